pub const SCHEMA: &str = r#"
-- Streams group models on the remote side
CREATE TABLE IF NOT EXISTS streams (
    id TEXT PRIMARY KEY,
    external_uuid TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL UNIQUE,
    active INTEGER NOT NULL DEFAULT 1
);

-- Models mirror remote apps; a stream cannot go while it still owns models
CREATE TABLE IF NOT EXISTS models (
    id TEXT PRIMARY KEY,
    external_uuid TEXT NOT NULL UNIQUE,
    description TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1,
    stream_id TEXT NOT NULL REFERENCES streams(id) ON DELETE RESTRICT
);

-- Fields of a model. No unique constraint on (name, source_table, data_type):
-- duplicates from racing sweeps are repaired by the dedup pass.
CREATE TABLE IF NOT EXISTS fields (
    id TEXT PRIMARY KEY,
    model_id TEXT NOT NULL REFERENCES models(id) ON DELETE CASCADE,
    name TEXT NOT NULL,
    source_table TEXT NOT NULL DEFAULT '',  -- '' = key field
    data_type TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);

-- History of triggered sweeps
CREATE TABLE IF NOT EXISTS sync_runs (
    id TEXT PRIMARY KEY,
    scope TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    apps_seen INTEGER NOT NULL DEFAULT 0,
    warning_count INTEGER NOT NULL DEFAULT 0,
    error TEXT
);

-- Advisory lock, one row per lock name
CREATE TABLE IF NOT EXISTS sync_lock (
    name TEXT PRIMARY KEY,
    owner TEXT NOT NULL,
    acquired_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_models_stream ON models(stream_id);
CREATE INDEX IF NOT EXISTS idx_fields_model ON fields(model_id);
CREATE INDEX IF NOT EXISTS idx_fields_identity ON fields(model_id, name, source_table);
CREATE INDEX IF NOT EXISTS idx_sync_runs_started ON sync_runs(started_at);
"#;

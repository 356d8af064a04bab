//! Reconciler behavior against an in-memory catalog and a fake remote.

mod common;

use serde_json::json;
use tempfile::TempDir;

use common::{FakeRemote, app, field, store};
use qscatalog::error::{Error, Result};
use qscatalog::snapshot::{FsSnapshotWriter, SnapshotReceipt, SnapshotSink};
use qscatalog::store::{Catalog, Filter, SqliteStore};
use qscatalog::sync::{
    CATALOG_LOCK, Reconciler, SyncContext, SyncLease, SyncReport, SyncScope, run_sync,
};
use qscatalog::types::{
    DataType, Field, Model, Stream, SyncStatus, UNASSIGNED_STREAM_DESCRIPTION,
    UNASSIGNED_STREAM_UUID,
};

fn sweep(store: &SqliteStore, remote: &FakeRemote) -> SyncReport {
    Reconciler::new(store, remote).reconcile_all().unwrap()
}

fn model(store: &SqliteStore, external_uuid: &str) -> Option<Model> {
    store
        .find(&Filter::all().eq("external_uuid", external_uuid))
        .unwrap()
}

fn stream(store: &SqliteStore, external_uuid: &str) -> Option<Stream> {
    store
        .find(&Filter::all().eq("external_uuid", external_uuid))
        .unwrap()
}

fn fields(store: &SqliteStore, model: &Model) -> Vec<Field> {
    store
        .filter(
            &Filter::all()
                .eq("model_id", &model.id)
                .order_by("name")
                .order_by("source_table"),
        )
        .unwrap()
}

fn field_set(store: &SqliteStore, model: &Model) -> Vec<(String, String, DataType)> {
    fields(store, model)
        .into_iter()
        .map(|f| (f.name, f.source_table, f.data_type))
        .collect()
}

fn sales_remote() -> FakeRemote {
    let remote = FakeRemote::new();
    remote.set_apps(vec![app("abc", "SalesApp", Some(("s1", "Sales")))]);
    remote.set_fields(
        "abc",
        json!([
            field("Revenue", &["$numeric"], &["Fact"]),
            field("Region", &["$text"], &["Dim"]),
        ]),
    );
    remote
}

#[test]
fn test_first_sweep_builds_catalog() {
    let store = store();
    let remote = sales_remote();

    let report = sweep(&store, &remote);

    assert_eq!(report.apps_seen, 1);
    assert_eq!(report.streams_created, 1);
    assert_eq!(report.models_created, 1);
    assert_eq!(report.fields_created, 2);
    assert!(report.warnings.is_empty());

    let sales = stream(&store, "s1").unwrap();
    assert_eq!(sales.description, "Sales");

    let sales_app = model(&store, "abc").unwrap();
    assert_eq!(sales_app.description, "SalesApp");
    assert_eq!(sales_app.stream_id, sales.id);

    assert_eq!(
        field_set(&store, &sales_app),
        vec![
            ("Region".to_string(), "Dim".to_string(), DataType::Text),
            ("Revenue".to_string(), "Fact".to_string(), DataType::Decimal),
        ]
    );
}

#[test]
fn test_second_sweep_changes_nothing() {
    let store = store();
    let remote = sales_remote();

    sweep(&store, &remote);
    let sales_app = model(&store, "abc").unwrap();
    let before = fields(&store, &sales_app);

    let report = sweep(&store, &remote);
    assert!(!report.has_changes(), "unexpected changes: {report:?}");
    assert_eq!(model(&store, "abc").unwrap(), sales_app);
    assert_eq!(fields(&store, &sales_app), before);
}

#[test]
fn test_removed_remote_field_is_deleted() {
    let store = store();
    let remote = sales_remote();
    remote.set_fields(
        "abc",
        json!([
            field("Revenue", &["$numeric"], &["Fact"]),
            field("OldField", &["$text"], &["Fact"]),
        ]),
    );
    sweep(&store, &remote);

    let sales_app = model(&store, "abc").unwrap();
    let revenue_id = fields(&store, &sales_app)
        .into_iter()
        .find(|f| f.name == "Revenue")
        .unwrap()
        .id;

    remote.set_fields("abc", json!([field("Revenue", &["$numeric"], &["Fact"])]));
    let report = sweep(&store, &remote);

    assert_eq!(report.fields_deleted, 1);
    assert_eq!(report.fields_created, 0);
    let remaining = fields(&store, &sales_app);
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, revenue_id);
    assert_eq!(remaining[0].data_type, DataType::Decimal);
}

#[test]
fn test_key_fields_and_hidden_fields() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![app("abc", "SalesApp", Some(("s1", "Sales")))]);
    remote.set_fields(
        "abc",
        json!([
            field("CustomerID", &["$key", "$integer"], &["Fact", "Dim"]),
            field("Orphan", &["$numeric"], &[]),
            {"name": "$Table", "tags": ["$system"], "is_system": true, "is_hidden": false, "src_tables": []},
            {"name": "Secret", "tags": ["$text"], "is_system": false, "is_hidden": true, "src_tables": ["Dim"]},
        ]),
    );

    sweep(&store, &remote);

    let rows = fields(&store, &model(&store, "abc").unwrap());
    assert_eq!(rows.len(), 2);

    let customer = rows.iter().find(|f| f.name == "CustomerID").unwrap();
    assert!(customer.is_key());
    assert_eq!(customer.source_table, "");
    assert_eq!(customer.data_type, DataType::Int);

    let orphan = rows.iter().find(|f| f.name == "Orphan").unwrap();
    assert!(orphan.is_key());
    assert_eq!(orphan.data_type, DataType::Decimal);
}

#[test]
fn test_duplicate_document_entries_collapse_to_first() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![app("abc", "SalesApp", Some(("s1", "Sales")))]);
    remote.set_fields(
        "abc",
        json!([
            field("Revenue", &["$integer"], &["Fact"]),
            field("Revenue", &["$text"], &["Fact"]),
        ]),
    );

    sweep(&store, &remote);

    assert_eq!(
        field_set(&store, &model(&store, "abc").unwrap()),
        vec![("Revenue".to_string(), "Fact".to_string(), DataType::Int)]
    );
}

#[test]
fn test_apps_without_stream_go_to_unassigned() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![
        app("abc", "Personal", None),
        json!({"id": "def", "name": "Half", "stream": {"name": "No id"}}),
    ]);

    let report = sweep(&store, &remote);
    assert_eq!(report.streams_created, 1);

    let unassigned = stream(&store, UNASSIGNED_STREAM_UUID).unwrap();
    assert_eq!(unassigned.description, UNASSIGNED_STREAM_DESCRIPTION);
    assert_eq!(model(&store, "abc").unwrap().stream_id, unassigned.id);
    assert_eq!(model(&store, "def").unwrap().stream_id, unassigned.id);
}

#[test]
fn test_unlisted_models_and_streams_are_deleted() {
    let store = store();
    let remote = sales_remote();
    remote.set_apps(vec![
        app("abc", "SalesApp", Some(("s1", "Sales"))),
        app("gone", "Legacy", Some(("s9", "Archive"))),
    ]);
    remote.set_fields("gone", json!([field("Amount", &["$numeric"], &["Old"])]));
    sweep(&store, &remote);
    assert_eq!(store.count::<Field>(&Filter::all()).unwrap(), 3);

    remote.set_apps(vec![app("abc", "SalesApp", Some(("s1", "Sales")))]);
    let report = sweep(&store, &remote);

    assert_eq!(report.models_deleted, 1);
    assert_eq!(report.streams_deleted, 1);
    assert!(model(&store, "gone").is_none());
    assert!(stream(&store, "s9").is_none());
    assert_eq!(store.count::<Model>(&Filter::all()).unwrap(), 1);
    assert_eq!(store.count::<Stream>(&Filter::all()).unwrap(), 1);
    assert_eq!(store.count::<Field>(&Filter::all()).unwrap(), 2);
}

#[test]
fn test_stream_rename_is_saved_once() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![
        app("abc", "SalesApp", Some(("s1", "Sales"))),
        app("def", "Pipeline", Some(("s1", "Sales"))),
    ]);
    sweep(&store, &remote);

    remote.set_apps(vec![
        app("abc", "SalesApp", Some(("s1", "Sales EMEA"))),
        app("def", "Pipeline", Some(("s1", "Sales EMEA"))),
    ]);
    let report = sweep(&store, &remote);

    assert_eq!(report.streams_updated, 1);
    assert_eq!(stream(&store, "s1").unwrap().description, "Sales EMEA");
}

#[test]
fn test_model_rename_and_move() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![app("abc", "SalesApp", Some(("s1", "Sales")))]);
    sweep(&store, &remote);

    remote.set_apps(vec![app("abc", "Sales 2026", Some(("s2", "Finance")))]);
    let report = sweep(&store, &remote);

    assert_eq!(report.models_updated, 1);
    assert_eq!(report.streams_created, 1);
    assert_eq!(report.streams_deleted, 1);

    let moved = model(&store, "abc").unwrap();
    assert_eq!(moved.description, "Sales 2026");
    assert_eq!(moved.stream_id, stream(&store, "s2").unwrap().id);
}

#[test]
fn test_stream_still_owning_models_is_kept() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![
        app("abc", "SalesApp", Some(("s1", "Sales"))),
        app("def", "Ledger", Some(("s3", "Finance"))),
    ]);
    sweep(&store, &remote);

    // s2 reuses the name of s3, which is still listed, so it cannot be stored.
    remote.set_apps(vec![
        app("abc", "SalesApp", Some(("s2", "Finance"))),
        app("def", "Ledger", Some(("s3", "Finance"))),
    ]);
    let report = sweep(&store, &remote);

    assert_eq!(report.streams_deleted, 0);
    assert_eq!(report.warnings.len(), 2);
    assert_eq!(report.warnings[0].app_id.as_deref(), Some("abc"));
    assert!(report.warnings[1].message.contains("still owns"));

    let sales = stream(&store, "s1").unwrap();
    assert_eq!(model(&store, "abc").unwrap().stream_id, sales.id);
    assert_eq!(stream(&store, "s3").unwrap().description, "Finance");
}

#[test]
fn test_recreated_stream_takes_over_old_row() {
    let store = store();
    let remote = sales_remote();
    sweep(&store, &remote);
    let original = stream(&store, "s1").unwrap();

    remote.set_apps(vec![app("abc", "SalesApp", Some(("s2", "Sales")))]);
    let report = sweep(&store, &remote);

    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.streams_updated, 1);
    assert_eq!(report.streams_created, 0);
    assert_eq!(report.streams_deleted, 0);

    assert!(stream(&store, "s1").is_none());
    let recreated = stream(&store, "s2").unwrap();
    assert_eq!(recreated.id, original.id);
    assert_eq!(recreated.description, "Sales");
    assert_eq!(model(&store, "abc").unwrap().stream_id, recreated.id);
    assert_eq!(fields(&store, &model(&store, "abc").unwrap()).len(), 2);

    let again = sweep(&store, &remote);
    assert!(!again.has_changes());
    assert!(again.warnings.is_empty());
}

#[test]
fn test_unnamed_stream_is_described_by_its_id() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![
        app("a1", "Personal", None),
        json!({"id": "a2", "name": "Shared", "stream": {"id": "s9", "name": null}}),
    ]);

    let report = sweep(&store, &remote);

    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    assert_eq!(report.streams_created, 2);
    let unnamed = stream(&store, "s9").unwrap();
    assert_eq!(unnamed.description, "s9");
    assert_eq!(model(&store, "a2").unwrap().stream_id, unnamed.id);
    assert_eq!(
        stream(&store, UNASSIGNED_STREAM_UUID).unwrap().description,
        UNASSIGNED_STREAM_DESCRIPTION
    );
}

#[test]
fn test_type_change_updates_in_place() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![app("abc", "SalesApp", Some(("s1", "Sales")))]);
    remote.set_fields("abc", json!([field("Revenue", &["$text"], &["Fact"])]));
    sweep(&store, &remote);

    let sales_app = model(&store, "abc").unwrap();
    let original = fields(&store, &sales_app).remove(0);
    assert_eq!(original.data_type, DataType::Text);

    remote.set_fields("abc", json!([field("Revenue", &["$numeric"], &["Fact"])]));
    let report = sweep(&store, &remote);

    assert_eq!(report.fields_updated, 1);
    assert_eq!(report.fields_created, 0);
    assert_eq!(report.fields_deleted, 0);

    let rows = fields(&store, &sales_app);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, original.id);
    assert_eq!(rows[0].data_type, DataType::Decimal);
}

#[test]
fn test_duplicate_rows_converge() {
    let store = store();
    let remote = sales_remote();
    sweep(&store, &remote);

    let sales_app = model(&store, "abc").unwrap();
    let copies: Vec<Field> = (0..3)
        .map(|_| Field::new(&sales_app.id, "Revenue", "Fact", DataType::Decimal))
        .collect();
    store.bulk_create(&copies).unwrap();
    assert_eq!(fields(&store, &sales_app).len(), 5);

    let report = Reconciler::new(&store, &remote)
        .reconcile_fields("abc")
        .unwrap();

    assert_eq!(report.fields_deleted, 3);
    assert_eq!(
        field_set(&store, &sales_app),
        vec![
            ("Region".to_string(), "Dim".to_string(), DataType::Text),
            ("Revenue".to_string(), "Fact".to_string(), DataType::Decimal),
        ]
    );
}

#[test]
fn test_stream_sweep_is_scoped() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![
        app("a1", "Alpha", Some(("s1", "Sales"))),
        app("a2", "Beta", Some(("s1", "Sales"))),
        app("a3", "Gamma", Some(("s1", "Sales"))),
        app("b1", "Delta", Some(("s2", "Finance"))),
        app("b2", "Epsilon", Some(("s2", "Finance"))),
    ]);
    sweep(&store, &remote);

    // a2 is gone, a3 moved to s2, b2 is gone, b3 is new in s2.
    remote.set_apps(vec![
        app("a1", "Alpha", Some(("s1", "Sales"))),
        app("a3", "Gamma", Some(("s2", "Finance"))),
        app("b1", "Delta", Some(("s2", "Finance"))),
        app("b3", "Zeta", Some(("s2", "Finance"))),
    ]);
    let calls_before = remote.metadata_calls();
    let report = Reconciler::new(&store, &remote)
        .reconcile_stream("s1")
        .unwrap();

    assert_eq!(report.apps_seen, 1);
    assert_eq!(remote.metadata_calls() - calls_before, 1);
    assert_eq!(report.models_deleted, 1);
    assert_eq!(report.streams_deleted, 0);

    assert!(model(&store, "a1").is_some());
    assert!(model(&store, "a2").is_none());
    assert!(model(&store, "a3").is_some());
    assert!(model(&store, "b2").is_some());
    assert!(model(&store, "b3").is_none());
}

#[test]
fn test_malformed_inventory_records_are_reported() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![
        json!({"name": "No id at all"}),
        app("abc", "SalesApp", Some(("s1", "Sales"))),
    ]);

    let report = sweep(&store, &remote);

    assert_eq!(report.apps_seen, 1);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].app_id.is_none());
    assert!(model(&store, "abc").is_some());
}

#[test]
fn test_per_app_failure_does_not_stop_sweep() {
    let store = store();
    let remote = sales_remote();
    remote.set_apps(vec![
        app("bad", "Broken", Some(("s1", "Sales"))),
        app("abc", "SalesApp", Some(("s1", "Sales"))),
    ]);
    remote.fail_metadata("bad");

    let report = sweep(&store, &remote);

    assert_eq!(report.warnings.len(), 1);
    let warning = &report.warnings[0];
    assert_eq!(warning.app_id.as_deref(), Some("bad"));
    assert_eq!(warning.app_name.as_deref(), Some("Broken"));
    assert!(warning.message.contains("503"));

    assert!(model(&store, "bad").is_some());
    assert_eq!(fields(&store, &model(&store, "abc").unwrap()).len(), 2);
}

#[test]
fn test_metadata_failure_keeps_previous_fields() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![
        app("a1", "Orders", Some(("s1", "Sales"))),
        app("a2", "Pipeline", Some(("s1", "Sales"))),
        app("a3", "Forecast", Some(("s1", "Sales"))),
    ]);
    for id in ["a1", "a2", "a3"] {
        remote.set_fields(id, json!([field("Amount", &["$numeric"], &["Fact"])]));
    }
    sweep(&store, &remote);
    let before = fields(&store, &model(&store, "a2").unwrap());

    for id in ["a1", "a2", "a3"] {
        remote.set_fields(id, json!([field("Amount", &["$integer"], &["Fact"])]));
    }
    remote.fail_metadata("a2");
    let report = sweep(&store, &remote);

    assert_eq!(report.apps_seen, 3);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].app_id.as_deref(), Some("a2"));
    assert_eq!(report.fields_updated, 2);

    let after = fields(&store, &model(&store, "a2").unwrap());
    assert_eq!(after.len(), before.len());
    assert_eq!(after[0].id, before[0].id);
    assert_eq!(after[0].data_type, DataType::Decimal);

    for id in ["a1", "a3"] {
        assert_eq!(
            field_set(&store, &model(&store, id).unwrap()),
            vec![("Amount".to_string(), "Fact".to_string(), DataType::Int)]
        );
    }
}

#[test]
fn test_inventory_failure_leaves_catalog_untouched() {
    let store = store();
    let remote = sales_remote();
    sweep(&store, &remote);

    remote.set_apps(Vec::new());
    remote.set_inventory_down(true);

    let result = Reconciler::new(&store, &remote).reconcile_all();
    assert!(matches!(result, Err(Error::RemoteUnavailable(_))));
    assert_eq!(store.count::<Stream>(&Filter::all()).unwrap(), 1);
    assert_eq!(store.count::<Model>(&Filter::all()).unwrap(), 1);
    assert_eq!(store.count::<Field>(&Filter::all()).unwrap(), 2);
}

#[test]
fn test_reconcile_fields_requires_known_model() {
    let store = store();
    let remote = sales_remote();

    let result = Reconciler::new(&store, &remote).reconcile_fields("abc");
    assert!(matches!(result, Err(Error::NotFound)));
}

#[test]
fn test_metadata_stream_relinks_model() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![
        app("abc", "SalesApp", Some(("s1", "Sales"))),
        app("def", "Budget", Some(("s2", "Finance"))),
    ]);
    sweep(&store, &remote);

    remote.set_metadata(
        "abc",
        json!({
            "fields": [field("Revenue", &["$numeric"], &["Fact"])],
            "stream": {"id": "s2", "name": "Finance"}
        }),
    );
    let report = Reconciler::new(&store, &remote)
        .reconcile_fields("abc")
        .unwrap();

    assert_eq!(report.models_updated, 1);
    assert_eq!(
        model(&store, "abc").unwrap().stream_id,
        stream(&store, "s2").unwrap().id
    );
}

#[test]
fn test_external_ids_are_normalized() {
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![app(
        "A1B2C3D4-0000-4000-8000-00000000ABCD",
        "SalesApp",
        Some(("5F3E4A1C00004000800000000000FFFF", "Sales")),
    )]);
    remote.set_fields(
        "a1b2c3d4-0000-4000-8000-00000000abcd",
        json!([field("Revenue", &["$numeric"], &["Fact"])]),
    );
    sweep(&store, &remote);

    let sales_app = model(&store, "a1b2c3d4-0000-4000-8000-00000000abcd").unwrap();
    assert!(stream(&store, "5f3e4a1c-0000-4000-8000-00000000ffff").is_some());
    assert_eq!(fields(&store, &sales_app).len(), 1);

    remote.set_apps(vec![app(
        "a1b2c3d4-0000-4000-8000-00000000abcd",
        "SalesApp",
        Some(("5f3e4a1c-0000-4000-8000-00000000ffff", "Sales")),
    )]);
    let report = sweep(&store, &remote);
    assert!(!report.has_changes());
    assert_eq!(store.count::<Model>(&Filter::all()).unwrap(), 1);
}

#[test]
fn test_snapshots_keep_whole_document() {
    let temp = TempDir::new().unwrap();
    let writer = FsSnapshotWriter::at(temp.path());
    let store = store();
    let remote = FakeRemote::new();
    remote.set_apps(vec![app("abc", "SalesApp", Some(("s1", "Sales")))]);
    remote.set_metadata(
        "abc",
        json!({
            "fields": [field("Revenue", &["$numeric"], &["Fact"])],
            "static_byte_size": 2048
        }),
    );

    let report = Reconciler::new(&store, &remote)
        .with_snapshots(Some(&writer as &dyn SnapshotSink))
        .reconcile_all()
        .unwrap();

    assert_eq!(report.snapshots_written, 1);
    let snapshot = writer.read_snapshot("abc").unwrap().unwrap();
    assert_eq!(snapshot["static_byte_size"], 2048);
    assert_eq!(snapshot["fields"][0]["name"], "Revenue");
}

struct BrokenSink;

impl SnapshotSink for BrokenSink {
    fn write_snapshot(&self, _key: &str, _payload: &serde_json::Value) -> Result<SnapshotReceipt> {
        Err(Error::Io(std::io::Error::other("disk full")))
    }
}

#[test]
fn test_snapshot_failure_is_a_warning() {
    let store = store();
    let remote = sales_remote();

    let report = Reconciler::new(&store, &remote)
        .with_snapshots(Some(&BrokenSink as &dyn SnapshotSink))
        .reconcile_all()
        .unwrap();

    assert_eq!(report.snapshots_written, 0);
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].message.contains("disk full"));
    assert_eq!(report.fields_created, 2);
}

#[test]
fn test_run_sync_is_exclusive_and_recorded() {
    let store = store();
    let remote = sales_remote();
    let ctx = SyncContext {
        store: &store,
        remote: &remote,
        snapshots: None,
        lock_ttl: chrono::Duration::minutes(15),
    };

    let held = SyncLease::acquire(&store, CATALOG_LOCK, chrono::Duration::minutes(15)).unwrap();
    assert!(matches!(
        run_sync(&ctx, &SyncScope::All),
        Err(Error::SyncInProgress)
    ));
    drop(held);

    let report = run_sync(&ctx, &SyncScope::All).unwrap();
    assert_eq!(report.apps_seen, 1);

    let runs = store.list_sync_runs(10).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].scope, "all");
    assert_eq!(runs[0].status, SyncStatus::Succeeded);
    assert_eq!(runs[0].apps_seen, 1);
    assert!(runs[0].finished_at.is_some());
}

#[test]
fn test_failed_run_is_recorded() {
    let store = store();
    let remote = sales_remote();
    remote.set_inventory_down(true);
    let ctx = SyncContext {
        store: &store,
        remote: &remote,
        snapshots: None,
        lock_ttl: chrono::Duration::minutes(15),
    };

    assert!(run_sync(&ctx, &SyncScope::All).is_err());

    let runs = store.list_sync_runs(10).unwrap();
    assert_eq!(runs[0].status, SyncStatus::Failed);
    assert!(runs[0].error.as_deref().unwrap().contains("connection refused"));

    // The lock was released despite the failure.
    remote.set_inventory_down(false);
    assert!(run_sync(&ctx, &SyncScope::All).is_ok());
}

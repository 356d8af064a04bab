use std::collections::{BTreeMap, HashMap, HashSet};

use super::classify::classify;
use super::report::SyncReport;
use crate::error::{Error, Result};
use crate::remote::RemoteInventory;
use crate::snapshot::SnapshotSink;
use crate::store::upsert::{deduplicate, diff_and_apply, get_or_create};
use crate::store::{Catalog, Filter, IntoValue};
use crate::types::{
    DataType, Field, KEY_FIELD_TABLE, Model, RemoteAppRecord, RemoteFieldRecord, RemoteStreamRef,
    Stream, UNASSIGNED_STREAM_DESCRIPTION, UNASSIGNED_STREAM_UUID, normalize_external_id,
};

/// Columns identifying a field row once its type is settled.
const FIELD_DISTINCT_ON: &[&str] = &["name", "source_table", "data_type"];

/// Mirrors the remote inventory into the catalog.
pub struct Reconciler<'a, S: Catalog> {
    store: &'a S,
    remote: &'a dyn RemoteInventory,
    snapshots: Option<&'a dyn SnapshotSink>,
}

/// Per-sweep working state.
#[derive(Default)]
struct Sweep {
    /// Streams resolved so far, by external uuid
    resolved: HashMap<String, Stream>,
    /// Streams with a description change not yet saved
    pending: Vec<Stream>,
    streams_to_delete: HashSet<String>,
    models_to_delete: HashSet<String>,
    /// Stream keys the inventory refers to
    listed_streams: HashSet<String>,
}

impl<'a, S: Catalog> Reconciler<'a, S> {
    pub fn new(store: &'a S, remote: &'a dyn RemoteInventory) -> Self {
        Self {
            store,
            remote,
            snapshots: None,
        }
    }

    #[must_use]
    pub fn with_snapshots(mut self, snapshots: Option<&'a dyn SnapshotSink>) -> Self {
        self.snapshots = snapshots;
        self
    }

    /// Full sweep: every remote app, then removal of every stream and model the
    /// remote no longer lists.
    pub fn reconcile_all(&self) -> Result<SyncReport> {
        self.sweep(None)
    }

    /// Sweep restricted to the apps of one stream. Models under that stream that the
    /// remote no longer lists are removed; streams are never deleted here.
    pub fn reconcile_stream(&self, stream_external_id: &str) -> Result<SyncReport> {
        let key = normalize_external_id(stream_external_id)
            .map_err(|_| Error::BadRequest("stream id cannot be empty".to_string()))?;
        self.sweep(Some(key))
    }

    /// Reconciles the field list of one model against its remote metadata.
    pub fn reconcile_fields(&self, app_external_id: &str) -> Result<SyncReport> {
        let key = normalize_external_id(app_external_id)
            .map_err(|_| Error::BadRequest("model id cannot be empty".to_string()))?;
        let mut report = SyncReport::new(format!("model:{key}"));
        self.sync_fields(&key, &mut report)?;
        Ok(report)
    }

    fn sweep(&self, stream_key: Option<String>) -> Result<SyncReport> {
        let scope = match &stream_key {
            Some(key) => format!("stream:{key}"),
            None => "all".to_string(),
        };
        tracing::info!("Starting catalog sweep ({})", scope);

        // Nothing is written before the inventory is in hand.
        let inventory = self.remote.fetch_app_inventory()?;

        let mut report = SyncReport::new(scope);
        for note in &inventory.skipped {
            report.warn(format!("skipped inventory {note}"));
        }

        let mut sweep = self.deletion_candidates(stream_key.as_deref())?;
        sweep.listed_streams = inventory.apps.iter().map(|app| stream_of(app).0).collect();

        // Anything the remote still lists survives, whatever stream it sits in.
        for app in &inventory.apps {
            if let Ok(key) = normalize_external_id(&app.id) {
                sweep.models_to_delete.remove(&key);
            }
        }

        for app in &inventory.apps {
            let (stream_uuid, stream_description) = stream_of(app);
            if stream_key
                .as_deref()
                .is_some_and(|key| key != stream_uuid.as_str())
            {
                continue;
            }

            report.apps_seen += 1;
            if let Err(e) =
                self.reconcile_app(app, &stream_uuid, &stream_description, &mut sweep, &mut report)
            {
                report.warn_app(&app.id, &app.name, e.to_string());
            }
        }

        self.save_pending_streams(&mut sweep, &mut report)?;
        self.delete_stale(&sweep, &mut report)?;

        tracing::info!(
            "Finished catalog sweep ({}): {} apps, {} warnings",
            report.scope,
            report.apps_seen,
            report.warnings.len()
        );
        Ok(report)
    }

    fn deletion_candidates(&self, stream_key: Option<&str>) -> Result<Sweep> {
        let mut sweep = Sweep::default();
        match stream_key {
            None => {
                sweep.streams_to_delete = self
                    .store
                    .filter::<Stream>(&Filter::all())?
                    .into_iter()
                    .map(|s| s.id)
                    .collect();
                sweep.models_to_delete = self
                    .store
                    .filter::<Model>(&Filter::all())?
                    .into_iter()
                    .map(|m| m.external_uuid)
                    .collect();
            }
            Some(key) => {
                if let Some(stream) = self
                    .store
                    .find::<Stream>(&Filter::all().eq("external_uuid", key))?
                {
                    sweep.models_to_delete = self
                        .store
                        .filter::<Model>(&Filter::all().eq("stream_id", &stream.id))?
                        .into_iter()
                        .map(|m| m.external_uuid)
                        .collect();
                }
            }
        }
        Ok(sweep)
    }

    fn reconcile_app(
        &self,
        app: &RemoteAppRecord,
        stream_uuid: &str,
        stream_description: &str,
        sweep: &mut Sweep,
        report: &mut SyncReport,
    ) -> Result<()> {
        let app_key = normalize_external_id(&app.id)?;

        let stream = self.resolve_stream(stream_uuid, stream_description, sweep, report)?;
        sweep.streams_to_delete.remove(&stream.id);

        let existing = self
            .store
            .find::<Model>(&Filter::all().eq("external_uuid", &app_key))?;
        match existing {
            None => {
                let model = Model::new(&app_key, &app.name, &stream.id);
                self.store.create(&model)?;
                report.models_created += 1;
                tracing::info!("Created model {} ({})", app_key, app.name);
            }
            Some(model) => {
                let before = model.clone();
                let (_, model) = diff_and_apply(
                    self.store,
                    model,
                    &[
                        ("description", app.name.as_str().into_value()),
                        ("stream_id", stream.id.as_str().into_value()),
                    ],
                    true,
                )?;
                if model != before {
                    report.models_updated += 1;
                }
            }
        }

        self.sync_fields(&app_key, report)
    }

    fn resolve_stream(
        &self,
        external_uuid: &str,
        description: &str,
        sweep: &mut Sweep,
        report: &mut SyncReport,
    ) -> Result<Stream> {
        if let Some(stream) = sweep.resolved.get(external_uuid) {
            return Ok(stream.clone());
        }

        self.adopt_recreated_stream(external_uuid, description, sweep, report)?;

        let (created, stream) = get_or_create::<Stream, _>(
            self.store,
            &[("external_uuid", external_uuid.into_value())],
            &[("description", description.into_value())],
        )?;

        let stream = if created {
            report.streams_created += 1;
            tracing::info!("Created stream {} ({})", external_uuid, description);
            stream
        } else {
            let (changed, stream) = diff_and_apply(
                self.store,
                stream,
                &[("description", description.into_value())],
                false,
            )?;
            if changed {
                sweep.pending.push(stream.clone());
            }
            stream
        };

        sweep
            .resolved
            .insert(external_uuid.to_string(), stream.clone());
        Ok(stream)
    }

    /// A stream deleted and re-created remotely comes back under a new id with the
    /// same name. The row still holding that name is re-keyed in place when the
    /// remote no longer lists its old id, so its models follow it.
    fn adopt_recreated_stream(
        &self,
        external_uuid: &str,
        description: &str,
        sweep: &Sweep,
        report: &mut SyncReport,
    ) -> Result<()> {
        if self
            .store
            .count::<Stream>(&Filter::all().eq("external_uuid", external_uuid))?
            > 0
        {
            return Ok(());
        }

        let Some(mut stream) = self
            .store
            .find::<Stream>(&Filter::all().eq("description", description))?
        else {
            return Ok(());
        };
        if stream.external_uuid == UNASSIGNED_STREAM_UUID
            || sweep.listed_streams.contains(&stream.external_uuid)
        {
            return Ok(());
        }

        tracing::info!(
            "Stream {} ({}) re-created remotely as {}",
            stream.external_uuid,
            description,
            external_uuid
        );
        stream.external_uuid = external_uuid.to_string();
        self.store.update(&stream)?;
        report.streams_updated += 1;
        Ok(())
    }

    fn save_pending_streams(&self, sweep: &mut Sweep, report: &mut SyncReport) -> Result<()> {
        if sweep.pending.is_empty() {
            return Ok(());
        }

        match self.store.bulk_update(&sweep.pending) {
            Ok(updated) => {
                report.streams_updated += updated;
                Ok(())
            }
            Err(Error::PersistenceConflict(msg)) => {
                report.warn(format!("stream descriptions not saved: {msg}"));
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    fn delete_stale(&self, sweep: &Sweep, report: &mut SyncReport) -> Result<()> {
        if !sweep.models_to_delete.is_empty() {
            let removed = self.store.delete::<Model>(
                &Filter::all().is_in("external_uuid", &sweep.models_to_delete),
            )?;
            if removed > 0 {
                tracing::info!("Deleted {} models no longer listed remotely", removed);
            }
            report.models_deleted += removed;
        }

        for stream_id in &sweep.streams_to_delete {
            let Some(stream) = self
                .store
                .find::<Stream>(&Filter::all().eq("id", stream_id))?
            else {
                continue;
            };

            let owned = self
                .store
                .count::<Model>(&Filter::all().eq("stream_id", &stream.id))?;
            if owned > 0 {
                report.warn(format!(
                    "stream {} ({}) is no longer listed but still owns {} models; kept",
                    stream.external_uuid, stream.description, owned
                ));
                continue;
            }

            match self
                .store
                .delete::<Stream>(&Filter::all().eq("id", &stream.id))
            {
                Ok(removed) => {
                    report.streams_deleted += removed;
                    tracing::info!("Deleted stream {} ({})", stream.external_uuid, stream.description);
                }
                Err(Error::PersistenceConflict(msg)) => {
                    report.warn(format!("stream {} kept: {msg}", stream.external_uuid));
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    fn sync_fields(&self, app_key: &str, report: &mut SyncReport) -> Result<()> {
        let document = self.remote.fetch_field_metadata(app_key)?;

        let mut model = self
            .store
            .find::<Model>(&Filter::all().eq("external_uuid", app_key))?
            .ok_or(Error::NotFound)?;

        if let Some(stream) = self.metadata_stream(document.stream.as_ref())? {
            if model.stream_id != stream.id {
                let (_, moved) = diff_and_apply(
                    self.store,
                    model,
                    &[("stream_id", stream.id.as_str().into_value())],
                    true,
                )?;
                model = moved;
                report.models_updated += 1;
                tracing::info!("Moved model {} to stream {}", app_key, stream.external_uuid);
            }
        }

        let live = live_fields(&document.fields);
        let scope = Filter::all().eq("model_id", &model.id);
        let existing = self.store.filter::<Field>(&scope)?;

        let mut matched: HashSet<(String, String)> = HashSet::new();
        let mut retyped = Vec::new();
        let mut stale = Vec::new();
        for field in existing {
            let identity = (field.name.clone(), field.source_table.clone());
            match live.get(&identity) {
                Some(data_type) if matched.insert(identity) => {
                    if field.data_type != *data_type {
                        let mut field = field;
                        field.data_type = *data_type;
                        retyped.push(field);
                    }
                }
                _ => stale.push(field.id),
            }
        }

        let created: Vec<Field> = live
            .iter()
            .filter(|(identity, _)| !matched.contains(*identity))
            .map(|((name, table), data_type)| Field::new(&model.id, name, table, *data_type))
            .collect();

        if !stale.is_empty() {
            report.fields_deleted += self
                .store
                .delete::<Field>(&Filter::all().is_in("id", &stale))?;
        }
        report.fields_updated += self.store.bulk_update(&retyped)?;
        report.fields_created += self.store.bulk_create(&created)?;
        report.duplicates_removed +=
            deduplicate::<Field, _>(self.store, &scope, FIELD_DISTINCT_ON)?;

        tracing::debug!(
            "Model {}: {} fields live, {} created, {} retyped, {} stale",
            app_key,
            live.len(),
            created.len(),
            retyped.len(),
            stale.len()
        );

        if let Some(sink) = self.snapshots {
            let written = serde_json::to_value(&document)
                .map_err(Error::from)
                .and_then(|payload| sink.write_snapshot(app_key, &payload));
            match written {
                Ok(_) => report.snapshots_written += 1,
                Err(e) => report.warn_app(
                    app_key,
                    &model.description,
                    format!("snapshot not written: {e}"),
                ),
            }
        }

        Ok(())
    }

    /// The known stream named by a metadata document, if any. Unknown streams are
    /// left for the next inventory sweep to create.
    fn metadata_stream(&self, stream: Option<&RemoteStreamRef>) -> Result<Option<Stream>> {
        let Some(id) = stream
            .and_then(|s| s.id.as_deref())
            .filter(|id| !id.trim().is_empty())
        else {
            return Ok(None);
        };

        let key = normalize_external_id(id)?;
        self.store
            .find::<Stream>(&Filter::all().eq("external_uuid", &key))
    }
}

/// Stream key and description of an app. Apps without a usable stream reference go
/// to the unassigned stream; a stream without a name is described by its key.
fn stream_of(app: &RemoteAppRecord) -> (String, String) {
    match app.stream_ref() {
        Some((id, name)) => match normalize_external_id(id) {
            Ok(key) => {
                let description = name
                    .filter(|n| !n.trim().is_empty())
                    .map_or_else(|| key.clone(), str::to_string);
                (key, description)
            }
            Err(_) => unassigned(),
        },
        None => unassigned(),
    }
}

fn unassigned() -> (String, String) {
    (
        UNASSIGNED_STREAM_UUID.to_string(),
        UNASSIGNED_STREAM_DESCRIPTION.to_string(),
    )
}

/// Cataloged fields keyed by (name, table). The first entry for an identity wins.
fn live_fields(fields: &[RemoteFieldRecord]) -> BTreeMap<(String, String), DataType> {
    let mut live = BTreeMap::new();
    for field in fields.iter().filter(|f| f.is_cataloged()) {
        let table = match field.src_tables.as_slice() {
            [single] => single.clone(),
            _ => KEY_FIELD_TABLE.to_string(),
        };
        live.entry((field.name.clone(), table))
            .or_insert_with(|| classify(&field.tags));
    }
    live
}

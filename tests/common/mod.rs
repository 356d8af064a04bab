#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use serde_json::{Value, json};

use qscatalog::error::{Error, Result};
use qscatalog::remote::RemoteInventory;
use qscatalog::store::{Catalog, SqliteStore};
use qscatalog::types::{AppInventory, FieldMetadataDocument, normalize_external_id};

/// In-memory remote side for driving the reconciler.
#[derive(Default)]
pub struct FakeRemote {
    apps: Mutex<Vec<Value>>,
    metadata: Mutex<HashMap<String, Value>>,
    failing: Mutex<HashSet<String>>,
    inventory_down: AtomicBool,
    metadata_calls: AtomicUsize,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_apps(&self, apps: Vec<Value>) {
        *self.apps.lock().unwrap() = apps;
    }

    /// Sets the `fields` array served for an app.
    pub fn set_fields(&self, app_id: &str, fields: Value) {
        self.set_metadata(app_id, json!({ "fields": fields }));
    }

    pub fn set_metadata(&self, app_id: &str, document: Value) {
        self.metadata
            .lock()
            .unwrap()
            .insert(normalize_external_id(app_id).unwrap(), document);
    }

    pub fn fail_metadata(&self, app_id: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(normalize_external_id(app_id).unwrap());
    }

    pub fn set_inventory_down(&self, down: bool) {
        self.inventory_down.store(down, Ordering::SeqCst);
    }

    pub fn metadata_calls(&self) -> usize {
        self.metadata_calls.load(Ordering::SeqCst)
    }
}

impl RemoteInventory for FakeRemote {
    fn fetch_app_inventory(&self) -> Result<AppInventory> {
        if self.inventory_down.load(Ordering::SeqCst) {
            return Err(Error::RemoteUnavailable("connection refused".to_string()));
        }
        Ok(AppInventory::from_values(self.apps.lock().unwrap().clone()))
    }

    fn fetch_field_metadata(&self, app_external_id: &str) -> Result<FieldMetadataDocument> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        let key = normalize_external_id(app_external_id)?;
        if self.failing.lock().unwrap().contains(&key) {
            return Err(Error::RemoteUnavailable(format!(
                "GET /api/v1/apps/{key}/data/metadata returned 503 Service Unavailable"
            )));
        }

        let document = self
            .metadata
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| json!({ "fields": [] }));
        Ok(serde_json::from_value(document)?)
    }
}

pub fn app(id: &str, name: &str, stream: Option<(&str, &str)>) -> Value {
    match stream {
        Some((stream_id, stream_name)) => json!({
            "id": id,
            "name": name,
            "stream": { "id": stream_id, "name": stream_name },
            "owner": { "userId": "svc_qlik" }
        }),
        None => json!({ "id": id, "name": name, "stream": null }),
    }
}

pub fn field(name: &str, tags: &[&str], tables: &[&str]) -> Value {
    json!({
        "name": name,
        "tags": tags,
        "is_system": false,
        "is_hidden": false,
        "src_tables": tables
    })
}

pub fn store() -> SqliteStore {
    let store = SqliteStore::in_memory().unwrap();
    store.initialize().unwrap();
    store
}

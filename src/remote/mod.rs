mod client;

pub use client::QlikClient;

use crate::error::Result;
use crate::types::{AppInventory, FieldMetadataDocument};

/// Source of remote app inventory and per-app field metadata.
pub trait RemoteInventory: Send + Sync {
    /// Lists every app visible to the service account.
    fn fetch_app_inventory(&self) -> Result<AppInventory>;

    /// Fetches the data model metadata of one app.
    fn fetch_field_metadata(&self, app_external_id: &str) -> Result<FieldMetadataDocument>;
}

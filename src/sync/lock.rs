use uuid::Uuid;

use crate::error::{Error, Result};
use crate::store::Catalog;

/// Name of the lock serializing catalog sweeps.
pub const CATALOG_LOCK: &str = "catalog";

/// Held advisory lock, released when dropped.
pub struct SyncLease<'a, S: Catalog> {
    store: &'a S,
    name: &'static str,
    owner: String,
}

impl<'a, S: Catalog> SyncLease<'a, S> {
    /// Takes the lock or fails with `SyncInProgress` while another live holder has it.
    pub fn acquire(store: &'a S, name: &'static str, stale_after: chrono::Duration) -> Result<Self> {
        let owner = format!("{}:{}", std::process::id(), Uuid::new_v4());
        if !store.try_acquire_lock(name, &owner, stale_after)? {
            return Err(Error::SyncInProgress);
        }
        tracing::debug!("Acquired '{}' lock as {}", name, owner);
        Ok(Self { store, name, owner })
    }

    #[must_use]
    pub fn owner(&self) -> &str {
        &self.owner
    }
}

impl<S: Catalog> Drop for SyncLease<'_, S> {
    fn drop(&mut self) {
        match self.store.release_lock(self.name, &self.owner) {
            Ok(true) => tracing::debug!("Released '{}' lock", self.name),
            Ok(false) => tracing::warn!("'{}' lock was taken over before release", self.name),
            Err(e) => tracing::error!("Failed to release '{}' lock: {}", self.name, e),
        }
    }
}

mod entities;
mod filter;
mod schema;
mod sqlite;
pub mod upsert;

pub use filter::{Filter, IntoValue};
pub use sqlite::SqliteStore;

use rusqlite::Row;
use rusqlite::types::Value;

use crate::error::Result;
use crate::types::SyncRun;

/// Capability shared by every catalog entity: a table, its columns and a way to move
/// column values in and out of the Rust type.
///
/// The generic upsert helpers and [`Catalog`] work through this trait, so entity
/// types are fixed at compile time.
pub trait Persistable: Clone + Send + Sized {
    const TABLE: &'static str;
    /// Column names in storage order. The first one is the primary key.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> &str;

    /// A new, unsaved entity with a fresh id and default values.
    fn blank() -> Self;

    /// Builds the entity from a row selected with [`Self::COLUMNS`] in order.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Column values in [`Self::COLUMNS`] order.
    fn to_values(&self) -> Vec<Value>;

    fn set_value(&mut self, column: &str, value: Value) -> Result<()>;

    fn value(&self, column: &str) -> Option<Value> {
        let index = Self::COLUMNS.iter().position(|c| *c == column)?;
        self.to_values().into_iter().nth(index)
    }
}

/// Catalog defines the persistence interface consumed by the reconciler.
pub trait Catalog: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // Entity operations
    fn find<T: Persistable>(&self, filter: &Filter) -> Result<Option<T>>;
    fn filter<T: Persistable>(&self, filter: &Filter) -> Result<Vec<T>>;
    fn count<T: Persistable>(&self, filter: &Filter) -> Result<i64>;
    fn distinct<T: Persistable>(&self, filter: &Filter, columns: &[&str])
    -> Result<Vec<Vec<Value>>>;
    fn create<T: Persistable>(&self, entity: &T) -> Result<()>;
    fn bulk_create<T: Persistable>(&self, entities: &[T]) -> Result<usize>;
    fn update<T: Persistable>(&self, entity: &T) -> Result<()>;
    fn bulk_update<T: Persistable>(&self, entities: &[T]) -> Result<usize>;
    fn delete<T: Persistable>(&self, filter: &Filter) -> Result<usize>;

    // Sync run history
    fn create_sync_run(&self, run: &SyncRun) -> Result<()>;
    fn finish_sync_run(&self, run: &SyncRun) -> Result<()>;
    fn list_sync_runs(&self, limit: i64) -> Result<Vec<SyncRun>>;

    // Advisory lock
    fn try_acquire_lock(&self, name: &str, owner: &str, stale_after: chrono::Duration)
    -> Result<bool>;
    fn release_lock(&self, name: &str, owner: &str) -> Result<bool>;
}

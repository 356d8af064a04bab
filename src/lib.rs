//! # qscatalog
//!
//! Mirrors the app inventory and data model metadata of a Qlik Sense site into a
//! local SQLite catalog of streams, models and fields. Usable both as a standalone
//! binary and as a library.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! qscatalog = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::path::Path;
//! use qscatalog::config::AppConfig;
//! use qscatalog::remote::QlikClient;
//! use qscatalog::snapshot::FsSnapshotWriter;
//! use qscatalog::store::{Catalog, SqliteStore};
//! use qscatalog::sync::{SyncContext, SyncScope, run_sync};
//!
//! let config = AppConfig::load(Path::new("qscatalog.toml"))?;
//! let store = SqliteStore::new(config.db_path())?;
//! store.initialize()?;
//!
//! let client = QlikClient::new(&config.remote)?;
//! let writer = FsSnapshotWriter::new(&config);
//! let ctx = SyncContext {
//!     store: &store,
//!     remote: &client,
//!     snapshots: Some(&writer),
//!     lock_ttl: config.lock_ttl(),
//! };
//! let report = run_sync(&ctx, &SyncScope::All)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Includes CLI module. Disable with `default-features = false`.

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod remote;
pub mod server;
pub mod snapshot;
pub mod store;
pub mod sync;
pub mod types;

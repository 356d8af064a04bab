//! Catalog reconciliation against the remote inventory.

mod classify;
mod lock;
mod reconciler;
mod report;

pub use classify::classify;
pub use lock::{CATALOG_LOCK, SyncLease};
pub use reconciler::Reconciler;
pub use report::{SyncReport, SyncWarning};

use chrono::Utc;
use uuid::Uuid;

use crate::error::Result;
use crate::remote::RemoteInventory;
use crate::snapshot::SnapshotSink;
use crate::store::Catalog;
use crate::types::{SyncRun, SyncStatus};

/// What a triggered sync covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncScope {
    All,
    Stream(String),
    Model(String),
}

impl SyncScope {
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            SyncScope::All => "all".to_string(),
            SyncScope::Stream(id) => format!("stream:{id}"),
            SyncScope::Model(id) => format!("model:{id}"),
        }
    }
}

/// Everything a triggered sync needs besides its scope.
pub struct SyncContext<'a, S: Catalog> {
    pub store: &'a S,
    pub remote: &'a dyn RemoteInventory,
    pub snapshots: Option<&'a dyn SnapshotSink>,
    pub lock_ttl: chrono::Duration,
}

/// Runs one sync under the catalog lock and records it in the run history.
///
/// Fails with `SyncInProgress` when another sweep holds the lock. Sweep-level errors
/// are recorded on the run and returned; per-app problems are in the report.
pub fn run_sync<S: Catalog>(ctx: &SyncContext<'_, S>, scope: &SyncScope) -> Result<SyncReport> {
    let _lease = SyncLease::acquire(ctx.store, CATALOG_LOCK, ctx.lock_ttl)?;

    let mut run = SyncRun {
        id: Uuid::new_v4().to_string(),
        scope: scope.label(),
        status: SyncStatus::Running,
        started_at: Utc::now(),
        finished_at: None,
        apps_seen: 0,
        warning_count: 0,
        error: None,
    };
    ctx.store.create_sync_run(&run)?;

    let reconciler = Reconciler::new(ctx.store, ctx.remote).with_snapshots(ctx.snapshots);
    let result = match scope {
        SyncScope::All => reconciler.reconcile_all(),
        SyncScope::Stream(id) => reconciler.reconcile_stream(id),
        SyncScope::Model(id) => reconciler.reconcile_fields(id),
    };

    run.finished_at = Some(Utc::now());
    match &result {
        Ok(report) => {
            run.status = SyncStatus::Succeeded;
            run.apps_seen = i64::try_from(report.apps_seen).unwrap_or(i64::MAX);
            run.warning_count = i64::try_from(report.warnings.len()).unwrap_or(i64::MAX);
        }
        Err(e) => {
            tracing::error!("Sync {} failed: {}", run.scope, e);
            run.status = SyncStatus::Failed;
            run.error = Some(e.to_string());
        }
    }

    if let Err(e) = ctx.store.finish_sync_run(&run) {
        tracing::error!("Failed to record sync run {}: {}", run.id, e);
    }

    result
}

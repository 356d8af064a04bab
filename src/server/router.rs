use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::{
    Router,
    routing::{get, post},
};

use super::{catalog, sync};
use crate::config::AppConfig;
use crate::remote::RemoteInventory;
use crate::snapshot::{FsSnapshotWriter, SnapshotSink};
use crate::store::SqliteStore;

pub struct AppState {
    pub store: Arc<SqliteStore>,
    /// `None` when the remote side is not configured; sync routes then fail.
    pub remote: Option<Arc<dyn RemoteInventory>>,
    pub snapshots: Arc<FsSnapshotWriter>,
    pub config: AppConfig,
}

impl AppState {
    /// The snapshot sink handed to sweeps, if snapshots are enabled.
    #[must_use]
    pub fn snapshot_sink(&self) -> Option<&dyn SnapshotSink> {
        if self.config.sync.snapshots {
            Some(&*self.snapshots as &dyn SnapshotSink)
        } else {
            None
        }
    }
}

async fn health() -> &'static str {
    "OK"
}

async fn log_request(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();

    let response = next.run(request).await;

    let latency = start.elapsed();
    let status = response.status();

    tracing::info!(
        "{} {} {} {}ms",
        method,
        uri.path(),
        status.as_u16(),
        latency.as_millis()
    );

    response
}

fn api_router() -> Router<Arc<AppState>> {
    Router::new()
        // Sync triggers
        .route("/sync", post(sync::sync_all))
        .route("/sync/runs", get(sync::list_runs))
        .route("/sync/streams/{uuid}", post(sync::sync_stream))
        .route("/models/{uuid}/sync", post(sync::sync_model))
        // Catalog
        .route("/streams", get(catalog::list_streams))
        .route("/streams/{uuid}", get(catalog::get_stream))
        .route("/streams/{uuid}/models", get(catalog::list_stream_models))
        .route("/models", get(catalog::list_models))
        .route("/models/{uuid}", get(catalog::get_model))
        .route("/models/{uuid}/fields", get(catalog::list_model_fields))
        .route("/models/{uuid}/snapshot", get(catalog::get_model_snapshot))
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api_router())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

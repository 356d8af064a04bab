use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::RunsParams;
use crate::server::response::{ApiError, ApiResponse, StoreResultExt};
use crate::store::Catalog;
use crate::sync::{SyncContext, SyncReport, SyncScope, run_sync};

const DEFAULT_RUNS: i64 = 20;
const MAX_RUNS: i64 = 200;

fn sync_error(e: Error) -> ApiError {
    match e {
        Error::RemoteUnavailable(msg) => ApiError::bad_gateway(format!("Remote unavailable: {msg}")),
        Error::MalformedRemoteRecord(msg) => {
            ApiError::bad_gateway(format!("Malformed remote response: {msg}"))
        }
        Error::SyncInProgress => ApiError::conflict("A catalog sync is already in progress"),
        Error::NotFound => ApiError::not_found("Model not found"),
        Error::BadRequest(msg) => ApiError::bad_request(msg),
        Error::Config(msg) => ApiError::internal(format!("Invalid configuration: {msg}")),
        e => {
            tracing::error!("Sync failed: {}", e);
            ApiError::internal("Sync failed")
        }
    }
}

/// Runs a sync off the async executor; the remote client and the store both block.
async fn trigger(state: Arc<AppState>, scope: SyncScope) -> Result<SyncReport, ApiError> {
    let remote = state
        .remote
        .clone()
        .ok_or_else(|| ApiError::internal("Remote inventory is not configured"))?;

    tokio::task::spawn_blocking(move || {
        let ctx = SyncContext {
            store: state.store.as_ref(),
            remote: remote.as_ref(),
            snapshots: state.snapshot_sink(),
            lock_ttl: state.config.lock_ttl(),
        };
        run_sync(&ctx, &scope)
    })
    .await
    .map_err(|e| {
        tracing::error!("Sync task panicked: {}", e);
        ApiError::internal("Sync failed")
    })?
    .map_err(sync_error)
}

pub async fn sync_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let report = trigger(state, SyncScope::All).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(report)))
}

pub async fn sync_stream(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> impl IntoResponse {
    let report = trigger(state, SyncScope::Stream(uuid)).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(report)))
}

pub async fn sync_model(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> impl IntoResponse {
    let report = trigger(state, SyncScope::Model(uuid)).await?;
    Ok::<_, ApiError>(Json(ApiResponse::success(report)))
}

pub async fn list_runs(
    State(state): State<Arc<AppState>>,
    Query(params): Query<RunsParams>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(DEFAULT_RUNS).clamp(1, MAX_RUNS);
    let runs = state
        .store
        .list_sync_runs(limit)
        .api_err("Failed to list sync runs")?;

    Ok::<_, ApiError>(Json(ApiResponse::success(runs)))
}

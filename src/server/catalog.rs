use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};

use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{
    FieldResponse, ModelDetailResponse, ModelResponse, PaginationParams, StreamResponse,
};
use crate::server::response::{
    ApiError, ApiResponse, PaginatedResponse, StoreOptionExt, StoreResultExt, paginate,
};
use crate::store::{Catalog, Filter};
use crate::types::{Field, Model, Stream, normalize_external_id};

fn external_key(raw: &str) -> Result<String, ApiError> {
    normalize_external_id(raw).map_err(|_| ApiError::bad_request("Invalid id"))
}

fn find_stream(state: &AppState, raw: &str) -> Result<Stream, ApiError> {
    let key = external_key(raw)?;
    state
        .store
        .find::<Stream>(&Filter::all().eq("external_uuid", &key))
        .api_err("Failed to get stream")?
        .or_not_found("Stream not found")
}

fn find_model(state: &AppState, raw: &str) -> Result<Model, ApiError> {
    let key = external_key(raw)?;
    state
        .store
        .find::<Model>(&Filter::all().eq("external_uuid", &key))
        .api_err("Failed to get model")?
        .or_not_found("Model not found")
}

fn page_models(
    state: &AppState,
    filter: Filter,
    params: &PaginationParams,
) -> Result<PaginatedResponse<ModelResponse>, ApiError> {
    let (offset, limit) = params.window();
    let models = state
        .store
        .filter::<Model>(&filter.order_by("description").offset(offset).limit(limit + 1))
        .api_err("Failed to list models")?;

    let (models, next_offset, has_more) = paginate(models, offset, limit as usize);
    let data = models
        .into_iter()
        .map(|m| ModelResponse::new(m, &state.config.remote))
        .collect();
    Ok(PaginatedResponse::new(data, next_offset, has_more))
}

pub async fn list_streams(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let (offset, limit) = params.window();
    let streams = state
        .store
        .filter::<Stream>(
            &Filter::all()
                .order_by("description")
                .offset(offset)
                .limit(limit + 1),
        )
        .api_err("Failed to list streams")?;

    let (streams, next_offset, has_more) = paginate(streams, offset, limit as usize);
    let data = streams
        .into_iter()
        .map(|s| StreamResponse::new(s, &state.config.remote))
        .collect();

    Ok::<_, ApiError>(Json(PaginatedResponse::new(data, next_offset, has_more)))
}

pub async fn get_stream(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> impl IntoResponse {
    let stream = find_stream(&state, &uuid)?;
    Ok::<_, ApiError>(Json(ApiResponse::success(StreamResponse::new(
        stream,
        &state.config.remote,
    ))))
}

pub async fn list_stream_models(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let stream = find_stream(&state, &uuid)?;
    let page = page_models(&state, Filter::all().eq("stream_id", &stream.id), &params)?;
    Ok::<_, ApiError>(Json(page))
}

pub async fn list_models(
    State(state): State<Arc<AppState>>,
    Query(params): Query<PaginationParams>,
) -> impl IntoResponse {
    let page = page_models(&state, Filter::all(), &params)?;
    Ok::<_, ApiError>(Json(page))
}

pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> impl IntoResponse {
    let model = find_model(&state, &uuid)?;

    let stream = state
        .store
        .find::<Stream>(&Filter::all().eq("id", &model.stream_id))
        .api_err("Failed to get stream")?
        .ok_or_else(|| ApiError::internal("Model has no stream"))?;

    let field_count = state
        .store
        .count::<Field>(&Filter::all().eq("model_id", &model.id))
        .api_err("Failed to count fields")?;

    let detail = ModelDetailResponse {
        model: ModelResponse::new(model, &state.config.remote),
        stream: StreamResponse::new(stream, &state.config.remote),
        field_count,
    };
    Ok::<_, ApiError>(Json(ApiResponse::success(detail)))
}

pub async fn list_model_fields(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> impl IntoResponse {
    let model = find_model(&state, &uuid)?;

    let fields = state
        .store
        .filter::<Field>(
            &Filter::all()
                .eq("model_id", &model.id)
                .order_by("source_table")
                .order_by("name"),
        )
        .api_err("Failed to list fields")?;

    let fields: Vec<FieldResponse> = fields.into_iter().map(FieldResponse::from).collect();
    Ok::<_, ApiError>(Json(ApiResponse::success(fields)))
}

pub async fn get_model_snapshot(
    State(state): State<Arc<AppState>>,
    Path(uuid): Path<String>,
) -> impl IntoResponse {
    let model = find_model(&state, &uuid)?;

    let snapshot = match state.snapshots.read_snapshot(&model.external_uuid) {
        Ok(snapshot) => snapshot,
        Err(Error::InvalidSnapshotKey(_)) => {
            return Err(ApiError::bad_request("Model id cannot be used as a snapshot key"));
        }
        Err(e) => {
            tracing::error!("Failed to read snapshot {}: {}", model.external_uuid, e);
            return Err(ApiError::internal("Failed to read snapshot"));
        }
    };

    let snapshot = snapshot.or_not_found("Snapshot not found")?;
    Ok::<_, ApiError>(Json(ApiResponse::success(snapshot)))
}

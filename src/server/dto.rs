use serde::{Deserialize, Serialize};

use crate::config::RemoteConfig;
use crate::types::{Field, Model, Stream};

use super::response::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

#[derive(Debug, Default, Deserialize)]
pub struct PaginationParams {
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
}

impl PaginationParams {
    /// Offset and page size, clamped to sane bounds.
    #[must_use]
    pub fn window(&self) -> (i64, i64) {
        let offset = self.offset.unwrap_or(0).max(0);
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        (offset, limit)
    }
}

#[derive(Debug, Serialize)]
pub struct StreamResponse {
    pub id: String,
    pub external_uuid: String,
    pub description: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hub_url: Option<String>,
}

impl StreamResponse {
    pub fn new(stream: Stream, remote: &RemoteConfig) -> Self {
        Self {
            hub_url: remote.stream_url(&stream.external_uuid),
            id: stream.id,
            external_uuid: stream.external_uuid,
            description: stream.description,
            active: stream.active,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelResponse {
    pub id: String,
    pub external_uuid: String,
    pub description: String,
    pub active: bool,
    pub stream_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_url: Option<String>,
}

impl ModelResponse {
    pub fn new(model: Model, remote: &RemoteConfig) -> Self {
        Self {
            app_url: remote.app_url(&model.external_uuid),
            id: model.id,
            external_uuid: model.external_uuid,
            description: model.description,
            active: model.active,
            stream_id: model.stream_id,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ModelDetailResponse {
    #[serde(flatten)]
    pub model: ModelResponse,
    pub stream: StreamResponse,
    pub field_count: i64,
}

#[derive(Debug, Serialize)]
pub struct FieldResponse {
    pub id: String,
    pub name: String,
    pub source_table: String,
    pub data_type: &'static str,
    pub data_type_label: &'static str,
    pub is_key: bool,
    pub description: String,
}

impl From<Field> for FieldResponse {
    fn from(field: Field) -> Self {
        Self {
            is_key: field.is_key(),
            data_type: field.data_type.as_str(),
            data_type_label: field.data_type.label(),
            id: field.id,
            name: field.name,
            source_table: field.source_table,
            description: field.description,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct RunsParams {
    #[serde(default)]
    pub limit: Option<i64>,
}

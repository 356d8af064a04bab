use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::DataType;

/// Field table marker for key fields that are shared by several tables (or by none).
pub const KEY_FIELD_TABLE: &str = "";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    pub id: String,
    pub external_uuid: String,
    pub description: String,
    pub active: bool,
}

impl Stream {
    #[must_use]
    pub fn new(external_uuid: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            external_uuid: external_uuid.into(),
            description: description.into(),
            active: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub external_uuid: String,
    pub description: String,
    pub active: bool,
    pub stream_id: String,
}

impl Model {
    #[must_use]
    pub fn new(
        external_uuid: impl Into<String>,
        description: impl Into<String>,
        stream_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            external_uuid: external_uuid.into(),
            description: description.into(),
            active: true,
            stream_id: stream_id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub model_id: String,
    pub name: String,
    /// Source table, or [`KEY_FIELD_TABLE`] for key fields.
    pub source_table: String,
    pub data_type: DataType,
    pub description: String,
}

impl Field {
    #[must_use]
    pub fn new(
        model_id: impl Into<String>,
        name: impl Into<String>,
        source_table: impl Into<String>,
        data_type: DataType,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            model_id: model_id.into(),
            name: name.into(),
            source_table: source_table.into(),
            data_type,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn is_key(&self) -> bool {
        self.source_table == KEY_FIELD_TABLE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Running,
    Succeeded,
    Failed,
}

impl SyncStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Running => "running",
            SyncStatus::Succeeded => "succeeded",
            SyncStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<SyncStatus> {
        match s {
            "running" => Some(SyncStatus::Running),
            "succeeded" => Some(SyncStatus::Succeeded),
            "failed" => Some(SyncStatus::Failed),
            _ => None,
        }
    }
}

/// One triggered sweep, kept as history for status reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncRun {
    pub id: String,
    pub scope: String,
    pub status: SyncStatus,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    pub apps_seen: i64,
    pub warning_count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

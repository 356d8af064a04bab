use serde::Serialize;

/// A problem confined to one app (or one stream) that did not stop the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncWarning {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    pub message: String,
}

/// Outcome of one reconcile call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub scope: String,
    pub apps_seen: usize,
    pub streams_created: usize,
    pub streams_updated: usize,
    pub streams_deleted: usize,
    pub models_created: usize,
    pub models_updated: usize,
    pub models_deleted: usize,
    pub fields_created: usize,
    pub fields_updated: usize,
    pub fields_deleted: usize,
    pub duplicates_removed: usize,
    pub snapshots_written: usize,
    pub warnings: Vec<SyncWarning>,
}

impl SyncReport {
    #[must_use]
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            ..Self::default()
        }
    }

    pub fn warn_app(&mut self, app_id: &str, app_name: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("App {} ({}): {}", app_id, app_name, message);
        self.warnings.push(SyncWarning {
            app_id: Some(app_id.to_string()),
            app_name: (!app_name.is_empty()).then(|| app_name.to_string()),
            message,
        });
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.warnings.push(SyncWarning {
            app_id: None,
            app_name: None,
            message,
        });
    }

    /// Whether the reconcile wrote anything to the catalog.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.streams_created
            + self.streams_updated
            + self.streams_deleted
            + self.models_created
            + self.models_updated
            + self.models_deleted
            + self.fields_created
            + self.fields_updated
            + self.fields_deleted
            + self.duplicates_removed
            > 0
    }
}

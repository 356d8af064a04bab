use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Stream reference embedded in a remote app record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteStreamRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteOwner {
    #[serde(rename = "userId", default)]
    pub user_id: Option<String>,
}

/// An app as listed by the remote inventory endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAppRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub stream: Option<RemoteStreamRef>,
    #[serde(default)]
    pub owner: Option<RemoteOwner>,
}

impl RemoteAppRecord {
    /// Stream id and name, when the record names a stream with a usable id.
    #[must_use]
    pub fn stream_ref(&self) -> Option<(&str, Option<&str>)> {
        let stream = self.stream.as_ref()?;
        let id = stream.id.as_deref().filter(|id| !id.trim().is_empty())?;
        Some((id, stream.name.as_deref()))
    }
}

/// Result of an inventory fetch: the decoded apps plus a note for every element
/// that could not be decoded.
#[derive(Debug, Clone, Default)]
pub struct AppInventory {
    pub apps: Vec<RemoteAppRecord>,
    pub skipped: Vec<String>,
}

impl AppInventory {
    #[must_use]
    pub fn new(apps: Vec<RemoteAppRecord>) -> Self {
        Self {
            apps,
            skipped: Vec::new(),
        }
    }

    /// Decodes an inventory body element by element.
    pub fn from_values(values: Vec<Value>) -> Self {
        let mut inventory = Self::default();
        for (index, value) in values.into_iter().enumerate() {
            match serde_json::from_value::<RemoteAppRecord>(value) {
                Ok(app) if !app.id.trim().is_empty() => inventory.apps.push(app),
                Ok(_) => inventory
                    .skipped
                    .push(format!("record {index}: empty app id")),
                Err(e) => inventory.skipped.push(format!("record {index}: {e}")),
            }
        }
        inventory
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFieldRecord {
    pub name: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub is_hidden: bool,
    #[serde(default)]
    pub src_tables: Vec<String>,
}

impl RemoteFieldRecord {
    /// Whether the field belongs in the catalog.
    #[must_use]
    pub fn is_cataloged(&self) -> bool {
        !self.is_system && !self.is_hidden
    }
}

/// Per-app metadata document. Attributes other than `fields` and `stream` are kept
/// verbatim so the snapshot holds the whole payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldMetadataDocument {
    #[serde(default)]
    pub fields: Vec<RemoteFieldRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<RemoteStreamRef>,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

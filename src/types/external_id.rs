use uuid::Uuid;

use crate::error::{Error, Result};

/// Reserved external id of the stream that collects apps without a remote stream.
pub const UNASSIGNED_STREAM_UUID: &str = "00000000-0000-0000-0000-000000000000";

/// Description of the sentinel stream.
pub const UNASSIGNED_STREAM_DESCRIPTION: &str = "Unassigned";

/// Normalizes a remote identifier to the single form stored in the catalog.
///
/// Anything that parses as a UUID (hyphenated, simple, braced or urn form, any case)
/// becomes a lowercase hyphenated string. Other identifiers are kept verbatim apart
/// from surrounding whitespace.
pub fn normalize_external_id(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(Error::MalformedRemoteRecord(
            "external id cannot be empty".to_string(),
        ));
    }

    match Uuid::parse_str(trimmed) {
        Ok(uuid) => Ok(uuid.hyphenated().to_string()),
        Err(_) => Ok(trimmed.to_string()),
    }
}

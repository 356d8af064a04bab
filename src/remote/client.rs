use std::time::Duration;

use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::Url;
use reqwest::blocking::{Client, Response};
use serde_json::Value;

use super::RemoteInventory;
use crate::config::{Credentials, RemoteConfig};
use crate::error::{Error, Result};
use crate::types::{AppInventory, FieldMetadataDocument};

const XRFKEY_HEADER: &str = "X-Qlik-Xrfkey";
const XRFKEY_LEN: usize = 16;

/// Blocking client for the Qlik Sense repository and metadata endpoints.
pub struct QlikClient {
    client: Client,
    base_url: String,
    credentials: Credentials,
    inventory_path: String,
    metadata_path: String,
}

impl QlikClient {
    /// Validates the remote configuration and builds the HTTP client. Nothing is
    /// sent over the network here.
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let credentials = config.validate()?;
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url,
            credentials,
            inventory_path: config.inventory_path.clone(),
            metadata_path: config.metadata_path.clone(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Appends `path` to the base URL, keeping any virtual proxy prefix.
    fn url(&self, path: &str) -> Result<Url> {
        let path = path.trim_start_matches('/');
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| Error::Config(format!("invalid remote path '{path}': {e}")))
    }

    fn get(&self, url: Url) -> Result<Response> {
        let xrfkey = xrfkey();
        tracing::debug!("GET {}", url);

        let resp = self
            .client
            .get(url.clone())
            .basic_auth(&self.credentials.username, Some(&self.credentials.password))
            .header(XRFKEY_HEADER, &xrfkey)
            .query(&[("xrfkey", &xrfkey)])
            .send()
            .map_err(|e| Error::RemoteUnavailable(format!("GET {}: {e}", url.path())))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::RemoteUnavailable(format!(
                "GET {} returned {}",
                url.path(),
                status
            )));
        }
        Ok(resp)
    }
}

impl RemoteInventory for QlikClient {
    fn fetch_app_inventory(&self) -> Result<AppInventory> {
        let url = self.url(&self.inventory_path)?;
        let body: Value = self
            .get(url)?
            .json()
            .map_err(|e| Error::MalformedRemoteRecord(format!("app inventory: {e}")))?;

        let Value::Array(records) = body else {
            return Err(Error::MalformedRemoteRecord(
                "app inventory is not a JSON array".to_string(),
            ));
        };

        let inventory = AppInventory::from_values(records);
        tracing::debug!(
            "Fetched {} apps ({} skipped)",
            inventory.apps.len(),
            inventory.skipped.len()
        );
        Ok(inventory)
    }

    fn fetch_field_metadata(&self, app_external_id: &str) -> Result<FieldMetadataDocument> {
        let id = app_external_id.trim();
        if id.is_empty() || id.contains(['/', '?', '#']) {
            return Err(Error::MalformedRemoteRecord(format!(
                "invalid app id '{app_external_id}'"
            )));
        }

        let url = self.url(&self.metadata_path.replace("{id}", id))?;
        self.get(url)?
            .json()
            .map_err(|e| Error::MalformedRemoteRecord(format!("metadata of app {id}: {e}")))
    }
}

fn xrfkey() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(XRFKEY_LEN)
        .map(char::from)
        .collect()
}

//! Configuration loaded once at process start and passed by reference to the
//! components that need it.

mod server;

pub use server::ServerConfig;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_FILE: &str = "qscatalog.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding the catalog database and snapshots
    pub data_dir: PathBuf,
    pub server: ServerConfig,
    pub remote: RemoteConfig,
    pub sync: SyncConfig,
}

/// Remote Qlik Sense endpoints and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL of the Qlik Sense proxy, e.g. "https://qlik.example.com"
    pub base_url: String,
    pub username: String,
    /// Password in clear text. Prefer `password_env`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Name of the environment variable holding the password
    pub password_env: String,
    /// Path of the app inventory endpoint
    pub inventory_path: String,
    /// Path template of the field metadata endpoint; `{id}` is replaced by the app id
    pub metadata_path: String,
    /// Hub base URL used to build links to streams and apps
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hub_url: Option<String>,
    pub timeout_secs: u64,
    /// Accept self-signed certificates (common on on-premise installs)
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Write raw metadata payloads to the snapshot directory
    pub snapshots: bool,
    /// Overrides `<data_dir>/snapshots`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,
    /// Age after which a held sync lock is considered abandoned
    pub lock_ttl_secs: u64,
}

/// Credentials resolved from [`RemoteConfig`].
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            server: ServerConfig::default(),
            remote: RemoteConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: None,
            password_env: "QSCATALOG_REMOTE_PASSWORD".to_string(),
            inventory_path: "/qrs/app/full".to_string(),
            metadata_path: "/api/v1/apps/{id}/data/metadata".to_string(),
            hub_url: None,
            timeout_secs: 60,
            accept_invalid_certs: false,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            snapshots: true,
            snapshot_dir: None,
            lock_ttl_secs: 15 * 60,
        }
    }
}

impl AppConfig {
    /// Loads the configuration file. A missing file yields the defaults so that
    /// catalog-only commands work before the remote side is configured.
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(content) => {
                let config: AppConfig = toml::from_str(&content).map_err(|e| {
                    Error::Config(format!("failed to parse {}: {e}", path.display()))
                })?;
                tracing::debug!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No configuration at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize configuration: {e}")))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("qscatalog.db")
    }

    #[must_use]
    pub fn snapshot_dir(&self) -> PathBuf {
        self.sync
            .snapshot_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("snapshots"))
    }

    #[must_use]
    pub fn lock_ttl(&self) -> chrono::Duration {
        i64::try_from(self.sync.lock_ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

impl RemoteConfig {
    /// Checks endpoint settings and resolves the credentials. Fails before any
    /// remote call is attempted.
    pub fn validate(&self) -> Result<Credentials> {
        let base_url = self.base_url.trim();
        if base_url.is_empty() {
            return Err(Error::Config("remote.base_url is not set".to_string()));
        }
        let url = reqwest::Url::parse(base_url)
            .map_err(|e| Error::Config(format!("remote.base_url is invalid: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "remote.base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if !self.metadata_path.contains("{id}") {
            return Err(Error::Config(
                "remote.metadata_path must contain an {id} placeholder".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(Error::Config(
                "remote.timeout_secs must be greater than zero".to_string(),
            ));
        }

        let username = self.username.trim();
        if username.is_empty() {
            return Err(Error::Config("remote.username is not set".to_string()));
        }

        let password = match &self.password {
            Some(password) => password.clone(),
            None => std::env::var(&self.password_env).map_err(|_| {
                Error::Config(format!(
                    "no remote password: set remote.password or the {} environment variable",
                    self.password_env
                ))
            })?,
        };

        Ok(Credentials {
            username: username.to_string(),
            password,
        })
    }

    /// Link to a stream in the hub, when a hub URL is configured.
    #[must_use]
    pub fn stream_url(&self, external_uuid: &str) -> Option<String> {
        self.hub_url
            .as_deref()
            .map(|hub| format!("{}/hub/stream/{external_uuid}", hub.trim_end_matches('/')))
    }

    /// Link to an app in the hub, when a hub URL is configured.
    #[must_use]
    pub fn app_url(&self, external_uuid: &str) -> Option<String> {
        self.hub_url
            .as_deref()
            .map(|hub| format!("{}/sense/app/{external_uuid}", hub.trim_end_matches('/')))
    }
}

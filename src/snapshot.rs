use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::error::{Error, Result};

/// Side-channel store for raw remote payloads.
pub trait SnapshotSink: Send + Sync {
    /// Writes `payload` under `key`, replacing any earlier snapshot.
    fn write_snapshot(&self, key: &str, payload: &Value) -> Result<SnapshotReceipt>;
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotReceipt {
    pub key: String,
    pub path: PathBuf,
    pub bytes: u64,
    pub sha256: String,
}

/// Writes snapshots as pretty JSON files, one per key.
pub struct FsSnapshotWriter {
    base_path: PathBuf,
}

impl FsSnapshotWriter {
    pub fn new(config: &AppConfig) -> Self {
        Self::at(config.snapshot_dir())
    }

    pub fn at(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    #[must_use]
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn snapshot_path(&self, key: &str) -> PathBuf {
        self.base_path.join(format!("{key}.json"))
    }

    fn temp_path(&self) -> PathBuf {
        self.base_path
            .join("tmp")
            .join(Uuid::new_v4().to_string())
    }

    /// Reads a stored snapshot back, `None` when nothing was written under `key`.
    pub fn read_snapshot(&self, key: &str) -> Result<Option<Value>> {
        validate_key(key)?;
        match fs::read(self.snapshot_path(key)) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

impl SnapshotSink for FsSnapshotWriter {
    fn write_snapshot(&self, key: &str, payload: &Value) -> Result<SnapshotReceipt> {
        validate_key(key)?;

        let data = serde_json::to_vec_pretty(payload)?;
        let sha256 = hex::encode(Sha256::digest(&data));

        let temp_path = self.temp_path();
        if let Some(parent) = temp_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let final_path = self.snapshot_path(key);
        if let Err(e) = persist(&temp_path, &final_path, &data) {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                if cleanup.kind() != ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {}: {}", temp_path.display(), cleanup);
                }
            }
            return Err(Error::Io(e));
        }

        tracing::debug!("Wrote snapshot {} ({} bytes)", final_path.display(), data.len());

        Ok(SnapshotReceipt {
            key: key.to_string(),
            path: final_path,
            bytes: data.len() as u64,
            sha256,
        })
    }
}

fn persist(temp_path: &Path, final_path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut temp_file = File::create(temp_path)?;
    temp_file.write_all(data)?;
    temp_file.sync_all()?;
    fs::rename(temp_path, final_path)
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > 128 {
        return Err(Error::InvalidSnapshotKey(key.to_string()));
    }

    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(Error::InvalidSnapshotKey(key.to_string()));
    }

    Ok(())
}

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("malformed remote record: {0}")]
    MalformedRemoteRecord(String),

    #[error("persistence conflict: {0}")]
    PersistenceConflict(String),

    #[error("a catalog sync is already in progress")]
    SyncInProgress,

    #[error("invalid snapshot key: {0}")]
    InvalidSnapshotKey(String),

    #[error("unknown column '{column}' for table '{table}'")]
    UnknownColumn { table: &'static str, column: String },

    #[error("bad request: {0}")]
    BadRequest(String),
}

impl Error {
    /// Maps unique and foreign key violations to `PersistenceConflict`.
    pub(crate) fn from_write(e: rusqlite::Error, context: &str) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::PersistenceConflict(format!(
                    "{context}: {}",
                    msg.unwrap_or_else(|| err.to_string())
                ))
            }
            e => Error::Database(e),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

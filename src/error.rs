use thiserror::Error;

/// Failures surfaced by the store and the snapshot codec.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The database file could not be opened or initialized.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("{collection} already contains id {id}")]
    DuplicateKey { collection: &'static str, id: String },

    #[error("{collection} has no record with id {id}")]
    NotFound { collection: &'static str, id: String },

    /// The payload handed to an import is not a recognizable snapshot.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Stable code reported to the UI in `error.code`.
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::StorageUnavailable(_) => "storage_unavailable",
            StoreError::DuplicateKey { .. } => "duplicate_key",
            StoreError::NotFound { .. } => "not_found",
            StoreError::InvalidFormat(_) => "invalid_format",
            StoreError::Sqlite(_) => "db_query_failed",
            StoreError::Json(_) => "invalid_format",
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

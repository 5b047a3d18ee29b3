use thiserror::Error;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A SQLite operation failed.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A row referenced by the operation does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// A JSON column could not be encoded for storage.
    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    /// A stored row holds a value that no longer decodes (bad JSON, malformed
    /// condition tree, out-of-range port).
    #[error("corrupt {entity} row {id}: {reason}")]
    Corrupt {
        entity: &'static str,
        id: i64,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

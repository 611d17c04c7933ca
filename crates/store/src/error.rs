use thiserror::Error;

use crate::Version;

/// Errors that can occur when interacting with the saga or outbox store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A bundle with the same VIP bundle id or booking id already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// The requested bundle does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The stored version did not match the expected version, or the
    /// database aborted the transaction because of a concurrent write.
    #[error("Concurrency conflict for {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        id: String,
        expected: Version,
        actual: Version,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if retrying the operation may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. } | StoreError::Database(_)
        )
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

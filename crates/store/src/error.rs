use common::Version;
use thiserror::Error;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write carried a stale version counter.
    /// Another writer committed a change to the same record first.
    #[error(
        "Concurrent modification of {entity} {id}: expected version {expected}, found {actual}"
    )]
    ConcurrentModification {
        entity: &'static str,
        id: i64,
        expected: Version,
        actual: Version,
    },

    /// The record to update does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },

    /// A value does not fit the storage representation.
    #[error("Invalid stored value: {0}")]
    InvalidValue(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

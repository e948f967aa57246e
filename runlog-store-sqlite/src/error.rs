// runlog-store-sqlite/src/error.rs
// ============================================================================
// Module: Errors
// Description: SQLite-specific error type, mapped onto runlog_core::StoreError
//              at the trait boundary.
// Dependencies: runlog_core, thiserror
// ============================================================================

use runlog_core::StoreError;
use thiserror::Error;

/// `SQLite` store errors, narrower than [`StoreError`] so call sites inside
/// this crate can match on cause before the final conversion.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error (filesystem, connection pool).
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// The exclusive per-run write lock could not be acquired.
    #[error("sqlite store write contended: {0}")]
    WriteContended(String),
    /// Row not found.
    #[error("sqlite store not found: {0}")]
    NotFound(String),
    /// Stored data failed to deserialize or violated an invariant.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Io(message),
            SqliteStoreError::WriteContended(message) => Self::WriteContended(message),
            SqliteStoreError::NotFound(message) => Self::NotFound(message),
            SqliteStoreError::Invalid(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Invalid(message)
            }
        }
    }
}

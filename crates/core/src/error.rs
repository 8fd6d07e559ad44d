// Error types for the runner and its stores

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for runner operations
pub type Result<T> = std::result::Result<T, RunnerError>;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by store implementations (Postgres, in-memory)
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Row not found
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
}

impl StoreError {
    pub fn database(err: impl std::fmt::Display) -> Self {
        StoreError::Database(err.to_string())
    }

    pub fn serialization(err: impl std::fmt::Display) -> Self {
        StoreError::Serialization(err.to_string())
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Errors that abort a runner invocation before it can produce an outcome.
///
/// Model failures and tool failures are NOT runner errors: they are recorded
/// in the run and reported through [`crate::runner::RunOutcome`]. A runner
/// error means infrastructure failed (the store), and the claimed event is
/// left for lease expiry to recover.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Store operation failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// An explicitly requested event does not exist
    #[error("event not found: {0}")]
    EventNotFound(Uuid),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

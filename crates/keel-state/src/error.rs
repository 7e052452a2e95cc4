//! Error types for the Keel state store.

use thiserror::Error;

/// Result type alias for state store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur during state store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to open database: {0}")]
    Open(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("table error: {0}")]
    Table(String),

    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("blocking store call failed: {0}")]
    Blocking(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("version conflict on {key}: expected {expected}, found {actual}")]
    Conflict {
        key: String,
        expected: u64,
        actual: u64,
    },
}

impl StateError {
    /// Short, implementation-free description of the failure category.
    ///
    /// Suitable for surfacing to API callers; the full error should only go
    /// to the logs.
    pub fn summary(&self) -> &'static str {
        match self {
            StateError::Open(_) | StateError::Blocking(_) => "store unavailable",
            StateError::Transaction(_) => "store transaction failed",
            StateError::Table(_) | StateError::Read(_) => "store read failed",
            StateError::Write(_) => "store write failed",
            StateError::Serialize(_) | StateError::Deserialize(_) => {
                "store record could not be encoded"
            }
            StateError::NotFound(_) => "record not found",
            StateError::AlreadyExists(_) => "record already exists",
            StateError::Conflict { .. } => "record was modified concurrently",
        }
    }
}

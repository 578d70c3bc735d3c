use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use storage::error::StorageError;

/// Error taxonomy carried on every command acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ErrorKind {
    BadInput,
    NotFound,
    StateConflict,
    NotReady,
    Transient,
    Fatal,
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("bad input: {0}")]
    BadInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("not ready: {0}")]
    NotReady(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadInput(_) => ErrorKind::BadInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::StateConflict(_) => ErrorKind::StateConflict,
            Self::NotReady(_) => ErrorKind::NotReady,
            Self::Transient(_) => ErrorKind::Transient,
            Self::Fatal(_) => ErrorKind::Fatal,
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound => EngineError::NotFound("record not found".into()),
            StorageError::BadInput(msg) => EngineError::BadInput(msg),
            StorageError::ConstraintViolation(msg) => EngineError::StateConflict(msg),
            other => {
                if other.is_busy() {
                    EngineError::Transient(other.to_string())
                } else {
                    EngineError::Fatal(other.to_string())
                }
            }
        }
    }
}

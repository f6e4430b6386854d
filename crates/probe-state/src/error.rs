//! Error types for the result store.

use thiserror::Error;

use crate::types::ProbeStatus;

/// Result type alias for result store operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur in result store operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("read error: {0}")]
    Read(String),

    #[error("write error: {0}")]
    Write(String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("deserialization error: {0}")]
    Deserialize(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("illegal transition for {probe}: {from} -> {to}")]
    InvalidTransition {
        probe: String,
        from: ProbeStatus,
        to: ProbeStatus,
    },
}

//! Report error types.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("{path} is not a JSON array of capabilities")]
    InvalidListing { path: PathBuf },

    #[error("results error: {0}")]
    State(#[from] probe_state::StateError),
}

pub type ReportResult<T> = Result<T, ReportError>;

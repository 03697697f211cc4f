//! Error types for report assembly

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Analysis backend returned an empty response")]
    EmptyResponse,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ReportError>;

//! Error types for the analysis client

use thiserror::Error;

/// Failure of a single backend call
#[derive(Debug, Error)]
pub enum BackendError {
    #[error(
        "Rate limit exceeded{}",
        .retry_after_secs.map(|s| format!(" (retry after {}s)", s)).unwrap_or_default()
    )]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Provider error ({status_code}): {message}")]
    Provider { status_code: u16, message: String },

    #[error("Response blocked by provider: {0}")]
    Blocked(String),

    #[error("Failed to parse provider response: {0}")]
    Parse(String),
}

impl BackendError {
    /// Only rate limiting is retried; everything else fails the call at once
    pub fn is_retryable(&self) -> bool {
        matches!(self, BackendError::RateLimited { .. })
    }

    /// Server-provided delay before the next attempt, if any
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            BackendError::RateLimited { retry_after_secs } => *retry_after_secs,
            _ => None,
        }
    }
}

/// Failure of a whole analysis call
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Analysis credential is missing: set {0}")]
    MissingCredential(&'static str),

    #[error("Analysis rate limited on all {attempts} attempts: {last}")]
    Exhausted {
        attempts: u32,
        #[source]
        last: BackendError,
    },

    #[error("Analysis failed on attempt {attempt}: {source}")]
    NonRetryable { attempt: u32, source: BackendError },

    #[error("Analysis cancelled after {attempts} attempt(s)")]
    Cancelled { attempts: u32 },

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;

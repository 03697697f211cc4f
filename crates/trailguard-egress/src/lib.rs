//! TrailGuard Egress
//!
//! This crate sends masked content to the remote compliance analyzer:
//! - Gemini `generateContent` backend and model listing
//! - Bounded exponential backoff on rate limiting
//! - Attempt history and cancellation at wait boundaries

pub mod analysis;
pub mod backend;
pub mod client;
pub mod error;
pub mod gemini;
pub mod retry;
pub mod retry_after;

pub use analysis::{AnalysisOutcome, ResilientAnalysisClient};
pub use backend::AnalysisBackend;
pub use client::{HttpClientConfig, create_client};
pub use error::{AnalysisError, BackendError, Result};
pub use gemini::{GeminiBackend, GeminiConfig, ModelInfo};
pub use retry::{AttemptOutcome, RetryAttempt, RetryPolicy};
pub use retry_after::parse_retry_after;
pub use tokio_util::sync::CancellationToken;

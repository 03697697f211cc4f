//! Analysis backend abstraction

use crate::BackendError;
use async_trait::async_trait;
use trailguard_core::AnalysisRequest;

/// A remote compliance analyzer that turns a request into report text.
///
/// One call is one attempt; retrying is the caller's job.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    async fn generate(&self, request: AnalysisRequest) -> Result<String, BackendError>;
}

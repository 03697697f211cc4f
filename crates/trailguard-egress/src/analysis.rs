//! Resilient analysis client
//!
//! Wraps an [`AnalysisBackend`] with the rate-limit retry policy. Calls hold
//! no shared state, so one client serves concurrent callers; each call owns
//! its own attempt history.

use crate::backend::AnalysisBackend;
use crate::gemini::{GeminiBackend, GeminiConfig};
use crate::retry::{AttemptOutcome, RetryAttempt, RetryPolicy};
use crate::{AnalysisError, BackendError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use trailguard_core::AnalysisRequest;

/// Report text and the attempts it took to get it
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub text: String,
    pub attempts: Vec<RetryAttempt>,
}

impl AnalysisOutcome {
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }

    /// Total time spent waiting between attempts
    pub fn total_wait(&self) -> Duration {
        self.attempts.iter().map(|a| a.waited).sum()
    }
}

/// Where a call currently stands
enum CallState {
    Attempt { attempt: u32, waited: Duration },
    Waiting { next_attempt: u32, wait: Duration },
}

/// Analysis client with bounded exponential backoff on rate limiting
pub struct ResilientAnalysisClient {
    backend: Arc<dyn AnalysisBackend>,
    policy: RetryPolicy,
}

impl ResilientAnalysisClient {
    pub fn new(backend: Arc<dyn AnalysisBackend>, policy: RetryPolicy) -> Result<Self> {
        policy.validate().map_err(AnalysisError::Config)?;
        Ok(Self { backend, policy })
    }

    /// Client over the Gemini backend; fails on a missing key before any
    /// network activity
    pub fn gemini(config: GeminiConfig, policy: RetryPolicy) -> Result<Self> {
        let backend = GeminiBackend::new(config)?;
        Self::new(Arc::new(backend), policy)
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run the request, retrying on rate limiting
    pub async fn analyze(&self, request: AnalysisRequest) -> Result<AnalysisOutcome> {
        self.analyze_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// Run the request, giving up at the next wait once `cancel` fires.
    ///
    /// An attempt already in flight is never interrupted; it is bounded by
    /// the HTTP request timeout instead.
    #[instrument(
        skip(self, request, cancel),
        fields(
            template_version = %request.template_version,
            max_attempts = self.policy.max_attempts
        )
    )]
    pub async fn analyze_with_cancel(
        &self,
        request: AnalysisRequest,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutcome> {
        let mut attempts: Vec<RetryAttempt> = Vec::new();
        let mut state = CallState::Attempt {
            attempt: 1,
            waited: Duration::ZERO,
        };

        loop {
            state = match state {
                CallState::Attempt { attempt, waited } => {
                    debug!(attempt, "Sending analysis request");

                    match self.backend.generate(request.clone()).await {
                        Ok(text) => {
                            attempts.push(RetryAttempt {
                                attempt,
                                waited,
                                outcome: AttemptOutcome::Success,
                            });
                            info!(attempt, response_chars = text.len(), "Analysis succeeded");
                            return Ok(AnalysisOutcome { text, attempts });
                        }
                        Err(e) if e.is_retryable() => {
                            attempts.push(RetryAttempt {
                                attempt,
                                waited,
                                outcome: AttemptOutcome::RetryableFailure(e.to_string()),
                            });

                            if attempt >= self.policy.max_attempts {
                                error!(attempts = attempt, error = %e, "Analysis retries exhausted");
                                return Err(AnalysisError::Exhausted {
                                    attempts: attempt,
                                    last: e,
                                });
                            }

                            let next_attempt = attempt + 1;
                            let wait = self.policy.wait_with_hint(next_attempt, e.retry_after_secs());
                            warn!(
                                attempt,
                                max_attempts = self.policy.max_attempts,
                                wait_ms = wait.as_millis() as u64,
                                error = %e,
                                "Analysis rate limited, backing off"
                            );
                            CallState::Waiting { next_attempt, wait }
                        }
                        Err(e) => {
                            attempts.push(RetryAttempt {
                                attempt,
                                waited,
                                outcome: AttemptOutcome::FatalFailure(e.to_string()),
                            });
                            error!(attempt, error = %e, "Analysis failed with non-retryable error");
                            return Err(fatal(attempt, e));
                        }
                    }
                }
                CallState::Waiting { next_attempt, wait } => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            warn!(attempts = next_attempt - 1, "Analysis cancelled while backing off");
                            return Err(AnalysisError::Cancelled {
                                attempts: next_attempt - 1,
                            });
                        }
                        _ = tokio::time::sleep(wait) => CallState::Attempt {
                            attempt: next_attempt,
                            waited: wait,
                        },
                    }
                }
            };
        }
    }
}

fn fatal(attempt: u32, source: BackendError) -> AnalysisError {
    AnalysisError::NonRetryable { attempt, source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mockall::mock;

    mock! {
        pub Backend {}

        #[async_trait]
        impl AnalysisBackend for Backend {
            async fn generate(&self, request: AnalysisRequest) -> std::result::Result<String, BackendError>;
        }
    }

    fn request() -> AnalysisRequest {
        AnalysisRequest {
            instruction: "Perform a comprehensive audit summary.".to_string(),
            context: "| User |\n|---|\n| <PERSON_1> |\n".to_string(),
            template_version: "di-audit/1".to_string(),
            question: None,
        }
    }

    fn rate_limited() -> BackendError {
        BackendError::RateLimited {
            retry_after_secs: None,
        }
    }

    fn client(backend: MockBackend) -> ResilientAnalysisClient {
        ResilientAnalysisClient::new(Arc::new(backend), RetryPolicy::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_first_attempt() {
        let mut backend = MockBackend::new();
        backend
            .expect_generate()
            .times(1)
            .returning(|_| Ok("## Compliance Summary".to_string()));

        let outcome = client(backend).analyze(request()).await.unwrap();

        assert_eq!(outcome.text, "## Compliance Summary");
        assert_eq!(outcome.attempt_count(), 1);
        assert_eq!(outcome.attempts[0].outcome, AttemptOutcome::Success);
        assert_eq!(outcome.total_wait(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausts_after_seven_attempts() {
        let mut backend = MockBackend::new();
        backend
            .expect_generate()
            .times(7)
            .returning(|_| Err(rate_limited()));

        let start = tokio::time::Instant::now();
        let err = client(backend).analyze(request()).await.unwrap_err();
        let elapsed = start.elapsed();

        match err {
            AnalysisError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 7);
                assert!(last.is_retryable());
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
        // 5 + 8 + 16 + 32 + 60 + 60
        assert!(elapsed >= Duration::from_secs(181));
        assert!(elapsed < Duration::from_secs(182));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_fails_after_one_attempt() {
        let mut backend = MockBackend::new();
        backend
            .expect_generate()
            .times(1)
            .returning(|_| Err(BackendError::InvalidRequest("bad request".to_string())));

        let err = client(backend).analyze(request()).await.unwrap_err();

        match err {
            AnalysisError::NonRetryable { attempt, source } => {
                assert_eq!(attempt, 1);
                assert!(matches!(source, BackendError::InvalidRequest(_)));
            }
            other => panic!("expected NonRetryable, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_rate_limiting() {
        let mut backend = MockBackend::new();
        let mut seq = mockall::Sequence::new();
        backend
            .expect_generate()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Err(rate_limited()));
        backend
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("report".to_string()));

        let outcome = client(backend).analyze(request()).await.unwrap();

        assert_eq!(outcome.text, "report");
        let waits: Vec<Duration> = outcome.attempts.iter().map(|a| a.waited).collect();
        assert_eq!(
            waits,
            vec![Duration::ZERO, Duration::from_secs(5), Duration::from_secs(8)]
        );
        assert!(matches!(
            outcome.attempts[0].outcome,
            AttemptOutcome::RetryableFailure(_)
        ));
        assert_eq!(outcome.attempts[2].outcome, AttemptOutcome::Success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fatal_error_after_rate_limit_stops_immediately() {
        let mut backend = MockBackend::new();
        let mut seq = mockall::Sequence::new();
        backend
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(rate_limited()));
        backend
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(BackendError::Authentication("API key not valid".to_string()))
            });

        let err = client(backend).analyze(request()).await.unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::NonRetryable {
                attempt: 2,
                source: BackendError::Authentication(_)
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_hint_extends_wait() {
        let mut backend = MockBackend::new();
        let mut seq = mockall::Sequence::new();
        backend
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(BackendError::RateLimited {
                    retry_after_secs: Some(30),
                })
            });
        backend
            .expect_generate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok("ok".to_string()));

        let outcome = client(backend).analyze(request()).await.unwrap();
        assert_eq!(outcome.attempts[1].waited, Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_honoured_at_wait_boundary() {
        let mut backend = MockBackend::new();
        backend
            .expect_generate()
            .times(1)
            .returning(|_| Err(rate_limited()));

        let cancel = CancellationToken::new();
        cancel.cancel();

        // The first attempt still runs; the cancellation stops the first wait
        let err = client(backend)
            .analyze_with_cancel(request(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, AnalysisError::Cancelled { attempts: 1 }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_calls_are_independent() {
        let mut backend = MockBackend::new();
        backend
            .expect_generate()
            .times(2)
            .returning(|req| Ok(format!("report for {}", req.template_version)));

        let client = client(backend);
        let (a, b) = tokio::join!(client.analyze(request()), client.analyze(request()));

        assert_eq!(a.unwrap().attempt_count(), 1);
        assert_eq!(b.unwrap().attempt_count(), 1);
    }

    #[test]
    fn test_invalid_policy_rejected() {
        let policy = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        let result = ResilientAnalysisClient::new(Arc::new(MockBackend::new()), policy);
        assert!(matches!(result, Err(AnalysisError::Config(_))));
    }
}

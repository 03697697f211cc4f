//! Retry policy and attempt records
//!
//! A call moves through `Attempt(1) → {Success | RateLimited → Waiting →
//! Attempt(k+1) | Fatal}` and stops at `max_attempts`. The wait before
//! attempt `k ≥ 2` is `min(max_wait, max(min_wait, multiplier × 2^(k-1)))`
//! seconds; with the defaults that is 5, 8, 16, 32, 60 and 60 seconds.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff configuration for rate-limited calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,

    /// Exponential multiplier, in seconds
    pub multiplier: f64,

    /// Lower bound of every wait
    #[serde(rename = "min_wait_secs", with = "duration_secs")]
    pub min_wait: Duration,

    /// Upper bound of every wait
    #[serde(rename = "max_wait_secs", with = "duration_secs")]
    pub max_wait: Duration,

    /// Add up to 10% random extra to each wait
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 7,
            multiplier: 2.0,
            min_wait: Duration::from_secs(5),
            max_wait: Duration::from_secs(60),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Wait before `attempt` (1-based). The first attempt never waits.
    pub fn wait_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let exponent = (attempt - 1).min(62) as i32;
        let raw = self.multiplier * 2f64.powi(exponent);
        let base = Duration::try_from_secs_f64(raw)
            .unwrap_or(self.max_wait)
            .max(self.min_wait)
            .min(self.max_wait);

        if self.jitter {
            let extra: f64 = rand::rng().random_range(0.0..=0.1);
            base + base.mul_f64(extra)
        } else {
            base
        }
    }

    /// Wait before `attempt`, stretched to a server hint capped at `max_wait`
    pub fn wait_with_hint(&self, attempt: u32, retry_after_secs: Option<u64>) -> Duration {
        let wait = self.wait_before(attempt);
        match retry_after_secs {
            Some(secs) => wait.max(Duration::from_secs(secs).min(self.max_wait)),
            None => wait,
        }
    }

    /// Sum of every wait a call that exhausts the policy sleeps through
    pub fn total_wait(&self) -> Duration {
        (2..=self.max_attempts).map(|k| self.wait_before(k)).sum()
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_attempts == 0 {
            return Err("max_attempts must be at least 1".to_string());
        }
        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(format!("multiplier must be a non-negative number, got {}", self.multiplier));
        }
        if self.min_wait > self.max_wait {
            return Err(format!(
                "min_wait ({:?}) exceeds max_wait ({:?})",
                self.min_wait, self.max_wait
            ));
        }
        Ok(())
    }
}

/// How one attempt ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "error")]
pub enum AttemptOutcome {
    Success,
    RetryableFailure(String),
    FatalFailure(String),
}

/// Record of one attempt within a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryAttempt {
    /// 1-based attempt number
    pub attempt: u32,

    /// Time slept before this attempt
    pub waited: Duration,

    pub outcome: AttemptOutcome,
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = RetryPolicy::default();
        let waits: Vec<u64> = (1..=7).map(|k| policy.wait_before(k).as_secs()).collect();

        assert_eq!(waits, vec![0, 5, 8, 16, 32, 60, 60]);
        assert_eq!(policy.total_wait(), Duration::from_secs(181));
    }

    #[test]
    fn test_waits_are_bounded() {
        let policy = RetryPolicy::default();
        for attempt in 2..=100 {
            let wait = policy.wait_before(attempt);
            assert!(wait >= policy.min_wait && wait <= policy.max_wait);
        }
    }

    #[test]
    fn test_jitter_adds_at_most_ten_percent() {
        let policy = RetryPolicy {
            jitter: true,
            ..RetryPolicy::default()
        };
        for _ in 0..50 {
            let wait = policy.wait_before(3);
            assert!(wait >= Duration::from_secs(8));
            assert!(wait <= Duration::from_secs_f64(8.8));
        }
    }

    #[test]
    fn test_server_hint_respected_up_to_max_wait() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.wait_with_hint(2, Some(20)), Duration::from_secs(20));
        assert_eq!(policy.wait_with_hint(2, Some(1)), Duration::from_secs(5));
        assert_eq!(policy.wait_with_hint(2, Some(600)), Duration::from_secs(60));
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::default().validate().is_ok());
        assert!(RetryPolicy { max_attempts: 0, ..RetryPolicy::default() }.validate().is_err());
        assert!(
            RetryPolicy {
                min_wait: Duration::from_secs(90),
                ..RetryPolicy::default()
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_policy_serde_in_seconds() {
        let policy: RetryPolicy =
            serde_json::from_str(r#"{"max_attempts": 3, "min_wait_secs": 0.5}"#).unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.min_wait, Duration::from_millis(500));
        assert_eq!(policy.max_wait, Duration::from_secs(60));
    }
}

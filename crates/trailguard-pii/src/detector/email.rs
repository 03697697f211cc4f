//! Email address detector

use crate::detector::{DetectedSpan, DetectorError, EntityCategory, SpanDetector};
use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

/// Email regex is quite specific
const CONFIDENCE: f32 = 0.95;

/// Regex-based email detector
#[derive(Debug, Clone, Copy, Default)]
pub struct EmailDetector;

impl SpanDetector for EmailDetector {
    fn name(&self) -> &'static str {
        "email_regex"
    }

    fn category(&self) -> EntityCategory {
        EntityCategory::Email
    }

    fn detect(&self, text: &str) -> Result<Vec<DetectedSpan>, DetectorError> {
        Ok(EMAIL_REGEX
            .find_iter(text)
            .map(|m| DetectedSpan::new(self.category(), m.start(), m.end(), CONFIDENCE, self.name()))
            .collect())
    }
}

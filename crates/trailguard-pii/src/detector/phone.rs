//! Phone number detector

use crate::detector::{DetectedSpan, DetectorError, EntityCategory, SpanDetector};
use once_cell::sync::Lazy;
use regex::Regex;

// (123) 456-7890, 123-456-7890, 123.456.7890, +1 123 456 7890
static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\+?\d{1,3}[-.\s]?)?(\(?\d{3}\)?[-.\s]?)?\d{3}[-.\s]?\d{4}\b").unwrap()
});

/// Phone patterns can have false positives
const CONFIDENCE: f32 = 0.85;

/// Regex-based phone number detector with digit-count validation
#[derive(Debug, Clone, Copy, Default)]
pub struct PhoneDetector;

impl PhoneDetector {
    fn is_plausible(candidate: &str) -> bool {
        let digits = candidate.chars().filter(|c| c.is_ascii_digit()).count();

        // US/Canada numbers are 10 or 11 digits, international up to 15
        if !(10..=15).contains(&digits) {
            return false;
        }

        // 11 digits without a separator-led country code must start with 1
        if digits == 11 && !candidate.starts_with('+') {
            return candidate.trim_start_matches('(').starts_with('1');
        }

        true
    }

    /// Digits glued to the match on the left mean it is part of a longer number
    fn has_clean_left_edge(text: &str, start: usize) -> bool {
        text[..start]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_ascii_alphanumeric())
    }
}

impl SpanDetector for PhoneDetector {
    fn name(&self) -> &'static str {
        "phone_regex"
    }

    fn category(&self) -> EntityCategory {
        EntityCategory::Phone
    }

    fn detect(&self, text: &str) -> Result<Vec<DetectedSpan>, DetectorError> {
        Ok(PHONE_REGEX
            .find_iter(text)
            .filter(|m| Self::is_plausible(m.as_str()))
            .filter(|m| Self::has_clean_left_edge(text, m.start()))
            .map(|m| DetectedSpan::new(self.category(), m.start(), m.end(), CONFIDENCE, self.name()))
            .collect())
    }
}

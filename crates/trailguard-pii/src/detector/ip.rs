//! IP address detector

use crate::detector::{DetectedSpan, DetectorError, EntityCategory, SpanDetector};
use once_cell::sync::Lazy;
use regex::Regex;

static IPV4_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\.){3}(?:25[0-5]|2[0-4][0-9]|[01]?[0-9][0-9]?)\b",
    )
    .unwrap()
});

// Full (uncompressed) IPv6 form only
static IPV6_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}\b").unwrap());

/// IPv4 octet-range regex is very specific
const IPV4_CONFIDENCE: f32 = 0.99;
const IPV6_CONFIDENCE: f32 = 0.95;

/// Regex-based IPv4/IPv6 detector
#[derive(Debug, Clone, Copy, Default)]
pub struct IpAddressDetector;

impl IpAddressDetector {
    /// A dotted quad followed by another `.digit` is a version string, not an address
    fn is_standalone(text: &str, end: usize) -> bool {
        let mut rest = text[end..].chars();
        !matches!(
            (rest.next(), rest.next()),
            (Some('.'), Some(c)) if c.is_ascii_digit()
        )
    }
}

impl SpanDetector for IpAddressDetector {
    fn name(&self) -> &'static str {
        "ip_regex"
    }

    fn category(&self) -> EntityCategory {
        EntityCategory::IpAddress
    }

    fn detect(&self, text: &str) -> Result<Vec<DetectedSpan>, DetectorError> {
        let v4 = IPV4_REGEX
            .find_iter(text)
            .filter(|m| Self::is_standalone(text, m.end()))
            .map(|m| DetectedSpan::new(self.category(), m.start(), m.end(), IPV4_CONFIDENCE, self.name()));

        let v6 = IPV6_REGEX
            .find_iter(text)
            .map(|m| DetectedSpan::new(self.category(), m.start(), m.end(), IPV6_CONFIDENCE, self.name()));

        let mut spans: Vec<DetectedSpan> = v4.chain(v6).collect();
        spans.sort_by_key(|s| s.start);
        Ok(spans)
    }
}

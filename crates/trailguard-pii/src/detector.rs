//! Span detectors
//!
//! One detector per entity category. Every detector is a pure function of its
//! input: regexes are compiled once into immutable statics and nothing is
//! mutated across calls, so a detector set can be shared between threads
//! without locking.

mod email;
mod ip;
mod person;
mod phone;

pub use email::EmailDetector;
pub use ip::IpAddressDetector;
pub use person::PersonDetector;
pub use phone::PhoneDetector;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::AssertUnwindSafe;
use thiserror::Error;
use tracing::debug;

/// Inputs at least this large fan detectors out onto scoped threads
const PARALLEL_THRESHOLD_BYTES: usize = 64 * 1024;

/// Categories of sensitive data the engine recognizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityCategory {
    /// Person name or personal username
    Person,

    /// Email address
    Email,

    /// Phone number
    Phone,

    /// IPv4 or IPv6 address
    IpAddress,
}

impl EntityCategory {
    pub const ALL: [EntityCategory; 4] = [
        EntityCategory::Person,
        EntityCategory::Email,
        EntityCategory::Phone,
        EntityCategory::IpAddress,
    ];

    /// Tie-break rank used by the resolver: PERSON > EMAIL > PHONE > IP_ADDRESS
    pub fn rank(self) -> u8 {
        match self {
            EntityCategory::Person => 4,
            EntityCategory::Email => 3,
            EntityCategory::Phone => 2,
            EntityCategory::IpAddress => 1,
        }
    }

    /// Upper-case label, also used inside replacement tokens
    pub fn label(self) -> &'static str {
        match self {
            EntityCategory::Person => "PERSON",
            EntityCategory::Email => "EMAIL",
            EntityCategory::Phone => "PHONE",
            EntityCategory::IpAddress => "IP_ADDRESS",
        }
    }

    /// Fixed placeholder that replaces a span of this category
    pub fn placeholder(self) -> &'static str {
        match self {
            EntityCategory::Person => "<PERSON>",
            EntityCategory::Email => "<EMAIL>",
            EntityCategory::Phone => "<PHONE>",
            EntityCategory::IpAddress => "<IP_ADDRESS>",
        }
    }
}

impl fmt::Display for EntityCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A candidate sensitive span produced by a detector
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectedSpan {
    /// Category of the detected entity
    pub category: EntityCategory,

    /// Start byte offset (inclusive)
    pub start: usize,

    /// End byte offset (exclusive)
    pub end: usize,

    /// Confidence score (0.0 to 1.0)
    pub confidence: f32,

    /// Name of the detector that produced the span
    pub detector: &'static str,
}

impl DetectedSpan {
    pub fn new(
        category: EntityCategory,
        start: usize,
        end: usize,
        confidence: f32,
        detector: &'static str,
    ) -> Self {
        Self {
            category,
            start,
            end,
            confidence,
            detector,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Whether two half-open spans share at least one byte
    pub fn overlaps(&self, other: &DetectedSpan) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Borrow the covered text from the source string, if the span fits it
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        source.get(self.start..self.end)
    }

    /// Check the span invariants against its source text
    pub fn is_valid_for(&self, source: &str) -> bool {
        self.start < self.end
            && self.end <= source.len()
            && source.is_char_boundary(self.start)
            && source.is_char_boundary(self.end)
            && (0.0..=1.0).contains(&self.confidence)
    }
}

/// Errors raised while running detectors over one unit of text
#[derive(Debug, Error)]
pub enum DetectorError {
    #[error("Input of {len} bytes exceeds the {max} byte detection limit")]
    InputTooLarge { len: usize, max: usize },

    #[error("Detector '{detector}' produced an invalid span [{start}, {end})")]
    InvalidSpan {
        detector: &'static str,
        start: usize,
        end: usize,
    },

    #[error("Detector '{0}' panicked")]
    Panicked(&'static str),
}

/// A detector for a single entity category
pub trait SpanDetector: Send + Sync {
    /// Stable identifier recorded on every span this detector emits
    fn name(&self) -> &'static str;

    /// The one category this detector produces
    fn category(&self) -> EntityCategory;

    /// Produce candidate spans for `text`
    fn detect(&self, text: &str) -> Result<Vec<DetectedSpan>, DetectorError>;
}

/// Configuration for the detector set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Enable person name detection
    pub detect_person: bool,

    /// Enable email detection
    pub detect_email: bool,

    /// Enable phone number detection
    pub detect_phone: bool,

    /// Enable IP address detection
    pub detect_ip_address: bool,

    /// Minimum confidence threshold
    pub min_confidence: f32,

    /// Largest unit of text a detector will scan
    pub max_input_bytes: usize,

    /// Additional given names recognized by the person detector
    pub extra_given_names: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            detect_person: true,
            detect_email: true,
            detect_phone: true,
            detect_ip_address: true,
            min_confidence: 0.5,
            max_input_bytes: 1024 * 1024,
            extra_given_names: Vec::new(),
        }
    }
}

/// The set of enabled detectors, run together over one unit of text
pub struct SpanDetectorSet {
    detectors: Vec<Box<dyn SpanDetector>>,
    min_confidence: f32,
    max_input_bytes: usize,
}

impl SpanDetectorSet {
    /// Build the built-in detectors enabled in `config`
    pub fn new(config: &DetectorConfig) -> Self {
        let mut detectors: Vec<Box<dyn SpanDetector>> = Vec::new();

        if config.detect_person {
            detectors.push(Box::new(PersonDetector::with_extra_names(
                &config.extra_given_names,
            )));
        }
        if config.detect_email {
            detectors.push(Box::new(EmailDetector));
        }
        if config.detect_phone {
            detectors.push(Box::new(PhoneDetector));
        }
        if config.detect_ip_address {
            detectors.push(Box::new(IpAddressDetector));
        }

        Self::with_detectors(detectors, config.min_confidence, config.max_input_bytes)
    }

    /// Build a set from arbitrary detectors
    pub fn with_detectors(
        detectors: Vec<Box<dyn SpanDetector>>,
        min_confidence: f32,
        max_input_bytes: usize,
    ) -> Self {
        Self {
            detectors,
            min_confidence: min_confidence.clamp(0.0, 1.0),
            max_input_bytes,
        }
    }

    /// Categories covered by at least one detector
    pub fn categories(&self) -> Vec<EntityCategory> {
        let mut categories: Vec<EntityCategory> =
            self.detectors.iter().map(|d| d.category()).collect();
        categories.sort_by_key(|c| std::cmp::Reverse(c.rank()));
        categories.dedup();
        categories
    }

    /// Run every detector over `text`
    pub fn detect_all(&self, text: &str) -> Result<Vec<DetectedSpan>, DetectorError> {
        self.detect(text, &EntityCategory::ALL)
    }

    /// Run the detectors whose category is in `categories` over `text`.
    ///
    /// Empty input yields no spans. Spans below the confidence threshold are
    /// dropped; a span that violates the offset invariants fails the whole
    /// unit so the caller can apply its failure policy.
    pub fn detect(
        &self,
        text: &str,
        categories: &[EntityCategory],
    ) -> Result<Vec<DetectedSpan>, DetectorError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }

        if text.len() > self.max_input_bytes {
            return Err(DetectorError::InputTooLarge {
                len: text.len(),
                max: self.max_input_bytes,
            });
        }

        let selected: Vec<&dyn SpanDetector> = self
            .detectors
            .iter()
            .map(|d| d.as_ref())
            .filter(|d| categories.contains(&d.category()))
            .collect();

        let per_detector = if text.len() >= PARALLEL_THRESHOLD_BYTES && selected.len() > 1 {
            run_parallel(&selected, text)?
        } else {
            selected
                .iter()
                .map(|d| run_guarded(*d, text))
                .collect::<Result<Vec<_>, _>>()?
        };

        let mut spans = Vec::new();
        for (detector, found) in selected.iter().zip(per_detector) {
            debug!(
                detector = detector.name(),
                candidates = found.len(),
                "Detector finished"
            );
            for span in found {
                if !span.is_valid_for(text) {
                    return Err(DetectorError::InvalidSpan {
                        detector: detector.name(),
                        start: span.start,
                        end: span.end,
                    });
                }
                if span.confidence >= self.min_confidence {
                    spans.push(span);
                }
            }
        }

        // Stable sort keeps detector order for equal starts
        spans.sort_by_key(|s| s.start);

        Ok(spans)
    }
}

/// Run one detector, turning a panic into a per-unit error
fn run_guarded(detector: &dyn SpanDetector, text: &str) -> Result<Vec<DetectedSpan>, DetectorError> {
    std::panic::catch_unwind(AssertUnwindSafe(|| detector.detect(text)))
        .map_err(|_| DetectorError::Panicked(detector.name()))?
}

/// Run detectors on scoped threads; results come back in detector order
fn run_parallel(
    detectors: &[&dyn SpanDetector],
    text: &str,
) -> Result<Vec<Vec<DetectedSpan>>, DetectorError> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = detectors
            .iter()
            .map(|d| {
                let detector = *d;
                (detector.name(), scope.spawn(move || detector.detect(text)))
            })
            .collect();

        handles
            .into_iter()
            .map(|(name, handle)| {
                handle
                    .join()
                    .map_err(|_| DetectorError::Panicked(name))?
            })
            .collect()
    })
}

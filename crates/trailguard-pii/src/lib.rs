//! TrailGuard PII Detection and Masking
//!
//! This crate turns raw audit-trail content into masked content:
//! - Span detectors for person names, emails, phone numbers and IP addresses
//! - Conflict resolution between overlapping candidate spans
//! - Placeholder masking of free text
//! - Column-consistent table masking with per-column value caches

pub mod detector;
pub mod engine;
pub mod masker;
pub mod resolver;
pub mod table;

pub use detector::{
    DetectedSpan, DetectorConfig, DetectorError, EmailDetector, EntityCategory,
    IpAddressDetector, PersonDetector, PhoneDetector, SpanDetector, SpanDetectorSet,
};
pub use engine::{
    FailurePolicy, MaskedLines, MaskedTable, MaskedUnit, MaskingConfig, MaskingEngine, MaskingStats,
    REDACTED_TOKEN, SoftFailure,
};
pub use masker::{MaskError, MaskedText, Replacement, mask_text, mask_text_with};
pub use resolver::{ResolvedSpanSet, resolve, resolve_within};
pub use table::{ColumnMaskCache, PseudonymStyle};

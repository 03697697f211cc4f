//! Conflict resolution between overlapping candidate spans
//!
//! Candidates are ordered by start offset, then descending confidence, then
//! category priority (PERSON > EMAIL > PHONE > IP_ADDRESS). A single sweep
//! keeps the current accepted span and, on overlap, retains whichever of the
//! two has the greater (confidence, priority) pair. Ties keep the span that
//! sorted first, so identical input always resolves identically.

use crate::detector::DetectedSpan;
use serde::Serialize;
use std::cmp::Ordering;

/// Non-overlapping spans sorted by start offset.
///
/// Only [`resolve`] and [`resolve_within`] build one, so the ordering and
/// non-overlap invariants always hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedSpanSet {
    spans: Vec<DetectedSpan>,
}

impl ResolvedSpanSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn spans(&self) -> &[DetectedSpan] {
        &self.spans
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DetectedSpan> {
        self.spans.iter()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    pub fn into_vec(self) -> Vec<DetectedSpan> {
        self.spans
    }
}

impl<'a> IntoIterator for &'a ResolvedSpanSet {
    type Item = &'a DetectedSpan;
    type IntoIter = std::slice::Iter<'a, DetectedSpan>;

    fn into_iter(self) -> Self::IntoIter {
        self.spans.iter()
    }
}

/// Total order used before the sweep
fn candidate_order(a: &DetectedSpan, b: &DetectedSpan) -> Ordering {
    a.start
        .cmp(&b.start)
        .then_with(|| b.confidence.total_cmp(&a.confidence))
        .then_with(|| b.category.rank().cmp(&a.category.rank()))
        .then_with(|| b.end.cmp(&a.end))
        .then_with(|| a.detector.cmp(b.detector))
}

/// Whether `challenger` displaces the accepted span
fn beats(challenger: &DetectedSpan, accepted: &DetectedSpan) -> bool {
    match challenger.confidence.total_cmp(&accepted.confidence) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => challenger.category.rank() > accepted.category.rank(),
    }
}

/// Merge candidates from every detector into a non-overlapping set
pub fn resolve(mut candidates: Vec<DetectedSpan>) -> ResolvedSpanSet {
    candidates.retain(|s| s.start < s.end);
    candidates.sort_by(candidate_order);

    let mut accepted: Vec<DetectedSpan> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match accepted.last_mut() {
            Some(current) if current.overlaps(&candidate) => {
                if beats(&candidate, current) {
                    *current = candidate;
                }
            }
            _ => accepted.push(candidate),
        }
    }

    ResolvedSpanSet { spans: accepted }
}

/// Like [`resolve`], first discarding spans that fall outside a text of
/// `text_len` bytes
pub fn resolve_within(text_len: usize, mut candidates: Vec<DetectedSpan>) -> ResolvedSpanSet {
    candidates.retain(|s| s.end <= text_len);
    resolve(candidates)
}

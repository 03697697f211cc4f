//! Masking of resolved spans
//!
//! Replacements are applied from the highest start offset to the lowest: a
//! token may be longer or shorter than the span it replaces, so working
//! right to left keeps every lower offset valid.

use crate::detector::{DetectedSpan, EntityCategory};
use crate::resolver::ResolvedSpanSet;
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while applying spans to a text
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MaskError {
    #[error("Span [{start}, {end}) is out of bounds for text of {len} bytes")]
    SpanOutOfBounds { start: usize, end: usize, len: usize },

    #[error("Span [{start}, {end}) does not fall on character boundaries")]
    NotCharBoundary { start: usize, end: usize },
}

/// One span and the token that replaced it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Replacement {
    pub category: EntityCategory,
    pub start: usize,
    pub end: usize,
    pub token: String,
}

/// Result of masking one text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskedText {
    original_len: usize,
    /// Sorted by descending start offset, the order they were applied in
    replacements: Vec<Replacement>,
    text: String,
}

impl MaskedText {
    /// Masked text for input that needed no replacement
    pub fn unchanged(text: &str) -> Self {
        Self {
            original_len: text.len(),
            replacements: Vec::new(),
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    pub fn original_len(&self) -> usize {
        self.original_len
    }

    pub fn replacements(&self) -> &[Replacement] {
        &self.replacements
    }

    pub fn is_unchanged(&self) -> bool {
        self.replacements.is_empty()
    }

    /// Number of replacements per category
    pub fn counts_by_category(&self) -> BTreeMap<EntityCategory, usize> {
        let mut counts = BTreeMap::new();
        for replacement in &self.replacements {
            *counts.entry(replacement.category).or_insert(0) += 1;
        }
        counts
    }

    /// Replay the recorded replacements over `original`
    pub fn apply_to(&self, original: &str) -> Result<String, MaskError> {
        let mut result = original.to_string();
        for replacement in &self.replacements {
            check_range(&result, replacement.start, replacement.end)?;
            result.replace_range(replacement.start..replacement.end, &replacement.token);
        }
        Ok(result)
    }

    /// Whether replaying the replacements over `original` reproduces the
    /// masked text exactly
    pub fn verify(&self, original: &str) -> bool {
        original.len() == self.original_len
            && self.apply_to(original).is_ok_and(|replayed| replayed == self.text)
    }
}

fn check_range(text: &str, start: usize, end: usize) -> Result<(), MaskError> {
    if start >= end || end > text.len() {
        return Err(MaskError::SpanOutOfBounds {
            start,
            end,
            len: text.len(),
        });
    }
    if !text.is_char_boundary(start) || !text.is_char_boundary(end) {
        return Err(MaskError::NotCharBoundary { start, end });
    }
    Ok(())
}

/// Replace every span with its category placeholder
pub fn mask_text(text: &str, spans: &ResolvedSpanSet) -> Result<MaskedText, MaskError> {
    mask_text_with(text, spans, |span, _| span.category.placeholder().to_string())
}

/// Replace every span with the token produced by `token_for`, which receives
/// the span and the text it covers
pub fn mask_text_with<F>(
    text: &str,
    spans: &ResolvedSpanSet,
    mut token_for: F,
) -> Result<MaskedText, MaskError>
where
    F: FnMut(&DetectedSpan, &str) -> String,
{
    if spans.is_empty() {
        return Ok(MaskedText::unchanged(text));
    }

    // Validate everything against the original before touching it
    for span in spans {
        check_range(text, span.start, span.end)?;
    }

    // Tokens are chosen left to right so numbering follows reading order
    let mut replacements: Vec<Replacement> = spans
        .iter()
        .map(|span| Replacement {
            category: span.category,
            start: span.start,
            end: span.end,
            token: token_for(span, &text[span.start..span.end]),
        })
        .collect();
    replacements.reverse();

    let mut result = text.to_string();
    for replacement in &replacements {
        result.replace_range(replacement.start..replacement.end, &replacement.token);
    }

    Ok(MaskedText {
        original_len: text.len(),
        replacements,
        text: result,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;

    fn spans(list: &[(EntityCategory, usize, usize)]) -> ResolvedSpanSet {
        resolve(
            list.iter()
                .map(|&(category, start, end)| DetectedSpan::new(category, start, end, 0.9, "test"))
                .collect(),
        )
    }

    #[test]
    fn test_mask_mode() {
        let text = "Email: test@example.com and IP: 10.0.0.5";
        let set = spans(&[
            (EntityCategory::Email, 7, 23),
            (EntityCategory::IpAddress, 32, 40),
        ]);

        let masked = mask_text(text, &set).unwrap();
        assert_eq!(masked.text(), "Email: <EMAIL> and IP: <IP_ADDRESS>");
        assert_eq!(masked.original_len(), text.len());
        assert!(masked.verify(text));
    }

    #[test]
    fn test_replacements_recorded_highest_offset_first() {
        let text = "a@b.co x 10.0.0.1";
        let set = spans(&[
            (EntityCategory::Email, 0, 6),
            (EntityCategory::IpAddress, 9, 17),
        ]);

        let masked = mask_text(text, &set).unwrap();
        let starts: Vec<usize> = masked.replacements().iter().map(|r| r.start).collect();
        assert_eq!(starts, vec![9, 0]);
    }

    #[test]
    fn test_no_spans_returns_original() {
        let masked = mask_text("nothing to see", &ResolvedSpanSet::empty()).unwrap();
        assert!(masked.is_unchanged());
        assert_eq!(masked.text(), "nothing to see");
    }

    #[test]
    fn test_out_of_bounds_span_rejected() {
        let set = spans(&[(EntityCategory::Email, 0, 50)]);
        let err = mask_text("short", &set).unwrap_err();
        assert!(matches!(err, MaskError::SpanOutOfBounds { len: 5, .. }));
    }

    #[test]
    fn test_char_boundary_enforced() {
        // 'é' is two bytes wide
        let set = spans(&[(EntityCategory::Person, 0, 1)]);
        let err = mask_text("élan", &set).unwrap_err();
        assert_eq!(err, MaskError::NotCharBoundary { start: 0, end: 1 });
    }

    #[test]
    fn test_multibyte_text_round_trip() {
        let text = "담당자 John Doe, 연락처 jd@example.kr";
        let john = text.find("John Doe").unwrap();
        let email = text.find("jd@example.kr").unwrap();
        let set = spans(&[
            (EntityCategory::Person, john, john + 8),
            (EntityCategory::Email, email, email + 13),
        ]);

        let masked = mask_text(text, &set).unwrap();
        assert_eq!(masked.text(), "담당자 <PERSON>, 연락처 <EMAIL>");
        assert!(masked.verify(text));
    }

    #[test]
    fn test_custom_tokens_numbered_left_to_right() {
        let text = "bob met alice";
        let set = spans(&[
            (EntityCategory::Person, 0, 3),
            (EntityCategory::Person, 8, 13),
        ]);

        let mut seen = Vec::new();
        let masked = mask_text_with(text, &set, |span, raw| {
            seen.push(raw.to_string());
            format!("<{}_{}>", span.category.label(), seen.len())
        })
        .unwrap();

        assert_eq!(masked.text(), "<PERSON_1> met <PERSON_2>");
        assert_eq!(seen, vec!["bob", "alice"]);
    }

    #[test]
    fn test_counts_by_category() {
        let text = "a@b.co c@d.co 10.0.0.1";
        let set = spans(&[
            (EntityCategory::Email, 0, 6),
            (EntityCategory::Email, 7, 13),
            (EntityCategory::IpAddress, 14, 22),
        ]);
        let counts = mask_text(text, &set).unwrap().counts_by_category();
        assert_eq!(counts[&EntityCategory::Email], 2);
        assert_eq!(counts[&EntityCategory::IpAddress], 1);
    }

    #[test]
    fn test_verify_rejects_other_original() {
        let text = "mail a@b.co";
        let set = spans(&[(EntityCategory::Email, 5, 11)]);
        let masked = mask_text(text, &set).unwrap();
        assert!(!masked.verify("mall a@b.co"));
        assert!(!masked.verify("mail a@b.com"));
    }
}

//! Person name detector
//!
//! Lexical heuristics rather than a statistical model. Candidates come from
//! four rules, each with its own confidence:
//! - honorific followed by a capitalized name (`Dr. Chen`)
//! - known given name followed by capitalized surname(s) (`John Doe`)
//! - a name or username introduced by a label (`User: jdoe`, `approved by Lee`)
//! - a known given name on its own, in any case (`alice`)
//!
//! Rules are allowed to overlap; the resolver picks the winner.

use crate::detector::{DetectedSpan, DetectorError, EntityCategory, SpanDetector};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static WORD_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z][A-Za-z'\-]*").unwrap());

static HONORIFIC_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:Mr|Mrs|Ms|Miss|Dr|Prof)\.?[ \t]+([A-Z][a-z][A-Za-z'\-]*(?:[ \t][A-Z][a-z][A-Za-z'\-]*)?)",
    )
    .unwrap()
});

static USER_LABEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i:\b(?:user(?:name|_id)?|operator|login|account)[ \t]*[:=][ \t]*)([A-Za-z][A-Za-z0-9._\-]*[A-Za-z0-9])",
    )
    .unwrap()
});

static BY_LABEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i:\b(?:signed|approved|performed|reviewed|executed|modified|deleted|created|verified)[ \t]+by[ \t]+)([A-Z][a-z][A-Za-z'\-]*(?:[ \t][A-Z][a-z][A-Za-z'\-]*)?)",
    )
    .unwrap()
});

const HONORIFIC_CONFIDENCE: f32 = 0.90;
const FULL_NAME_CONFIDENCE: f32 = 0.85;
const BY_LABEL_CONFIDENCE: f32 = 0.75;
const USER_LABEL_CONFIDENCE: f32 = 0.70;
const CAPITALIZED_GIVEN_NAME_CONFIDENCE: f32 = 0.60;
const LOWERCASE_GIVEN_NAME_CONFIDENCE: f32 = 0.55;

/// Surnames that may follow a given name (middle name included)
const MAX_SURNAME_WORDS: usize = 2;

// Given names that double as common words ("will", "mark", "grace") are left out.
const GIVEN_NAMES: &[&str] = &[
    "aaron", "abigail", "adam", "alan", "albert", "alexander", "alexis", "alice", "amanda", "amy",
    "andrea", "andrew", "angela", "ann", "anna", "anthony", "arthur", "ashley", "barbara",
    "benjamin", "betty", "beverly", "bob", "bobby", "brandon", "brenda", "brian", "brittany",
    "bruce", "bryan", "carl", "carol", "carolyn", "catherine", "charles", "charlotte", "cheryl",
    "christina", "christine", "christopher", "cynthia", "daniel", "danielle", "david", "deborah",
    "debra", "denise", "dennis", "diana", "diane", "donald", "donna", "doris", "dorothy",
    "douglas", "dylan", "edward", "elijah", "elizabeth", "emily", "emma", "eric", "ethan",
    "eugene", "evelyn", "frances", "gabriel", "george", "gerald", "gloria", "gregory", "hannah",
    "harold", "heather", "helen", "henry", "isabella", "jacob", "jacqueline", "james", "jane",
    "janet", "janice", "jason", "jeffrey", "jennifer", "jeremy", "jerry", "jessica", "joan",
    "john", "johnny", "jonathan", "jose", "joseph", "joshua", "joyce", "juan", "judith", "judy",
    "julia", "julie", "justin", "karen", "katherine", "kathleen", "kathryn", "kayla", "keith",
    "kelly", "kenneth", "kevin", "kimberly", "kyle", "larry", "laura", "lauren", "lawrence",
    "linda", "lisa", "logan", "louis", "madison", "margaret", "maria", "marie", "marilyn",
    "martha", "mary", "matthew", "megan", "melissa", "michael", "michelle", "nancy", "natalie",
    "nathan", "nicholas", "nicole", "noah", "olivia", "pamela", "patricia", "patrick", "paul",
    "peter", "philip", "rachel", "ralph", "randy", "raymond", "rebecca", "richard", "robert",
    "ronald", "russell", "ruth", "ryan", "samantha", "samuel", "sandra", "sara", "sarah", "scott",
    "sean", "sharon", "shirley", "sophia", "stephanie", "stephen", "steven", "susan", "teresa",
    "theresa", "thomas", "timothy", "tyler", "victoria", "vincent", "virginia", "walter", "wayne",
    "willie", "zachary",
];

// Capitalized words common in audit logs that must never be read as a surname
// or a labelled name.
const NON_NAME_WORDS: &[&str] = &[
    "abort", "aborted", "access", "account", "action", "admin", "administrator", "and", "at",
    "audit", "backup", "by", "data", "delete", "deleted", "error", "fail", "failed", "file",
    "for", "from", "guest", "in", "info", "login", "logout", "method", "none", "null", "of", "on",
    "operator", "or", "passed", "qa", "qc", "reviewer", "root", "save", "sequence", "server",
    "service", "start", "stop", "success", "supervisor", "system", "test", "the", "to",
    "unknown", "user", "warn", "warning", "with",
];

/// Heuristic person name detector
#[derive(Debug, Clone)]
pub struct PersonDetector {
    given_names: HashSet<String>,
    non_name_words: HashSet<&'static str>,
}

impl Default for PersonDetector {
    fn default() -> Self {
        Self::with_extra_names(&[])
    }
}

impl PersonDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Built-in gazetteer extended with `extra` given names (case-insensitive)
    pub fn with_extra_names(extra: &[String]) -> Self {
        let given_names = GIVEN_NAMES
            .iter()
            .map(|n| n.to_string())
            .chain(extra.iter().map(|n| n.trim().to_lowercase()))
            .filter(|n| !n.is_empty())
            .collect();

        Self {
            given_names,
            non_name_words: NON_NAME_WORDS.iter().copied().collect(),
        }
    }

    fn is_given_name(&self, word: &str) -> bool {
        self.given_names.contains(&word.to_lowercase())
    }

    fn is_non_name(&self, word: &str) -> bool {
        self.non_name_words.contains(word.to_lowercase().as_str())
    }

    /// Capitalized word with at least one lowercase letter (`Doe`, `McDonald`)
    fn looks_like_surname(&self, word: &str) -> bool {
        word.chars().next().is_some_and(|c| c.is_ascii_uppercase())
            && word.chars().skip(1).any(|c| c.is_ascii_lowercase())
            && !self.is_non_name(word)
    }

    /// The word is not glued to digits or underscores (`alice01`, `bob_x`)
    fn is_whole_word(text: &str, start: usize, end: usize) -> bool {
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        let clean = |c: Option<char>| c.is_none_or(|c| !(c.is_alphanumeric() || c == '_'));
        clean(before) && clean(after)
    }

    fn span(&self, start: usize, end: usize, confidence: f32) -> DetectedSpan {
        DetectedSpan::new(EntityCategory::Person, start, end, confidence, self.name())
    }

    fn detect_honorifics(&self, text: &str, spans: &mut Vec<DetectedSpan>) {
        for caps in HONORIFIC_REGEX.captures_iter(text) {
            if let Some(name) = caps.get(1) {
                spans.push(self.span(name.start(), name.end(), HONORIFIC_CONFIDENCE));
            }
        }
    }

    fn detect_labelled(&self, text: &str, spans: &mut Vec<DetectedSpan>) {
        for caps in USER_LABEL_REGEX.captures_iter(text) {
            if let Some(name) = caps.get(1) {
                if !self.is_non_name(name.as_str()) {
                    spans.push(self.span(name.start(), name.end(), USER_LABEL_CONFIDENCE));
                }
            }
        }

        for caps in BY_LABEL_REGEX.captures_iter(text) {
            if let Some(name) = caps.get(1) {
                let first_word = name.as_str().split_whitespace().next().unwrap_or_default();
                if !self.is_non_name(first_word) {
                    spans.push(self.span(name.start(), name.end(), BY_LABEL_CONFIDENCE));
                }
            }
        }
    }

    fn detect_given_names(&self, text: &str, spans: &mut Vec<DetectedSpan>) {
        let words: Vec<regex::Match<'_>> = WORD_REGEX.find_iter(text).collect();

        for (index, word) in words.iter().enumerate() {
            if !self.is_given_name(word.as_str())
                || !Self::is_whole_word(text, word.start(), word.end())
            {
                continue;
            }

            let capitalized = word.as_str().starts_with(|c: char| c.is_ascii_uppercase());
            let confidence = if capitalized {
                CAPITALIZED_GIVEN_NAME_CONFIDENCE
            } else {
                LOWERCASE_GIVEN_NAME_CONFIDENCE
            };
            spans.push(self.span(word.start(), word.end(), confidence));

            if !capitalized {
                continue;
            }

            // Extend over following surnames separated by a single space or tab
            let mut end = word.end();
            for next in words.iter().skip(index + 1).take(MAX_SURNAME_WORDS) {
                let gap = &text[end..next.start()];
                let single_gap = gap.len() == 1 && (gap == " " || gap == "\t");
                if !single_gap
                    || !self.looks_like_surname(next.as_str())
                    || !Self::is_whole_word(text, next.start(), next.end())
                {
                    break;
                }
                end = next.end();
            }

            if end > word.end() {
                spans.push(self.span(word.start(), end, FULL_NAME_CONFIDENCE));
            }
        }
    }
}

impl SpanDetector for PersonDetector {
    fn name(&self) -> &'static str {
        "person_heuristic"
    }

    fn category(&self) -> EntityCategory {
        EntityCategory::Person
    }

    fn detect(&self, text: &str) -> Result<Vec<DetectedSpan>, DetectorError> {
        let mut spans = Vec::new();

        self.detect_honorifics(text, &mut spans);
        self.detect_labelled(text, &mut spans);
        self.detect_given_names(text, &mut spans);

        spans.sort_by_key(|s| (s.start, std::cmp::Reverse(s.end)));
        spans.dedup_by(|a, b| a.start == b.start && a.end == b.end && a.confidence <= b.confidence);

        Ok(spans)
    }
}

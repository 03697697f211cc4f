//! Request assembly and response parsing

use crate::context::MaskedContent;
use crate::error::{ReportError, Result};
use crate::template::AuditTemplate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};
use trailguard_core::AnalysisRequest;

static ASSESSMENT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?im)assessment\W{0,6}\s*\[?\s*(compliant|minor observation|major observation|critical warning)[ \t]*(?:[\]*.]|$)",
    )
    .unwrap()
});

static SEVERITY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?im)^\W*severity\W{0,6}\s*(critical|major|minor)\b").unwrap());

/// Build the outbound request from masked content.
///
/// A non-blank `question` turns the request into a question answered from
/// the logs; otherwise the backend is asked for a full audit summary.
pub fn build_request(
    masked: &MaskedContent,
    template: &AuditTemplate,
    question: Option<&str>,
) -> AnalysisRequest {
    let question = question
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_string);

    if masked.is_empty() {
        warn!("Building analysis request with empty context");
    }
    if masked.is_truncated() {
        debug!(kind = ?masked.kind(), "Context truncated to configured limits");
    }

    let request = AnalysisRequest {
        instruction: template.compose(question.as_deref()),
        context: masked.body().to_string(),
        template_version: template.version().to_string(),
        question,
    };

    debug!(
        template_version = %request.template_version,
        payload_bytes = request.payload_bytes(),
        is_question = request.is_question(),
        "Analysis request assembled"
    );

    request
}

/// Overall verdict of a review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Assessment {
    Compliant,
    MinorObservation,
    MajorObservation,
    CriticalWarning,
}

impl Assessment {
    fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "compliant" => Some(Assessment::Compliant),
            "minor observation" => Some(Assessment::MinorObservation),
            "major observation" => Some(Assessment::MajorObservation),
            "critical warning" => Some(Assessment::CriticalWarning),
            _ => None,
        }
    }
}

/// Findings count per severity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub major: usize,
    pub minor: usize,
}

/// Markdown report returned by the backend, plus what could be read from it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditReport {
    /// Verdict from the compliance summary, when the backend stated one
    pub assessment: Option<Assessment>,

    pub findings: SeverityCounts,

    /// Response text, untouched
    pub markdown: String,
}

impl AuditReport {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Read the response text. The markdown is kept as returned; the verdict and
/// severity counts are best effort and absent fields are not an error.
pub fn parse_report(response: &str) -> Result<AuditReport> {
    if response.trim().is_empty() {
        return Err(ReportError::EmptyResponse);
    }

    let assessment = ASSESSMENT_REGEX
        .captures(response)
        .and_then(|caps| caps.get(1))
        .and_then(|m| Assessment::parse(m.as_str()));

    let mut findings = SeverityCounts::default();
    for caps in SEVERITY_REGEX.captures_iter(response) {
        match caps.get(1).map(|m| m.as_str().to_lowercase()).as_deref() {
            Some("critical") => findings.critical += 1,
            Some("major") => findings.major += 1,
            Some("minor") => findings.minor += 1,
            _ => {}
        }
    }

    Ok(AuditReport {
        assessment,
        findings,
        markdown: response.to_string(),
    })
}

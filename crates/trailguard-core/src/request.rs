//! Outbound analysis request

use serde::{Deserialize, Serialize};

/// Payload sent to the compliance-analysis backend.
///
/// The instruction and the context travel as two separate content parts;
/// backends decide model and generation parameters themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Audit framework instruction, including the task or user question
    pub instruction: String,

    /// Masked content under review
    pub context: String,

    /// Version of the template the instruction was built from
    pub template_version: String,

    /// User question, if the request answers one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
}

impl AnalysisRequest {
    /// Approximate payload size in bytes, used for logging
    pub fn payload_bytes(&self) -> usize {
        self.instruction.len() + self.context.len()
    }

    pub fn is_question(&self) -> bool {
        self.question.is_some()
    }
}

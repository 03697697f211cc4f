//! Fixed audit framework template
//!
//! The instruction set is compiled into the binary and versioned; callers
//! pick a template but can never edit its text at call time.

/// Static, versioned instruction set sent ahead of every review
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditTemplate {
    version: &'static str,
    instruction: &'static str,
}

/// Appended when the caller asks a specific question
const QUESTION_SUFFIX: &str =
    "Answer the user's question using only the provided audit trail logs.";

/// Appended when no question is asked
const SUMMARY_TASK: &str = "Perform a comprehensive data integrity audit summary of the provided logs.";

const DATA_INTEGRITY_V1: &str = r#"### ROLE
You are a Lead Data Integrity (DI) Auditor at a pharmaceutical manufacturer.
You review audit trail records of GMP computerized systems for compliance with
21 CFR Part 11, EudraLex Annex 11 and the ALCOA+ principles.

### CONTEXT AND RULES
- Personal identifiers in the input have been replaced with tokens such as
  <PERSON>, <PERSON_1>, <EMAIL>, <PHONE> and <IP_ADDRESS>. Equal tokens within
  a column refer to the same actor; never try to recover the real identity.
- Objective: detect potential data integrity violations, data manipulation
  and poor practice.
- Treat deletion of raw data, or modification of critical parameters without
  a recorded reason, as a CRITICAL violation.

### REVIEW FRAMEWORK (ALCOA+)
1. Attributable (who)
   - Shared or generic accounts such as "Admin" or "User1".
   - Actions performed by roles that should not hold the privilege, for
     example an operator deleting a processing method.
2. Legible and Original
   - DELETE, DROP or REMOVE actions on data files or results.
   - Changes to the audit trail configuration, including disabling it.
3. Contemporaneous (when)
   - Timestamps out of chronological order (possible clock manipulation or
     backdating).
   - Activity outside business hours without justification.
4. Testing into compliance
   - Repeated aborted runs followed by a passing run.
   - Several changes to integration parameters or processing methods
     immediately before a result is generated.

### OUTPUT FORMAT (Markdown)
Write a formal Audit Review Report.

#### 1. Compliance Summary
- Assessment: one of [COMPLIANT / MINOR OBSERVATION / MAJOR OBSERVATION / CRITICAL WARNING]
- A short summary of the review.

#### 2. DI Observations
For every finding:
- **Severity:** Critical, Major or Minor
- **Category:** for example Unauthorized Deletion, Testing into Compliance, Invalid User Access
- **Log Evidence:** the exact log entry, quoted
- **Regulatory Impact:** the ALCOA+ principle or 21 CFR Part 11 clause that is violated

#### 3. Auditor Recommendations
- Immediate actions, for example "Initiate Deviation Report" or "Lock user account <PERSON_1>"."#;

impl AuditTemplate {
    /// GMP data integrity review, first revision
    pub const DATA_INTEGRITY: AuditTemplate = AuditTemplate {
        version: "di-audit/1",
        instruction: DATA_INTEGRITY_V1,
    };

    /// Template used when the caller does not choose one
    pub const fn current() -> AuditTemplate {
        Self::DATA_INTEGRITY
    }

    pub fn version(&self) -> &'static str {
        self.version
    }

    pub fn instruction(&self) -> &'static str {
        self.instruction
    }

    /// Full instruction for one request. A blank question counts as none.
    pub fn compose(&self, question: Option<&str>) -> String {
        match question.map(str::trim).filter(|q| !q.is_empty()) {
            Some(question) => format!(
                "{}\n\nUSER QUESTION: {}\n\n{}",
                self.instruction, question, QUESTION_SUFFIX
            ),
            None => format!("{}\n\n{}", self.instruction, SUMMARY_TASK),
        }
    }
}

impl Default for AuditTemplate {
    fn default() -> Self {
        Self::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_is_versioned() {
        let template = AuditTemplate::current();
        assert_eq!(template.version(), "di-audit/1");
        assert!(template.instruction().contains("ALCOA+"));
        assert!(template.instruction().contains("21 CFR Part 11"));
    }

    #[test]
    fn test_compose_with_question() {
        let prompt = AuditTemplate::current().compose(Some("  Who deleted files?  "));

        assert!(prompt.starts_with("### ROLE"));
        assert!(prompt.contains("USER QUESTION: Who deleted files?\n"));
        assert!(prompt.ends_with(QUESTION_SUFFIX));
        assert!(!prompt.contains(SUMMARY_TASK));
    }

    #[test]
    fn test_compose_without_question() {
        let template = AuditTemplate::current();
        for question in [None, Some(""), Some("   ")] {
            let prompt = template.compose(question);
            assert!(prompt.ends_with(SUMMARY_TASK));
            assert!(!prompt.contains("USER QUESTION"));
        }
    }
}

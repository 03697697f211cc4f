//! Masked content prepared for the analysis context
//!
//! [`MaskedContent`] has no public constructor taking a raw string or a raw
//! table: it can only be built from masking output, so nothing that reaches
//! the assembler has skipped the masking engine.

use serde::{Deserialize, Serialize};
use trailguard_core::{Cell, Table};
use trailguard_pii::{MaskedLines, MaskedTable, MaskedUnit};

/// Size limits applied when rendering content into the request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextLimits {
    /// Table rows rendered into the context
    pub max_rows: usize,

    /// Characters of free text kept in the context
    pub max_chars: usize,
}

impl Default for ContextLimits {
    fn default() -> Self {
        Self {
            max_rows: 50,
            max_chars: 5000,
        }
    }
}

/// Shape of the content that was masked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Text,
    Table { rows: usize, shown_rows: usize },
}

/// Masked content ready to be embedded in an analysis request
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedContent {
    kind: ContentKind,
    body: String,
    truncated: bool,
}

impl MaskedContent {
    /// Masked free text, cut to `limits.max_chars` characters
    pub fn from_unit(unit: &MaskedUnit, limits: &ContextLimits) -> Self {
        let (body, truncated) = truncate_chars(unit.text(), limits.max_chars);
        Self {
            kind: ContentKind::Text,
            body: body.to_string(),
            truncated,
        }
    }

    /// Line-masked text, joined and cut to `limits.max_chars` characters
    pub fn from_lines(masked: &MaskedLines, limits: &ContextLimits) -> Self {
        let text = masked.text();
        let (body, truncated) = truncate_chars(&text, limits.max_chars);
        Self {
            kind: ContentKind::Text,
            body: body.to_string(),
            truncated,
        }
    }

    /// Masked table, rendered as markdown up to `limits.max_rows` rows
    pub fn from_table(masked: &MaskedTable, limits: &ContextLimits) -> Self {
        let table = masked.table();
        let rows = table.row_count();
        let shown_rows = rows.min(limits.max_rows);

        Self {
            kind: ContentKind::Table { rows, shown_rows },
            body: render_markdown(table, shown_rows),
            truncated: shown_rows < rows,
        }
    }

    pub fn kind(&self) -> ContentKind {
        self.kind
    }

    /// Rendered context text
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Whether rows or characters were dropped to fit the limits
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// First `max_chars` characters of `text`, never splitting a character
fn truncate_chars(text: &str, max_chars: usize) -> (&str, bool) {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => (&text[..cut], true),
        None => (text, false),
    }
}

fn escape_cell(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('|', "\\|")
        .replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
}

/// Render the first `rows` rows as a GitHub-style markdown table
fn render_markdown(table: &Table, rows: usize) -> String {
    if table.column_count() == 0 {
        return String::new();
    }

    let mut out = String::new();

    let header: Vec<String> = table
        .column_names()
        .into_iter()
        .map(escape_cell)
        .collect();
    out.push_str("| ");
    out.push_str(&header.join(" | "));
    out.push_str(" |\n");

    let rule: Vec<&str> = table.columns().iter().map(|_| "---").collect();
    out.push('|');
    out.push_str(&rule.join("|"));
    out.push_str("|\n");

    for index in 0..rows {
        let Some(row) = table.row(index) else { break };
        let cells: Vec<String> = row
            .into_iter()
            .map(|cell| match cell {
                Cell::Text(text) => escape_cell(text),
                other => other.to_string(),
            })
            .collect();
        out.push_str("| ");
        out.push_str(&cells.join(" | "));
        out.push_str(" |\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use trailguard_core::Column;
    use trailguard_pii::MaskingEngine;

    fn masked_table(table: &Table) -> MaskedTable {
        MaskingEngine::default().mask_table_default(table).unwrap()
    }

    #[test]
    fn test_text_within_limit_kept_whole() {
        let unit = MaskingEngine::default().mask_text("Contact John Doe at 10.0.0.5");
        let content = MaskedContent::from_unit(&unit, &ContextLimits::default());

        assert_eq!(content.body(), "Contact <PERSON> at <IP_ADDRESS>");
        assert_eq!(content.kind(), ContentKind::Text);
        assert!(!content.is_truncated());
    }

    #[test]
    fn test_text_truncated_on_char_boundary() {
        let unit = MaskingEngine::default().mask_text("감사 추적 검토");
        let limits = ContextLimits {
            max_chars: 4,
            ..ContextLimits::default()
        };
        let content = MaskedContent::from_unit(&unit, &limits);

        assert_eq!(content.body(), "감사 추");
        assert!(content.is_truncated());
    }

    #[test]
    fn test_lines_joined_into_text_body() {
        let masked = MaskingEngine::default().mask_lines("login from 10.0.0.1\nlogout from 10.0.0.2");
        let content = MaskedContent::from_lines(&masked, &ContextLimits::default());

        assert_eq!(content.body(), "login from <IP_ADDRESS>\nlogout from <IP_ADDRESS>");
        assert_eq!(content.kind(), ContentKind::Text);
    }

    #[test]
    fn test_table_rendered_as_markdown() {
        let table = Table::new(vec![
            Column::new("User", vec![Cell::from("alice"), Cell::from("bob")]),
            Column::new("Batch", vec![Cell::Int(7), Cell::Null]),
        ])
        .unwrap();
        let content = MaskedContent::from_table(&masked_table(&table), &ContextLimits::default());

        assert_eq!(
            content.body(),
            "| User | Batch |\n|---|---|\n| <PERSON_1> | 7 |\n| <PERSON_2> |  |\n"
        );
        assert_eq!(
            content.kind(),
            ContentKind::Table {
                rows: 2,
                shown_rows: 2
            }
        );
    }

    #[test]
    fn test_table_limited_to_max_rows() {
        let cells: Vec<Cell> = (0..120).map(Cell::Int).collect();
        let table = Table::new(vec![Column::new("Seq", cells)]).unwrap();
        let content = MaskedContent::from_table(&masked_table(&table), &ContextLimits::default());

        // header + rule + 50 rows
        assert_eq!(content.body().lines().count(), 52);
        assert!(content.is_truncated());
        assert!(content.body().contains("| 49 |"));
        assert!(!content.body().contains("| 50 |"));
    }

    #[test]
    fn test_pipes_and_newlines_escaped() {
        assert_eq!(escape_cell("a|b\nc"), "a\\|b c");
    }
}

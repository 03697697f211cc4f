//! Error types for TrailGuard Core

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid table: {0}")]
    InvalidTable(String),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    #[error("Unsupported input: {0}")]
    UnsupportedInput(String),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Table;

    /// Every variant a core operation can produce
    fn kind(err: &Error) -> &'static str {
        match err {
            Error::Serialization(_) => "serialization",
            Error::InvalidTable(_) => "invalid_table",
            Error::ColumnNotFound(_) => "column_not_found",
            Error::UnsupportedInput(_) => "unsupported_input",
        }
    }

    #[test]
    fn test_table_errors_map_to_variants() {
        assert_eq!(kind(&Table::from_json("{not json").unwrap_err()), "serialization");
        assert_eq!(kind(&Table::from_json("42").unwrap_err()), "unsupported_input");
        assert_eq!(kind(&Table::from_json("[1, 2]").unwrap_err()), "invalid_table");

        let table = Table::from_json(r#"[{"User": "alice"}]"#).unwrap();
        assert_eq!(kind(&table.column("IP").unwrap_err()), "column_not_found");
    }
}

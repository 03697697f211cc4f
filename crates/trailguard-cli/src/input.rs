//! Input file loading
//!
//! `.json` files are tables, `.txt` and `.log` files are free text.

use anyhow::{Context, bail};
use std::path::{Path, PathBuf};
use trailguard_core::Table;

/// Raw content read from disk, before masking
#[derive(Debug, Clone, PartialEq)]
pub enum InputDocument {
    Text(String),
    Table(Table),
}

impl InputDocument {
    pub fn kind(&self) -> &'static str {
        match self {
            InputDocument::Text(_) => "text",
            InputDocument::Table(_) => "table",
        }
    }
}

/// Expand a leading `~` in a path argument
pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).to_string())
}

/// Read and classify an input file by extension
pub fn load(path: &Path) -> anyhow::Result<InputDocument> {
    let path = expand_path(path);
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    match extension.as_str() {
        "json" => {
            let contents = read(&path)?;
            let table = Table::from_json(&contents)
                .with_context(|| format!("Failed to parse table from {}", path.display()))?;
            Ok(InputDocument::Table(table))
        }
        "txt" | "log" => Ok(InputDocument::Text(read(&path)?)),
        other => bail!(
            trailguard_core::Error::UnsupportedInput(format!(
                "'{}' files are not supported (use .json, .txt or .log)",
                if other.is_empty() { "extensionless" } else { other }
            ))
        ),
    }
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

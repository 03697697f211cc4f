//! Detection, resolution and masking wired together
//!
//! [`MaskingEngine`] owns only immutable configuration and detectors, so one
//! instance can be shared across threads and requests without locking.
//!
//! Soft failures (a detector error or a span that cannot be applied) never
//! abort a batch. The affected unit is logged and handled by the configured
//! [`FailurePolicy`]: `PassThrough` forwards it unmasked, `Redact` replaces
//! the whole unit. Operators choosing `PassThrough` accept that a failed unit
//! can carry a real identifier downstream.

use crate::detector::{DetectedSpan, DetectorConfig, DetectorError, EntityCategory, SpanDetectorSet};
use crate::masker::{MaskError, MaskedText, mask_text, mask_text_with};
use crate::resolver::{ResolvedSpanSet, resolve_within};
use crate::table::{ColumnMaskCache, PseudonymStyle};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};
use trailguard_core::{Cell, Column, Table};

/// Token that replaces a whole unit under [`FailurePolicy::Redact`]
pub const REDACTED_TOKEN: &str = "<REDACTED>";

/// What to do with a unit of text whose masking failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Forward the unit unmasked (availability first)
    #[default]
    PassThrough,

    /// Replace the whole unit with [`REDACTED_TOKEN`] (fail closed)
    Redact,
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pass_through" | "passthrough" => Ok(FailurePolicy::PassThrough),
            "redact" => Ok(FailurePolicy::Redact),
            other => Err(format!("unknown failure policy '{}'", other)),
        }
    }
}

/// Masking behaviour beyond detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MaskingConfig {
    /// Handling of units whose masking failed
    pub failure_policy: FailurePolicy,

    /// Token style for entities found in table cells
    pub table_style: PseudonymStyle,
}

/// Why a unit could not be masked
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SoftFailure {
    #[error("detection failed: {0}")]
    Detection(String),

    #[error("masking failed: {0}")]
    Masking(#[from] MaskError),

    #[error("column worker panicked")]
    WorkerPanicked,
}

impl From<DetectorError> for SoftFailure {
    fn from(err: DetectorError) -> Self {
        SoftFailure::Detection(err.to_string())
    }
}

/// Masked form of one unit of text
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedUnit {
    text: String,
    detail: Option<MaskedText>,
    failure: Option<SoftFailure>,
}

impl MaskedUnit {
    fn masked(detail: MaskedText) -> Self {
        Self {
            text: detail.text().to_string(),
            detail: Some(detail),
            failure: None,
        }
    }

    fn failed(original: &str, failure: SoftFailure, policy: FailurePolicy) -> Self {
        let text = match policy {
            FailurePolicy::PassThrough => original.to_string(),
            FailurePolicy::Redact => REDACTED_TOKEN.to_string(),
        };
        Self {
            text,
            detail: None,
            failure: Some(failure),
        }
    }

    /// Text to forward downstream
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// Replacement detail, present when masking succeeded
    pub fn detail(&self) -> Option<&MaskedText> {
        self.detail.as_ref()
    }

    pub fn failure(&self) -> Option<&SoftFailure> {
        self.failure.as_ref()
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Counters for one masking pass
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaskingStats {
    /// Units of text run through detection
    pub units: usize,

    /// Units with at least one replacement
    pub masked_units: usize,

    /// Replacements per category
    pub replacements: BTreeMap<EntityCategory, usize>,

    /// Units that hit a soft failure
    pub soft_failures: usize,

    /// Text cells mapped through a column cache
    pub cells: usize,
}

impl MaskingStats {
    fn record(&mut self, unit: &MaskedUnit) {
        self.units += 1;
        if unit.is_failure() {
            self.soft_failures += 1;
        }
        if let Some(detail) = unit.detail() {
            if !detail.is_unchanged() {
                self.masked_units += 1;
            }
            for (category, count) in detail.counts_by_category() {
                *self.replacements.entry(category).or_insert(0) += count;
            }
        }
    }

    /// Fold another pass's counters into this one
    pub fn merge(&mut self, other: &MaskingStats) {
        self.units += other.units;
        self.masked_units += other.masked_units;
        self.soft_failures += other.soft_failures;
        self.cells += other.cells;
        for (category, count) in &other.replacements {
            *self.replacements.entry(*category).or_insert(0) += count;
        }
    }

    pub fn total_replacements(&self) -> usize {
        self.replacements.values().sum()
    }
}

/// A masked table with the counters gathered while producing it
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedTable {
    table: Table,
    stats: MaskingStats,
}

impl MaskedTable {
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn stats(&self) -> &MaskingStats {
        &self.stats
    }

    pub fn into_table(self) -> Table {
        self.table
    }
}

/// Line-oriented text masked one line at a time
#[derive(Debug, Clone, PartialEq)]
pub struct MaskedLines {
    units: Vec<MaskedUnit>,
    terminators: Vec<&'static str>,
    stats: MaskingStats,
}

impl MaskedLines {
    /// One unit per input line, in order
    pub fn units(&self) -> &[MaskedUnit] {
        &self.units
    }

    pub fn stats(&self) -> &MaskingStats {
        &self.stats
    }

    /// Masked lines, each followed by the line ending it had in the input
    pub fn text(&self) -> String {
        self.units
            .iter()
            .zip(&self.terminators)
            .fold(String::new(), |mut out, (unit, terminator)| {
                out.push_str(unit.text());
                out.push_str(terminator);
                out
            })
    }
}

/// PII masking engine: detector set, conflict resolver and masking transformer
pub struct MaskingEngine {
    detectors: SpanDetectorSet,
    config: MaskingConfig,
}

impl Default for MaskingEngine {
    fn default() -> Self {
        Self::new(&DetectorConfig::default(), MaskingConfig::default())
    }
}

impl MaskingEngine {
    /// Create an engine with the built-in detectors
    pub fn new(detector_config: &DetectorConfig, config: MaskingConfig) -> Self {
        Self::with_detectors(SpanDetectorSet::new(detector_config), config)
    }

    /// Create an engine around an existing detector set
    pub fn with_detectors(detectors: SpanDetectorSet, config: MaskingConfig) -> Self {
        info!(
            categories = ?detectors.categories(),
            failure_policy = ?config.failure_policy,
            table_style = ?config.table_style,
            "Masking engine initialized"
        );
        Self { detectors, config }
    }

    pub fn config(&self) -> &MaskingConfig {
        &self.config
    }

    pub fn detectors(&self) -> &SpanDetectorSet {
        &self.detectors
    }

    /// Candidate spans from every detector
    pub fn detect(&self, text: &str) -> Result<Vec<DetectedSpan>, DetectorError> {
        self.detectors.detect_all(text)
    }

    /// Final non-overlapping spans for `text`
    pub fn resolve(&self, text: &str) -> Result<ResolvedSpanSet, DetectorError> {
        let candidates = self.detectors.detect_all(text)?;
        Ok(resolve_within(text.len(), candidates))
    }

    /// Mask a free-text unit with category placeholders
    pub fn mask_text(&self, text: &str) -> MaskedUnit {
        let result = self
            .resolve(text)
            .map_err(SoftFailure::from)
            .and_then(|spans| mask_text(text, &spans).map_err(SoftFailure::from));

        self.finish_unit(text, result, None)
    }

    /// Mask a log or other line-oriented text, treating each line as its own
    /// unit so one failing line never affects the others. `\n` and `\r\n`
    /// endings are kept as they were, including a final one.
    pub fn mask_lines(&self, text: &str) -> MaskedLines {
        let mut stats = MaskingStats::default();
        let mut units = Vec::new();
        let mut terminators = Vec::new();
        for raw in text.split_inclusive('\n') {
            let (line, terminator) = split_line_ending(raw);
            let unit = self.mask_text(line);
            stats.record(&unit);
            units.push(unit);
            terminators.push(terminator);
        }

        info!(
            lines = units.len(),
            replacements = stats.total_replacements(),
            soft_failures = stats.soft_failures,
            "Text masked"
        );

        MaskedLines {
            units,
            terminators,
            stats,
        }
    }

    /// Mask a free-text unit, choosing tokens from a column cache
    fn mask_cell(&self, text: &str, cache: &mut ColumnMaskCache) -> MaskedUnit {
        let result = self.resolve(text).map_err(SoftFailure::from).and_then(|spans| {
            mask_text_with(text, &spans, |span, covered| cache.token_for(span.category, covered))
                .map_err(SoftFailure::from)
        });

        let column = cache.column().to_string();
        self.finish_unit(text, result, Some(&column))
    }

    fn finish_unit(
        &self,
        text: &str,
        result: Result<MaskedText, SoftFailure>,
        column: Option<&str>,
    ) -> MaskedUnit {
        match result {
            Ok(masked) => {
                debug!(
                    column = column.unwrap_or("-"),
                    replacements = masked.replacements().len(),
                    "Unit masked"
                );
                MaskedUnit::masked(masked)
            }
            Err(failure) => {
                // Never log the unit itself, only its size
                warn!(
                    column = column.unwrap_or("-"),
                    unit_bytes = text.len(),
                    policy = ?self.config.failure_policy,
                    error = %failure,
                    "PII masking failed for unit; applying failure policy"
                );
                MaskedUnit::failed(text, failure, self.config.failure_policy)
            }
        }
    }

    /// Mask a table with caches in the configured token style
    pub fn mask_table_default(&self, table: &Table) -> trailguard_core::Result<MaskedTable> {
        let style = self.config.table_style.clone();
        self.mask_table(table, |column| ColumnMaskCache::new(column, &style))
    }

    /// Mask every textual column of `table`.
    ///
    /// Each distinct raw value in a column is masked once; every cell is then
    /// mapped through that column's cache, so equal values in a column always
    /// mask identically. `cache_factory` is called once per textual column.
    /// Non-text cells pass through untouched. Columns are masked in parallel;
    /// output column order matches the input.
    pub fn mask_table<F>(
        &self,
        table: &Table,
        cache_factory: F,
    ) -> trailguard_core::Result<MaskedTable>
    where
        F: Fn(&str) -> ColumnMaskCache,
    {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        let jobs: Vec<(&Column, Option<ColumnMaskCache>)> = table
            .columns()
            .iter()
            .map(|column| {
                let cache = column.is_textual().then(|| cache_factory(&column.name));
                (column, cache)
            })
            .collect();

        let mut columns = Vec::with_capacity(jobs.len());
        let mut stats = MaskingStats::default();

        let mut jobs = jobs.into_iter().peekable();
        while jobs.peek().is_some() {
            let batch: Vec<_> = jobs.by_ref().take(workers).collect();

            let results: Vec<(Column, MaskingStats)> = std::thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .into_iter()
                    .map(|(column, cache)| {
                        let handle = cache
                            .map(|cache| scope.spawn(move || self.mask_column(column, cache)));
                        (column, handle)
                    })
                    .collect();

                handles
                    .into_iter()
                    .map(|(column, handle)| match handle {
                        None => (column.clone(), MaskingStats::default()),
                        Some(handle) => handle
                            .join()
                            .unwrap_or_else(|_| self.fail_column(column)),
                    })
                    .collect()
            });

            for (column, column_stats) in results {
                stats.merge(&column_stats);
                columns.push(column);
            }
        }

        info!(
            columns = table.column_count(),
            rows = table.row_count(),
            replacements = stats.total_replacements(),
            soft_failures = stats.soft_failures,
            "Table masked"
        );

        Ok(MaskedTable {
            table: Table::new(columns)?,
            stats,
        })
    }

    fn mask_column(&self, column: &Column, mut cache: ColumnMaskCache) -> (Column, MaskingStats) {
        info!(column = %column.name, rows = column.len(), "Anonymizing column");

        let mut stats = MaskingStats::default();

        // Distinct values in first-appearance order keep token numbering stable
        let mut seen: HashSet<&str> = HashSet::new();
        let distinct: Vec<&str> = column
            .cells
            .iter()
            .filter_map(Cell::as_text)
            .filter(|value| seen.insert(*value))
            .collect();

        for raw in &distinct {
            let unit = self.mask_cell(raw, &mut cache);
            stats.record(&unit);
            cache.insert(*raw, unit.into_text());
        }

        debug!(
            column = %column.name,
            distinct_values = distinct.len(),
            "Column cache populated"
        );

        let cells = column
            .cells
            .iter()
            .map(|cell| match cell {
                Cell::Text(raw) => {
                    stats.cells += 1;
                    Cell::Text(cache.get(raw).map(str::to_string).unwrap_or_else(|| raw.clone()))
                }
                other => other.clone(),
            })
            .collect();

        (Column::new(column.name.clone(), cells), stats)
    }

    /// Fallback output for a column whose worker panicked
    fn fail_column(&self, column: &Column) -> (Column, MaskingStats) {
        warn!(
            column = %column.name,
            policy = ?self.config.failure_policy,
            error = %SoftFailure::WorkerPanicked,
            "PII masking failed for column; applying failure policy"
        );

        let mut stats = MaskingStats::default();
        let cells = column
            .cells
            .iter()
            .map(|cell| match cell {
                Cell::Text(raw) => {
                    stats.units += 1;
                    stats.soft_failures += 1;
                    stats.cells += 1;
                    match self.config.failure_policy {
                        FailurePolicy::PassThrough => Cell::Text(raw.clone()),
                        FailurePolicy::Redact => Cell::Text(REDACTED_TOKEN.to_string()),
                    }
                }
                other => other.clone(),
            })
            .collect();

        (Column::new(column.name.clone(), cells), stats)
    }
}

/// Split a line from its `\r\n` or `\n` ending
fn split_line_ending(raw: &str) -> (&str, &'static str) {
    if let Some(line) = raw.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = raw.strip_suffix('\n') {
        (line, "\n")
    } else {
        (raw, "")
    }
}

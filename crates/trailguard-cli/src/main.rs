//! TrailGuard CLI
//!
//! Masks audit trail exports and sends the masked content for a data
//! integrity review.

mod config;
mod generate;
mod input;
mod logging;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use config::TrailGuardConfig;
use generate::{AuditLogGenerator, LogKind};
use input::InputDocument;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use trailguard_core::Table;
use trailguard_egress::{CancellationToken, GeminiBackend, ResilientAnalysisClient};
use trailguard_pii::{MaskedLines, MaskedTable, MaskingEngine};
use trailguard_report::{AuditTemplate, MaskedContent, build_request, parse_report};

#[derive(Parser)]
#[command(name = "trailguard")]
#[command(about = "TrailGuard - PII masking and data integrity review for audit trails", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file (YAML or TOML)
    #[arg(short, long, global = true, env = "TRAILGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Mask PII in an audit trail file (.json table, .txt or .log text)
    Mask {
        /// Input file
        input: PathBuf,

        /// Show original and masked values together
        #[arg(long, default_value = "false")]
        side_by_side: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Write output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Mask an audit trail file and request a data integrity review
    Analyze {
        /// Input file
        input: PathBuf,

        /// Ask a specific question instead of requesting a full summary
        #[arg(short, long)]
        question: Option<String>,

        /// Model override
        #[arg(long, env = "TRAILGUARD_MODEL")]
        model: Option<String>,

        /// Print the outbound request instead of sending it
        #[arg(long, default_value = "false")]
        dry_run: bool,

        /// Print the parsed report as JSON
        #[arg(long, default_value = "false")]
        report_json: bool,
    },
    /// List models that support content generation
    Models,
    /// Generate a synthetic GMP audit trail for testing
    Generate {
        /// Number of events
        #[arg(long, default_value = "250")]
        rows: usize,

        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Table (JSON) or plain text lines
        #[arg(long, value_enum, default_value = "table")]
        kind: LogKind,

        /// Write output to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Input after masking
enum MaskedDocument {
    Text(MaskedLines),
    Table(MaskedTable),
}

impl MaskedDocument {
    fn context(&self, config: &TrailGuardConfig) -> MaskedContent {
        match self {
            MaskedDocument::Text(lines) => MaskedContent::from_lines(lines, &config.analysis.context),
            MaskedDocument::Table(table) => MaskedContent::from_table(table, &config.analysis.context),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = TrailGuardConfig::load(cli.config.as_deref())?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    logging::init(&config.logging)?;

    match cli.command {
        Commands::Mask {
            input,
            side_by_side,
            format,
            output,
        } => {
            let document = input::load(&input)?;
            let masked = mask_document(&config, &document)?;
            let rendered = render_masked(&document, &masked, side_by_side, format)?;
            write_output(output.as_deref(), &rendered)?;
        }
        Commands::Analyze {
            input,
            question,
            model,
            dry_run,
            report_json,
        } => {
            if let Some(model) = model {
                config.analysis.model = model;
            }
            analyze(&config, &input, question.as_deref(), dry_run, report_json).await?;
        }
        Commands::Models => {
            let backend = GeminiBackend::new(config.gemini_config()?)?;
            let models = backend
                .list_models()
                .await
                .context("Failed to list models")?;
            for model in models {
                println!("{}\t{}", model.name, model.display_name);
            }
        }
        Commands::Generate {
            rows,
            seed,
            kind,
            output,
        } => {
            let mut generator = AuditLogGenerator::new(seed);
            let rendered = match kind {
                LogKind::Table => {
                    let table = generator.table(rows)?;
                    serde_json::to_string_pretty(&table.to_records())?
                }
                LogKind::Text => generator.text(rows),
            };
            write_output(output.as_deref(), &rendered)?;
            info!(rows, seed, kind = ?kind, "Generated synthetic audit trail");
        }
    }

    Ok(())
}

fn mask_document(
    config: &TrailGuardConfig,
    document: &InputDocument,
) -> anyhow::Result<MaskedDocument> {
    let engine = MaskingEngine::new(&config.detection, config.masking.clone());
    info!(
        input_kind = document.kind(),
        failure_policy = ?config.masking.failure_policy,
        "Masking input"
    );
    let masked = match document {
        InputDocument::Text(text) => MaskedDocument::Text(engine.mask_lines(text)),
        InputDocument::Table(table) => MaskedDocument::Table(
            engine
                .mask_table_default(table)
                .context("Failed to mask table")?,
        ),
    };
    Ok(masked)
}

async fn analyze(
    config: &TrailGuardConfig,
    input: &Path,
    question: Option<&str>,
    dry_run: bool,
    report_json: bool,
) -> anyhow::Result<()> {
    let document = input::load(input)?;
    let masked = mask_document(config, &document)?;
    let content = masked.context(config);
    if content.is_empty() {
        bail!("{} contains no content to analyze", input.display());
    }
    if content.is_truncated() {
        warn!(
            max_rows = config.analysis.context.max_rows,
            max_chars = config.analysis.context.max_chars,
            "Context truncated to configured limits"
        );
    }

    let request = build_request(&content, &AuditTemplate::current(), question);

    if dry_run {
        println!("{}", serde_json::to_string_pretty(&request)?);
        return Ok(());
    }

    let client =
        ResilientAnalysisClient::gemini(config.gemini_config()?, config.analysis.retry.clone())?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current attempt...");
            ctrl_c.cancel();
        }
    });

    let outcome = client.analyze_with_cancel(request, &cancel).await?;
    info!(
        attempts = outcome.attempt_count(),
        waited_secs = outcome.total_wait().as_secs(),
        "Analysis complete"
    );

    if report_json {
        let report = parse_report(&outcome.text)?;
        println!("{}", report.to_json()?);
    } else {
        println!("{}", outcome.text);
    }

    Ok(())
}

fn render_masked(
    document: &InputDocument,
    masked: &MaskedDocument,
    side_by_side: bool,
    format: OutputFormat,
) -> anyhow::Result<String> {
    let rendered = match (document, masked, format) {
        (InputDocument::Text(original), MaskedDocument::Text(lines), OutputFormat::Text) => {
            if side_by_side {
                text_side_by_side(original, lines)
            } else {
                lines.text()
            }
        }
        (InputDocument::Table(original), MaskedDocument::Table(table), OutputFormat::Text) => {
            if side_by_side {
                table_side_by_side(original, table.table())
            } else {
                serde_json::to_string_pretty(&table.table().to_records())?
            }
        }
        (InputDocument::Text(original), MaskedDocument::Text(lines), OutputFormat::Json) => {
            let mut value = serde_json::json!({
                "kind": "text",
                "masked": lines.text(),
                "stats": lines.stats(),
            });
            if side_by_side {
                value["original"] = serde_json::Value::String(original.clone());
            }
            serde_json::to_string_pretty(&value)?
        }
        (InputDocument::Table(original), MaskedDocument::Table(table), OutputFormat::Json) => {
            let mut value = serde_json::json!({
                "kind": "table",
                "masked": table.table().to_records(),
                "stats": table.stats(),
            });
            if side_by_side {
                value["original"] = original.to_records();
            }
            serde_json::to_string_pretty(&value)?
        }
        _ => bail!("masked output does not match input kind"),
    };
    Ok(rendered)
}

/// Original and masked form of each changed line
fn text_side_by_side(original: &str, masked: &MaskedLines) -> String {
    let mut out = String::new();
    for (index, (line, unit)) in original.lines().zip(masked.units()).enumerate() {
        if line == unit.text() {
            continue;
        }
        out.push_str(&format!("{:>5} - {}\n", index + 1, line));
        out.push_str(&format!("{:>5} + {}\n", index + 1, unit.text()));
    }
    out
}

/// Original and masked value of each changed cell
fn table_side_by_side(original: &Table, masked: &Table) -> String {
    let mut out = String::new();
    for (before, after) in original.columns().iter().zip(masked.columns()) {
        for (row, (a, b)) in before.cells.iter().zip(&after.cells).enumerate() {
            if a != b {
                out.push_str(&format!("row {:>4} {}: {} -> {}\n", row + 1, before.name, a, b));
            }
        }
    }
    out
}

fn write_output(path: Option<&Path>, rendered: &str) -> anyhow::Result<()> {
    match path {
        Some(path) => {
            let path = input::expand_path(path);
            std::fs::write(&path, rendered)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Output written");
        }
        None if rendered.ends_with('\n') => print!("{}", rendered),
        None => println!("{}", rendered),
    }
    Ok(())
}

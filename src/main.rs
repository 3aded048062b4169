use std::path::PathBuf;

use chrono::Local;
use clap::{Parser, Subcommand, ValueEnum};
use roster_tools::config;
use roster_tools::dates::{CanonicalInstant, parse_to_instant};
use roster_tools::sync::{self, ImportKind, ImportOptions};
use roster_tools::tags::{FollowUpTracker, inspect_dnc};
use roster_tools::{Result, ToolError};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_tracing(cli.verbose).and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Import(args) => execute_import(args),
        Command::Annotate(args) => execute_annotate(args),
        Command::Report(args) => execute_report(args),
        Command::Tags(args) => execute_tags(args),
    }
}

fn execute_import(args: ImportArgs) -> Result<()> {
    if !args.source.exists() {
        return Err(ToolError::MissingInput(args.source));
    }
    let config = config::load_or_default(args.common.config.as_deref())?;
    let now = resolve_now(args.common.now.as_deref())?;

    let options = ImportOptions {
        kind: args.kind.into(),
        source_sheet: args.sheet.as_deref(),
        annotate: args.annotate,
        dry_run: args.dry_run,
    };
    let summary = sync::import_source(&args.common.master, &args.source, &options, &config, now)?;

    let merge = &summary.merge;
    let output = json!({
        "new": merge.new_identities,
        "existing": merge.existing_identities,
        "report": merge.report,
        "restricted": summary.annotations.as_ref().map(|outcome| outcome.dnc.len()),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn execute_annotate(args: AnnotateArgs) -> Result<()> {
    if !args.common.master.exists() {
        return Err(ToolError::MissingInput(args.common.master));
    }
    let config = config::load_or_default(args.common.config.as_deref())?;
    let now = resolve_now(args.common.now.as_deref())?;

    let outcome = sync::annotate_master(&args.common.master, &config, now, args.dry_run)?;
    let output = json!({
        "dnc": outcome.dnc,
        "follow_ups": outcome.follow_ups,
        "warnings": outcome.warnings,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn execute_report(args: ReportArgs) -> Result<()> {
    if !args.common.master.exists() {
        return Err(ToolError::MissingInput(args.common.master));
    }
    let mut config = config::load_or_default(args.common.config.as_deref())?;
    if let Some(days) = args.min_days_out {
        config.report.recency_threshold_days = days;
    }

    let tables = sync::write_reports(&args.common.master, &args.output, &config)?;
    for table in &tables {
        println!("{}: {} rows", table.sheet_name, table.rows.len());
    }
    Ok(())
}

fn execute_tags(args: TagsArgs) -> Result<()> {
    let config = config::load_or_default(args.config.as_deref())?;
    let now = resolve_now(args.now.as_deref())?;

    // Each --text is one successive edit of the same note.
    let mut tracker = FollowUpTracker::new(config.follow_up_debounce);
    for text in &args.text {
        tracker.observe(text, now);
    }
    let latest = args.text.last().map(String::as_str).unwrap_or_default();
    let classification = inspect_dnc(latest);
    let follow_ups = tracker.current();

    let output = json!({
        "dnc": classification.scope,
        "dnc_tokens": classification.tokens,
        "follow_ups": follow_ups,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// `--now` when given, otherwise the local wall clock.
fn resolve_now(value: Option<&str>) -> Result<CanonicalInstant> {
    match value {
        Some(text) => parse_to_instant(&text.into())
            .ok_or_else(|| ToolError::InvalidDate(text.to_string())),
        None => Ok(CanonicalInstant::new(Local::now().naive_local())),
    }
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|error| ToolError::Logging(error.to_string()))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| ToolError::Logging(error.to_string()))
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Reconcile LMS, attendance and SIS exports into one Master List."
)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Merge an export into the Master List.
    Import(ImportArgs),
    /// Re-derive DNC and follow-up columns from the notes.
    Annotate(AnnotateArgs),
    /// Write the days-out and failing reports.
    Report(ReportArgs),
    /// Print the signals found in a piece of note text.
    Tags(TagsArgs),
}

#[derive(clap::Args)]
struct CommonArgs {
    /// Master List workbook.
    #[arg(long)]
    master: PathBuf,

    /// JSON configuration overriding the shipped schema and thresholds.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Date used as "today", e.g. 2025-10-01. Defaults to the local date.
    #[arg(long)]
    now: Option<String>,
}

#[derive(clap::Args)]
struct ImportArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Export to merge.
    #[arg(long)]
    source: PathBuf,

    /// Sheet of the export to read. Defaults to the first sheet.
    #[arg(long)]
    sheet: Option<String>,

    /// Kind of refresh to perform.
    #[arg(long, value_enum, default_value_t = ImportKindArg::Roster)]
    kind: ImportKindArg,

    /// Also refresh DNC and follow-up columns before writing.
    #[arg(long)]
    annotate: bool,

    /// Compute the merge and print the summary without writing.
    #[arg(long)]
    dry_run: bool,
}

#[derive(clap::Args)]
struct AnnotateArgs {
    #[command(flatten)]
    common: CommonArgs,

    #[arg(long)]
    dry_run: bool,
}

#[derive(clap::Args)]
struct ReportArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Report workbook to write.
    #[arg(long)]
    output: PathBuf,

    /// Minimum days out for the recency report.
    #[arg(long)]
    min_days_out: Option<f64>,
}

#[derive(clap::Args)]
struct TagsArgs {
    /// Note text to inspect. Repeat to replay successive edits.
    #[arg(long, required = true)]
    text: Vec<String>,

    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    now: Option<String>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ImportKindArg {
    Roster,
    Grades,
}

impl std::fmt::Display for ImportKindArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportKindArg::Roster => write!(f, "roster"),
            ImportKindArg::Grades => write!(f, "grades"),
        }
    }
}

impl From<ImportKindArg> for ImportKind {
    fn from(kind: ImportKindArg) -> Self {
        match kind {
            ImportKindArg::Roster => ImportKind::Roster,
            ImportKindArg::Grades => ImportKind::Grades,
        }
    }
}

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::config::ToolConfig;
use crate::dates::CanonicalInstant;
use crate::error::{Result, ToolError};
use crate::io::{excel_read, excel_write};
use crate::merge::{MergeMode, MergeOutcome, upsert_roster};
use crate::model::{RosterGrid, SheetGrid, SheetTable};
use crate::report::{select_by_recency, select_failing};
use crate::tags::{AnnotationOutcome, annotate_roster};

/// Sheet names used by [`write_reports`].
pub const RECENCY_SHEET: &str = "Days Out";
pub const FAILING_SHEET: &str = "Failing";

/// Which kind of refresh an import performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportKind {
    /// Rebuild the roster from a full export.
    Roster,
    /// Overwrite only gradebook fields of matching rows.
    Grades,
}

/// Options for [`import_source`].
#[derive(Debug, Clone)]
pub struct ImportOptions<'a> {
    pub kind: ImportKind,
    pub source_sheet: Option<&'a str>,
    /// Run the annotation pass on the merged roster before committing.
    pub annotate: bool,
    /// Compute the merge without writing the roster.
    pub dry_run: bool,
}

/// Summary of an import, suitable for printing.
#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub merge: MergeOutcome,
    pub annotations: Option<AnnotationOutcome>,
}

/// Merges an export into the Master List at `master` and commits the result
/// in a single write. A missing master file is treated as an empty roster.
/// Sheets of the master other than the roster are written back unchanged.
///
/// Merge and annotation both run in memory first, so a failure in either
/// leaves the stored roster untouched.
#[instrument(
    level = "info",
    skip_all,
    fields(master = %master.display(), source = %source.display(), kind = ?options.kind)
)]
pub fn import_source(
    master: &Path,
    source: &Path,
    options: &ImportOptions<'_>,
    config: &ToolConfig,
    now: CanonicalInstant,
) -> Result<ImportSummary> {
    let (existing, sheets) = load_master(master, config)?;
    let incoming = excel_read::read_source_table(source, options.source_sheet)?;
    info!(rows = incoming.rows.len(), columns = incoming.headers.len(), "read source export");

    let mode = match options.kind {
        ImportKind::Roster => MergeMode::FullReplace,
        ImportKind::Grades => MergeMode::PartialUpdate(config.grades.clone()),
    };
    let merge = upsert_roster(&existing, &incoming, &config.schema, &mode, now)?;
    for warning in &merge.report.warnings {
        warn!(%warning, "import warning");
    }

    let annotations = if options.annotate {
        Some(annotate_roster(
            &merge.roster,
            &config.schema,
            &config.annotations,
            now,
        )?)
    } else {
        None
    };

    let committed = annotations
        .as_ref()
        .map(|outcome| &outcome.roster)
        .unwrap_or(&merge.roster);

    if options.dry_run {
        debug!("dry run; roster not written");
    } else {
        excel_write::write_master(master, &config.roster_sheet, committed, &sheets)?;
        info!(rows = committed.rows.len(), "roster committed");
    }

    Ok(ImportSummary { merge, annotations })
}

/// Re-derives DNC scope and follow-up dates for every record of the Master
/// List and commits the annotated roster.
#[instrument(level = "info", skip_all, fields(master = %master.display()))]
pub fn annotate_master(
    master: &Path,
    config: &ToolConfig,
    now: CanonicalInstant,
    dry_run: bool,
) -> Result<AnnotationOutcome> {
    if !master.exists() {
        return Err(ToolError::MissingInput(master.to_path_buf()));
    }
    let (roster, sheets) = load_master(master, config)?;
    let outcome = annotate_roster(&roster, &config.schema, &config.annotations, now)?;
    for warning in &outcome.warnings {
        warn!(%warning, "annotation warning");
    }
    if !dry_run {
        excel_write::write_master(master, &config.roster_sheet, &outcome.roster, &sheets)?;
    }
    info!(
        restricted = outcome.dnc.len(),
        follow_ups = outcome.follow_ups.len(),
        "roster annotated"
    );
    Ok(outcome)
}

/// Writes the recency and failing reports for the Master List into one
/// workbook. Returns the tables that were written.
#[instrument(
    level = "info",
    skip_all,
    fields(master = %master.display(), output = %output.display())
)]
pub fn write_reports(master: &Path, output: &Path, config: &ToolConfig) -> Result<Vec<SheetTable>> {
    let roster = excel_read::read_roster(master, &config.roster_sheet)?;
    let tables = build_reports(&roster, config)?;
    excel_write::write_report(output, &tables)?;
    Ok(tables)
}

/// Builds the report tables without touching the filesystem.
pub fn build_reports(roster: &RosterGrid, config: &ToolConfig) -> Result<Vec<SheetTable>> {
    let report = &config.report;
    let recency = select_by_recency(
        roster,
        &config.schema,
        &report.recency_field,
        report.recency_threshold_days,
    )?;
    let failing = select_failing(
        roster,
        &config.schema,
        &report.grade_field,
        &report.recency_field,
        report,
    )?;
    info!(recency = recency.len(), failing = failing.len(), "report rows selected");

    Ok(vec![
        roster.project(RECENCY_SHEET, &recency),
        roster.project(FAILING_SHEET, &failing),
    ])
}

/// Loads the roster sheet and the full sheet list of the master so a commit
/// can carry the other sheets over.
fn load_master(master: &Path, config: &ToolConfig) -> Result<(RosterGrid, Vec<SheetGrid>)> {
    if master.exists() {
        let roster = excel_read::read_roster(master, &config.roster_sheet)?;
        let sheets = excel_read::read_sheets(master)?;
        debug!(rows = roster.rows.len(), sheets = sheets.len(), "loaded master list");
        Ok((roster, sheets))
    } else {
        info!("master list not found; starting from an empty roster");
        Ok((RosterGrid::default(), Vec::new()))
    }
}

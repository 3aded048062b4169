//! Upserts incoming export rows into the Master List.
//!
//! [`upsert_roster`] is a pure function over a roster snapshot: every
//! configuration check runs before any row is built, and the caller commits
//! the returned grid in one write. A failed merge therefore never leaves a
//! partially updated roster behind.

pub mod hyperlink;

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::dates::{CanonicalInstant, elapsed_days, parse_to_instant};
use crate::error::{HeaderSide, Result, ToolError};
use crate::identity::{format_display, normalize_identity};
use crate::model::{
    Cell, CellValue, FieldName, IdentityKey, RosterGrid, RosterRecord, RosterRow, SourceTable,
};
use crate::schema::defaults::fields;
use crate::schema::{ColumnMapping, Derivation, FieldKind, FieldSpec, RosterSchema};
use crate::warning::ImportWarning;

use hyperlink::{link_cell, parse_hyperlink_formula};

/// Settings for a targeted refresh such as a gradebook import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialUpdateConfig {
    /// The only fields a partial update may overwrite.
    pub target_fields: Vec<FieldName>,
    /// Incoming field inspected for the exclusion substring.
    pub category_field: Option<FieldName>,
    /// Rows whose category contains this text (case-insensitive) are skipped.
    pub exclude_category: Option<String>,
}

impl Default for PartialUpdateConfig {
    fn default() -> Self {
        Self {
            target_fields: vec![
                fields::GRADE.to_string(),
                fields::MISSING_ASSIGNMENTS.to_string(),
                fields::ZERO_ASSIGNMENTS.to_string(),
                fields::GRADEBOOK.to_string(),
            ],
            category_field: Some(fields::COURSE_NAME.to_string()),
            exclude_category: None,
        }
    }
}

/// How incoming rows are applied to the roster.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeMode {
    /// Clear the roster and rebuild it from the incoming rows, restoring
    /// static fields the source leaves blank.
    FullReplace,
    /// Keep every roster row and overwrite only the configured target fields
    /// of rows whose identity matches.
    PartialUpdate(PartialUpdateConfig),
}

/// Counters and warnings describing what a merge did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergeReport {
    pub warnings: Vec<ImportWarning>,
    /// Incoming rows dropped because their identity cell was blank.
    pub skipped_blank_identity: usize,
    /// Incoming rows dropped by the category exclusion.
    pub excluded_by_category: usize,
    /// Cells blanked because they could not be coerced.
    pub parse_failures: usize,
    /// Static values carried over from the previous roster.
    pub restored_static_values: usize,
    /// Roster rows written or updated.
    pub written_rows: usize,
}

/// Result of [`upsert_roster`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub roster: RosterGrid,
    /// Identities absent from the roster before the merge, in incoming order.
    pub new_identities: Vec<IdentityKey>,
    /// Identities already on the roster, in incoming order.
    pub existing_identities: Vec<IdentityKey>,
    pub report: MergeReport,
}

/// Merges `incoming` into `existing`.
///
/// Rows are matched by [`normalize_identity`] of the schema's identity
/// field. In [`MergeMode::FullReplace`] new identities are written first and
/// existing identities second. In [`MergeMode::PartialUpdate`] unmatched
/// incoming rows are reported as new but never added.
///
/// Fails without producing a roster when the identity field is missing on
/// either side, or when static fields are present but the identifier column
/// needed to carry them over is not.
#[instrument(
    level = "info",
    skip_all,
    fields(existing = existing.rows.len(), incoming = incoming.rows.len())
)]
pub fn upsert_roster(
    existing: &RosterGrid,
    incoming: &SourceTable,
    schema: &RosterSchema,
    mode: &MergeMode,
    now: CanonicalInstant,
) -> Result<MergeOutcome> {
    schema.validate()?;

    let headers = if existing.headers.is_empty() {
        schema.fields.iter().map(|field| field.name.clone()).collect()
    } else {
        existing.headers.clone()
    };

    let roster_identity = schema.require(&headers, &schema.identity_field, HeaderSide::Roster)?;
    let source_identity =
        schema.require(&incoming.headers, &schema.identity_field, HeaderSide::Source)?;

    let roster_columns = schema.map_columns(&headers, HeaderSide::Roster);
    let source_columns = schema
        .map_columns(&incoming.headers, HeaderSide::Source)
        .with_rows_affected(incoming.rows.len());

    let mut report = MergeReport::default();
    report.warnings.extend(roster_columns.warnings.iter().cloned());
    report.warnings.extend(source_columns.warnings.iter().cloned());

    let context = MergeContext {
        schema,
        headers: &headers,
        roster_identity,
        roster_columns: &roster_columns,
        source_columns: &source_columns,
        now,
    };

    let outcome = match mode {
        MergeMode::FullReplace => {
            let static_capture = capture_static_values(&context, existing)?;
            let records = collect_records(&context, incoming, source_identity, None, &mut report);
            full_replace(&context, existing, records, static_capture, report)
        }
        MergeMode::PartialUpdate(config) => {
            let targets = resolve_targets(&context, config)?;
            let exclusion = resolve_exclusion(&context, config)?;
            let records =
                collect_records(&context, incoming, source_identity, exclusion, &mut report);
            partial_update(&context, existing, records, &targets, report)
        }
    };

    for warning in &outcome.report.warnings {
        debug!(%warning, "merge warning");
    }
    info!(
        new = outcome.new_identities.len(),
        existing = outcome.existing_identities.len(),
        written = outcome.report.written_rows,
        warnings = outcome.report.warnings.len(),
        "roster merged"
    );
    Ok(outcome)
}

struct MergeContext<'a> {
    schema: &'a RosterSchema,
    headers: &'a [String],
    roster_identity: usize,
    roster_columns: &'a ColumnMapping,
    source_columns: &'a ColumnMapping,
    now: CanonicalInstant,
}

/// Static values keyed by identifier text, captured before the roster is
/// cleared.
struct StaticCapture {
    identifier: Option<FieldName>,
    values: HashMap<String, BTreeMap<FieldName, Cell>>,
}

struct CategoryExclusion {
    column: usize,
    needle: String,
}

fn capture_static_values(
    context: &MergeContext<'_>,
    existing: &RosterGrid,
) -> Result<StaticCapture> {
    let static_fields: Vec<(&FieldSpec, usize)> = context
        .schema
        .static_fields()
        .filter_map(|field| {
            context
                .roster_columns
                .column(&field.name)
                .map(|column| (field, column))
        })
        .collect();

    if static_fields.is_empty() || existing.rows.is_empty() {
        return Ok(StaticCapture {
            identifier: None,
            values: HashMap::new(),
        });
    }

    let identifier = context
        .schema
        .identifier_field()
        .ok_or_else(|| {
            ToolError::InvalidConfig("static fields require a field flagged as identifier".into())
        })?;
    let missing = || ToolError::MissingIdentifier {
        field: identifier.name.clone(),
    };
    let roster_column = context.roster_columns.column(&identifier.name).ok_or_else(missing)?;
    context
        .source_columns
        .column(&identifier.name)
        .ok_or_else(missing)?;

    let mut values: HashMap<String, BTreeMap<FieldName, Cell>> = HashMap::new();
    for row in &existing.rows {
        let key = identifier_key(row.value(roster_column));
        if key.is_empty() {
            continue;
        }
        let entry = values.entry(key).or_default();
        for (field, column) in &static_fields {
            if let Some(cell) = row.cell(*column).filter(|cell| !cell.is_empty()) {
                entry.entry(field.name.clone()).or_insert_with(|| cell.clone());
            }
        }
    }

    debug!(identifiers = values.len(), "captured static values");
    Ok(StaticCapture {
        identifier: Some(identifier.name.clone()),
        values,
    })
}

fn resolve_targets<'a>(
    context: &MergeContext<'a>,
    config: &PartialUpdateConfig,
) -> Result<Vec<(&'a FieldSpec, usize)>> {
    let mut targets = Vec::with_capacity(config.target_fields.len());
    for name in &config.target_fields {
        let field = context
            .schema
            .field(name)
            .ok_or_else(|| ToolError::UnknownField(name.clone()))?;
        let column = context
            .roster_columns
            .column(name)
            .ok_or_else(|| ToolError::MissingField {
                field: name.clone(),
                side: HeaderSide::Roster,
            })?;
        if field.link.is_none() && context.source_columns.column(name).is_none() {
            return Err(ToolError::MissingField {
                field: name.clone(),
                side: HeaderSide::Source,
            });
        }
        targets.push((field, column));
    }
    Ok(targets)
}

fn resolve_exclusion(
    context: &MergeContext<'_>,
    config: &PartialUpdateConfig,
) -> Result<Option<CategoryExclusion>> {
    let (Some(field), Some(needle)) = (&config.category_field, &config.exclude_category) else {
        return Ok(None);
    };
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return Ok(None);
    }
    if context.schema.field(field).is_none() {
        return Err(ToolError::UnknownField(field.clone()));
    }
    let column = context
        .source_columns
        .column(field)
        .ok_or_else(|| ToolError::MissingField {
            field: field.clone(),
            side: HeaderSide::Source,
        })?;
    Ok(Some(CategoryExclusion { column, needle }))
}

/// Builds one record per distinct identity, in order of first appearance.
fn collect_records(
    context: &MergeContext<'_>,
    incoming: &SourceTable,
    identity_column: usize,
    exclusion: Option<CategoryExclusion>,
    report: &mut MergeReport,
) -> Vec<RosterRecord> {
    let mut records: Vec<RosterRecord> = Vec::new();
    let mut positions: HashMap<IdentityKey, usize> = HashMap::new();
    let mut occurrences: BTreeMap<IdentityKey, usize> = BTreeMap::new();

    for row_index in 0..incoming.rows.len() {
        if let Some(exclusion) = &exclusion {
            let category = incoming.cell(row_index, exclusion.column).to_string();
            if category.to_lowercase().contains(&exclusion.needle) {
                report.excluded_by_category += 1;
                continue;
            }
        }

        let name = incoming.cell(row_index, identity_column).to_string();
        let identity = normalize_identity(&name);
        if identity.is_empty() {
            report.skipped_blank_identity += 1;
            continue;
        }

        let mut record = RosterRecord::new(identity.clone());
        for field in &context.schema.fields {
            let Some(column) = context.source_columns.column(&field.name) else {
                continue;
            };
            let raw = incoming.cell(row_index, column);
            let cell = if field.name == context.schema.identity_field {
                Cell::value(format_display(&name))
            } else {
                match coerce(field, raw) {
                    Some(cell) => cell,
                    None => {
                        warn!(field = %field.name, row = row_index + 1, "unparseable cell");
                        report.parse_failures += 1;
                        report.warnings.push(ImportWarning::UnparseableCell {
                            field: field.name.clone(),
                            row: row_index + 1,
                            value: raw.to_string(),
                        });
                        Cell::default()
                    }
                }
            };
            record.fields.insert(field.name.clone(), cell);
        }

        *occurrences.entry(identity.clone()).or_insert(0) += 1;
        match positions.get(&identity).copied() {
            Some(position) => {
                let target = &mut records[position];
                for (field, cell) in record.fields {
                    let slot = target.fields.entry(field).or_default();
                    if slot.is_empty() {
                        *slot = cell;
                    }
                }
            }
            None => {
                positions.insert(identity, records.len());
                records.push(record);
            }
        }
    }

    for (identity, count) in occurrences.into_iter().filter(|(_, count)| *count > 1) {
        warn!(%identity, count, "duplicate identity in incoming rows");
        report.warnings.push(ImportWarning::DuplicateIdentity {
            identity,
            occurrences: count,
        });
    }

    records
}

fn full_replace(
    context: &MergeContext<'_>,
    existing: &RosterGrid,
    records: Vec<RosterRecord>,
    static_capture: StaticCapture,
    mut report: MergeReport,
) -> MergeOutcome {
    let known = identity_index(existing, context.roster_identity);

    let (fresh, known_records): (Vec<RosterRecord>, Vec<RosterRecord>) = records
        .into_iter()
        .partition(|record| !known.contains_key(&record.identity));

    let new_identities: Vec<IdentityKey> =
        fresh.iter().map(|record| record.identity.clone()).collect();
    let existing_identities: Vec<IdentityKey> = known_records
        .iter()
        .map(|record| record.identity.clone())
        .collect();

    let width = context.headers.len();
    let mut rows = Vec::with_capacity(fresh.len() + known_records.len());

    for record in fresh.iter().chain(known_records.iter()) {
        let mut row = RosterRow::blank(width);

        for (field, column) in &context.roster_columns.columns {
            if let Some(cell) = record.get(field) {
                row.set(*column, cell.clone());
            }
        }

        report.restored_static_values += restore_static(context, &static_capture, record, &mut row);

        for field in &context.schema.fields {
            let Some(column) = context.roster_columns.column(&field.name) else {
                continue;
            };
            if field.link.is_some() {
                if let Some(cell) = render_link(context, field, Some(record), &row) {
                    row.set(column, cell);
                }
            }
        }
        apply_derivations(context, &mut row, None);
        rows.push(row);
    }

    report.written_rows = rows.len();
    MergeOutcome {
        roster: RosterGrid {
            headers: context.headers.to_vec(),
            rows,
        },
        new_identities,
        existing_identities,
        report,
    }
}

fn partial_update(
    context: &MergeContext<'_>,
    existing: &RosterGrid,
    records: Vec<RosterRecord>,
    targets: &[(&FieldSpec, usize)],
    mut report: MergeReport,
) -> MergeOutcome {
    let known = identity_index(existing, context.roster_identity);

    let mut new_identities = Vec::new();
    let mut existing_identities = Vec::new();
    let mut by_identity: HashMap<&str, &RosterRecord> = HashMap::new();
    for record in &records {
        let identity = record.identity.as_str();
        if known.contains_key(identity) {
            existing_identities.push(identity.to_string());
            by_identity.insert(identity, record);
        } else {
            new_identities.push(identity.to_string());
        }
    }

    let target_names: Vec<&str> = targets.iter().map(|(field, _)| field.name.as_str()).collect();
    let mut roster = RosterGrid {
        headers: context.headers.to_vec(),
        rows: existing.rows.clone(),
    };

    for row in &mut roster.rows {
        let identity = normalize_identity(&row.value(context.roster_identity).to_string());
        let Some(&record) = by_identity.get(identity.as_str()) else {
            continue;
        };

        for (field, column) in targets {
            if field.link.is_some() {
                if let Some(cell) = render_link(context, field, Some(record), row) {
                    row.set(*column, cell);
                }
                continue;
            }
            let cell = record.get(&field.name).cloned().unwrap_or_default();
            row.set(*column, cell);
        }
        apply_derivations(context, row, Some(target_names.as_slice()));
        report.written_rows += 1;
    }

    MergeOutcome {
        roster,
        new_identities,
        existing_identities,
        report,
    }
}

/// Identity key → first roster row holding it.
fn identity_index(roster: &RosterGrid, identity_column: usize) -> HashMap<IdentityKey, usize> {
    let mut index = HashMap::new();
    for (position, row) in roster.rows.iter().enumerate() {
        let identity = normalize_identity(&row.value(identity_column).to_string());
        if !identity.is_empty() {
            index.entry(identity).or_insert(position);
        }
    }
    index
}

fn restore_static(
    context: &MergeContext<'_>,
    capture: &StaticCapture,
    record: &RosterRecord,
    row: &mut RosterRow,
) -> usize {
    let Some(identifier) = &capture.identifier else {
        return 0;
    };
    let key = record
        .get(identifier)
        .map(|cell| identifier_key(&cell.value))
        .unwrap_or_default();
    let Some(previous) = capture.values.get(&key) else {
        return 0;
    };

    let mut restored = 0;
    for (field, cell) in previous {
        let Some(column) = context.roster_columns.column(field) else {
            continue;
        };
        if record.non_empty(field).is_none() {
            row.set(column, cell.clone());
            restored += 1;
        }
    }
    restored
}

/// Rebuilds a hyperlink cell from its join keys, looking in the incoming
/// record first and the roster row second.
fn render_link(
    context: &MergeContext<'_>,
    field: &FieldSpec,
    record: Option<&RosterRecord>,
    row: &RosterRow,
) -> Option<Cell> {
    let link = field.link.as_ref()?;
    let url = link.render(|key| {
        record
            .and_then(|record| record.non_empty(key))
            .map(|cell| cell.value.to_string())
            .or_else(|| {
                context
                    .roster_columns
                    .column(key)
                    .map(|column| row.value(column).to_string())
            })
    })?;
    let label = link.label.clone().unwrap_or_else(|| url.clone());
    Some(link_cell(&url, &label))
}

/// Recomputes derived fields. When `only_from` is set, a derivation runs
/// only if its input is one of the listed fields.
fn apply_derivations(context: &MergeContext<'_>, row: &mut RosterRow, only_from: Option<&[&str]>) {
    for field in &context.schema.fields {
        let Some(Derivation::ElapsedDays { from }) = &field.derived else {
            continue;
        };
        if only_from.is_some_and(|names| !names.contains(&from.as_str())) {
            continue;
        }
        let Some(column) = context.roster_columns.column(&field.name) else {
            continue;
        };
        if row.cell(column).is_some_and(|cell| cell.formula.is_some()) {
            continue;
        }
        let value = context
            .roster_columns
            .column(from)
            .and_then(|source| parse_to_instant(row.value(source)))
            .map(|since| CellValue::Number(elapsed_days(since, context.now) as f64))
            .unwrap_or_default();
        row.set(column, Cell::value(value));
    }
}

/// Coerces a raw source value into the field's kind. `None` signals a parse
/// failure the caller records and recovers from.
fn coerce(field: &FieldSpec, raw: &CellValue) -> Option<Cell> {
    if raw.is_empty() {
        return Some(Cell::default());
    }

    if field.link.is_some() {
        if let CellValue::Text(text) = raw {
            if let Some(link) = parse_hyperlink_formula(text) {
                let label = link
                    .label
                    .or_else(|| field.link.as_ref().and_then(|spec| spec.label.clone()))
                    .unwrap_or_else(|| link.url.clone());
                return Some(link_cell(&link.url, &label));
            }
        }
    }

    match field.kind {
        FieldKind::Text => Some(Cell::value(raw.clone())),
        FieldKind::Number => match raw {
            CellValue::Boolean(_) | CellValue::DateTime(_) => None,
            other => other.as_number().map(Cell::value),
        },
        FieldKind::Date => parse_to_instant(raw)
            .map(|instant| Cell::value(CellValue::DateTime(instant.naive()))),
    }
}

fn identifier_key(value: &CellValue) -> String {
    value.to_string().trim().to_string()
}

//! Signals extracted from free-text annotations: contact restrictions and
//! follow-up dates.
//!
//! Everything here takes the current instant as an argument; nothing reads a
//! clock.

pub mod dnc;
pub mod follow_up;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

pub use dnc::{DncClassification, DncScope, classify_dnc, classify_dnc_history, inspect_dnc};
pub use follow_up::{
    FollowUpTracker, extract_follow_up_dates, follow_up_dates, note_follow_up_dates,
    stamp_newest_entry, stamp_relative_dates,
};

use crate::dates::{CanonicalInstant, format_short_date};
use crate::error::{HeaderSide, Result};
use crate::identity::normalize_identity;
use crate::model::{Cell, CellValue, FieldName, IdentityKey, RosterGrid, RosterRow};
use crate::schema::RosterSchema;
use crate::schema::defaults::fields;
use crate::warning::ImportWarning;

/// Which roster fields the annotation pass reads and writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Field holding the newline-separated note history, oldest first.
    pub notes_field: FieldName,
    /// Receives the DNC scope label when set.
    pub dnc_field: Option<FieldName>,
    /// Receives the upcoming follow-up dates when set.
    pub follow_up_field: Option<FieldName>,
    /// Rewrite relative phrases on the newest note line as fixed dates.
    pub stamp_relative_dates: bool,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            notes_field: fields::NOTES.to_string(),
            dnc_field: Some(fields::DNC.to_string()),
            follow_up_field: Some(fields::FOLLOW_UP.to_string()),
            stamp_relative_dates: true,
        }
    }
}

/// Result of [`annotate_roster`].
#[derive(Debug, Clone, Default)]
pub struct AnnotationOutcome {
    pub roster: RosterGrid,
    pub dnc: BTreeMap<IdentityKey, DncScope>,
    pub follow_ups: BTreeMap<IdentityKey, Vec<String>>,
    pub warnings: Vec<ImportWarning>,
}

/// Derives DNC scope and follow-up dates from each record's notes and
/// writes them back into the roster.
///
/// Note entries are read newest first (the bottom line of the cell is the
/// most recent). Only follow-ups on or after `now` are written. Cells that
/// hold a formula are never overwritten.
#[instrument(level = "info", skip_all, fields(rows = roster.rows.len()))]
pub fn annotate_roster(
    roster: &RosterGrid,
    schema: &RosterSchema,
    config: &AnnotationConfig,
    now: CanonicalInstant,
) -> Result<AnnotationOutcome> {
    let identity_column = schema.require(&roster.headers, &schema.identity_field, HeaderSide::Roster)?;
    let notes_column = schema.require(&roster.headers, &config.notes_field, HeaderSide::Roster)?;
    let dnc_column = config
        .dnc_field
        .as_deref()
        .map(|field| schema.require(&roster.headers, field, HeaderSide::Roster))
        .transpose()?;
    let follow_up_column = config
        .follow_up_field
        .as_deref()
        .map(|field| schema.require(&roster.headers, field, HeaderSide::Roster))
        .transpose()?;

    let mut outcome = AnnotationOutcome {
        roster: roster.clone(),
        ..AnnotationOutcome::default()
    };
    let today = now.date();

    for row in &mut outcome.roster.rows {
        let identity = normalize_identity(&row.value(identity_column).to_string());
        if identity.is_empty() {
            continue;
        }

        let mut notes = row.value(notes_column).to_string();
        let notes_has_formula = row
            .cell(notes_column)
            .is_some_and(|cell| cell.formula.is_some());
        if config.stamp_relative_dates && !notes_has_formula {
            let stamped = stamp_newest_entry(&notes, now);
            if stamped != notes {
                debug!(%identity, "stamped relative follow-up dates");
                row.set(notes_column, Cell::value(stamped.clone()));
                notes = stamped;
            }
        }

        let classification = classify_dnc_history(
            notes
                .lines()
                .rev()
                .map(str::trim)
                .filter(|line| !line.is_empty()),
        );
        if classification.is_ambiguous() {
            warn!(%identity, tokens = classification.tokens, "multiple DNC tokens in one annotation");
            outcome.warnings.push(ImportWarning::MultipleDncTokens {
                identity: identity.clone(),
                tokens: classification.tokens,
            });
        }

        let upcoming: Vec<String> = note_follow_up_dates(&notes, now)
            .into_iter()
            .filter(|date| *date >= today)
            .map(format_short_date)
            .collect();

        if let Some(column) = dnc_column {
            write_derived(row, column, CellValue::from(classification.scope.label()));
        }
        if let Some(column) = follow_up_column {
            write_derived(row, column, CellValue::from(upcoming.join(", ")));
        }

        if classification.scope.is_restricted() {
            outcome.dnc.insert(identity.clone(), classification.scope);
        }
        if !upcoming.is_empty() {
            outcome.follow_ups.insert(identity, upcoming);
        }
    }

    debug!(
        restricted = outcome.dnc.len(),
        with_follow_up = outcome.follow_ups.len(),
        "annotation pass complete"
    );
    Ok(outcome)
}

fn write_derived(row: &mut RosterRow, column: usize, value: CellValue) {
    if row.cell(column).is_some_and(|cell| cell.formula.is_some()) {
        return;
    }
    let value = if value.is_empty() { CellValue::Empty } else { value };
    row.set(column, Cell::value(value));
}

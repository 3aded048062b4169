//! Prioritised subsets of a merged roster for report rendering.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{HeaderSide, Result};
use crate::model::RosterGrid;
use crate::schema::RosterSchema;
use crate::schema::defaults::fields;

/// Thresholds used by the report selectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Derived elapsed-days field.
    pub recency_field: String,
    pub grade_field: String,
    /// Minimum days out for the recency report.
    pub recency_threshold_days: f64,
    /// Failing cut-off expressed on the 0–100 scale.
    pub failing_percent: f64,
    /// Maximum days out for a failing student to be listed.
    pub failing_max_days_out: f64,
    /// Rows sampled from the top of the grade column to detect its scale.
    pub scale_sample_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            recency_field: fields::DAYS_OUT.to_string(),
            grade_field: fields::GRADE.to_string(),
            recency_threshold_days: 7.0,
            failing_percent: 60.0,
            failing_max_days_out: 4.0,
            scale_sample_rows: 10,
        }
    }
}

/// Scale a grade column is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GradeScale {
    /// 0–1
    Fraction,
    /// 0–100
    Percent,
}

impl GradeScale {
    /// Detects the scale from a sampled prefix: any sampled value above 1
    /// puts the whole column on the 0–100 scale.
    pub fn detect<I>(sample: I) -> Self
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        if sample.into_iter().flatten().any(|value| value > 1.0) {
            GradeScale::Percent
        } else {
            GradeScale::Fraction
        }
    }

    /// Converts a 0–100 cut-off into this scale.
    pub fn threshold(&self, percent: f64) -> f64 {
        match self {
            GradeScale::Fraction => percent / 100.0,
            GradeScale::Percent => percent,
        }
    }
}

/// Rows whose elapsed-days value is at least `threshold_days`, most days out
/// first. Ties keep roster order. Returns row indices into `roster.rows`.
pub fn select_by_recency(
    roster: &RosterGrid,
    schema: &RosterSchema,
    recency_field: &str,
    threshold_days: f64,
) -> Result<Vec<usize>> {
    let column = schema.require(&roster.headers, recency_field, HeaderSide::Roster)?;

    let mut selected: Vec<(usize, f64)> = roster
        .rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| row.value(column).as_number().map(|days| (index, days)))
        .filter(|(_, days)| *days >= threshold_days)
        .collect();
    selected.sort_by(|lhs, rhs| rhs.1.total_cmp(&lhs.1));

    debug!(selected = selected.len(), threshold_days, "recency selection");
    Ok(selected.into_iter().map(|(index, _)| index).collect())
}

/// Rows with a failing grade that were active recently, lowest grade
/// first.
///
/// The grade scale is detected once for the whole column from the first
/// `config.scale_sample_rows` rows, so a column sampled as 0–100 compares
/// every value, including ones at or below 1, against the 0–100 cut-off.
pub fn select_failing(
    roster: &RosterGrid,
    schema: &RosterSchema,
    grade_field: &str,
    recency_field: &str,
    config: &ReportConfig,
) -> Result<Vec<usize>> {
    let grade_column = schema.require(&roster.headers, grade_field, HeaderSide::Roster)?;
    let recency_column = schema.require(&roster.headers, recency_field, HeaderSide::Roster)?;

    let scale = GradeScale::detect(
        roster
            .rows
            .iter()
            .take(config.scale_sample_rows)
            .map(|row| row.value(grade_column).as_number()),
    );
    let cutoff = scale.threshold(config.failing_percent);

    let mut selected: Vec<(usize, f64)> = roster
        .rows
        .iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let grade = row.value(grade_column).as_number()?;
            let days_out = row.value(recency_column).as_number()?;
            (grade < cutoff && days_out <= config.failing_max_days_out).then_some((index, grade))
        })
        .collect();
    selected.sort_by(|lhs, rhs| lhs.1.total_cmp(&rhs.1));

    debug!(selected = selected.len(), ?scale, cutoff, "failing selection");
    Ok(selected.into_iter().map(|(index, _)| index).collect())
}

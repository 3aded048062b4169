use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{Result, ToolError};
use crate::merge::PartialUpdateConfig;
use crate::report::ReportConfig;
use crate::schema::RosterSchema;
use crate::tags::AnnotationConfig;

/// Default worksheet holding the Master List.
pub const DEFAULT_ROSTER_SHEET: &str = "Master List";

/// Everything the tool reads from its JSON configuration file. Any section
/// left out falls back to the shipped defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub roster_sheet: String,
    pub schema: RosterSchema,
    pub grades: PartialUpdateConfig,
    pub report: ReportConfig,
    pub annotations: AnnotationConfig,
    /// Empty evaluations tolerated before a detected follow-up is dropped.
    pub follow_up_debounce: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            roster_sheet: DEFAULT_ROSTER_SHEET.to_string(),
            schema: RosterSchema::default(),
            grades: PartialUpdateConfig::default(),
            report: ReportConfig::default(),
            annotations: AnnotationConfig::default(),
            follow_up_debounce: 2,
        }
    }
}

impl ToolConfig {
    /// Checks that every field the sections refer to is declared in the
    /// schema.
    pub fn validate(&self) -> Result<()> {
        self.schema.validate()?;

        let referenced = self
            .grades
            .target_fields
            .iter()
            .chain(self.grades.category_field.iter())
            .chain([&self.report.grade_field, &self.report.recency_field])
            .chain(std::iter::once(&self.annotations.notes_field))
            .chain(self.annotations.dnc_field.iter())
            .chain(self.annotations.follow_up_field.iter());

        for field in referenced {
            if self.schema.field(field).is_none() {
                return Err(ToolError::UnknownField(field.clone()));
            }
        }

        if self.roster_sheet.trim().is_empty() {
            return Err(ToolError::InvalidConfig("roster_sheet must not be empty".into()));
        }
        Ok(())
    }
}

/// Loads and validates a configuration file.
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn load(path: &Path) -> Result<ToolConfig> {
    if !path.exists() {
        return Err(ToolError::MissingInput(path.to_path_buf()));
    }
    let data = fs::read_to_string(path)?;
    let config: ToolConfig = serde_json::from_str(&data)?;
    config.validate()?;
    debug!(fields = config.schema.fields.len(), "configuration loaded");
    Ok(config)
}

/// Loads `path` when given, otherwise returns the shipped defaults.
pub fn load_or_default(path: Option<&Path>) -> Result<ToolConfig> {
    match path {
        Some(path) => load(path),
        None => Ok(ToolConfig::default()),
    }
}

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Convenient alias for fallible results returned throughout the crate.
pub type Result<T> = std::result::Result<T, ToolError>;

/// Which side of a merge a header row belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HeaderSide {
    /// The persisted Master List.
    Roster,
    /// The incoming export being merged.
    Source,
}

impl std::fmt::Display for HeaderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderSide::Roster => write!(f, "roster"),
            HeaderSide::Source => write!(f, "source"),
        }
    }
}

/// Error type covering the different failure cases that can occur when the
/// tool ingests, reconciles, or emits roster data.
///
/// Per-cell parse failures are not errors. They are recovered locally
/// and reported through [`MergeReport`](crate::merge::MergeReport).
#[derive(Debug, Error)]
pub enum ToolError {
    /// Wrapper for IO failures such as reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Raised when JSON parsing or serialization fails.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Errors bubbled up from the Excel writer implementation.
    #[error("Excel write error: {0}")]
    ExcelWrite(#[from] rust_xlsxwriter::XlsxError),

    /// Errors bubbled up from the Excel reader implementation.
    #[error("Excel read error: {0}")]
    ExcelRead(#[from] calamine::XlsxError),

    /// Raised when a sheet does not follow the expected conventions.
    #[error("invalid workbook structure: {0}")]
    InvalidWorkbook(String),

    /// A required canonical field could not be located in a header row.
    #[error("required field '{field}' not found in {side} headers")]
    MissingField { field: String, side: HeaderSide },

    /// A field is referenced by configuration but never declared in the
    /// alias table.
    #[error("field '{0}' is not declared in the alias table")]
    UnknownField(String),

    /// Static fields need an identifier column to correlate old and new rows.
    #[error("static fields require identifier field '{field}' on both sides")]
    MissingIdentifier { field: String },

    /// Raised when the configuration is structurally valid JSON but
    /// semantically unusable.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Raised when a date supplied on the command line cannot be parsed.
    #[error("invalid date '{0}'")]
    InvalidDate(String),

    /// Raised when the user provides a path that does not exist.
    #[error("input file not found: {0}")]
    MissingInput(PathBuf),

    /// Raised when the tracing subscriber fails to initialise.
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

use serde::Serialize;

use crate::error::HeaderSide;
use crate::model::{FieldName, IdentityKey};

/// Non-fatal findings surfaced to the caller so imports stay auditable.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ImportWarning {
    /// Two canonical fields resolved to the same physical column. The field
    /// declared first keeps the column; `dropped` is left unmapped.
    SharedColumn {
        side: HeaderSide,
        column: usize,
        header: String,
        kept: FieldName,
        dropped: FieldName,
        rows_affected: usize,
    },
    /// More than one DNC-like token was found in one annotation; the first
    /// one was applied.
    MultipleDncTokens {
        identity: IdentityKey,
        tokens: usize,
    },
    /// The same identity appeared more than once in one incoming batch and
    /// was collapsed into a single record.
    DuplicateIdentity {
        identity: IdentityKey,
        occurrences: usize,
    },
    /// A cell could not be coerced into its field's kind and was blanked.
    UnparseableCell {
        field: FieldName,
        row: usize,
        value: String,
    },
}

impl std::fmt::Display for ImportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportWarning::SharedColumn {
                side,
                header,
                kept,
                dropped,
                rows_affected,
                ..
            } => write!(
                f,
                "{side} column '{header}' matches both '{kept}' and '{dropped}'; kept '{kept}' ({rows_affected} rows affected)"
            ),
            ImportWarning::MultipleDncTokens { identity, tokens } => {
                write!(f, "{tokens} DNC tokens for '{identity}'; applied the first")
            }
            ImportWarning::DuplicateIdentity {
                identity,
                occurrences,
            } => write!(f, "identity '{identity}' appeared {occurrences} times; merged"),
            ImportWarning::UnparseableCell { field, row, value } => {
                write!(f, "row {row}: could not parse '{value}' as {field}; left blank")
            }
        }
    }
}

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Canonical field name. Kept as a plain string so externally configured
/// alias tables can introduce fields the shipped defaults do not know about.
pub type FieldName = String;

/// Normalised identity key produced by [`normalize_identity`](crate::identity::normalize_identity).
pub type IdentityKey = String;

static EMPTY_VALUE: CellValue = CellValue::Empty;

/// Represents the value stored in a single spreadsheet cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    /// Blank cell.
    #[default]
    Empty,
    /// Plain string literal.
    Text(String),
    /// Floating point number literal. Date serials are stored this way too.
    Number(f64),
    /// Boolean literal.
    Boolean(bool),
    /// Native wall-clock date/time value.
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// Returns `true` for blank cells and whitespace-only text.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(value) => value.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric view of the cell. Text is accepted when it parses as a
    /// number once surrounding whitespace and a trailing `%` are removed.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(value) => Some(*value),
            CellValue::Text(value) => {
                let trimmed = value.trim();
                let trimmed = trimmed.strip_suffix('%').unwrap_or(trimmed).trim_end();
                trimmed.parse::<f64>().ok().filter(|number| number.is_finite())
            }
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Text(value) => f.write_str(value),
            CellValue::Number(value) => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    write!(f, "{}", *value as i64)
                } else {
                    write!(f, "{value}")
                }
            }
            CellValue::Boolean(value) => write!(f, "{value}"),
            CellValue::DateTime(value) => write!(f, "{}", value.format("%-m/%-d/%Y")),
        }
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

/// A roster cell: the stored value plus, for formula-bearing cells, the
/// formula string the host spreadsheet keeps alongside it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub value: CellValue,
    pub formula: Option<String>,
}

impl Cell {
    /// Creates a plain value cell without a formula.
    pub fn value(value: impl Into<CellValue>) -> Self {
        Self {
            value: value.into(),
            formula: None,
        }
    }

    /// Creates a formula cell with its cached display value.
    pub fn formula(value: impl Into<CellValue>, formula: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            formula: Some(formula.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.formula.is_none()
    }
}

/// Parsed tabular input handed over by an external file reader: a header row
/// followed by rows of raw cell values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SourceTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { headers, rows }
    }

    /// Returns the cell at the given position, treating ragged rows as blank.
    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(&EMPTY_VALUE)
    }
}

/// A single data row of the persisted roster.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterRow {
    pub cells: Vec<Cell>,
}

impl RosterRow {
    /// Creates a blank row with the given width.
    pub fn blank(width: usize) -> Self {
        Self {
            cells: vec![Cell::default(); width],
        }
    }

    pub fn value(&self, column: usize) -> &CellValue {
        self.cells
            .get(column)
            .map(|cell| &cell.value)
            .unwrap_or(&EMPTY_VALUE)
    }

    pub fn cell(&self, column: usize) -> Option<&Cell> {
        self.cells.get(column)
    }

    /// Replaces the cell at `column`, widening the row when it is ragged.
    pub fn set(&mut self, column: usize, cell: Cell) {
        if self.cells.len() <= column {
            self.cells.resize(column + 1, Cell::default());
        }
        self.cells[column] = cell;
    }
}

/// The persisted Master List: a header row plus data rows whose cells carry
/// both the value and the formula view of the host spreadsheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterGrid {
    pub headers: Vec<String>,
    pub rows: Vec<RosterRow>,
}

impl RosterGrid {
    /// Creates an empty roster that only carries a header row.
    pub fn with_headers<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.headers.len()
    }

    /// Projects the selected rows into a report table.
    pub fn project(&self, sheet_name: impl Into<String>, indices: &[usize]) -> SheetTable {
        let rows = indices
            .iter()
            .filter_map(|index| self.rows.get(*index))
            .map(|row| {
                (0..self.width())
                    .map(|column| row.cell(column).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();

        SheetTable {
            sheet_name: sheet_name.into(),
            columns: self.headers.clone(),
            rows,
        }
    }
}

/// A roster record after schema resolution: canonical field → cell, keyed by
/// identity. Columns the schema does not recognise are dropped before a
/// record is built.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterRecord {
    pub identity: IdentityKey,
    pub fields: BTreeMap<FieldName, Cell>,
}

impl RosterRecord {
    pub fn new(identity: impl Into<IdentityKey>) -> Self {
        Self {
            identity: identity.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Cell> {
        self.fields.get(field)
    }

    /// Returns the value for `field`, or `None` when absent or blank.
    pub fn non_empty(&self, field: &str) -> Option<&Cell> {
        self.fields.get(field).filter(|cell| !cell.is_empty())
    }
}

/// A table that will be materialised as an Excel sheet. Cells keep their
/// formulas so hyperlinks survive into reports.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetTable {
    pub sheet_name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// A worksheet read positionally from A1, kept so that sheets the tool does
/// not own can be written back unchanged in value and formula.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SheetGrid {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

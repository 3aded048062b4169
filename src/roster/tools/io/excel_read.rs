use std::path::Path;

use calamine::{DataType, Range, Reader, Xlsx, open_workbook};

use crate::dates::{parse_to_instant, serial_to_datetime};
use crate::error::{Result, ToolError};
use crate::model::{Cell, CellValue, RosterGrid, RosterRow, SheetGrid, SourceTable};

/// Reads an export as a header row plus data rows. Uses the first sheet
/// when `sheet` is `None`. Fully blank rows are skipped.
pub fn read_source_table(path: &Path, sheet: Option<&str>) -> Result<SourceTable> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ToolError::InvalidWorkbook("workbook has no sheets".into()))?,
    };
    let range = read_required_sheet(&mut workbook, &sheet_name)?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(first_row) => first_row
            .iter()
            .map(|cell| cell_to_string(Some(cell)).trim().to_string())
            .collect(),
        None => Vec::new(),
    };

    let rows = rows
        .map(|row| row.iter().map(cell_to_value).collect::<Vec<_>>())
        .filter(|row| row.iter().any(|cell| !cell.is_empty()))
        .collect();

    Ok(SourceTable::new(headers, rows))
}

/// Reads the Master List, reconciling the value grid and the formula grid
/// into one [`Cell`] per position.
///
/// The first non-blank row is the header row. Formula text is returned with
/// a leading `=`.
pub fn read_roster(path: &Path, sheet: &str) -> Result<RosterGrid> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let values = read_required_sheet(&mut workbook, sheet)?;
    let formulas = read_formula_sheet(&mut workbook, sheet)?;

    let (Some((header_row, _)), Some((value_end_row, value_end_col))) = (values.start(), values.end())
    else {
        return Ok(RosterGrid::default());
    };
    let (end_row, end_col) = match formulas.as_ref().and_then(Range::end) {
        Some((row, col)) => (row.max(value_end_row), col.max(value_end_col)),
        None => (value_end_row, value_end_col),
    };

    let mut headers: Vec<String> = (0..=end_col)
        .map(|col| cell_to_string(values.get_value((header_row, col))).trim().to_string())
        .collect();
    while headers.last().is_some_and(String::is_empty) {
        headers.pop();
    }
    let width = headers.len();

    let mut rows = Vec::new();
    for row in (header_row + 1)..=end_row {
        let cells: Vec<Cell> = (0..width as u32)
            .map(|col| merged_cell(&values, formulas.as_ref(), (row, col)))
            .collect();
        if cells.iter().all(Cell::is_empty) {
            continue;
        }
        rows.push(RosterRow { cells });
    }

    Ok(RosterGrid { headers, rows })
}

/// Reads every sheet of a workbook in order, positionally from A1, keeping
/// values and formulas.
pub fn read_sheets(path: &Path) -> Result<Vec<SheetGrid>> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let mut sheets = Vec::new();
    for name in workbook.sheet_names().to_owned() {
        let values = read_required_sheet(&mut workbook, &name)?;
        let formulas = read_formula_sheet(&mut workbook, &name)?;

        let value_end = values.end();
        let formula_end = formulas.as_ref().and_then(Range::end);
        let end = match (value_end, formula_end) {
            (Some((vr, vc)), Some((fr, fc))) => Some((vr.max(fr), vc.max(fc))),
            (Some(end), None) | (None, Some(end)) => Some(end),
            (None, None) => None,
        };

        let rows = match end {
            Some((end_row, end_col)) => (0..=end_row)
                .map(|row| {
                    (0..=end_col)
                        .map(|col| merged_cell(&values, formulas.as_ref(), (row, col)))
                        .collect()
                })
                .collect(),
            None => Vec::new(),
        };
        sheets.push(SheetGrid { name, rows });
    }
    Ok(sheets)
}

fn merged_cell(
    values: &Range<DataType>,
    formulas: Option<&Range<String>>,
    position: (u32, u32),
) -> Cell {
    Cell {
        value: values.get_value(position).map(cell_to_value).unwrap_or_default(),
        formula: formulas
            .and_then(|range| range.get_value(position))
            .and_then(|formula| normalize_formula(formula)),
    }
}

fn read_formula_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Option<Range<String>>> {
    match workbook.worksheet_formula(name) {
        Some(Ok(range)) => Ok(Some(range)),
        Some(Err(error)) => Err(ToolError::from(error)),
        None => Ok(None),
    }
}

fn read_required_sheet<R: std::io::Read + std::io::Seek>(
    workbook: &mut Xlsx<R>,
    name: &str,
) -> Result<Range<DataType>> {
    let range_result = workbook
        .worksheet_range(name)
        .ok_or_else(|| ToolError::InvalidWorkbook(format!("missing sheet '{name}'")))?;
    let range = range_result.map_err(ToolError::from)?;
    Ok(range)
}

fn normalize_formula(formula: &str) -> Option<String> {
    let trimmed = formula.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.starts_with('=') {
        Some(trimmed.to_string())
    } else {
        Some(format!("={trimmed}"))
    }
}

fn cell_to_value(cell: &DataType) -> CellValue {
    match cell {
        DataType::String(value) => CellValue::Text(value.clone()),
        DataType::Float(value) => CellValue::Number(*value),
        DataType::Int(value) => CellValue::Number(*value as f64),
        DataType::Bool(value) => CellValue::Boolean(*value),
        DataType::DateTime(serial) => serial_to_datetime(*serial)
            .map(CellValue::DateTime)
            .unwrap_or(CellValue::Number(*serial)),
        DataType::Empty => CellValue::Empty,
        other => {
            let text = other.to_string();
            match parse_to_instant(&CellValue::Text(text.clone())) {
                Some(instant) => CellValue::DateTime(instant.naive()),
                None => CellValue::Text(text),
            }
        }
    }
}

fn cell_to_string(cell: Option<&DataType>) -> String {
    match cell {
        Some(DataType::String(value)) => value.clone(),
        Some(DataType::Float(value)) => value.to_string(),
        Some(DataType::Int(value)) => value.to_string(),
        Some(DataType::Bool(value)) => value.to_string(),
        Some(DataType::Empty) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

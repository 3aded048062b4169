use std::path::Path;

use rust_xlsxwriter::{Format, Formula, Table, TableColumn, Workbook, Worksheet};

use crate::dates::{CanonicalInstant, to_serial};
use crate::error::{Result, ToolError};
use crate::model::{Cell, CellValue, RosterGrid, SheetGrid, SheetTable};

const DATE_FORMAT: &str = "m/d/yy";

/// Writes the roster as the single sheet of the workbook at `path`.
pub fn write_roster(path: &Path, sheet_name: &str, roster: &RosterGrid) -> Result<()> {
    write_master(path, sheet_name, roster, &[])
}

/// Writes the roster together with the other sheets of the master workbook.
///
/// `sheets` is the master's sheet list in workbook order. The entry named
/// `sheet_name` is replaced by `roster`; when no entry carries that name the
/// roster goes first. Other sheets are written back cell for cell.
///
/// The workbook is saved to a temporary file next to `path` and then renamed
/// over it, so readers observe either the previous master or the complete new
/// one.
pub fn write_master(
    path: &Path,
    sheet_name: &str,
    roster: &RosterGrid,
    sheets: &[SheetGrid],
) -> Result<()> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format(DATE_FORMAT);

    if !sheets.iter().any(|sheet| sheet.name == sheet_name) {
        write_roster_sheet(&mut workbook, sheet_name, roster, &date_format)?;
    }
    for sheet in sheets {
        if sheet.name == sheet_name {
            write_roster_sheet(&mut workbook, sheet_name, roster, &date_format)?;
            continue;
        }
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;
        for (row_idx, row) in sheet.rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                write_cell(worksheet, row_idx as u32, col_idx as u16, cell, &date_format)?;
            }
        }
    }

    commit(&mut workbook, path)
}

fn write_roster_sheet(
    workbook: &mut Workbook,
    sheet_name: &str,
    roster: &RosterGrid,
    date_format: &Format,
) -> Result<()> {
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (col_idx, header) in roster.headers.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, header)?;
    }

    for (row_idx, row) in roster.rows.iter().enumerate() {
        for (col_idx, cell) in row.cells.iter().enumerate() {
            write_cell(worksheet, (row_idx + 1) as u32, col_idx as u16, cell, date_format)?;
        }
    }
    Ok(())
}

/// Writes one autofiltered table per report sheet.
pub fn write_report(path: &Path, tables: &[SheetTable]) -> Result<()> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format(DATE_FORMAT);

    for table in tables {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&table.sheet_name)?;

        for (col_idx, header) in table.columns.iter().enumerate() {
            worksheet.write_string(0, col_idx as u16, header)?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                write_cell(worksheet, (row_idx + 1) as u32, col_idx as u16, cell, &date_format)?;
            }
        }

        if table.columns.is_empty() {
            continue;
        }

        let columns: Vec<TableColumn> = table
            .columns
            .iter()
            .map(|header| TableColumn::new().set_header(header))
            .collect();
        let mut excel_table = Table::new();
        excel_table.set_autofilter(true).set_columns(&columns);

        let col_end = (table.columns.len() as u16).saturating_sub(1);
        let row_end = if table.rows.is_empty() {
            1
        } else {
            table.rows.len() as u32
        };
        worksheet.add_table(0, 0, row_end, col_end, &excel_table)?;
    }

    commit(&mut workbook, path)
}

fn write_cell(
    worksheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    date_format: &Format,
) -> Result<()> {
    if let Some(formula) = &cell.formula {
        let formula = Formula::new(formula).set_result(cell.value.to_string());
        worksheet.write_formula(row, col, formula)?;
        return Ok(());
    }

    match &cell.value {
        CellValue::Empty => {}
        CellValue::Text(value) => {
            worksheet.write_string(row, col, value)?;
        }
        CellValue::Number(value) => {
            worksheet.write_number(row, col, *value)?;
        }
        CellValue::Boolean(value) => {
            worksheet.write_boolean(row, col, *value)?;
        }
        CellValue::DateTime(value) => {
            let serial = to_serial(CanonicalInstant::new(*value));
            worksheet.write_number_with_format(row, col, serial, date_format)?;
        }
    }
    Ok(())
}

fn commit(workbook: &mut Workbook, path: &Path) -> Result<()> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".roster-")
        .suffix(".xlsx")
        .tempfile_in(directory)?;
    workbook.save(staged.path())?;
    staged
        .persist(path)
        .map_err(|error| ToolError::Io(error.error))?;
    Ok(())
}

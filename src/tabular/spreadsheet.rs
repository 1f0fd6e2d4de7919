//! Spreadsheet import (xlsx, xls, xlsb, ods) and XLSX export.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, Workbook};
use tracing::debug;

use super::{report_columns, Cell, ReportRow, Table};
use crate::error::Result;

const SHEET_NAME: &str = "Results";

/// Read the first worksheet. The first row is the header row; every other
/// cell is converted to its text form.
///
/// Blank rows inside the used range are kept, as the CSV reader keeps
/// delimiter-only lines, so row numbers match the sheet.
pub fn read_xlsx(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path)?;

    let Some(sheet_name) = workbook.sheet_names().first().cloned() else {
        return Ok(Table::default());
    };
    debug!("Reading sheet '{}' from {}", sheet_name, path.display());

    let range = workbook.worksheet_range(&sheet_name)?;
    let mut rows = range.rows();

    let Some(header_cells) = rows.next() else {
        return Ok(Table::default());
    };
    let headers: Vec<String> = header_cells.iter().map(cell_text).collect();

    let records = rows.map(|cells| cells.iter().map(cell_text).collect::<Vec<String>>());

    Ok(Table::from_records(headers, records))
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}

/// Write report rows to a single-sheet XLSX workbook.
pub fn write_xlsx(rows: &[ReportRow], path: &Path) -> Result<()> {
    let columns = report_columns(rows);
    let mut workbook = Workbook::new();
    let header_format = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(SHEET_NAME)?;

    for (col, name) in columns.iter().enumerate() {
        worksheet.write_string_with_format(0, col as u16, name, &header_format)?;
    }

    for (idx, row) in rows.iter().enumerate() {
        let excel_row = (idx + 1) as u32;
        for (name, cell) in row {
            let Some(col) = columns.iter().position(|c| c == name) else {
                continue;
            };
            let col = col as u16;
            match cell {
                Cell::Text(s) => {
                    worksheet.write_string(excel_row, col, s)?;
                }
                Cell::Number(n) => {
                    worksheet.write_number(excel_row, col, *n)?;
                }
                Cell::Bool(b) => {
                    worksheet.write_boolean(excel_row, col, *b)?;
                }
                Cell::Empty => {}
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

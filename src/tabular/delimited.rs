//! CSV import/export.

use std::fs;
use std::path::Path;

use csv::{ReaderBuilder, Trim, WriterBuilder};
use tracing::debug;

use super::{report_columns, ReportRow, Table};
use crate::error::Result;

/// Read a CSV file, auto-detecting `,` or `;` as the delimiter.
pub fn read_csv(path: &Path) -> Result<Table> {
    let bytes = fs::read(path)?;
    let content = String::from_utf8_lossy(&bytes);
    read_csv_str(&content)
}

/// Parse CSV text, auto-detecting `,` or `;` as the delimiter.
pub fn read_csv_str(content: &str) -> Result<Table> {
    let content = content.trim_start_matches('\u{feff}').trim();
    if content.is_empty() {
        return Ok(Table::default());
    }

    let delimiter = sniff_delimiter(content);
    debug!("Using CSV delimiter {:?}", delimiter as char);

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

    let mut records = Vec::new();
    for result in reader.records() {
        let record = result?;
        records.push(record.iter().map(String::from).collect());
    }

    Ok(Table::from_records(headers, records))
}

/// Pick `;` when the header line holds more semicolons than commas,
/// otherwise `,`.
pub fn sniff_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    let semicolons = header.matches(';').count();
    let commas = header.matches(',').count();

    if semicolons > commas {
        b';'
    } else {
        b','
    }
}

/// Write report rows as CSV. Columns are the union of keys in first-seen order.
pub fn write_csv(rows: &[ReportRow], path: &Path) -> Result<()> {
    let columns = report_columns(rows);
    let mut writer = WriterBuilder::new().from_path(path)?;

    writer.write_record(&columns)?;
    for row in rows {
        let record: Vec<String> = columns
            .iter()
            .map(|column| {
                row.iter()
                    .find(|(name, _)| name == column)
                    .map(|(_, cell)| cell.to_text())
                    .unwrap_or_default()
            })
            .collect();
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

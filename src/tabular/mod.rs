//! Tabular data: the row shape shared by every dataset, plus readers and
//! writers for CSV and spreadsheet files.

mod delimited;
mod spreadsheet;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub use delimited::{read_csv, read_csv_str, sniff_delimiter, write_csv};
pub use spreadsheet::{read_xlsx, write_xlsx};

/// One input row: an ordered mapping of column name to raw cell value.
///
/// Headers are shared between all rows of a table. Values are trimmed and
/// never absent: a missing cell is an empty string.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    headers: Arc<[String]>,
    values: Vec<String>,
}

impl Row {
    /// Build a row against shared headers; pads or truncates `values` to the
    /// header count.
    pub fn new(headers: Arc<[String]>, mut values: Vec<String>) -> Self {
        values.resize(headers.len(), String::new());
        for value in &mut values {
            let trimmed = value.trim();
            if trimmed.len() != value.len() {
                *value = trimmed.to_string();
            }
        }
        Self { headers, values }
    }

    /// Convenience constructor from `(column, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let (headers, values): (Vec<String>, Vec<String>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(headers.into(), values)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Value by column position. Out-of-range positions read as empty.
    pub fn value_at(&self, index: usize) -> &str {
        self.values.get(index).map(String::as_str).unwrap_or("")
    }

    /// Value by column name.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == column)
            .map(|idx| self.value_at(idx))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().map(String::as_str))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A parsed dataset: headers in file order and every data row.
#[derive(Debug, Clone)]
pub struct Table {
    headers: Arc<[String]>,
    rows: Vec<Row>,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            headers: Arc::from(Vec::new()),
            rows: Vec::new(),
        }
    }
}

impl Table {
    /// Build a table from raw records. Headers are trimmed; every record is
    /// aligned to the header count.
    pub fn from_records<I>(headers: Vec<String>, records: I) -> Self
    where
        I: IntoIterator<Item = Vec<String>>,
    {
        let headers: Arc<[String]> = headers
            .into_iter()
            .map(|h| h.trim().to_string())
            .collect::<Vec<_>>()
            .into();

        let rows = records
            .into_iter()
            .map(|values| Row::new(Arc::clone(&headers), values))
            .collect();

        Self { headers, rows }
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A typed report cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Bool(bool),
    Empty,
}

impl Cell {
    /// Text form used by the CSV writer.
    pub fn to_text(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Number(n) => n.to_string(),
            Cell::Bool(b) => b.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<f64> for Cell {
    fn from(n: f64) -> Self {
        Cell::Number(n)
    }
}

impl From<usize> for Cell {
    fn from(n: usize) -> Self {
        Cell::Number(n as f64)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Bool(b)
    }
}

impl<T: Into<Cell>> From<Option<T>> for Cell {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Cell::Empty)
    }
}

/// One output row: ordered `(column, value)` pairs.
pub type ReportRow = Vec<(String, Cell)>;

/// Union of the column names of all rows, in first-seen order.
pub fn report_columns(rows: &[ReportRow]) -> Vec<String> {
    let mut seen = hashbrown::HashSet::new();
    let mut columns = Vec::new();
    for row in rows {
        for (column, _) in row {
            if seen.insert(column.as_str()) {
                columns.push(column.clone());
            }
        }
    }
    columns
}

/// Read a dataset, choosing the decoder from the file extension.
pub fn read_table(path: &Path) -> Result<Table> {
    let extension = file_extension(path);

    let table = match extension.as_str() {
        "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => read_xlsx(path)?,
        "csv" | "txt" | "" => read_csv(path)?,
        other => return Err(Error::UnsupportedFormat(other.to_string())),
    };

    info!(
        "Read {} rows x {} columns from {}",
        table.len(),
        table.headers().len(),
        path.display()
    );
    Ok(table)
}

/// Write report rows, choosing the encoder from the file extension.
///
/// Returns `false` (and writes nothing) when there are no rows.
pub fn write_table(rows: &[ReportRow], path: &Path) -> Result<bool> {
    if rows.is_empty() {
        warn!("No data to write to {}", path.display());
        return Ok(false);
    }

    match file_extension(path).as_str() {
        "csv" => write_csv(rows, path)?,
        "xlsx" => write_xlsx(rows, path)?,
        other => return Err(Error::UnsupportedFormat(other.to_string())),
    }

    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(true)
}

fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_pads_and_trims() {
        let headers: Arc<[String]> = vec!["a".to_string(), "b".to_string()].into();
        let row = Row::new(headers, vec!["  x ".to_string()]);
        assert_eq!(row.get("a"), Some("x"));
        assert_eq!(row.get("b"), Some(""));
        assert_eq!(row.get("c"), None);
        assert_eq!(row.len(), 2);
    }

    #[test]
    fn test_report_columns_first_seen_order() {
        let rows: Vec<ReportRow> = vec![
            vec![("b".into(), Cell::from("1")), ("a".into(), Cell::from("2"))],
            vec![("a".into(), Cell::from("3")), ("c".into(), Cell::from(1.5))],
        ];
        assert_eq!(report_columns(&rows), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_write_table_skips_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");
        assert!(!write_table(&[], &path).unwrap());
        assert!(!path.exists());
    }

    #[test]
    fn test_unsupported_extension() {
        let err = read_table(Path::new("data.parquet")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));
    }
}

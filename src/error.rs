//! Error types shared by the analysis, matching and geocoding layers.

use std::time::Duration;

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors that abort a whole call.
///
/// Configuration errors are raised before any partial work is produced.
/// Row-level problems never show up here: they are recorded on the row
/// (as a classification or an export field) and the batch keeps going.
#[derive(Debug, Error)]
pub enum Error {
    /// A column the operation strictly needs is not mapped.
    #[error("dataset '{dataset}': {role} column is not mapped")]
    MissingColumn { dataset: String, role: &'static str },

    /// The column mapping names a header that the dataset does not have.
    #[error("dataset '{dataset}': column '{column}' (mapped as {role}) not found in headers")]
    UnknownColumn {
        dataset: String,
        role: &'static str,
        column: String,
    },

    #[error("invalid match policy: {0}")]
    InvalidPolicy(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet read error: {0}")]
    SpreadsheetRead(#[from] calamine::Error),

    #[error("spreadsheet write error: {0}")]
    SpreadsheetWrite(#[from] rust_xlsxwriter::XlsxError),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("OSM read error: {0}")]
    Osm(#[from] osmpbfreader::Error),
}

impl Error {
    /// True for errors caused by how the caller set up the run, as opposed to
    /// I/O or decoding failures.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::MissingColumn { .. }
                | Error::UnknownColumn { .. }
                | Error::InvalidPolicy(_)
                | Error::InvalidConfig(_)
        )
    }
}

/// Failure of a single call to a geocoding collaborator.
///
/// Always recoverable at the batch level.
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("geocoder returned status {0}")]
    Status(u16),

    #[error("geocoder did not answer within {0:?}")]
    Timeout(Duration),

    #[error("invalid geocoder response: {0}")]
    InvalidResponse(String),
}

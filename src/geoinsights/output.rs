//! Terminal progress and report files.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use geoinsights::tabular::{write_table, ReportRow};

pub fn progress_bar(message: &'static str) -> Result<Arc<ProgressBar>> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );
    pb.set_message(message);
    Ok(Arc::new(pb))
}

/// Write `rows` if a destination was given.
pub fn write_rows(rows: &[ReportRow], path: Option<&Path>, what: &str) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    let written = write_table(rows, path)
        .with_context(|| format!("Failed to write {} to {}", what, path.display()))?;
    if written {
        info!("{} written to {}", what, path.display());
    }
    Ok(())
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize summary")?;
    println!("{}", json);
    Ok(())
}

//! Report rows with the exported column names.
//!
//! Original columns come first, verbatim, followed by the report fields.

use crate::analysis::AnalysisReport;
use crate::compare::ComparisonResult;
use crate::geocoding::GeocodeReport;
use crate::models::Point;
use crate::tabular::{Cell, ReportRow, Row};

pub const COL_PROBLEM_REASON: &str = "MOTIVO_PROBLEMA";
pub const COL_STATUS: &str = "STATUS_ANALISE";
pub const COL_DETECTED_STATE: &str = "ESTADO_DETECTADO";
pub const COL_DETECTED_CITY: &str = "CIDADE_DETECTADA";
pub const COL_STATE_MATCH: &str = "CORRESP_ESTADO";
pub const COL_CITY_MATCH: &str = "CORRESP_CIDADE";
pub const COL_LATITUDE: &str = "LATITUDE_GEO";
pub const COL_LONGITUDE: &str = "LONGITUDE_GEO";
pub const COL_ERROR: &str = "ERRO_VERIFICACAO";
pub const COL_BASE_ROW: &str = "LINHA_BASE";
pub const COL_MATCH_ROW: &str = "LINHA_MATCH";
pub const COL_DISTANCE: &str = "DISTANCIA_M";
pub const BASE_PREFIX: &str = "BASE_";
pub const MATCH_PREFIX: &str = "MATCH_";

fn source_columns(row: &Row) -> ReportRow {
    prefixed(row, "")
}

fn prefixed(row: &Row, prefix: &str) -> ReportRow {
    row.iter()
        .map(|(column, value)| (format!("{}{}", prefix, column), Cell::from(value)))
        .collect()
}

fn reason(point: &Point) -> Cell {
    Cell::from(point.reason().map(String::from))
}

/// Rounded to centimeters for export only.
fn round_distance(meters: f64) -> f64 {
    (meters * 100.0).round() / 100.0
}

/// Problematic points with their classification reason.
pub fn problems_report(report: &AnalysisReport) -> Vec<ReportRow> {
    report
        .problematic_points()
        .into_iter()
        .map(|point| {
            let mut row = source_columns(&point.attributes);
            row.push((COL_PROBLEM_REASON.to_string(), reason(point)));
            row
        })
        .collect()
}

/// Every point in row order with its status and detected place.
pub fn full_report(report: &AnalysisReport) -> Vec<ReportRow> {
    report
        .points
        .iter()
        .map(|point| {
            let mut row = source_columns(&point.attributes);
            row.push((COL_STATUS.to_string(), reason(point)));
            row.push((
                COL_DETECTED_STATE.to_string(),
                Cell::from(point.detected_state().map(String::from)),
            ));
            row.push((
                COL_DETECTED_CITY.to_string(),
                Cell::from(point.detected_city().map(String::from)),
            ));
            row
        })
        .collect()
}

/// One row per match record.
pub fn comparison_report(result: &ComparisonResult) -> Vec<ReportRow> {
    result
        .records
        .iter()
        .map(|record| {
            let mut row = prefixed(&record.base, BASE_PREFIX);
            row.push((COL_BASE_ROW.to_string(), Cell::from(record.base_row)));
            row.extend(prefixed(&record.candidate, MATCH_PREFIX));
            row.push((COL_MATCH_ROW.to_string(), Cell::from(record.candidate_row)));
            row.push((
                COL_DISTANCE.to_string(),
                Cell::from(round_distance(record.distance_m)),
            ));
            row
        })
        .collect()
}

/// Geocoded coordinates and row errors; verification fields when that mode ran.
pub fn geocoding_report(report: &GeocodeReport) -> Vec<ReportRow> {
    let verified = report.rows.iter().any(|r| r.verification.is_some());

    report
        .rows
        .iter()
        .map(|geocoded| {
            let mut row = source_columns(&geocoded.attributes);
            row.push((
                COL_LATITUDE.to_string(),
                Cell::from(geocoded.location.map(|l| l.lat)),
            ));
            row.push((
                COL_LONGITUDE.to_string(),
                Cell::from(geocoded.location.map(|l| l.lon)),
            ));
            row.push((COL_ERROR.to_string(), Cell::from(geocoded.error.clone())));

            if verified {
                let check = geocoded.verification.as_ref();
                row.push((
                    COL_DETECTED_STATE.to_string(),
                    Cell::from(check.and_then(|c| c.detected_state.clone())),
                ));
                row.push((
                    COL_DETECTED_CITY.to_string(),
                    Cell::from(check.and_then(|c| c.detected_city.clone())),
                ));
                row.push((
                    COL_STATE_MATCH.to_string(),
                    Cell::from(check.map(|c| c.state_match)),
                ));
                row.push((
                    COL_CITY_MATCH.to_string(),
                    Cell::from(check.map(|c| c.city_match)),
                ));
            }
            row
        })
        .collect()
}

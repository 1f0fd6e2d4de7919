//! GeoInsights - point-of-interest quality analysis and dataset matching
//!
//! This library provides the analysis engine used by the `geoinsights` binary:
//! coordinate normalization, duplicate/proximity detection, cross-dataset
//! matching, geographic consistency checks and geocoding collaborators.

pub mod analysis;
pub mod compare;
pub mod config;
pub mod consistency;
pub mod distance;
pub mod error;
pub mod export;
pub mod geocoding;
pub mod models;
pub mod normalize;
pub mod pip;
pub mod registry;
pub mod spatial;
pub mod tabular;

pub use analysis::{analyze, analyze_with_geocoder, AnalysisOptions, AnalysisReport};
pub use compare::{compare_datasets, ComparisonResult};
pub use error::{Error, GeocodeError, Result};
pub use models::{DatasetSide, GeoPoint, MatchPolicy, MatchRecord, Point};
pub use normalize::ColumnMapping;

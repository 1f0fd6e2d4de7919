use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::geocoding::BatchControl;
use crate::pip::BoundaryLevels;

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub geocoder: GeocoderConfig,
    pub analysis: AnalysisConfig,
    pub boundaries: BoundariesConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct GeocoderConfig {
    pub nominatim_url: String,
    pub user_agent: String,
    pub language: String,
    pub timeout_secs: u64,
    /// Minimum spacing between successive external calls
    pub delay_ms: u64,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            nominatim_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("geoinsights/", env!("CARGO_PKG_VERSION")).to_string(),
            language: "en".to_string(),
            timeout_secs: 10,
            delay_ms: 1100,
        }
    }
}

impl GeocoderConfig {
    pub fn batch_control(&self) -> BatchControl {
        BatchControl::new(
            Duration::from_millis(self.delay_ms),
            Duration::from_secs(self.timeout_secs),
        )
    }
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub proximity_threshold_m: Option<f64>,
}

/// Offline boundary source for reverse lookups.
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct BoundariesConfig {
    pub pbf_path: Option<PathBuf>,
    pub levels: BoundaryLevels,
}

impl Config {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.geocoder.timeout_secs == 0 {
            return Err(Error::InvalidConfig("geocoder.timeout_secs must be positive".to_string()));
        }
        if let Some(t) = self.analysis.proximity_threshold_m {
            if !t.is_finite() || t < 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "analysis.proximity_threshold_m must be a non-negative number, got {}",
                    t
                )));
            }
        }
        self.boundaries.levels.validate()
    }
}

//! Cross-dataset matching types.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tabular::Row;

/// Distance (meters) under which two points share the same square meter.
pub const SAME_SQUARE_METER: f64 = 1.0;

/// Which of the two datasets drives the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatasetSide {
    A,
    B,
}

impl std::fmt::Display for DatasetSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatasetSide::A => write!(f, "A"),
            DatasetSide::B => write!(f, "B"),
        }
    }
}

/// How candidates are retained for each base point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Candidates within one meter, in candidate dataset order
    ExactCell,
    /// The `n` closest candidates, ties broken by candidate dataset order
    Nearest(usize),
    /// Every candidate within the radius (meters), closest first
    Radius(f64),
}

impl MatchPolicy {
    pub fn nearest(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(Error::InvalidPolicy(
                "nearest requires at least one neighbour".to_string(),
            ));
        }
        Ok(MatchPolicy::Nearest(n))
    }

    pub fn radius(meters: f64) -> Result<Self> {
        if !meters.is_finite() || meters < 0.0 {
            return Err(Error::InvalidPolicy(format!(
                "radius must be a non-negative number of meters, got {}",
                meters
            )));
        }
        Ok(MatchPolicy::Radius(meters))
    }

    /// Re-check the invariants of a policy built without the constructors.
    pub fn validate(&self) -> Result<()> {
        match *self {
            MatchPolicy::ExactCell => Ok(()),
            MatchPolicy::Nearest(n) => Self::nearest(n).map(|_| ()),
            MatchPolicy::Radius(r) => Self::radius(r).map(|_| ()),
        }
    }

    /// Distance cutoff implied by the policy, if any
    pub fn max_distance(&self) -> Option<f64> {
        match *self {
            MatchPolicy::ExactCell => Some(SAME_SQUARE_METER),
            MatchPolicy::Nearest(_) => None,
            MatchPolicy::Radius(r) => Some(r),
        }
    }
}

impl std::fmt::Display for MatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchPolicy::ExactCell => write!(f, "same square meter"),
            MatchPolicy::Nearest(n) => write!(f, "{} nearest", n),
            MatchPolicy::Radius(r) => write!(f, "within {} m", r),
        }
    }
}

/// One retained (base, candidate) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub base_row: usize,
    pub base: Row,
    pub candidate_row: usize,
    pub candidate: Row,
    /// Full precision; rounded only on export
    pub distance_m: f64,
}

impl MatchRecord {
    pub fn is_same_square_meter(&self) -> bool {
        self.distance_m <= SAME_SQUARE_METER
    }
}

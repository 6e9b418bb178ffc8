//! `RunParameters` — the knobs a Run is triggered with, with documented
//! defaults. Loadable from a JSON config file the same way a manifest
//! loader reads a file into a typed struct: parse, then validate. CLI
//! flags (in `oce_cli`) override individual fields afterwards.

use crate::IoError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RunParameters {
    /// Size of the trailing window of votes considered, in days.
    pub window_days: u32,
    /// Minimum distinct voters required to run at all.
    pub min_voters: u32,
    /// Minimum votes a voter must have cast in the window to be included.
    pub min_votes_per_voter: u32,
    /// Encoding used for a cast `Neutral` vote (never `0.0`, always `< 0.5`
    /// so it decodes back to neutral rather than a Support/Oppose vote).
    pub neutral_epsilon: f64,
    /// Parsimony/hysteresis margin applied when selecting the group count.
    pub silhouette_threshold: f64,
    /// Inclusive range of candidate group counts (k).
    pub k_group_min: u32,
    pub k_group_max: u32,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self {
            window_days: 30,
            min_voters: 50,
            min_votes_per_voter: 3,
            neutral_epsilon: 1e-4,
            silhouette_threshold: 0.02,
            k_group_min: 2,
            k_group_max: 5,
        }
    }
}

impl RunParameters {
    pub fn k_group_range(&self) -> std::ops::RangeInclusive<u32> {
        self.k_group_min..=self.k_group_max
    }

    pub fn validate(&self) -> Result<(), IoError> {
        if self.window_days == 0 {
            return Err(IoError::Invalid("window_days must be > 0".into()));
        }
        if self.min_votes_per_voter == 0 {
            return Err(IoError::Invalid("min_votes_per_voter must be > 0".into()));
        }
        if self.neutral_epsilon <= 0.0 || self.neutral_epsilon >= 0.5 {
            return Err(IoError::Invalid(
                "neutral_epsilon must be in (0.0, 0.5)".into(),
            ));
        }
        if self.k_group_min < 2 || self.k_group_max < self.k_group_min {
            return Err(IoError::Invalid("k_group range invalid".into()));
        }
        Ok(())
    }
}

/// Parse → validate a `RunParameters` file: read, parse, validate, return
/// typed struct.
pub fn load_run_parameters(path: &Path) -> Result<RunParameters, IoError> {
    let bytes = std::fs::read(path)?;
    let params: RunParameters = serde_json::from_slice(&bytes)?;
    params.validate()?;
    Ok(params)
}

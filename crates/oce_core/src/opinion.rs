//! The `Opinion` domain and the raw `Vote` record.
//!
//! `Opinion::Neutral` and "no vote cast" are deliberately distinct: a missing
//! vote is absence-of-an-entry in the vote matrix, while `Neutral` is an
//! explicit, ambivalent cast vote encoded as `neutral_epsilon` rather than
//! zero so sparsity-aware centering can still distinguish "voted neutral"
//! from "never voted."

use crate::errors::CoreError;
use crate::ids::{ItemId, VoterId};
use alloc::string::String;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Eq, PartialEq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Opinion {
    Support,
    Oppose,
    Neutral,
}

impl Opinion {
    /// Numeric encoding used by the matrix builder: `+1.0` / `-1.0`, and
    /// `neutral_epsilon` (a small positive constant, not `0.0`) for
    /// `Neutral` so a cast neutral vote still differs from "not voted."
    pub fn encode(self, neutral_epsilon: f64) -> f64 {
        match self {
            Opinion::Support => 1.0,
            Opinion::Oppose => -1.0,
            Opinion::Neutral => neutral_epsilon,
        }
    }

    pub fn from_token(s: &str) -> Result<Self, CoreError> {
        match s {
            "support" => Ok(Opinion::Support),
            "oppose" => Ok(Opinion::Oppose),
            "neutral" => Ok(Opinion::Neutral),
            _ => Err(CoreError::InvalidOpinion),
        }
    }

    pub fn as_token(self) -> &'static str {
        match self {
            Opinion::Support => "support",
            Opinion::Oppose => "oppose",
            Opinion::Neutral => "neutral",
        }
    }
}

/// A single raw vote as recorded by the voting platform. `cast_at` is an
/// RFC3339 UTC timestamp string; parsing/window filtering is the concern of
/// `oce_io`/`oce_algo`, which carry the `chrono` dependency this crate does
/// not need.
#[derive(Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vote {
    pub voter: VoterId,
    pub item: ItemId,
    pub opinion: Opinion,
    pub cast_at: String,
}

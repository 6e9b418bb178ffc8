//! Identifier types: no I/O, ASCII-only, strict shapes.

use crate::errors::CoreError;
use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const MAX_ID_LEN: usize = 256;
const TOKEN_MAX_LEN: usize = 128;

#[inline]
fn is_ascii_no_nul(s: &str) -> bool {
    !s.as_bytes().iter().any(|&b| b == 0 || b > 0x7F)
}

#[inline]
fn is_token(s: &str) -> bool {
    let len = s.len();
    if !(1..=TOKEN_MAX_LEN).contains(&len) {
        return false;
    }
    s.bytes()
        .all(|b| matches!(b, b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_' | b'-' | b':' | b'.'))
}

#[inline]
fn is_lower_hex(s: &str) -> bool {
    s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

#[inline]
fn is_rfc3339_utc_20(ts: &str) -> bool {
    let b = ts.as_bytes();
    if b.len() != 20 {
        return false;
    }
    let digits = |r: core::ops::Range<usize>| b[r].iter().all(|&c| (b'0'..=b'9').contains(&c));
    digits(0..4)
        && b[4] == b'-'
        && digits(5..7)
        && b[7] == b'-'
        && digits(8..10)
        && b[10] == b'T'
        && digits(11..13)
        && b[13] == b':'
        && digits(14..16)
        && b[16] == b':'
        && digits(17..19)
        && b[19] == b'Z'
}

/// An item (news claim/article) being voted on.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ItemId(String);

impl ItemId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ItemId {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !is_ascii_no_nul(s) || s.len() > MAX_ID_LEN || !is_token(s) {
            return Err(CoreError::InvalidToken);
        }
        Ok(Self(s.to_string()))
    }
}

/// A voter, identified either as a reconciled registered account or an
/// anonymous session that has not (yet) been claimed by one.
///
/// `ClaimRegistry` (in `oce_io`) reconciles `Session` voters into
/// `Registered` ones before the matrix builder runs; a `VoterId` surviving
/// into the matrix as `Session` means no claim exists for it.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", content = "id"))]
pub enum VoterId {
    #[cfg_attr(feature = "serde", serde(rename = "registered"))]
    Registered(String),
    #[cfg_attr(feature = "serde", serde(rename = "session"))]
    Session(String),
}

impl VoterId {
    pub fn registered(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if is_token(&id) {
            Ok(Self::Registered(id))
        } else {
            Err(CoreError::InvalidToken)
        }
    }

    pub fn session(id: impl Into<String>) -> Result<Self, CoreError> {
        let id = id.into();
        if is_token(&id) {
            Ok(Self::Session(id))
        } else {
            Err(CoreError::InvalidToken)
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            VoterId::Registered(s) | VoterId::Session(s) => s,
        }
    }

    pub fn is_registered(&self) -> bool {
        matches!(self, VoterId::Registered(_))
    }
}

impl fmt::Display for VoterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VoterId::Registered(s) => write!(f, "reg:{s}"),
            VoterId::Session(s) => write!(f, "ses:{s}"),
        }
    }
}

/// "RUN:" + RFC3339 UTC timestamp + "-" + 8..64 lowercase hex content hash.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct RunId(String);

impl RunId {
    /// Mint a `RunId` from an already-RFC3339-formatted UTC timestamp and a
    /// content hash hex digest (any length in `8..=64`).
    pub fn new(timestamp_utc: &str, hash_hex: &str) -> Result<Self, CoreError> {
        if !is_rfc3339_utc_20(timestamp_utc) {
            return Err(CoreError::InvalidTimestamp);
        }
        if !(8..=64).contains(&hash_hex.len()) || !is_lower_hex(hash_hex) {
            return Err(CoreError::InvalidHex);
        }
        Ok(Self(alloc::format!("RUN:{timestamp_utc}-{hash_hex}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn timestamp_utc(&self) -> &str {
        &self.0[4..24]
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RunId {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("RUN:").ok_or(CoreError::InvalidId)?;
        let (ts, hash) = rest.split_once('-').ok_or(CoreError::InvalidId)?;
        if !is_rfc3339_utc_20(ts) {
            return Err(CoreError::InvalidTimestamp);
        }
        if !(8..=64).contains(&hash.len()) || !is_lower_hex(hash) {
            return Err(CoreError::InvalidId);
        }
        Ok(Self(s.to_string()))
    }
}

/// A cluster at either level (`B` = base, `G` = group), scoped to the run
/// that produced it: `"<RunId>/B<index>"` or `"<RunId>/G<index>"`.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ClusterId(String);

impl ClusterId {
    pub fn base(run_id: &RunId, index: u32) -> Self {
        Self(alloc::format!("{}/B{}", run_id.as_str(), index))
    }

    pub fn group(run_id: &RunId, index: u32) -> Self {
        Self(alloc::format!("{}/G{}", run_id.as_str(), index))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_group(&self) -> bool {
        self.0.contains("/G")
    }
}

impl fmt::Display for ClusterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClusterId {
    type Err = CoreError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (run_part, suffix) = s.rsplit_once('/').ok_or(CoreError::InvalidId)?;
        RunId::from_str(run_part)?;
        let index_digits = suffix
            .strip_prefix('B')
            .or_else(|| suffix.strip_prefix('G'))
            .ok_or(CoreError::InvalidId)?;
        if index_digits.is_empty() || !index_digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidId);
        }
        Ok(Self(s.to_string()))
    }
}

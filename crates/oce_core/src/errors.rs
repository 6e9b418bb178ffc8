//! Minimal error set for core-domain validation & parsing.

use core::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CoreError {
    InvalidId,
    InvalidToken,
    InvalidHex,
    InvalidTimestamp,
    InvalidOpinion,
    DomainOutOfRange(&'static str),
    EmptyChoiceSet,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidId => write!(f, "invalid id"),
            CoreError::InvalidToken => write!(f, "invalid token"),
            CoreError::InvalidHex => write!(f, "invalid hex"),
            CoreError::InvalidTimestamp => write!(f, "invalid timestamp"),
            CoreError::InvalidOpinion => write!(f, "invalid opinion"),
            CoreError::DomainOutOfRange(k) => write!(f, "domain out of range: {k}"),
            CoreError::EmptyChoiceSet => write!(f, "empty choice set"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CoreError {}

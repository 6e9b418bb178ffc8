//! The five-variant error taxonomy the Run Coordinator surfaces. Every
//! component downstream returns its own typed failure; `From` impls here
//! are the single place that collapses those into one of these kinds,
//! funneling every failure mode to a boundary before it reaches a caller.

use oce_algo::{KMeansError, MatrixError, PcaError};
use oce_io::lease::LeaseError;
use oce_io::IoError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ErrorKind {
    #[error("clustering already in progress")]
    AlreadyRunning,

    #[error("insufficient voters: have {have}, need {need}")]
    InsufficientVoters { have: u32, need: u32 },

    #[error("numerical failure: {0}")]
    Numerical(String),

    #[error("vote store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("write conflict: {0}")]
    WriteConflict(String),
}

impl From<LeaseError> for ErrorKind {
    fn from(_: LeaseError) -> Self {
        ErrorKind::AlreadyRunning
    }
}

impl From<MatrixError> for ErrorKind {
    fn from(e: MatrixError) -> Self {
        match e {
            MatrixError::InsufficientVoters { have, need } => ErrorKind::InsufficientVoters {
                have: have as u32,
                need,
            },
            MatrixError::EmptyItemSet => ErrorKind::InsufficientVoters { have: 0, need: 1 },
        }
    }
}

impl From<PcaError> for ErrorKind {
    fn from(e: PcaError) -> Self {
        match e {
            PcaError::Numerical => ErrorKind::Numerical("PCA did not converge".into()),
        }
    }
}

impl From<KMeansError> for ErrorKind {
    fn from(e: KMeansError) -> Self {
        match e {
            KMeansError::ZeroK => ErrorKind::Numerical("k-means requested with k=0".into()),
            KMeansError::TooFewPoints { have, k } => ErrorKind::InsufficientVoters {
                have: have as u32,
                need: k as u32,
            },
        }
    }
}

/// The Vote Store read, the Run Store's read-before-write reconciliation
/// checks, and persistence failures all come back through `oce_io::IoError`.
/// Whether that collapses to `StoreUnavailable` or `WriteConflict` depends
/// on which stage the coordinator was in when it surfaced — see
/// `ErrorKind::from_io` below, used explicitly at each call site instead of
/// a blanket `From` (a blanket impl can't tell a read failure from a write
/// failure).
impl ErrorKind {
    pub fn from_read_io(e: IoError) -> Self {
        ErrorKind::StoreUnavailable(e.to_string())
    }

    pub fn from_write_io(e: IoError) -> Self {
        ErrorKind::WriteConflict(e.to_string())
    }
}

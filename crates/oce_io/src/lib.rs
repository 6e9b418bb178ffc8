//! oce_io — Storage-shaped traits (`VoteStore`, `ClaimRegistry`, `RunStore`,
//! `LeaseManager`), their in-memory and file-backed adapters, canonical JSON,
//! and `RunParameters` configuration loading.
//!
//! No algorithm lives here — this crate only gets data in and artifacts out.

#![forbid(unsafe_code)]

use thiserror::Error;

/// Unified error for every adapter in this crate.
#[derive(Debug, Error)]
pub enum IoError {
    #[error("io/path error: {0}")]
    Path(String),

    #[error("json error at {pointer}: {msg}")]
    Json { pointer: String, msg: String },

    #[error("hash error: {0}")]
    Hash(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid: {0}")]
    Invalid(String),
}

pub type IoResult<T> = Result<T, IoError>;

impl From<std::io::Error> for IoError {
    fn from(e: std::io::Error) -> Self {
        IoError::Path(e.to_string())
    }
}

impl From<serde_json::Error> for IoError {
    fn from(e: serde_json::Error) -> Self {
        IoError::Json {
            pointer: "/".to_string(),
            msg: e.to_string(),
        }
    }
}

pub mod canonical_json;
pub mod claims;
pub mod config;
pub mod hasher;
pub mod lease;
pub mod run_store;
pub mod votes;

pub mod prelude {
    pub use crate::{IoError, IoResult};

    pub use crate::canonical_json::to_canonical_bytes;
    pub use crate::claims::{ClaimRegistry, InMemoryClaimRegistry};
    pub use crate::config::{load_run_parameters, RunParameters};
    pub use crate::hasher::{sha256_canonical, sha256_hex};
    pub use crate::lease::{FsLeaseManager, InMemoryLeaseManager, LeaseError, LeaseManager};
    pub use crate::run_store::{FsRunStore, InMemoryRunStore, RunStore};
    pub use crate::votes::{InMemoryVoteStore, VoteStore};
}

//! oce_core — Core domain types, ids, error kinds, deterministic RNG, and
//! stable ordering for the opinion-clustering engine.
//!
//! This crate is **I/O-free** and has no knowledge of storage, the pipeline,
//! or the query surface — it defines the vocabulary every other crate in the
//! workspace (`oce_io`, `oce_algo`, `oce_pipeline`, `oce_query`, `oce_cli`)
//! shares:
//!
//! - Identifiers: `VoterId`, `ItemId`, `RunId`, `ClusterId`
//! - The `Opinion` domain (support / oppose / neutral) and numeric encoding
//! - Stable ordering helpers used for every documented tie-break
//! - A seeded `TieRng` (ChaCha20) used by k-means initialization and restarts
//!
//! Serialization derives are gated behind the `serde` feature, matching the
//! no_std-friendly posture of the rest of the workspace's core layer.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod determinism;
pub mod errors;
pub mod ids;
pub mod opinion;
pub mod rng;

pub use errors::CoreError;
pub use ids::{ClusterId, ItemId, RunId, VoterId};
pub use opinion::{Opinion, Vote};

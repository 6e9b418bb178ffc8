//! oce_pipeline — the Run Coordinator: deterministic orchestration of the
//! clustering pipeline (load -> reconcile -> build matrix -> project ->
//! base-cluster -> group-cluster -> score -> persist -> classify lineage)
//! under a single-leader lease. Depends on `oce_algo` for the math and
//! `oce_io` for storage-shaped traits; owns the persisted domain model
//! those two don't know about.

#![forbid(unsafe_code)]

pub mod coordinator;
pub mod error;
pub mod model;
pub mod naming;

pub use coordinator::RunCoordinator;
pub use error::ErrorKind;
pub use model::{
    Cluster, ClusterType, ClusterVotingPattern, Lineage, LineageKind, Majority, Membership,
    Projection, Run, RunArtifacts, RunStatus, RunSummary,
};
pub use naming::{ClusterNamer, NamingHint, NoopNamer};

//! The persisted domain model: `Run` and everything it owns. These types
//! are serialized as canonical JSON through `oce_io::RunStore`; nothing in
//! this module touches storage directly.

use oce_core::{ClusterId, ItemId, RunId, VoterId};
use oce_io::config::RunParameters;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One immutable execution of the pipeline. `status` only ever moves
/// forward: `Pending -> Running -> {Completed, Failed}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub created_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
    pub status: RunStatus,
    pub parameters: RunParameters,
    pub n_voters: u32,
    pub n_items: u32,
    pub n_base_clusters: u32,
    pub n_groups: u32,
    pub silhouette: f64,
    pub computation_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterType {
    Base,
    Group,
}

/// `(run, voter)` 2D coordinate, created once and never mutated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Projection {
    pub voter: VoterId,
    pub x: f64,
    pub y: f64,
    pub n_votes_cast: u32,
}

/// One base or group cluster. A base cluster's `parent` is the group
/// `ClusterId` it was assigned to by plurality; a group cluster's `parent`
/// is always `None`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cluster {
    pub id: ClusterId,
    pub cluster_type: ClusterType,
    pub local_id: u32,
    pub size: u32,
    pub centroid_x: f64,
    pub centroid_y: f64,
    pub consensus: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ClusterId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// `(cluster, voter)` pair, unique per cluster type: every voter has
/// exactly one base membership and exactly one group membership in a Run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Membership {
    pub cluster: ClusterId,
    pub voter: VoterId,
    pub distance_to_centroid: f64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Majority {
    Support,
    Oppose,
    Neutral,
}

/// Per-(cluster, item) voting breakdown. Only exists for items that
/// received at least one vote from the cluster's members.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterVotingPattern {
    pub cluster: ClusterId,
    pub item: ItemId,
    pub count_pos: u32,
    pub count_neg: u32,
    pub count_neu: u32,
    pub consensus: f64,
    pub majority: Option<Majority>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineageKind {
    Continuation,
    Split,
    Merge,
    Minor,
}

impl From<oce_algo::LineageKind> for LineageKind {
    fn from(k: oce_algo::LineageKind) -> Self {
        match k {
            oce_algo::LineageKind::Continuation => LineageKind::Continuation,
            oce_algo::LineageKind::Split => LineageKind::Split,
            oce_algo::LineageKind::Merge => LineageKind::Merge,
            oce_algo::LineageKind::Minor => LineageKind::Minor,
        }
    }
}

/// One classified relationship between a group cluster in the previous Run
/// and a group cluster in the current one. Written only after the new Run
/// has transitioned to `completed`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lineage {
    pub from_cluster: ClusterId,
    pub to_cluster: ClusterId,
    pub overlap_count: u32,
    pub pct_from: f64,
    pub pct_to: f64,
    pub kind: LineageKind,
}

/// Everything a completed Run owns, bundled for a single atomic write.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunArtifacts {
    pub run: Run,
    pub projections: Vec<Projection>,
    pub clusters: Vec<Cluster>,
    pub memberships: Vec<Membership>,
    pub patterns: Vec<ClusterVotingPattern>,
    pub lineage: Vec<Lineage>,
}

/// What `RunCoordinator::run` hands back to its caller on success — the
/// aggregates a scheduler or operator cares about, without the full
/// artifact bundle.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub status: RunStatus,
    pub n_voters: u32,
    pub n_items: u32,
    pub n_base_clusters: u32,
    pub n_groups: u32,
    pub silhouette: f64,
    pub computation_ms: u64,
}

impl From<&Run> for RunSummary {
    fn from(run: &Run) -> Self {
        Self {
            run_id: run.id.clone(),
            status: run.status,
            n_voters: run.n_voters,
            n_items: run.n_items,
            n_base_clusters: run.n_base_clusters,
            n_groups: run.n_groups,
            silhouette: run.silhouette,
            computation_ms: run.computation_ms,
        }
    }
}

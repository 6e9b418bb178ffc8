//! oce_algo — the algorithm layer: builds the sparse vote matrix, projects
//! it with sparsity-aware PCA, clusters voters in two passes (base, then
//! group), scores consensus/voting patterns, and classifies lineage against
//! a prior run. Pure computation: no I/O, no storage traits, depends only
//! on `oce_core`.

#![forbid(unsafe_code)]

pub mod base_cluster;
pub mod group_cluster;
pub mod kmeans;
pub mod lineage;
pub mod matrix;
pub mod metrics;
pub mod pca;

pub use base_cluster::{k_base_for, BaseClustering};
pub use group_cluster::{assign_base_clusters_to_groups, GroupClusterConfig, GroupClustering};
pub use kmeans::{weighted_kmeans, KMeansError, KMeansResult};
pub use lineage::{classify_edges, primary_parent, LineageEdge, LineageKind};
pub use matrix::{MatrixConfig, MatrixError, VoteMatrix};
pub use metrics::{
    classify, cluster_consensus, pairwise_similarity, voting_pattern, Category, VotingPattern,
};
pub use pca::{project, project_jittered, PcaConfig, PcaError, Projection};

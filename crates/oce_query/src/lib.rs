//! oce_query — the read-only surface over persisted Runs: the latest
//! completed Run's summary/projections/group clusters, a voter's current
//! bubble, a cluster's voting patterns ordered by descending consensus, a
//! window of lineage sets across consecutive runs, and the API-only
//! pairwise voter similarity computation (never invoked from the batch
//! pipeline itself — see `oce_algo::metrics::pairwise_similarity`'s own
//! doc comment).
//!
//! Every function here is pure with respect to storage: it reads an
//! `oce_io::RunStore` (and, for pairwise similarity, an `oce_io::VoteStore`)
//! and returns typed response structs. No caching, no mutation — the
//! caller's HTTP/gRPC layer owns both.

#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use oce_algo::metrics::{classify, Category};
use oce_core::{ClusterId, ItemId, RunId, VoterId};
use oce_io::votes::VoteStore;
use oce_io::IoResult;
use oce_pipeline::{
    Cluster, ClusterType, ClusterVotingPattern, Lineage, Projection, Run, RunArtifacts, RunStatus,
};

/// The latest completed Run's summary, voter projections, and group
/// clusters. Base clusters are deliberately omitted — they're an
/// intermediate clustering step never shown to an end user.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LatestRunView {
    pub run: Run,
    pub projections: Vec<Projection>,
    pub group_clusters: Vec<Cluster>,
}

/// A voter's group-cluster assignment in the latest completed Run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VoterBubble {
    pub run_id: RunId,
    pub cluster: ClusterId,
    pub distance_to_centroid: f64,
}

/// One `(run, next_run)` step of a lineage window: the `Lineage` edges
/// recorded when `next` completed against `from`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LineageStep {
    pub from_run: RunId,
    pub to_run: RunId,
    pub edges: Vec<Lineage>,
}

fn load_artifacts(store: &dyn oce_io::run_store::RunStore, id: &RunId) -> IoResult<Option<RunArtifacts>> {
    let Some(bytes) = store.get(id)? else {
        return Ok(None);
    };
    let artifacts: RunArtifacts = serde_json::from_slice(&bytes)
        .map_err(|e| oce_io::IoError::Json { pointer: "/".into(), msg: e.to_string() })?;
    Ok(Some(artifacts))
}

/// All run ids with a `completed` Run, newest first.
fn completed_run_ids_desc(store: &dyn oce_io::run_store::RunStore) -> IoResult<Vec<(RunId, RunArtifacts)>> {
    let mut out = Vec::new();
    for id in store.list_run_ids()?.into_iter().rev() {
        if let Some(artifacts) = load_artifacts(store, &id)? {
            if artifacts.run.status == RunStatus::Completed {
                out.push((id, artifacts));
            }
        }
    }
    Ok(out)
}

/// The most recent `completed` Run, or `None` if none exists yet. A
/// `failed`/`running` Run is never returned here even if it is the most
/// recently created — this surface only ever exposes completed state.
pub fn latest_run(store: &dyn oce_io::run_store::RunStore) -> IoResult<Option<LatestRunView>> {
    let mut completed = completed_run_ids_desc(store)?;
    let Some((_, artifacts)) = completed.drain(..1).next() else {
        return Ok(None);
    };
    let group_clusters: Vec<Cluster> = artifacts
        .clusters
        .into_iter()
        .filter(|c| c.cluster_type == ClusterType::Group)
        .collect();
    Ok(Some(LatestRunView {
        run: artifacts.run,
        projections: artifacts.projections,
        group_clusters,
    }))
}

/// The given voter's group cluster in the latest completed Run, or `None`
/// if no completed Run exists or the voter wasn't present in it.
pub fn voter_bubble(
    store: &dyn oce_io::run_store::RunStore,
    voter: &VoterId,
) -> IoResult<Option<VoterBubble>> {
    let mut completed = completed_run_ids_desc(store)?;
    let Some((run_id, artifacts)) = completed.drain(..1).next() else {
        return Ok(None);
    };
    let membership = artifacts
        .memberships
        .into_iter()
        .find(|m| &m.voter == voter && m.cluster.is_group());
    Ok(membership.map(|m| VoterBubble {
        run_id,
        cluster: m.cluster,
        distance_to_centroid: m.distance_to_centroid,
    }))
}

/// Every `ClusterVotingPattern` row for `cluster`, ordered by descending
/// consensus (ties keep the store's item order, which is ascending item
/// id — see `oce_algo::matrix::build`).
pub fn cluster_patterns(
    store: &dyn oce_io::run_store::RunStore,
    run_id: &RunId,
    cluster: &ClusterId,
) -> IoResult<Vec<ClusterVotingPattern>> {
    let Some(artifacts) = load_artifacts(store, run_id)? else {
        return Ok(Vec::new());
    };
    let mut patterns: Vec<ClusterVotingPattern> = artifacts
        .patterns
        .into_iter()
        .filter(|p| &p.cluster == cluster)
        .collect();
    patterns.sort_by(|a, b| {
        b.consensus
            .partial_cmp(&a.consensus)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.item.as_str().cmp(b.item.as_str()))
    });
    Ok(patterns)
}

/// Cluster patterns for `cluster` in the latest completed Run.
pub fn cluster_patterns_latest(
    store: &dyn oce_io::run_store::RunStore,
    cluster: &ClusterId,
) -> IoResult<Vec<ClusterVotingPattern>> {
    let mut completed = completed_run_ids_desc(store)?;
    let Some((run_id, _)) = completed.drain(..1).next() else {
        return Ok(Vec::new());
    };
    cluster_patterns(store, &run_id, cluster)
}

/// The last `n` `(run, run.next)` lineage steps, oldest first, walking
/// completed runs in chronological order. A run with no lineage rows at all
/// (e.g. the very first completed Run) contributes a step with empty
/// `edges`, not a gap — callers can tell "no prior run" from "prior run
/// with nothing surviving the classification thresholds" by checking
/// whether `edges` is empty.
pub fn lineage_window(
    store: &dyn oce_io::run_store::RunStore,
    n: usize,
) -> IoResult<Vec<LineageStep>> {
    let mut completed = completed_run_ids_desc(store)?;
    completed.reverse(); // oldest first
    let mut steps = Vec::new();
    for window in completed.windows(2) {
        let (from_id, _) = &window[0];
        let (to_id, to_artifacts) = &window[1];
        steps.push(LineageStep {
            from_run: from_id.clone(),
            to_run: to_id.clone(),
            edges: to_artifacts.lineage.clone(),
        });
    }
    if steps.len() > n {
        let start = steps.len() - n;
        steps.drain(..start);
    }
    Ok(steps)
}

/// Pairwise agreement between two voters over the items they both voted
/// on: the fraction of co-voted items where their discrete opinion category
/// (support/oppose/neutral) matches exactly. `None` when they share no
/// co-voted item. API/research use only — the batch pipeline never calls
/// this.
pub fn pairwise_similarity(
    votes: &dyn VoteStore,
    since: DateTime<Utc>,
    voter_a: &VoterId,
    voter_b: &VoterId,
) -> IoResult<Option<f64>> {
    let all = votes.votes_cast_since(since)?;
    let mut by_a: BTreeMap<ItemId, Category> = BTreeMap::new();
    let mut by_b: BTreeMap<ItemId, Category> = BTreeMap::new();
    let epsilon = 1e-4;
    for vote in &all {
        let category = |v: &oce_core::Vote| classify(v.opinion.encode(epsilon));
        if &vote.voter == voter_a {
            by_a.insert(vote.item.clone(), category(vote));
        } else if &vote.voter == voter_b {
            by_b.insert(vote.item.clone(), category(vote));
        }
    }
    let mut shared = 0u32;
    let mut matching = 0u32;
    for (item, cat_a) in &by_a {
        if let Some(cat_b) = by_b.get(item) {
            shared += 1;
            if cat_a == cat_b {
                matching += 1;
            }
        }
    }
    if shared == 0 {
        return Ok(None);
    }
    Ok(Some(matching as f64 / shared as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use oce_core::Opinion;
    use oce_io::run_store::{InMemoryRunStore, RunStore};
    use oce_io::votes::InMemoryVoteStore;
    use oce_pipeline::{ClusterType, Membership};
    use std::str::FromStr;

    fn v(voter: &str, item: &str, op: Opinion, at: &str) -> oce_core::Vote {
        oce_core::Vote {
            voter: VoterId::registered(voter).unwrap(),
            item: ItemId::from_str(item).unwrap(),
            opinion: op,
            cast_at: at.to_string(),
        }
    }

    fn run_id(ts: &str, hash: &str) -> RunId {
        RunId::new(ts, hash).unwrap()
    }

    fn completed_artifacts(run_id: RunId, voters: &[&str], group_of: usize) -> RunArtifacts {
        let run = Run {
            id: run_id.clone(),
            created_at: run_id.timestamp_utc().to_string(),
            completed_at: Some(run_id.timestamp_utc().to_string()),
            status: RunStatus::Completed,
            parameters: oce_io::config::RunParameters::default(),
            n_voters: voters.len() as u32,
            n_items: 1,
            n_base_clusters: 1,
            n_groups: 2,
            silhouette: 0.5,
            computation_ms: 1,
            error_message: None,
        };
        let group_cluster = ClusterId::group(&run_id, group_of as u32);
        let other_group = ClusterId::group(&run_id, (1 - group_of) as u32);
        let memberships: Vec<Membership> = voters
            .iter()
            .enumerate()
            .map(|(i, voter)| Membership {
                cluster: if i == 0 { group_cluster.clone() } else { other_group.clone() },
                voter: VoterId::registered(*voter).unwrap(),
                distance_to_centroid: 0.1,
            })
            .collect();
        let clusters = vec![Cluster {
            id: group_cluster.clone(),
            cluster_type: ClusterType::Group,
            local_id: group_of as u32,
            size: 1,
            centroid_x: 0.0,
            centroid_y: 0.0,
            consensus: 1.0,
            parent: None,
            name: None,
            description: None,
        }];
        let patterns = vec![
            ClusterVotingPattern {
                cluster: group_cluster.clone(),
                item: ItemId::from_str("i1").unwrap(),
                count_pos: 1,
                count_neg: 0,
                count_neu: 0,
                consensus: 1.0,
                majority: Some(oce_pipeline::Majority::Support),
            },
            ClusterVotingPattern {
                cluster: group_cluster.clone(),
                item: ItemId::from_str("i2").unwrap(),
                count_pos: 0,
                count_neg: 1,
                count_neu: 0,
                consensus: 0.4,
                majority: Some(oce_pipeline::Majority::Oppose),
            },
        ];
        RunArtifacts {
            run,
            projections: Vec::new(),
            clusters,
            memberships,
            patterns,
            lineage: Vec::new(),
        }
    }

    fn seed(store: &InMemoryRunStore, id: RunId, artifacts: &RunArtifacts) {
        let bytes = oce_io::canonical_json::to_canonical_bytes(artifacts).unwrap();
        store.put(&id, &bytes).unwrap();
    }

    #[test]
    fn latest_run_ignores_failed_and_returns_newest_completed() {
        let store = InMemoryRunStore::new();
        let old = run_id("2026-01-01T00:00:00Z", "aaaaaaaa");
        let bad = run_id("2026-06-01T00:00:00Z", "bbbbbbbb");
        let good = run_id("2026-07-28T00:00:00Z", "cccccccc");

        seed(&store, old.clone(), &completed_artifacts(old.clone(), &["u1", "u2"], 0));

        let mut failed = completed_artifacts(bad.clone(), &["u1", "u2"], 0);
        failed.run.status = RunStatus::Failed;
        seed(&store, bad.clone(), &failed);

        seed(&store, good.clone(), &completed_artifacts(good.clone(), &["u1", "u2"], 1));

        let view = latest_run(&store).unwrap().unwrap();
        assert_eq!(view.run.id, good);
        assert_eq!(view.group_clusters.len(), 1);
    }

    #[test]
    fn latest_run_is_none_with_no_completed_runs() {
        let store = InMemoryRunStore::new();
        assert!(latest_run(&store).unwrap().is_none());
    }

    #[test]
    fn voter_bubble_finds_group_membership() {
        let store = InMemoryRunStore::new();
        let id = run_id("2026-07-28T00:00:00Z", "deadbeef");
        seed(&store, id.clone(), &completed_artifacts(id.clone(), &["u1", "u2"], 0));

        let bubble = voter_bubble(&store, &VoterId::registered("u1").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(bubble.run_id, id);
        assert!(bubble.cluster.is_group());
    }

    #[test]
    fn voter_bubble_is_none_for_unknown_voter() {
        let store = InMemoryRunStore::new();
        let id = run_id("2026-07-28T00:00:00Z", "deadbeef");
        seed(&store, id.clone(), &completed_artifacts(id, &["u1"], 0));

        let bubble = voter_bubble(&store, &VoterId::registered("ghost").unwrap()).unwrap();
        assert!(bubble.is_none());
    }

    #[test]
    fn cluster_patterns_ordered_by_descending_consensus() {
        let store = InMemoryRunStore::new();
        let id = run_id("2026-07-28T00:00:00Z", "deadbeef");
        let artifacts = completed_artifacts(id.clone(), &["u1", "u2"], 0);
        let cluster = artifacts.clusters[0].id.clone();
        seed(&store, id.clone(), &artifacts);

        let patterns = cluster_patterns_latest(&store, &cluster).unwrap();
        assert_eq!(patterns.len(), 2);
        assert!(patterns[0].consensus >= patterns[1].consensus);
        assert_eq!(patterns[0].item.as_str(), "i1");
    }

    #[test]
    fn lineage_window_pairs_consecutive_completed_runs() {
        let store = InMemoryRunStore::new();
        let a = run_id("2026-01-01T00:00:00Z", "aaaaaaaa");
        let b = run_id("2026-02-01T00:00:00Z", "bbbbbbbb");
        seed(&store, a.clone(), &completed_artifacts(a.clone(), &["u1"], 0));
        let mut b_artifacts = completed_artifacts(b.clone(), &["u1"], 0);
        b_artifacts.lineage.push(Lineage {
            from_cluster: ClusterId::group(&a, 0),
            to_cluster: ClusterId::group(&b, 0),
            overlap_count: 1,
            pct_from: 1.0,
            pct_to: 1.0,
            kind: oce_pipeline::LineageKind::Continuation,
        });
        seed(&store, b.clone(), &b_artifacts);

        let window = lineage_window(&store, 5).unwrap();
        assert_eq!(window.len(), 1);
        assert_eq!(window[0].from_run, a);
        assert_eq!(window[0].to_run, b);
        assert_eq!(window[0].edges.len(), 1);
    }

    #[test]
    fn lineage_window_truncates_to_last_n() {
        let store = InMemoryRunStore::new();
        let ids: Vec<RunId> = (1..=4)
            .map(|i| run_id(&format!("2026-0{i}-01T00:00:00Z"), &format!("{i:08x}")))
            .collect();
        for id in &ids {
            seed(&store, id.clone(), &completed_artifacts(id.clone(), &["u1"], 0));
        }
        let window = lineage_window(&store, 2).unwrap();
        assert_eq!(window.len(), 2);
        assert_eq!(window[0].from_run, ids[1]);
        assert_eq!(window[1].from_run, ids[2]);
    }

    #[test]
    fn pairwise_similarity_none_with_no_shared_items() {
        let store = InMemoryVoteStore::new();
        store.insert(v("u1", "i1", Opinion::Support, "2026-07-01T00:00:00Z"));
        store.insert(v("u2", "i2", Opinion::Oppose, "2026-07-01T00:00:00Z"));
        let since: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let sim = pairwise_similarity(
            &store,
            since,
            &VoterId::registered("u1").unwrap(),
            &VoterId::registered("u2").unwrap(),
        )
        .unwrap();
        assert_eq!(sim, None);
    }

    #[test]
    fn pairwise_similarity_counts_matching_categories() {
        let store = InMemoryVoteStore::new();
        store.insert(v("u1", "i1", Opinion::Support, "2026-07-01T00:00:00Z"));
        store.insert(v("u1", "i2", Opinion::Oppose, "2026-07-01T00:00:00Z"));
        store.insert(v("u1", "i3", Opinion::Neutral, "2026-07-01T00:00:00Z"));
        store.insert(v("u2", "i1", Opinion::Support, "2026-07-01T00:00:00Z"));
        store.insert(v("u2", "i2", Opinion::Support, "2026-07-01T00:00:00Z"));
        store.insert(v("u2", "i3", Opinion::Neutral, "2026-07-01T00:00:00Z"));
        let since: DateTime<Utc> = "2026-01-01T00:00:00Z".parse().unwrap();
        let sim = pairwise_similarity(
            &store,
            since,
            &VoterId::registered("u1").unwrap(),
            &VoterId::registered("u2").unwrap(),
        )
        .unwrap()
        .unwrap();
        // i1 and i3 match, i2 doesn't: 2/3.
        assert!((sim - 2.0 / 3.0).abs() < 1e-9);
    }
}

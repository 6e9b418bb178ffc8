//! `RunCoordinator` — acquires the single-leader lease, loads and
//! reconciles votes, runs the matrix/PCA/clustering/metrics stages in
//! order, and publishes a Run atomically. Everything before publication is
//! pure computation over an in-memory snapshot; everything after is a
//! single write.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;

use oce_algo::{
    base_cluster, group_cluster,
    group_cluster::GroupClusterConfig,
    lineage::{classify_edges, LineageEdge},
    matrix::{self, MatrixConfig},
    metrics::{cluster_consensus, voting_pattern, Category},
    pca::{self, PcaConfig},
};
use oce_core::{ClusterId, ItemId, RunId, Vote, VoterId};
use oce_io::claims::ClaimRegistry;
use oce_io::config::RunParameters;
use oce_io::lease::LeaseManager;
use oce_io::run_store::RunStore;
use oce_io::votes::VoteStore;
use oce_io::{canonical_json::to_canonical_bytes, hasher::sha256_canonical};

use crate::error::ErrorKind;
use crate::model::{
    Cluster, ClusterType, ClusterVotingPattern, Lineage, Majority, Membership, Projection, Run,
    RunArtifacts, RunStatus, RunSummary,
};
use crate::naming::{ClusterNamer, NamingHint};

const LEASE_NAME: &str = "voter-clustering";

pub struct RunCoordinator<Votes, Claims, Runs, Leases, Namer> {
    votes: Votes,
    claims: Claims,
    runs: Runs,
    leases: Leases,
    namer: Namer,
}

impl<Votes, Claims, Runs, Leases, Namer> RunCoordinator<Votes, Claims, Runs, Leases, Namer>
where
    Votes: VoteStore,
    Claims: ClaimRegistry,
    Runs: RunStore,
    Leases: LeaseManager,
    Namer: ClusterNamer,
{
    pub fn new(votes: Votes, claims: Claims, runs: Runs, leases: Leases, namer: Namer) -> Self {
        Self {
            votes,
            claims,
            runs,
            leases,
            namer,
        }
    }

    /// Run one pass of the pipeline "now". Acquires the lease first thing;
    /// releases it on every exit path.
    pub fn run(&self, now: DateTime<Utc>, params: RunParameters) -> Result<RunSummary, ErrorKind> {
        self.leases.try_acquire(LEASE_NAME, now)?;
        let result = self.execute(now, &params);
        self.leases.release(LEASE_NAME);
        result
    }

    fn execute(&self, now: DateTime<Utc>, params: &RunParameters) -> Result<RunSummary, ErrorKind> {
        let started = Instant::now();
        let timestamp_utc = now.to_rfc3339_opts(SecondsFormat::Secs, true);

        let (run_id, run_seed) = mint_run_identity(&timestamp_utc, params)?;

        match self.build_and_publish(&run_id, &timestamp_utc, run_seed, now, params, &started) {
            Ok(summary) => Ok(summary),
            Err(err) => {
                self.publish_failure(&run_id, &timestamp_utc, params, &started, &err);
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn build_and_publish(
        &self,
        run_id: &RunId,
        timestamp_utc: &str,
        run_seed: u64,
        now: DateTime<Utc>,
        params: &RunParameters,
        started: &Instant,
    ) -> Result<RunSummary, ErrorKind> {
        let since = now - Duration::days(params.window_days as i64);
        let raw_votes = self
            .votes
            .votes_cast_since(since)
            .map_err(ErrorKind::from_read_io)?;
        let reconciled = reconcile_votes(raw_votes, &self.claims).map_err(ErrorKind::from_read_io)?;

        let matrix_cfg = MatrixConfig {
            min_voters: params.min_voters,
            min_votes_per_voter: params.min_votes_per_voter,
            neutral_epsilon: params.neutral_epsilon,
        };
        let vote_matrix = matrix::build(&reconciled, &matrix_cfg)?;

        let pca_cfg = PcaConfig { n_components: 2 };
        let projection = match pca::project(&vote_matrix, &pca_cfg) {
            Ok(p) => p,
            Err(_) => pca::project_jittered(&vote_matrix, &pca_cfg, run_seed)?,
        };

        let base = base_cluster::cluster(&vote_matrix, &projection, run_seed)?;

        let weights: Vec<f64> = vote_matrix.row_nnz.iter().map(|&n| n as f64).collect();
        let group_cfg = GroupClusterConfig {
            k_min: *params.k_group_range().start(),
            k_max: *params.k_group_range().end(),
            silhouette_threshold: params.silhouette_threshold,
        };
        let group = group_cluster::cluster(&projection.coords, &weights, run_seed, &group_cfg)?;
        let base_to_group = group_cluster::assign_base_clusters_to_groups(
            &base.assignments,
            &group.voter_labels,
            base.k,
            group.k,
        );

        let n_voters = vote_matrix.n_voters();
        let n_items = vote_matrix.n_items();

        let group_member_rows: Vec<Vec<usize>> = rows_by_label(&group.voter_labels, group.k);
        let base_member_rows: Vec<Vec<usize>> = rows_by_label(&base.assignments, base.k);

        let mut clusters = Vec::with_capacity(base.k + group.k);
        let mut patterns = Vec::new();

        for g in 0..group.k {
            let id = ClusterId::group(run_id, g as u32);
            let members = &group_member_rows[g];
            let consensus = cluster_consensus(&vote_matrix, members);
            clusters.push(Cluster {
                id: id.clone(),
                cluster_type: ClusterType::Group,
                local_id: g as u32,
                size: members.len() as u32,
                centroid_x: group.centroids[g][0],
                centroid_y: group.centroids[g][1],
                consensus,
                parent: None,
                name: None,
                description: None,
            });
            patterns.extend(patterns_for_cluster(&vote_matrix, &id, members, n_items));
        }

        for b in 0..base.k {
            let id = ClusterId::base(run_id, b as u32);
            let members = &base_member_rows[b];
            let consensus = cluster_consensus(&vote_matrix, members);
            let parent = ClusterId::group(run_id, base_to_group[b] as u32);
            clusters.push(Cluster {
                id: id.clone(),
                cluster_type: ClusterType::Base,
                local_id: b as u32,
                size: members.len() as u32,
                centroid_x: base.centroids[b][0],
                centroid_y: base.centroids[b][1],
                consensus,
                parent: Some(parent),
                name: None,
                description: None,
            });
            patterns.extend(patterns_for_cluster(&vote_matrix, &id, members, n_items));
        }

        let mut projections = Vec::with_capacity(n_voters);
        let mut memberships = Vec::with_capacity(n_voters * 2);
        for row in 0..n_voters {
            let voter = vote_matrix.voter_ids[row].clone();
            projections.push(Projection {
                voter: voter.clone(),
                x: projection.coords[row][0],
                y: projection.coords[row][1],
                n_votes_cast: vote_matrix.row_nnz[row],
            });

            let base_idx = base.assignments[row];
            memberships.push(Membership {
                cluster: ClusterId::base(run_id, base_idx as u32),
                voter: voter.clone(),
                distance_to_centroid: euclidean(&projection.coords[row], &base.centroids[base_idx]),
            });

            let group_idx = group.voter_labels[row];
            memberships.push(Membership {
                cluster: ClusterId::group(run_id, group_idx as u32),
                voter,
                distance_to_centroid: euclidean(&projection.coords[row], &group.centroids[group_idx]),
            });
        }

        let lineage = self.compute_lineage(&clusters, &memberships)?;

        let completed_at = timestamp_utc.to_string();
        let run = Run {
            id: run_id.clone(),
            created_at: timestamp_utc.to_string(),
            completed_at: Some(completed_at),
            status: RunStatus::Completed,
            parameters: params.clone(),
            n_voters: n_voters as u32,
            n_items: n_items as u32,
            n_base_clusters: base.k as u32,
            n_groups: group.k as u32,
            silhouette: group.silhouette,
            computation_ms: started.elapsed().as_millis() as u64,
            error_message: None,
        };
        let summary = RunSummary::from(&run);

        let artifacts = RunArtifacts {
            run,
            projections,
            clusters,
            memberships,
            patterns,
            lineage,
        };
        let bytes = to_canonical_bytes(&artifacts).map_err(ErrorKind::from_write_io)?;
        self.runs.put(run_id, &bytes).map_err(ErrorKind::from_write_io)?;

        self.fire_naming_hook(run_id, artifacts);

        Ok(summary)
    }

    /// Classify lineage against the immediately previous *completed* Run, if
    /// any. A `failed` Run never counts as a predecessor, so this walks
    /// `list_run_ids` from the end and skips anything not `Completed`. A
    /// no-op (empty lineage) when no completed Run exists yet.
    fn compute_lineage(
        &self,
        new_clusters: &[Cluster],
        new_memberships: &[Membership],
    ) -> Result<Vec<Lineage>, ErrorKind> {
        let ids = self.runs.list_run_ids().map_err(ErrorKind::from_read_io)?;
        let mut prior: Option<RunArtifacts> = None;
        for id in ids.into_iter().rev() {
            let Some(bytes) = self.runs.get(&id).map_err(ErrorKind::from_read_io)? else {
                continue;
            };
            let artifacts: RunArtifacts = serde_json::from_slice(&bytes)
                .map_err(|e| ErrorKind::StoreUnavailable(e.to_string()))?;
            if artifacts.run.status == RunStatus::Completed {
                prior = Some(artifacts);
                break;
            }
        }
        let Some(prior) = prior else {
            return Ok(Vec::new());
        };

        let prior_groups = group_member_sets(&prior.clusters, &prior.memberships);
        let new_groups = group_member_sets(new_clusters, new_memberships);

        let edges: Vec<LineageEdge> = classify_edges(&prior_groups, &new_groups);
        Ok(edges
            .into_iter()
            .map(|e| Lineage {
                from_cluster: e.prior,
                to_cluster: e.new,
                overlap_count: e.overlap as u32,
                pct_from: e.pct_from,
                pct_to: e.pct_to,
                kind: e.kind.into(),
            })
            .collect())
    }

    /// Best-effort: failures here are logged and swallowed, never
    /// propagated — naming must not affect the already-published Run.
    fn fire_naming_hook(&self, run_id: &RunId, mut artifacts: RunArtifacts) {
        let mut updated = false;
        for cluster in artifacts.clusters.iter_mut() {
            if cluster.cluster_type != ClusterType::Group {
                continue;
            }
            let mut top_items: Vec<(ItemId, f64)> = artifacts
                .patterns
                .iter()
                .filter(|p| p.cluster == cluster.id)
                .map(|p| (p.item.clone(), p.consensus))
                .collect();
            top_items.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            let hint = NamingHint {
                top_items_by_consensus: top_items.into_iter().take(5).map(|(i, _)| i).collect(),
                top_entities: Vec::new(),
            };
            if let Some((name, description)) = self.namer.name_cluster(&hint) {
                cluster.name = Some(name);
                cluster.description = Some(description);
                updated = true;
            }
        }
        if !updated {
            return;
        }
        match to_canonical_bytes(&artifacts) {
            Ok(bytes) => {
                if let Err(e) = self.runs.put(run_id, &bytes) {
                    eprintln!("cluster-naming hook: failed to persist names for {run_id}: {e}");
                }
            }
            Err(e) => eprintln!("cluster-naming hook: failed to encode names for {run_id}: {e}"),
        }
    }

    fn publish_failure(
        &self,
        run_id: &RunId,
        timestamp_utc: &str,
        params: &RunParameters,
        started: &Instant,
        err: &ErrorKind,
    ) {
        let run = Run {
            id: run_id.clone(),
            created_at: timestamp_utc.to_string(),
            completed_at: None,
            status: RunStatus::Failed,
            parameters: params.clone(),
            n_voters: 0,
            n_items: 0,
            n_base_clusters: 0,
            n_groups: 0,
            silhouette: 0.0,
            computation_ms: started.elapsed().as_millis() as u64,
            error_message: Some(err.to_string()),
        };
        let artifacts = RunArtifacts {
            run,
            projections: Vec::new(),
            clusters: Vec::new(),
            memberships: Vec::new(),
            patterns: Vec::new(),
            lineage: Vec::new(),
        };
        match to_canonical_bytes(&artifacts) {
            Ok(bytes) => {
                if let Err(e) = self.runs.put(run_id, &bytes) {
                    eprintln!("failed to persist failed-run record for {run_id}: {e}");
                }
            }
            Err(e) => eprintln!("failed to encode failed-run record for {run_id}: {e}"),
        }
    }
}

#[derive(Serialize)]
struct RunSeedInput<'a> {
    timestamp: &'a str,
    parameters: &'a RunParameters,
}

/// Mint the `RunId` (and the deterministic k-means seed derived from the
/// same hash) from the timestamp and trigger parameters alone, before any
/// vote data is read. This sidesteps the circularity of hashing the final
/// artifact (which would itself contain `ClusterId`s built from the
/// `RunId`), and lets a failed Run still get a stable identity to publish
/// its failure record under.
fn mint_run_identity(timestamp_utc: &str, params: &RunParameters) -> Result<(RunId, u64), ErrorKind> {
    let seed_input = RunSeedInput {
        timestamp: timestamp_utc,
        parameters: params,
    };
    let hash = sha256_canonical(&seed_input)
        .map_err(|e| ErrorKind::Numerical(format!("failed to mint run id: {e}")))?;
    let run_id = RunId::new(timestamp_utc, &hash)
        .map_err(|e| ErrorKind::Numerical(format!("failed to mint run id: {e:?}")))?;
    let seed = u64::from_str_radix(&hash[0..16], 16).unwrap_or(0);
    Ok((run_id, seed))
}

/// Reconcile session voters into their claimed registered identity and drop
/// duplicate `(voter, item)` pairs: a vote cast directly by the registered
/// identity wins over one that only resolves to it through a claim,
/// regardless of timestamp; otherwise the most recent vote wins.
fn reconcile_votes(votes: Vec<Vote>, claims: &impl ClaimRegistry) -> oce_io::IoResult<Vec<Vote>> {
    let mut kept: HashMap<(VoterId, ItemId), (Vote, bool)> = HashMap::new();
    for vote in votes {
        let originally_registered = vote.voter.is_registered();
        let resolved = claims.resolve(&vote.voter)?;
        let key = (resolved.clone(), vote.item.clone());
        let mut candidate = vote;
        candidate.voter = resolved;

        match kept.remove(&key) {
            None => {
                kept.insert(key, (candidate, originally_registered));
            }
            Some((existing, existing_registered)) => {
                let replace = match (originally_registered, existing_registered) {
                    (true, false) => true,
                    (false, true) => false,
                    _ => cast_at(&candidate) >= cast_at(&existing),
                };
                if replace {
                    kept.insert(key, (candidate, originally_registered));
                } else {
                    kept.insert(key, (existing, existing_registered));
                }
            }
        }
    }
    Ok(kept.into_values().map(|(v, _)| v).collect())
}

fn cast_at(vote: &Vote) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&vote.cast_at)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f64>().sqrt()
}

fn rows_by_label(labels: &[usize], k: usize) -> Vec<Vec<usize>> {
    let mut out = vec![Vec::new(); k];
    for (row, &label) in labels.iter().enumerate() {
        out[label].push(row);
    }
    out
}

fn patterns_for_cluster(
    vote_matrix: &matrix::VoteMatrix,
    cluster_id: &ClusterId,
    members: &[usize],
    n_items: usize,
) -> Vec<ClusterVotingPattern> {
    let mut out = Vec::new();
    for col in 0..n_items {
        let p = voting_pattern(vote_matrix, members, col);
        if p.support == 0 && p.oppose == 0 && p.neutral == 0 {
            continue;
        }
        out.push(ClusterVotingPattern {
            cluster: cluster_id.clone(),
            item: vote_matrix.item_ids[col].clone(),
            count_pos: p.support,
            count_neg: p.oppose,
            count_neu: p.neutral,
            consensus: p.consensus.unwrap_or(0.0),
            majority: p.majority.map(|c| match c {
                Category::Support => Majority::Support,
                Category::Oppose => Majority::Oppose,
                Category::Neutral => Majority::Neutral,
            }),
        });
    }
    out
}

fn group_member_sets(
    clusters: &[Cluster],
    memberships: &[Membership],
) -> Vec<(ClusterId, BTreeSet<VoterId>)> {
    clusters
        .iter()
        .filter(|c| c.cluster_type == ClusterType::Group)
        .map(|c| {
            let members: BTreeSet<VoterId> = memberships
                .iter()
                .filter(|m| m.cluster == c.id)
                .map(|m| m.voter.clone())
                .collect();
            (c.id.clone(), members)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use oce_core::{ItemId, Opinion, VoterId};
    use oce_io::claims::InMemoryClaimRegistry;
    use oce_io::lease::InMemoryLeaseManager;
    use oce_io::run_store::InMemoryRunStore;
    use oce_io::votes::InMemoryVoteStore;
    use std::str::FromStr;

    use crate::naming::NoopNamer;

    fn vote(voter: VoterId, item: &str, opinion: Opinion, cast_at: &str) -> Vote {
        Vote {
            voter,
            item: ItemId::from_str(item).unwrap(),
            opinion,
            cast_at: cast_at.to_string(),
        }
    }

    fn seed_votes(store: &InMemoryVoteStore, n: usize, opinion_a: Opinion, opinion_b: Opinion) {
        for i in 0..n {
            let voter = VoterId::registered(format!("voter-{i}")).unwrap();
            store.insert(vote(voter.clone(), "item-a", opinion_a, "2026-07-20T00:00:00Z"));
            store.insert(vote(voter, "item-b", opinion_b, "2026-07-20T00:00:00Z"));
        }
    }

    fn coordinator() -> RunCoordinator<
        InMemoryVoteStore,
        InMemoryClaimRegistry,
        InMemoryRunStore,
        InMemoryLeaseManager,
        NoopNamer,
    > {
        RunCoordinator::new(
            InMemoryVoteStore::new(),
            InMemoryClaimRegistry::new(),
            InMemoryRunStore::new(),
            InMemoryLeaseManager::new(),
            NoopNamer,
        )
    }

    #[test]
    fn insufficient_voters_fails_and_leaves_no_dependent_rows() {
        let coord = coordinator();
        seed_votes(&coord.votes, 5, Opinion::Support, Opinion::Oppose);
        let now: DateTime<Utc> = "2026-07-28T00:00:00Z".parse().unwrap();
        let params = RunParameters {
            min_voters: 20,
            ..RunParameters::default()
        };
        let err = coord.run(now, params).unwrap_err();
        assert!(matches!(err, ErrorKind::InsufficientVoters { .. }));
        assert_eq!(coord.runs.list_run_ids().unwrap().len(), 1);
        let bytes = coord
            .runs
            .get(&coord.runs.list_run_ids().unwrap()[0])
            .unwrap()
            .unwrap();
        let artifacts: RunArtifacts = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(artifacts.run.status, RunStatus::Failed);
        assert!(artifacts.clusters.is_empty());
    }

    #[test]
    fn trivial_separation_yields_two_groups() {
        let coord = coordinator();
        for i in 0..20 {
            let voter = VoterId::registered(format!("a-{i}")).unwrap();
            coord.votes.insert(vote(voter.clone(), "i1", Opinion::Support, "2026-07-20T00:00:00Z"));
            coord.votes.insert(vote(voter, "i2", Opinion::Oppose, "2026-07-20T00:00:00Z"));
        }
        for i in 0..20 {
            let voter = VoterId::registered(format!("b-{i}")).unwrap();
            coord.votes.insert(vote(voter.clone(), "i1", Opinion::Oppose, "2026-07-20T00:00:00Z"));
            coord.votes.insert(vote(voter, "i2", Opinion::Support, "2026-07-20T00:00:00Z"));
        }
        let now: DateTime<Utc> = "2026-07-28T00:00:00Z".parse().unwrap();
        let params = RunParameters {
            min_voters: 20,
            min_votes_per_voter: 1,
            ..RunParameters::default()
        };
        let summary = coord.run(now, params).unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.n_groups, 2);
        assert_eq!(summary.n_voters, 40);
    }

    #[test]
    fn unanimous_single_item_vote_still_completes() {
        let coord = coordinator();
        for i in 0..60 {
            let voter = VoterId::registered(format!("v-{i}")).unwrap();
            coord.votes.insert(vote(voter, "i1", Opinion::Support, "2026-07-20T00:00:00Z"));
        }
        let now: DateTime<Utc> = "2026-07-28T00:00:00Z".parse().unwrap();
        let params = RunParameters {
            min_voters: 20,
            min_votes_per_voter: 1,
            ..RunParameters::default()
        };
        let summary = coord.run(now, params).unwrap();
        assert_eq!(summary.status, RunStatus::Completed);
        assert_eq!(summary.n_voters, 60);
        assert_eq!(summary.n_groups, 2);
        assert!(summary.silhouette.abs() < 1e-6);

        let run_ids = coord.runs.list_run_ids().unwrap();
        let bytes = coord.runs.get(&run_ids[0]).unwrap().unwrap();
        let artifacts: RunArtifacts = serde_json::from_slice(&bytes).unwrap();

        let group_pattern = artifacts
            .patterns
            .iter()
            .find(|p| {
                p.item.as_str() == "i1"
                    && artifacts
                        .clusters
                        .iter()
                        .any(|c| c.id == p.cluster && c.cluster_type == ClusterType::Group)
            })
            .expect("a group cluster has a voting pattern for i1");
        assert_eq!(group_pattern.count_neg, 0);
        assert_eq!(group_pattern.count_neu, 0);
        assert!(group_pattern.count_pos > 0);
        assert_eq!(group_pattern.consensus, 1.0);
        assert_eq!(group_pattern.majority, Some(Majority::Support));
    }

    #[test]
    fn second_concurrent_run_is_refused() {
        let coord = coordinator();
        let now: DateTime<Utc> = "2026-07-28T00:00:00Z".parse().unwrap();
        coord.leases.try_acquire(LEASE_NAME, now).unwrap();
        let err = coord.run(now, RunParameters::default()).unwrap_err();
        assert_eq!(err, ErrorKind::AlreadyRunning);
        assert!(coord.runs.list_run_ids().unwrap().is_empty());
    }
}

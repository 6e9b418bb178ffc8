//! Group clustering: the second pass. Unlike the base layer, this one
//! clusters the voter-level projection directly (not the base centroids) —
//! the base layer exists only to compress the population for the plurality
//! step below, not to feed the group layer's k-means input. `k` is chosen
//! from `[k_min, k_max]` via a sequential parsimony ratchet: start assuming
//! `k_min` is best, then walk candidates in ascending order and only adopt a
//! larger `k` once its silhouette clears the *current* best by more than
//! `silhouette_threshold`. This is deliberately not "smallest k within
//! threshold of the global-max silhouette" — that static rule can jump past
//! a k the ratchet would have settled on first and never revisited.

use crate::kmeans::{weighted_kmeans, KMeansError, KMeansResult};
use crate::metrics::silhouette_score;
use oce_core::determinism::lowest_id_tie_break;

#[derive(Clone, Debug, PartialEq)]
pub struct GroupClustering {
    pub k: usize,
    /// `voter_labels[i]` is the group index assigned to voter `i`.
    pub voter_labels: Vec<usize>,
    pub centroids: Vec<Vec<f64>>,
    pub silhouette: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroupClusterConfig {
    pub k_min: u32,
    pub k_max: u32,
    pub silhouette_threshold: f64,
}

/// Cluster the voter-level `projection` points directly, picking `k` by the
/// sequential parsimony ratchet documented above. `weights` are per-voter
/// (e.g. `row_nnz`), the same weighting the base layer uses.
pub fn cluster(
    points: &[Vec<f64>],
    weights: &[f64],
    run_seed: u64,
    cfg: &GroupClusterConfig,
) -> Result<GroupClustering, KMeansError> {
    if points.len() < cfg.k_min as usize {
        return Err(KMeansError::TooFewPoints {
            have: points.len(),
            k: cfg.k_min as usize,
        });
    }

    let mut best: Option<(usize, KMeansResult, f64)> = None;

    for k in cfg.k_min..=cfg.k_max {
        let k = k as usize;
        if points.len() < k {
            break;
        }
        let result = weighted_kmeans(points, weights, k, run_seed ^ (k as u64))?;
        let sil = if k > 1 {
            silhouette_score(points, &result.assignments)
        } else {
            0.0
        };

        match &best {
            None => best = Some((k, result, sil)),
            Some((_, _, best_sil)) if sil > best_sil + cfg.silhouette_threshold => {
                best = Some((k, result, sil));
            }
            Some(_) => {}
        }
    }

    let (k, result, silhouette) = best.expect("k_min..=k_max is non-empty and k_min candidate always runs");
    Ok(GroupClustering {
        k,
        voter_labels: result.assignments,
        centroids: result.centroids,
        silhouette,
    })
}

/// Assign each base cluster to the group holding a plurality of its
/// members' voter-level group labels. Ties break to the lowest group index,
/// the one documented tie-break for this step.
pub fn assign_base_clusters_to_groups(
    base_assignments: &[usize],
    voter_group_labels: &[usize],
    n_base: usize,
    n_groups: usize,
) -> Vec<usize> {
    let mut votes = vec![vec![0u32; n_groups]; n_base];
    for (voter, &base) in base_assignments.iter().enumerate() {
        let group = voter_group_labels[voter];
        votes[base][group] += 1;
    }

    votes
        .iter()
        .map(|counts| {
            let max = counts.iter().copied().max().unwrap_or(0);
            let winners: Vec<usize> = counts
                .iter()
                .enumerate()
                .filter(|(_, &c)| c == max)
                .map(|(g, _)| g)
                .collect();
            lowest_id_tie_break(&winners).unwrap_or(0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> GroupClusterConfig {
        GroupClusterConfig {
            k_min: 2,
            k_max: 5,
            silhouette_threshold: 0.02,
        }
    }

    #[test]
    fn prefers_smaller_k_when_larger_k_does_not_clear_margin() {
        // Two well-separated blobs of 3 points each: k=2 is clearly right,
        // and larger k's can only split a blob, never beating k=2's
        // silhouette by the 0.02 margin.
        let points = vec![
            vec![0.0, 0.0],
            vec![0.1, 0.0],
            vec![0.0, 0.1],
            vec![10.0, 10.0],
            vec![10.1, 10.0],
            vec![10.0, 10.1],
        ];
        let weights = vec![1.0; 6];
        let result = cluster(&points, &weights, 99, &cfg()).unwrap();
        assert_eq!(result.k, 2);
    }

    #[test]
    fn ratchet_adopts_larger_k_only_past_margin_from_running_best() {
        // Four tight, evenly-spaced blobs: k=4 clearly separates all of
        // them, so the ratchet should climb past 2 and 3 on its way there.
        let points = vec![
            vec![0.0, 0.0], vec![0.1, 0.0],
            vec![5.0, 0.0], vec![5.1, 0.0],
            vec![10.0, 0.0], vec![10.1, 0.0],
            vec![15.0, 0.0], vec![15.1, 0.0],
        ];
        let weights = vec![1.0; 8];
        let result = cluster(&points, &weights, 7, &cfg()).unwrap();
        assert_eq!(result.k, 4);
    }

    #[test]
    fn too_few_voters_errors() {
        let points = vec![vec![0.0, 0.0]];
        let err = cluster(&points, &[1.0], 1, &cfg()).unwrap_err();
        assert!(matches!(err, KMeansError::TooFewPoints { .. }));
    }

    #[test]
    fn base_clusters_assigned_by_plurality_with_lowest_id_tiebreak() {
        // base 0: voters {0,1,2} -> groups {0,0,1}: plurality group 0.
        // base 1: voters {3,4} -> groups {0,1}: tie, lowest id wins -> 0.
        let base_assignments = vec![0, 0, 0, 1, 1];
        let voter_group_labels = vec![0, 0, 1, 0, 1];
        let assigned = assign_base_clusters_to_groups(&base_assignments, &voter_group_labels, 2, 2);
        assert_eq!(assigned, vec![0, 0]);
    }
}

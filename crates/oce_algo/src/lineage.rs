//! Lineage classification: compares this run's clusters against the prior
//! run's by voter-membership overlap and labels each matching pair
//! continuation / split / merge / minor, or drops it if the overlap is
//! noise. Operates purely on `VoterId` sets, not row indices, since the two
//! runs' vote matrices need not share row order or even voter population.

use oce_core::{ClusterId, VoterId};
use std::collections::BTreeSet;

const CONTINUATION_THRESHOLD: f64 = 0.8;
const SPLIT_THRESHOLD: f64 = 0.3;
const MERGE_THRESHOLD: f64 = 0.3;
const MINOR_OVERLAP_FLOOR: usize = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum LineageKind {
    Continuation,
    Split,
    Merge,
    Minor,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineageEdge {
    pub prior: ClusterId,
    pub new: ClusterId,
    pub overlap: usize,
    /// Fraction of the prior cluster's members that ended up in `new`.
    pub pct_from: f64,
    /// Fraction of the new cluster's members that came from `prior`.
    pub pct_to: f64,
    pub kind: LineageKind,
}

fn classify_pair(pct_from: f64, pct_to: f64, overlap: usize) -> Option<LineageKind> {
    if pct_from > CONTINUATION_THRESHOLD && pct_to > CONTINUATION_THRESHOLD {
        Some(LineageKind::Continuation)
    } else if pct_from > SPLIT_THRESHOLD {
        Some(LineageKind::Split)
    } else if pct_to > MERGE_THRESHOLD {
        Some(LineageKind::Merge)
    } else if overlap > MINOR_OVERLAP_FLOOR {
        Some(LineageKind::Minor)
    } else {
        None
    }
}

/// Every (prior, new) pair whose overlap clears a classification threshold.
/// A new cluster may have more than one edge (e.g. a merge draws from
/// several priors); clusters with no surviving edge are novel, not lineage
/// tracked.
pub fn classify_edges(
    prior: &[(ClusterId, BTreeSet<VoterId>)],
    new: &[(ClusterId, BTreeSet<VoterId>)],
) -> Vec<LineageEdge> {
    let mut edges = Vec::new();
    for (new_id, new_members) in new {
        if new_members.is_empty() {
            continue;
        }
        for (prior_id, prior_members) in prior {
            if prior_members.is_empty() {
                continue;
            }
            let overlap = new_members.intersection(prior_members).count();
            if overlap == 0 {
                continue;
            }
            let pct_from = overlap as f64 / prior_members.len() as f64;
            let pct_to = overlap as f64 / new_members.len() as f64;
            if let Some(kind) = classify_pair(pct_from, pct_to, overlap) {
                edges.push(LineageEdge {
                    prior: prior_id.clone(),
                    new: new_id.clone(),
                    overlap,
                    pct_from,
                    pct_to,
                    kind,
                });
            }
        }
    }
    edges
}

/// The single dominant parent for a new cluster, when one is wanted (e.g. a
/// continuation-style display). Highest `pct_from` wins; an exact tie falls
/// back to the lowest prior `ClusterId`, the one documented tie-break for
/// lineage resolution.
pub fn primary_parent<'a>(edges: &'a [LineageEdge], new: &ClusterId) -> Option<&'a LineageEdge> {
    let mut candidates: Vec<&LineageEdge> = edges.iter().filter(|e| &e.new == new).collect();
    candidates.sort_by(|a, b| {
        b.pct_from
            .partial_cmp(&a.pct_from)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.prior.as_str().cmp(b.prior.as_str()))
    });
    candidates.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cid(s: &str) -> ClusterId {
        s.parse().unwrap()
    }

    fn voters(ids: &[&str]) -> BTreeSet<VoterId> {
        ids.iter().map(|s| VoterId::registered(*s).unwrap()).collect()
    }

    #[test]
    fn near_identical_membership_is_continuation() {
        let prior = vec![(cid("RUN:2026-01-01T00:00:00Z-aaaaaaaa/B0"), voters(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]))];
        let new = vec![(cid("RUN:2026-02-01T00:00:00Z-bbbbbbbb/B0"), voters(&["a", "b", "c", "d", "e", "f", "g", "h", "i"]))];
        let edges = classify_edges(&prior, &new);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].kind, LineageKind::Continuation);
    }

    #[test]
    fn disjoint_clusters_have_no_edge() {
        let prior = vec![(cid("RUN:2026-01-01T00:00:00Z-aaaaaaaa/B0"), voters(&["a", "b"]))];
        let new = vec![(cid("RUN:2026-02-01T00:00:00Z-bbbbbbbb/B0"), voters(&["c", "d"]))];
        assert!(classify_edges(&prior, &new).is_empty());
    }

    #[test]
    fn hundred_voter_group_splitting_sixty_forty_yields_two_split_edges() {
        let hundred: Vec<String> = (0..100).map(|i| format!("v{i}")).collect();
        let hundred_ids: Vec<&str> = hundred.iter().map(String::as_str).collect();
        let prior = vec![(
            cid("RUN:2026-01-01T00:00:00Z-aaaaaaaa/G0"),
            voters(&hundred_ids),
        )];
        let new = vec![
            (
                cid("RUN:2026-02-01T00:00:00Z-bbbbbbbb/G0"),
                voters(&hundred_ids[0..60]),
            ),
            (
                cid("RUN:2026-02-01T00:00:00Z-bbbbbbbb/G1"),
                voters(&hundred_ids[60..100]),
            ),
        ];
        let mut edges = classify_edges(&prior, &new);
        edges.sort_by(|a, b| b.pct_from.partial_cmp(&a.pct_from).unwrap());

        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].kind, LineageKind::Split);
        assert_eq!(edges[0].new, cid("RUN:2026-02-01T00:00:00Z-bbbbbbbb/G0"));
        assert!((edges[0].pct_from - 0.6).abs() < 1e-9);
        assert_eq!(edges[1].kind, LineageKind::Split);
        assert_eq!(edges[1].new, cid("RUN:2026-02-01T00:00:00Z-bbbbbbbb/G1"));
        assert!((edges[1].pct_from - 0.4).abs() < 1e-9);
    }

    #[test]
    fn primary_parent_breaks_tie_on_lowest_id() {
        let edges = vec![
            LineageEdge {
                prior: cid("RUN:2026-01-01T00:00:00Z-bbbbbbbb/B1"),
                new: cid("RUN:2026-02-01T00:00:00Z-cccccccc/B0"),
                overlap: 3,
                pct_from: 0.5,
                pct_to: 0.5,
                kind: LineageKind::Split,
            },
            LineageEdge {
                prior: cid("RUN:2026-01-01T00:00:00Z-aaaaaaaa/B0"),
                new: cid("RUN:2026-02-01T00:00:00Z-cccccccc/B0"),
                overlap: 3,
                pct_from: 0.5,
                pct_to: 0.5,
                kind: LineageKind::Split,
            },
        ];
        let winner = primary_parent(&edges, &cid("RUN:2026-02-01T00:00:00Z-cccccccc/B0")).unwrap();
        assert_eq!(winner.prior, cid("RUN:2026-01-01T00:00:00Z-aaaaaaaa/B0"));
    }
}

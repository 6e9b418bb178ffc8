//! Matrix Builder: turns raw (already claim-reconciled) votes into a dense
//! `VoteMatrix`. Missing and `Neutral` are kept distinct: a missing cell is
//! `None`; a cast `Neutral` vote is `Some(neutral_epsilon)`.

use oce_core::determinism::{sort_items_by_id, sort_voters_by_id};
use oce_core::{ItemId, Vote, VoterId};
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatrixConfig {
    pub min_voters: u32,
    pub min_votes_per_voter: u32,
    pub neutral_epsilon: f64,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
pub enum MatrixError {
    #[error("insufficient voters: have {have}, need at least {need}")]
    InsufficientVoters { have: usize, need: u32 },
    #[error("no items were voted on in the window")]
    EmptyItemSet,
}

/// Dense vote matrix: `values[row][col]` is `None` if voter `row` never cast
/// a vote on item `col`, otherwise `Some(encoded opinion)`.
#[derive(Clone, Debug, PartialEq)]
pub struct VoteMatrix {
    pub voter_ids: Vec<VoterId>,
    pub item_ids: Vec<ItemId>,
    pub values: Vec<Vec<Option<f64>>>,
    /// Votes actually cast per voter (row), i.e. the row's non-`None` count.
    pub row_nnz: Vec<u32>,
}

impl VoteMatrix {
    pub fn n_voters(&self) -> usize {
        self.voter_ids.len()
    }

    pub fn n_items(&self) -> usize {
        self.item_ids.len()
    }
}

/// Build a `VoteMatrix` from already-reconciled votes (sessions resolved to
/// their claimed registered id by `oce_io::ClaimRegistry` upstream). The
/// latest vote per `(voter, item)` pair wins, compared by `cast_at`.
pub fn build(votes: &[Vote], cfg: &MatrixConfig) -> Result<VoteMatrix, MatrixError> {
    // voter -> item -> (opinion, cast_at)
    let mut by_voter: BTreeMap<VoterId, BTreeMap<ItemId, (oce_core::Opinion, String)>> =
        BTreeMap::new();

    for v in votes {
        let entry = by_voter
            .entry(v.voter.clone())
            .or_default()
            .entry(v.item.clone())
            .or_insert_with(|| (v.opinion, v.cast_at.clone()));
        if v.cast_at > entry.1 {
            *entry = (v.opinion, v.cast_at.clone());
        }
    }

    // Drop voters under the per-voter vote floor.
    by_voter.retain(|_, items| items.len() as u32 >= cfg.min_votes_per_voter);

    if by_voter.len() < cfg.min_voters as usize {
        return Err(MatrixError::InsufficientVoters {
            have: by_voter.len(),
            need: cfg.min_voters,
        });
    }

    let mut voter_ids: Vec<VoterId> = by_voter.keys().cloned().collect();
    sort_voters_by_id(&mut voter_ids);

    let mut item_set: BTreeMap<ItemId, ()> = BTreeMap::new();
    for items in by_voter.values() {
        for item in items.keys() {
            item_set.insert(item.clone(), ());
        }
    }
    if item_set.is_empty() {
        return Err(MatrixError::EmptyItemSet);
    }
    let mut item_ids: Vec<ItemId> = item_set.into_keys().collect();
    sort_items_by_id(&mut item_ids);

    let item_col: BTreeMap<&ItemId, usize> = item_ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

    let mut values = vec![vec![None; item_ids.len()]; voter_ids.len()];
    let mut row_nnz = vec![0u32; voter_ids.len()];

    for (row, voter) in voter_ids.iter().enumerate() {
        let items = &by_voter[voter];
        for (item, (opinion, _)) in items {
            let col = item_col[item];
            values[row][col] = Some(opinion.encode(cfg.neutral_epsilon));
            row_nnz[row] += 1;
        }
    }

    Ok(VoteMatrix {
        voter_ids,
        item_ids,
        values,
        row_nnz,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{classify, Category};
    use oce_core::Opinion;
    use proptest::prelude::*;

    fn vote(voter: &str, item: &str, op: Opinion, at: &str) -> Vote {
        Vote {
            voter: VoterId::registered(voter).unwrap(),
            item: item.parse().unwrap(),
            opinion: op,
            cast_at: at.to_string(),
        }
    }

    fn cfg() -> MatrixConfig {
        MatrixConfig {
            min_voters: 2,
            min_votes_per_voter: 1,
            neutral_epsilon: 1e-4,
        }
    }

    #[test]
    fn builds_dense_matrix_with_missing_as_none() {
        let votes = vec![
            vote("u1", "i1", Opinion::Support, "2026-01-01T00:00:00Z"),
            vote("u2", "i2", Opinion::Oppose, "2026-01-01T00:00:00Z"),
        ];
        let m = build(&votes, &cfg()).unwrap();
        assert_eq!(m.n_voters(), 2);
        assert_eq!(m.n_items(), 2);
        // u1 voted i1 only, so (u1, i2) must be None, not 0.0 or encoded-neutral.
        let u1_row = m.voter_ids.iter().position(|v| v.as_str() == "u1").unwrap();
        let i2_col = m.item_ids.iter().position(|i| i.as_str() == "i2").unwrap();
        assert_eq!(m.values[u1_row][i2_col], None);
    }

    #[test]
    fn latest_vote_wins_on_same_voter_item() {
        let votes = vec![
            vote("u1", "i1", Opinion::Support, "2026-01-01T00:00:00Z"),
            vote("u1", "i1", Opinion::Oppose, "2026-02-01T00:00:00Z"),
            vote("u2", "i1", Opinion::Neutral, "2026-01-01T00:00:00Z"),
        ];
        let m = build(&votes, &cfg()).unwrap();
        let u1_row = m.voter_ids.iter().position(|v| v.as_str() == "u1").unwrap();
        assert_eq!(m.values[u1_row][0], Some(-1.0));
    }

    #[test]
    fn neutral_is_not_zero() {
        let votes = vec![
            vote("u1", "i1", Opinion::Neutral, "2026-01-01T00:00:00Z"),
            vote("u2", "i1", Opinion::Support, "2026-01-01T00:00:00Z"),
        ];
        let m = build(&votes, &cfg()).unwrap();
        let u1_row = m.voter_ids.iter().position(|v| v.as_str() == "u1").unwrap();
        assert_eq!(m.values[u1_row][0], Some(1e-4));
        assert_ne!(m.values[u1_row][0], Some(0.0));
    }

    #[test]
    fn insufficient_voters_is_rejected() {
        let votes = vec![vote("u1", "i1", Opinion::Support, "2026-01-01T00:00:00Z")];
        let err = build(&votes, &cfg()).unwrap_err();
        assert_eq!(
            err,
            MatrixError::InsufficientVoters { have: 1, need: 2 }
        );
    }

    #[test]
    fn voters_under_vote_floor_are_dropped() {
        let mut c = cfg();
        c.min_voters = 1;
        c.min_votes_per_voter = 2;
        let votes = vec![vote("u1", "i1", Opinion::Support, "2026-01-01T00:00:00Z")];
        let err = build(&votes, &c).unwrap_err();
        assert_eq!(err, MatrixError::InsufficientVoters { have: 0, need: 1 });
    }

    fn opinion_strategy() -> impl Strategy<Value = Opinion> {
        prop_oneof![
            Just(Opinion::Support),
            Just(Opinion::Oppose),
            Just(Opinion::Neutral),
        ]
    }

    fn as_category(op: Opinion) -> Category {
        match op {
            Opinion::Support => Category::Support,
            Opinion::Oppose => Category::Oppose,
            Opinion::Neutral => Category::Neutral,
        }
    }

    const N_VOTERS: usize = 4;
    const N_ITEMS: usize = 3;

    proptest! {
        // Every voter casts a vote on every item (a dense grid, no missing
        // cells): round-tripping through `build` then `classify` must
        // recover each vote's original category exactly, and every row must
        // come back with nnz == n_items.
        #[test]
        fn full_grid_round_trips_through_encode_and_classify(
            opinions in prop::collection::vec(opinion_strategy(), N_VOTERS * N_ITEMS)
        ) {
            let mut votes = Vec::with_capacity(opinions.len());
            for voter in 0..N_VOTERS {
                for item in 0..N_ITEMS {
                    votes.push(vote(
                        &format!("u{voter}"),
                        &format!("i{item}"),
                        opinions[voter * N_ITEMS + item],
                        "2026-01-01T00:00:00Z",
                    ));
                }
            }

            let c = MatrixConfig {
                min_voters: N_VOTERS as u32,
                min_votes_per_voter: N_ITEMS as u32,
                neutral_epsilon: 1e-4,
            };
            let m = build(&votes, &c).unwrap();

            for voter in 0..N_VOTERS {
                let row = m
                    .voter_ids
                    .iter()
                    .position(|v| v.as_str() == format!("u{voter}"))
                    .unwrap();
                prop_assert_eq!(m.row_nnz[row], N_ITEMS as u32);
                for item in 0..N_ITEMS {
                    let col = m
                        .item_ids
                        .iter()
                        .position(|i| i.as_str() == format!("i{item}"))
                        .unwrap();
                    let cell = m.values[row][col].expect("full grid has no missing cells");
                    prop_assert_eq!(classify(cell), as_category(opinions[voter * N_ITEMS + item]));
                }
            }
        }
    }
}

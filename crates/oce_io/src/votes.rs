//! `VoteStore` — read access to the raw votes cast by voters on items. The
//! matrix builder is the only consumer; this crate never interprets a vote,
//! only fetches it.

use crate::IoResult;
use chrono::{DateTime, Utc};
use oce_core::Vote;
use std::sync::{Arc, RwLock};

pub trait VoteStore: Send + Sync {
    /// All votes cast at or after `since`, in no particular order — callers
    /// are responsible for any ordering/dedup they need.
    fn votes_cast_since(&self, since: DateTime<Utc>) -> IoResult<Vec<Vote>>;
}

/// Forwarding impl so a store can be shared (e.g. `Arc`-held by both the
/// coordinator and an in-process reader) without wrapping it in a newtype.
impl<T: VoteStore + ?Sized> VoteStore for Arc<T> {
    fn votes_cast_since(&self, since: DateTime<Utc>) -> IoResult<Vec<Vote>> {
        (**self).votes_cast_since(since)
    }
}

/// Simple in-memory `VoteStore` for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryVoteStore {
    votes: RwLock<Vec<Vote>>,
}

impl InMemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, vote: Vote) {
        self.votes.write().expect("vote store lock poisoned").push(vote);
    }

    pub fn extend(&self, votes: impl IntoIterator<Item = Vote>) {
        self.votes
            .write()
            .expect("vote store lock poisoned")
            .extend(votes);
    }
}

impl VoteStore for InMemoryVoteStore {
    fn votes_cast_since(&self, since: DateTime<Utc>) -> IoResult<Vec<Vote>> {
        let guard = self.votes.read().expect("vote store lock poisoned");
        Ok(guard
            .iter()
            .filter(|v| match DateTime::parse_from_rfc3339(&v.cast_at) {
                Ok(ts) => ts.with_timezone(&Utc) >= since,
                Err(_) => false,
            })
            .cloned()
            .collect())
    }
}

/// Load a JSON array of `Vote` records into an `InMemoryVoteStore`. The Vote
/// Store proper lives in an external voting platform; this is the offline
/// file-input path the CLI trigger command uses in place of a live adapter.
pub fn load_votes_from_file(path: &std::path::Path) -> IoResult<InMemoryVoteStore> {
    let bytes = std::fs::read(path)?;
    let votes: Vec<Vote> = serde_json::from_slice(&bytes)?;
    let store = InMemoryVoteStore::new();
    store.extend(votes);
    Ok(store)
}

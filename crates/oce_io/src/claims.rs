//! `ClaimRegistry` — resolves an anonymous `Session` voter into the
//! `Registered` voter that later claimed it, if any. The matrix builder
//! applies this reconciliation before counting each voter's votes, so a
//! voter who cast some votes anonymously and later claimed the session
//! isn't undercounted against `min_votes_per_voter`.

use crate::IoResult;
use oce_core::VoterId;
use std::collections::HashMap;
use std::sync::RwLock;

pub trait ClaimRegistry: Send + Sync {
    /// Resolve `voter` to the `Registered` id it should be counted under.
    /// Returns `voter` unchanged if it is already `Registered` or has no
    /// claim on record.
    fn resolve(&self, voter: &VoterId) -> IoResult<VoterId>;
}

#[derive(Default)]
pub struct InMemoryClaimRegistry {
    // session id -> registered id
    claims: RwLock<HashMap<String, String>>,
}

impl InMemoryClaimRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `session_id` was later claimed by `registered_id`.
    pub fn record_claim(&self, session_id: impl Into<String>, registered_id: impl Into<String>) {
        self.claims
            .write()
            .expect("claim registry lock poisoned")
            .insert(session_id.into(), registered_id.into());
    }
}

impl ClaimRegistry for InMemoryClaimRegistry {
    fn resolve(&self, voter: &VoterId) -> IoResult<VoterId> {
        match voter {
            VoterId::Registered(_) => Ok(voter.clone()),
            VoterId::Session(sid) => {
                let guard = self.claims.read().expect("claim registry lock poisoned");
                match guard.get(sid) {
                    Some(registered) => Ok(VoterId::registered(registered.clone())
                        .map_err(|_| crate::IoError::Invalid("claimed id is not a valid token".into()))?),
                    None => Ok(voter.clone()),
                }
            }
        }
    }
}

/// Load a JSON object `{session_id: registered_id, ...}` into an
/// `InMemoryClaimRegistry`. Same offline file-input role as
/// `votes::load_votes_from_file`: the identity-claim mechanism lives in an
/// external account system, so this is the CLI's stand-in for a live
/// claims service.
pub fn load_claims_from_file(path: &std::path::Path) -> IoResult<InMemoryClaimRegistry> {
    let bytes = std::fs::read(path)?;
    let claims: HashMap<String, String> = serde_json::from_slice(&bytes)?;
    let registry = InMemoryClaimRegistry::new();
    for (session_id, registered_id) in claims {
        registry.record_claim(session_id, registered_id);
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unclaimed_session_passes_through() {
        let reg = InMemoryClaimRegistry::new();
        let sess = VoterId::session("sess-1").unwrap();
        assert_eq!(reg.resolve(&sess).unwrap(), sess);
    }

    #[test]
    fn claimed_session_resolves_to_registered() {
        let reg = InMemoryClaimRegistry::new();
        reg.record_claim("sess-1", "user-7");
        let sess = VoterId::session("sess-1").unwrap();
        let resolved = reg.resolve(&sess).unwrap();
        assert_eq!(resolved, VoterId::registered("user-7").unwrap());
    }

    #[test]
    fn registered_passes_through_unchanged() {
        let reg = InMemoryClaimRegistry::new();
        let r = VoterId::registered("user-7").unwrap();
        assert_eq!(reg.resolve(&r).unwrap(), r);
    }
}

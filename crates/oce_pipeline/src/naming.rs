//! The cluster-naming hook: an optional external call-out invoked once per
//! group cluster after a Run publishes. Fire-and-forget from the
//! coordinator's perspective — a slow or failing namer must never block or
//! fail the Run, so `RunCoordinator` only ever logs the outcome and moves
//! on.

use oce_core::ItemId;

/// What the namer is given to work with: the group cluster's highest-
/// consensus items, most recent first, and any opaque entity tags the
/// caller wants to pass through (titles, tags — opaque to the core).
#[derive(Clone, Debug)]
pub struct NamingHint {
    pub top_items_by_consensus: Vec<ItemId>,
    pub top_entities: Vec<String>,
}

/// Implemented by whatever external naming service the deployment wires
/// up. `name_cluster` returns `None` on any failure (timeout, network
/// error, no opinion) rather than propagating an error type — the
/// coordinator treats "no name" and "namer failed" identically.
pub trait ClusterNamer: Send + Sync {
    fn name_cluster(&self, hint: &NamingHint) -> Option<(String, String)>;
}

/// The default namer: always declines. Clusters are left unnamed until an
/// external implementation is wired in.
#[derive(Default)]
pub struct NoopNamer;

impl ClusterNamer for NoopNamer {
    fn name_cluster(&self, _hint: &NamingHint) -> Option<(String, String)> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_namer_always_declines() {
        let namer = NoopNamer;
        let hint = NamingHint {
            top_items_by_consensus: vec![],
            top_entities: vec![],
        };
        assert_eq!(namer.name_cluster(&hint), None);
    }
}

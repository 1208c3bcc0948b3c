//! Per-zone master election.
//!
//! Only the master of a zone drives hardware for it. Mastership is never
//! stored: it is recomputed from the zone's binding order and the set of
//! locally registered players on every dispatch.
//!
//! Bindings that no local registry knows about still occupy their slot in the
//! order. A client is master only when its first local binding is also the
//! zone's head binding, so at most one client (the one owning the head) can be
//! master, and a zone whose head is unknown locally has no local master.

use crate::model::{AudioZone, PlayerId};

/// First binding of `zone` that is registered locally, in binding order.
pub fn local_candidate(
    zone: &AudioZone,
    is_local: impl Fn(PlayerId) -> bool,
) -> Option<PlayerId> {
    zone.players
        .iter()
        .map(|binding| binding.player_id)
        .find(|id| is_local(*id))
}

/// Returns true if this client may drive the hardware of `zone`.
pub fn is_master(zone: &AudioZone, is_local: impl Fn(PlayerId) -> bool) -> bool {
    match (local_candidate(zone, is_local), zone.head()) {
        (Some(candidate), Some(head)) => candidate == head,
        _ => false,
    }
}

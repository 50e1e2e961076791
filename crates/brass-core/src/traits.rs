use crate::error::CoreResult;
use crate::types::{ProjectId, SpendDecision, SpendRequest};

// ---------------------------------------------------------------------------
// CounterStore — the spend-accounting interface
//
// Implementations differ only in their consistency guarantees. Strict
// enforcement (exactly-once increments, race-free grace replay) requires a
// backend whose `spend` executes steps 1-3 as one critical section per key;
// each implementation documents where it stands.
// ---------------------------------------------------------------------------

pub trait CounterStore: Send + Sync {
    /// Attempt one spend.
    ///
    /// 1. If the idempotency record exists, return the stored decision
    ///    unchanged with the replay flag set. The counter is not touched
    ///    and no TTL is extended.
    /// 2. If the current count has reached `limit`, persist and return a
    ///    `limit_exceeded` denial (denials replay too).
    /// 3. Otherwise increment the counter and persist both the counter and
    ///    the decision with the same TTL.
    fn spend(&self, request: &SpendRequest) -> CoreResult<SpendDecision>;

    /// Look up the cached boundary-grace decision for `grace_key`. On a
    /// miss, reserve the key (test-and-set) with a pending, non-ok marker
    /// so that only the first writer ever stores a real grace response;
    /// concurrent callers observe the hit and fall through to re-evaluate.
    fn guard_grace(
        &self,
        project_id: &ProjectId,
        grace_key: &str,
        ttl_seconds: u64,
    ) -> CoreResult<Option<SpendDecision>>;

    /// Store a successful decision under `grace_key`. Non-ok decisions are
    /// ignored; an already-stored success is never overwritten.
    fn cache_grace_response(
        &self,
        project_id: &ProjectId,
        grace_key: &str,
        ttl_seconds: u64,
        decision: &SpendDecision,
    ) -> CoreResult<()>;
}

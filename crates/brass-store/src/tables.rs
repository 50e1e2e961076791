//! In-memory table set shared by the memory-backed stores.
//!
//! Plain maps with lazy TTL expiry. Consistency is the caller's problem:
//! `AtomicStore` holds one exclusive guard across a whole spend,
//! `BestEffortStore` deliberately does not.

use std::collections::HashMap;

use brass_core::{SpendDecision, SpendRequest};

use crate::keys::{count_record_key, ik_record_key};

/// Error string persisted with a budget denial.
pub const LIMIT_EXCEEDED: &str = "limit_exceeded";

/// Error string on the grace reservation marker written by `guard_grace`
/// before any real decision exists for the key.
pub const GRACE_PENDING: &str = "grace_pending";

#[derive(Debug, Clone)]
pub struct Entry<T> {
    pub value: T,
    pub expires_at_ms: u64,
}

impl<T> Entry<T> {
    pub fn new(value: T, now_ms: u64, ttl_seconds: u64) -> Self {
        Self {
            value,
            expires_at_ms: now_ms + ttl_seconds * 1_000,
        }
    }

    pub fn live(&self, now_ms: u64) -> bool {
        now_ms < self.expires_at_ms
    }
}

#[derive(Debug, Default)]
pub struct Tables {
    pub counters: HashMap<String, Entry<u64>>,
    pub decisions: HashMap<String, Entry<SpendDecision>>,
    pub grace: HashMap<String, Entry<SpendDecision>>,
}

impl Tables {
    /// Current count for a counter key; expired entries read as zero.
    pub fn counter(&self, record_key: &str, now_ms: u64) -> u64 {
        self.counters
            .get(record_key)
            .filter(|e| e.live(now_ms))
            .map(|e| e.value)
            .unwrap_or(0)
    }

    pub fn decision(&self, record_key: &str, now_ms: u64) -> Option<SpendDecision> {
        self.decisions
            .get(record_key)
            .filter(|e| e.live(now_ms))
            .map(|e| e.value.clone())
    }

    pub fn grace_decision(&self, record_key: &str, now_ms: u64) -> Option<SpendDecision> {
        self.grace
            .get(record_key)
            .filter(|e| e.live(now_ms))
            .map(|e| e.value.clone())
    }

    /// Drop expired entries. Called opportunistically; correctness never
    /// depends on it because every read filters on liveness.
    pub fn purge_expired(&mut self, now_ms: u64) {
        self.counters.retain(|_, e| e.live(now_ms));
        self.decisions.retain(|_, e| e.live(now_ms));
        self.grace.retain(|_, e| e.live(now_ms));
    }
}

/// Steps 1-3 of the spend contract against one table set. Callers that
/// need strict enforcement must hold exclusive access for the whole call.
pub fn apply_spend(tables: &mut Tables, request: &SpendRequest, now_ms: u64) -> SpendDecision {
    let ik_key = ik_record_key(&request.key.project_id, &request.idempotency_key);

    // 1. Idempotent replay: return the stored decision unchanged. No
    //    increment, no TTL extension, success or denial alike.
    if let Some(stored) = tables.decision(&ik_key, now_ms) {
        return stored.replayed();
    }

    let count_key = count_record_key(&request.key);
    let count = tables.counter(&count_key, now_ms);

    // 2. Budget exhausted: the denial itself is persisted so replays of
    //    this spend stay denied for the rest of the window.
    if count >= request.limit {
        let denial = SpendDecision::denied(LIMIT_EXCEEDED);
        tables.decisions.insert(
            ik_key,
            Entry::new(denial.clone(), now_ms, request.ttl_seconds),
        );
        return denial;
    }

    // 3. Spend: counter and decision persist with the same TTL.
    let new_count = count + 1;
    let remaining = request.limit.saturating_sub(new_count);
    let decision = SpendDecision::accepted(remaining);
    tables.counters.insert(
        count_key,
        Entry::new(new_count, now_ms, request.ttl_seconds),
    );
    tables.decisions.insert(
        ik_key,
        Entry::new(decision.clone(), now_ms, request.ttl_seconds),
    );
    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use brass_core::{CounterKey, PolicyId, ProjectId, WindowId};

    fn request(ik: &str, limit: u64) -> SpendRequest {
        SpendRequest {
            key: CounterKey {
                project_id: ProjectId::new("proj-1"),
                issuer_pk: "pk".into(),
                origin: "https://example.com".into(),
                epoch_days: 20_406,
                policy_id: PolicyId::new("default"),
                window_id: WindowId(20_406),
                nullifier: "y".into(),
            },
            idempotency_key: ik.into(),
            limit,
            ttl_seconds: 3_600,
        }
    }

    #[test]
    fn test_first_spend_increments() {
        let mut tables = Tables::default();
        let decision = apply_spend(&mut tables, &request("ik-1", 3), 1_000);
        assert!(decision.ok);
        assert_eq!(decision.remaining, 2);
        assert!(!decision.idempotent);
    }

    #[test]
    fn test_replay_does_not_increment() {
        let mut tables = Tables::default();
        let first = apply_spend(&mut tables, &request("ik-1", 3), 1_000);
        let replay = apply_spend(&mut tables, &request("ik-1", 3), 2_000);
        assert_eq!(replay.remaining, first.remaining);
        assert!(replay.idempotent);
        let count_key = count_record_key(&request("ik-1", 3).key);
        assert_eq!(tables.counter(&count_key, 2_000), 1);
    }

    #[test]
    fn test_replay_does_not_extend_ttl() {
        let mut tables = Tables::default();
        apply_spend(&mut tables, &request("ik-1", 3), 1_000);
        let ik_key = ik_record_key(&ProjectId::new("proj-1"), "ik-1");
        let before = tables.decisions.get(&ik_key).unwrap().expires_at_ms;
        apply_spend(&mut tables, &request("ik-1", 3), 500_000);
        let after = tables.decisions.get(&ik_key).unwrap().expires_at_ms;
        assert_eq!(before, after);
    }

    #[test]
    fn test_denial_persisted_and_replayed() {
        let mut tables = Tables::default();
        for i in 0..3 {
            let d = apply_spend(&mut tables, &request(&format!("ik-{}", i), 3), 1_000);
            assert!(d.ok);
        }
        let denied = apply_spend(&mut tables, &request("ik-3", 3), 1_000);
        assert!(!denied.ok);
        assert_eq!(denied.error.as_deref(), Some(LIMIT_EXCEEDED));

        // Replaying the denial returns it without touching the counter.
        let replay = apply_spend(&mut tables, &request("ik-3", 3), 1_000);
        assert!(!replay.ok);
        assert!(replay.idempotent);
        let count_key = count_record_key(&request("ik-3", 3).key);
        assert_eq!(tables.counter(&count_key, 1_000), 3);
    }

    #[test]
    fn test_counter_and_ik_ttls_align() {
        let mut tables = Tables::default();
        let req = request("ik-1", 3);
        apply_spend(&mut tables, &req, 1_000);
        let count_key = count_record_key(&req.key);
        let ik_key = ik_record_key(&req.key.project_id, &req.idempotency_key);
        assert_eq!(
            tables.counters.get(&count_key).unwrap().expires_at_ms,
            tables.decisions.get(&ik_key).unwrap().expires_at_ms
        );
    }

    #[test]
    fn test_expired_counter_reads_zero() {
        let mut tables = Tables::default();
        let req = request("ik-1", 3);
        apply_spend(&mut tables, &req, 1_000);
        let count_key = count_record_key(&req.key);
        let past_expiry = 1_000 + 3_600 * 1_000;
        assert_eq!(tables.counter(&count_key, past_expiry), 0);
    }

    #[test]
    fn test_purge_drops_expired_only() {
        let mut tables = Tables::default();
        apply_spend(&mut tables, &request("ik-1", 3), 1_000);
        tables.purge_expired(2_000);
        assert_eq!(tables.counters.len(), 1);
        tables.purge_expired(1_000 + 3_600 * 1_000);
        assert!(tables.counters.is_empty());
        assert!(tables.decisions.is_empty());
    }

    #[test]
    fn test_remaining_floor_is_zero() {
        let mut tables = Tables::default();
        let d = apply_spend(&mut tables, &request("ik-1", 1), 1_000);
        assert!(d.ok);
        assert_eq!(d.remaining, 0);
    }

    #[test]
    fn test_zero_limit_denies_immediately() {
        let mut tables = Tables::default();
        let d = apply_spend(&mut tables, &request("ik-1", 0), 1_000);
        assert!(!d.ok);
    }
}

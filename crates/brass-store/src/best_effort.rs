//! The best-effort backend.

use std::sync::{Arc, RwLock};

use brass_core::{
    Clock, CoreError, CoreResult, CounterStore, ProjectId, SpendDecision, SpendRequest,
    SystemClock,
};

use crate::keys::{count_record_key, grace_record_key, ik_record_key};
use crate::tables::{Entry, Tables, LIMIT_EXCEEDED};

/// Eventually-consistent counter store.
///
/// The spend sequence reads under a shared guard and writes under a
/// separate exclusive guard, so two concurrent spends can both observe
/// count C and both write C+1 — the budget under-counts under contention.
/// Grace de-duplication is a read-before-write check with the same hole.
/// Acceptable for the free tier; strict enforcement requires an atomic
/// backend.
pub struct BestEffortStore {
    tables: RwLock<Tables>,
    clock: Arc<dyn Clock>,
}

impl BestEffortStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            clock,
        }
    }

    fn read(&self) -> CoreResult<std::sync::RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|e| CoreError::Storage(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> CoreResult<std::sync::RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|e| CoreError::Storage(format!("lock poisoned: {}", e)))
    }
}

impl Default for BestEffortStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for BestEffortStore {
    fn spend(&self, request: &SpendRequest) -> CoreResult<SpendDecision> {
        let now_ms = self.clock.now_ms();
        let ik_key = ik_record_key(&request.key.project_id, &request.idempotency_key);
        let count_key = count_record_key(&request.key);

        // Read phase: the guard is dropped before any write happens, so a
        // concurrent spend may observe the same state.
        let (stored, count) = {
            let tables = self.read()?;
            (
                tables.decision(&ik_key, now_ms),
                tables.counter(&count_key, now_ms),
            )
        };

        if let Some(stored) = stored {
            return Ok(stored.replayed());
        }

        if count >= request.limit {
            let denial = SpendDecision::denied(LIMIT_EXCEEDED);
            let mut tables = self.write()?;
            tables.decisions.insert(
                ik_key,
                Entry::new(denial.clone(), now_ms, request.ttl_seconds),
            );
            return Ok(denial);
        }

        let new_count = count + 1;
        let remaining = request.limit.saturating_sub(new_count);
        let decision = SpendDecision::accepted(remaining);
        let mut tables = self.write()?;
        tables.purge_expired(now_ms);
        tables.counters.insert(
            count_key,
            Entry::new(new_count, now_ms, request.ttl_seconds),
        );
        tables.decisions.insert(
            ik_key,
            Entry::new(decision.clone(), now_ms, request.ttl_seconds),
        );
        Ok(decision)
    }

    fn guard_grace(
        &self,
        project_id: &ProjectId,
        grace_key: &str,
        _ttl_seconds: u64,
    ) -> CoreResult<Option<SpendDecision>> {
        // No reservation here: without a transactional backend a marker
        // would not close the race anyway, it would only shrink it.
        let now_ms = self.clock.now_ms();
        let record_key = grace_record_key(project_id, grace_key);
        Ok(self.read()?.grace_decision(&record_key, now_ms))
    }

    fn cache_grace_response(
        &self,
        project_id: &ProjectId,
        grace_key: &str,
        ttl_seconds: u64,
        decision: &SpendDecision,
    ) -> CoreResult<()> {
        if !decision.ok {
            return Ok(());
        }
        let now_ms = self.clock.now_ms();
        let record_key = grace_record_key(project_id, grace_key);
        // Read-before-write de-dup; racing writers can both pass the check.
        if self.read()?.grace_decision(&record_key, now_ms).is_some() {
            return Ok(());
        }
        self.write()?.grace.insert(
            record_key,
            Entry::new(decision.clone(), now_ms, ttl_seconds),
        );
        Ok(())
    }
}

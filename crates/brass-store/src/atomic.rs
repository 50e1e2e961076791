//! The atomic in-memory backend.

use std::sync::{Arc, Mutex};

use brass_core::{
    Clock, CoreError, CoreResult, CounterStore, ProjectId, SpendDecision, SpendRequest,
    SystemClock,
};

use crate::keys::grace_record_key;
use crate::tables::{apply_spend, Entry, Tables, GRACE_PENDING};

/// In-memory counter store with single-writer semantics.
///
/// One mutex guards the whole table set, so a spend's
/// read-compare-write sequence admits no interleaving: operations on the
/// same key (and, incidentally, on all keys) form a total order. This is
/// the only memory-backed implementation safe for strict enforcement.
pub struct AtomicStore {
    tables: Mutex<Tables>,
    clock: Arc<dyn Clock>,
}

impl AtomicStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            tables: Mutex::new(Tables::default()),
            clock,
        }
    }

    fn lock(&self) -> CoreResult<std::sync::MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|e| CoreError::Storage(format!("lock poisoned: {}", e)))
    }
}

impl Default for AtomicStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CounterStore for AtomicStore {
    fn spend(&self, request: &SpendRequest) -> CoreResult<SpendDecision> {
        let now_ms = self.clock.now_ms();
        let mut tables = self.lock()?;
        tables.purge_expired(now_ms);
        Ok(apply_spend(&mut tables, request, now_ms))
    }

    fn guard_grace(
        &self,
        project_id: &ProjectId,
        grace_key: &str,
        ttl_seconds: u64,
    ) -> CoreResult<Option<SpendDecision>> {
        let now_ms = self.clock.now_ms();
        let record_key = grace_record_key(project_id, grace_key);
        let mut tables = self.lock()?;
        if let Some(stored) = tables.grace_decision(&record_key, now_ms) {
            return Ok(Some(stored));
        }
        // Test-and-set: reserve the key so only the first caller proceeds
        // as the writer; the pending marker is non-ok, which readers treat
        // as "re-evaluate".
        tables.grace.insert(
            record_key,
            Entry::new(SpendDecision::denied(GRACE_PENDING), now_ms, ttl_seconds),
        );
        Ok(None)
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
        let mut tables = self.lock()?;
        // Keep the first stored success; replace only the pending marker.
        let replace = match tables.grace_decision(&record_key, now_ms) {
            Some(existing) => !existing.ok,
            None => true,
        };
        if replace {
            tables.grace.insert(
                record_key,
                Entry::new(decision.clone(), now_ms, ttl_seconds),
            );
        }
        Ok(())
    }
}

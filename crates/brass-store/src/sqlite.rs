//! The durable atomic backend.

use std::sync::{Arc, Mutex};

use rusqlite::{params, Connection, OptionalExtension, Transaction};
use tracing::info;

use brass_core::{
    Clock, CoreError, CoreResult, CounterStore, ProjectId, SpendDecision, SpendRequest,
    SystemClock,
};

use crate::keys::{count_record_key, grace_record_key, ik_record_key};
use crate::tables::{GRACE_PENDING, LIMIT_EXCEEDED};

/// SQLite-backed counter store.
///
/// Each spend runs as one transaction behind a connection mutex, so the
/// read-compare-write sequence is atomic and per-key operations form a
/// total order — the durable flavor of the atomic backend. Values are the
/// JSON `SpendDecision` for decisions and a decimal string for counters.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl SqliteStore {
    /// Open or create the database at `path`.
    pub fn open(path: &str) -> CoreResult<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    /// In-memory database, used by tests.
    pub fn in_memory() -> CoreResult<Self> {
        Self::open(":memory:")
    }

    pub fn open_with_clock(path: &str, clock: Arc<dyn Clock>) -> CoreResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| CoreError::Storage(format!("failed to open database: {}", e)))?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS entries (
                k TEXT PRIMARY KEY NOT NULL,
                v TEXT NOT NULL,
                expires_at_ms INTEGER NOT NULL
            );",
        )
        .map_err(|e| CoreError::Storage(format!("failed to create tables: {}", e)))?;
        info!(path, "counter state opened");
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    fn lock(&self) -> CoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CoreError::Storage(format!("lock poisoned: {}", e)))
    }
}

fn get_live(tx: &Transaction<'_>, key: &str, now_ms: u64) -> CoreResult<Option<String>> {
    tx.query_row(
        "SELECT v FROM entries WHERE k = ?1 AND expires_at_ms > ?2",
        params![key, now_ms as i64],
        |row| row.get(0),
    )
    .optional()
    .map_err(|e| CoreError::Storage(format!("query failed: {}", e)))
}

fn put(tx: &Transaction<'_>, key: &str, value: &str, expires_at_ms: u64) -> CoreResult<()> {
    tx.execute(
        "INSERT OR REPLACE INTO entries (k, v, expires_at_ms) VALUES (?1, ?2, ?3)",
        params![key, value, expires_at_ms as i64],
    )
    .map_err(|e| CoreError::Storage(format!("insert failed: {}", e)))?;
    Ok(())
}

fn purge(tx: &Transaction<'_>, now_ms: u64) -> CoreResult<()> {
    tx.execute(
        "DELETE FROM entries WHERE expires_at_ms <= ?1",
        params![now_ms as i64],
    )
    .map_err(|e| CoreError::Storage(format!("purge failed: {}", e)))?;
    Ok(())
}

fn decision_to_json(decision: &SpendDecision) -> CoreResult<String> {
    serde_json::to_string(decision)
        .map_err(|e| CoreError::Storage(format!("decision encode failed: {}", e)))
}

fn decision_from_json(value: &str) -> CoreResult<SpendDecision> {
    serde_json::from_str(value)
        .map_err(|e| CoreError::Storage(format!("decision decode failed: {}", e)))
}

fn commit(tx: Transaction<'_>) -> CoreResult<()> {
    tx.commit()
        .map_err(|e| CoreError::Storage(format!("commit failed: {}", e)))
}

impl CounterStore for SqliteStore {
    fn spend(&self, request: &SpendRequest) -> CoreResult<SpendDecision> {
        let now_ms = self.clock.now_ms();
        let expires_at_ms = now_ms + request.ttl_seconds * 1_000;
        let ik_key = ik_record_key(&request.key.project_id, &request.idempotency_key);
        let count_key = count_record_key(&request.key);

        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Storage(format!("transaction failed: {}", e)))?;
        purge(&tx, now_ms)?;

        if let Some(stored) = get_live(&tx, &ik_key, now_ms)? {
            let decision = decision_from_json(&stored)?.replayed();
            commit(tx)?;
            return Ok(decision);
        }

        let count: u64 = match get_live(&tx, &count_key, now_ms)? {
            Some(v) => v
                .parse()
                .map_err(|_| CoreError::Storage("counter is not an integer".into()))?,
            None => 0,
        };

        if count >= request.limit {
            let denial = SpendDecision::denied(LIMIT_EXCEEDED);
            put(&tx, &ik_key, &decision_to_json(&denial)?, expires_at_ms)?;
            commit(tx)?;
            return Ok(denial);
        }

        let new_count = count + 1;
        let decision = SpendDecision::accepted(request.limit.saturating_sub(new_count));
        put(&tx, &count_key, &new_count.to_string(), expires_at_ms)?;
        put(&tx, &ik_key, &decision_to_json(&decision)?, expires_at_ms)?;
        commit(tx)?;
        Ok(decision)
    }

    fn guard_grace(
        &self,
        project_id: &ProjectId,
        grace_key: &str,
        ttl_seconds: u64,
    ) -> CoreResult<Option<SpendDecision>> {
        let now_ms = self.clock.now_ms();
        let record_key = grace_record_key(project_id, grace_key);
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Storage(format!("transaction failed: {}", e)))?;

        if let Some(stored) = get_live(&tx, &record_key, now_ms)? {
            let decision = decision_from_json(&stored)?;
            commit(tx)?;
            return Ok(Some(decision));
        }

        let pending = SpendDecision::denied(GRACE_PENDING);
        put(
            &tx,
            &record_key,
            &decision_to_json(&pending)?,
            now_ms + ttl_seconds * 1_000,
        )?;
        commit(tx)?;
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
        let mut conn = self.lock()?;
        let tx = conn
            .transaction()
            .map_err(|e| CoreError::Storage(format!("transaction failed: {}", e)))?;

        let keep_existing = match get_live(&tx, &record_key, now_ms)? {
            Some(stored) => decision_from_json(&stored)?.ok,
            None => false,
        };
        if !keep_existing {
            put(
                &tx,
                &record_key,
                &decision_to_json(decision)?,
                now_ms + ttl_seconds * 1_000,
            )?;
        }
        commit(tx)?;
        Ok(())
    }
}

//! Telemetry event records.
//!
//! The verifier only *emits* events; transport is someone else's problem.
//! Sinks must never block the response path, and the bounded sink drops
//! on overflow rather than applying backpressure.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use tracing::info;

/// One record per terminal handler state.
#[derive(Debug, Clone, Serialize)]
pub struct SpendEvent {
    /// "ok", "limit_exceeded", or a rejection kind.
    pub result: String,
    pub response_time_ms: u64,
    pub in_grace_period: bool,
    /// True when a cached grace decision was replayed instead of spending.
    pub grace_protected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idempotent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u64>,
}

pub trait TelemetrySink: Send + Sync {
    fn emit(&self, event: SpendEvent);
}

/// Logs events as structured tracing records.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TelemetrySink for TracingSink {
    fn emit(&self, event: SpendEvent) {
        info!(
            target: "brass::telemetry",
            result = %event.result,
            response_time_ms = event.response_time_ms,
            in_grace_period = event.in_grace_period,
            grace_protected = event.grace_protected,
            idempotent = ?event.idempotent,
            remaining = ?event.remaining,
            "spend"
        );
    }
}

/// Bounded in-memory sink. Keeps the first `capacity` events and counts
/// the rest as dropped; used by tests and local debugging.
#[derive(Debug)]
pub struct MemorySink {
    capacity: usize,
    events: Mutex<Vec<SpendEvent>>,
    dropped: AtomicU64,
}

impl MemorySink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            events: Mutex::new(Vec::new()),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn events(&self) -> Vec<SpendEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl TelemetrySink for MemorySink {
    fn emit(&self, event: SpendEvent) {
        if let Ok(mut events) = self.events.lock() {
            if events.len() < self.capacity {
                events.push(event);
                return;
            }
        }
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }
}

//! BRASS: a privacy-preserving rate-limiting verifier.
//!
//! Clients present blinded, issuer-signed epoch passes; the verifier
//! checks two DLEQ proofs over P-256, derives a server-authoritative
//! nullifier from public context, and enforces a per-(origin, policy,
//! window) budget with idempotent spend accounting and a midnight grace
//! band. This crate is the orchestrator: configuration, authentication,
//! the spend pipeline, telemetry, and the HTTP surface.

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod http;
pub mod telemetry;

pub use auth::{ApiKeyLookup, ApiKeyRecord, StaticKeyTable};
pub use config::{Config, KvSecret, StorageBackendKind};
pub use error::{BrassError, BrassResult};
pub use handler::{handle_spend, RequestContext, SpendOutcome, WindowUsed};
pub use telemetry::{MemorySink, SpendEvent, TelemetrySink, TracingSink};

use std::sync::Arc;

use p256::AffinePoint;

use brass_core::codec::{b64url_decode, decode_point, encode_point};
use brass_core::{Clock, CounterStore, SystemClock};
use brass_store::{AtomicStore, BestEffortStore, SqliteStore};

/// Shared per-process state. Built once at startup; the handler receives
/// it by reference and owns no globals.
pub struct AppState {
    pub config: Config,
    pub issuer_point: AffinePoint,
    /// Compressed encoding of the issuer public key; feeds η and the
    /// counter key.
    pub issuer_pk_enc: [u8; 33],
    pub store: Arc<dyn CounterStore>,
    pub keys: Arc<dyn ApiKeyLookup>,
    pub telemetry: Arc<dyn TelemetrySink>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Wire up explicit collaborators. Validates the issuer key once so
    /// the hot path never re-parses it.
    pub fn new(
        config: Config,
        store: Arc<dyn CounterStore>,
        keys: Arc<dyn ApiKeyLookup>,
        telemetry: Arc<dyn TelemetrySink>,
        clock: Arc<dyn Clock>,
    ) -> BrassResult<Self> {
        config.validate()?;
        let pk_bytes = b64url_decode(&config.issuer_pubkey)
            .map_err(|_| BrassError::Config("BRASS_ISSUER_PUBKEY is not base64url".into()))?;
        let issuer_point = decode_point(&pk_bytes)
            .map_err(|kind| BrassError::Config(format!("BRASS_ISSUER_PUBKEY rejected: {}", kind)))?;
        Ok(Self {
            issuer_pk_enc: encode_point(&issuer_point),
            issuer_point,
            store,
            keys,
            telemetry,
            clock,
            config,
        })
    }

    /// Production wiring from a validated config: backend per
    /// `STORAGE_BACKEND` (durable when a state path is set), the fallback
    /// key table, tracing telemetry, wall-clock time.
    pub fn from_config(config: Config) -> BrassResult<Self> {
        let store: Arc<dyn CounterStore> = match (config.backend, &config.state_path) {
            (StorageBackendKind::Atomic, Some(path)) => Arc::new(SqliteStore::open(path)?),
            (StorageBackendKind::Atomic, None) => Arc::new(AtomicStore::new()),
            (StorageBackendKind::BestEffort, _) => Arc::new(BestEffortStore::new()),
        };
        let keys = Arc::new(StaticKeyTable::from_config(&config));
        Self::new(
            config,
            store,
            keys,
            Arc::new(TracingSink),
            Arc::new(SystemClock),
        )
    }

    /// Mode string surfaced by the health probe.
    pub fn mode(&self) -> String {
        match (self.config.backend, &self.config.state_path) {
            (StorageBackendKind::Atomic, Some(_)) => "atomic:durable".into(),
            (StorageBackendKind::Atomic, None) => "atomic".into(),
            (StorageBackendKind::BestEffort, _) => "best-effort".into(),
        }
    }
}

//! Environment-backed configuration.
//!
//! A validated record constructed once at startup and passed explicitly
//! into the handler; nothing reads the environment after boot.

use std::fmt;
use std::str::FromStr;

use zeroize::Zeroizing;

use brass_core::codec::{b64url_decode, decode_point};

use crate::error::{BrassError, BrassResult};

/// Which counter-store consistency level to run with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageBackendKind {
    /// Single-writer, strongly consistent. Required for strict enforcement.
    #[default]
    Atomic,
    /// Eventually consistent; may under-count under contention.
    BestEffort,
}

impl StorageBackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageBackendKind::Atomic => "atomic",
            StorageBackendKind::BestEffort => "best-effort",
        }
    }
}

impl FromStr for StorageBackendKind {
    type Err = BrassError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "atomic" => Ok(StorageBackendKind::Atomic),
            "best-effort" => Ok(StorageBackendKind::BestEffort),
            other => Err(BrassError::Config(format!(
                "STORAGE_BACKEND must be 'atomic' or 'best-effort', got '{}'",
                other
            ))),
        }
    }
}

/// The process HMAC key for idempotency-key derivation. Zeroized on drop
/// and never printed.
#[derive(Clone)]
pub struct KvSecret(Zeroizing<[u8; 32]>);

impl KvSecret {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn from_b64url(encoded: &str) -> BrassResult<Self> {
        let bytes = b64url_decode(encoded)
            .map_err(|_| BrassError::Config("BRASS_KV_SECRET is not base64url".into()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| BrassError::Config("BRASS_KV_SECRET must be 32 bytes".into()))?;
        Ok(Self::new(arr))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl fmt::Debug for KvSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KvSecret(..)")
    }
}

/// Default per-window request budget when API-key lookup is disabled.
const DEFAULT_FALLBACK_LIMIT: u64 = 100;

/// Default width of the midnight grace band, in seconds.
const DEFAULT_GRACE_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: StorageBackendKind,
    /// Width of the midnight grace band in seconds.
    pub grace_seconds: u64,
    /// Budget used with the fallback API key.
    pub fallback_limit: u64,
    /// base64url compressed issuer public key Y.
    pub issuer_pubkey: String,
    /// Fallback API key accepted when no key table is wired up.
    pub api_key: Option<String>,
    pub kv_secret: KvSecret,
    /// When set, the atomic backend persists counters here (SQLite).
    pub state_path: Option<String>,
    pub telemetry_url: Option<String>,
    pub telemetry_key: Option<String>,
    pub deployment_id: Option<String>,
}

impl Config {
    pub fn new(issuer_pubkey: impl Into<String>, kv_secret: KvSecret) -> Self {
        Self {
            backend: StorageBackendKind::Atomic,
            grace_seconds: DEFAULT_GRACE_SECONDS,
            fallback_limit: DEFAULT_FALLBACK_LIMIT,
            issuer_pubkey: issuer_pubkey.into(),
            api_key: None,
            kv_secret,
            state_path: None,
            telemetry_url: None,
            telemetry_key: None,
            deployment_id: None,
        }
    }

    /// Build from the process environment. Fails fast on anything
    /// malformed; a verifier with a half-read config must not serve.
    pub fn from_env() -> BrassResult<Self> {
        let issuer_pubkey = require_var("BRASS_ISSUER_PUBKEY")?;
        let kv_secret = KvSecret::from_b64url(&require_var("BRASS_KV_SECRET")?)?;
        let mut config = Config::new(issuer_pubkey, kv_secret);

        if let Ok(backend) = std::env::var("STORAGE_BACKEND") {
            config.backend = backend.parse()?;
        }
        if let Ok(grace) = std::env::var("BOUNDARY_GRACE_SECONDS") {
            config.grace_seconds = grace.parse().map_err(|_| {
                BrassError::Config("BOUNDARY_GRACE_SECONDS must be an integer".into())
            })?;
        }
        if let Ok(limit) = std::env::var("BRASS_RATE_LIMIT") {
            config.fallback_limit = limit
                .parse()
                .map_err(|_| BrassError::Config("BRASS_RATE_LIMIT must be an integer".into()))?;
        }
        config.api_key = std::env::var("BRASS_SECRET_KEY").ok();
        config.state_path = std::env::var("BRASS_STATE_PATH").ok();
        config.telemetry_url = std::env::var("BRASS_TELEMETRY_URL").ok();
        config.telemetry_key = std::env::var("BRASS_TELEMETRY_KEY").ok();
        config.deployment_id = std::env::var("BRASS_DEPLOYMENT_ID").ok();

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> BrassResult<()> {
        let pk = b64url_decode(&self.issuer_pubkey)
            .map_err(|_| BrassError::Config("BRASS_ISSUER_PUBKEY is not base64url".into()))?;
        decode_point(&pk).map_err(|kind| {
            BrassError::Config(format!("BRASS_ISSUER_PUBKEY rejected: {}", kind))
        })?;

        if self.grace_seconds == 0 || self.grace_seconds > 3_600 {
            return Err(BrassError::Config(format!(
                "BOUNDARY_GRACE_SECONDS must be in 1..=3600, got {}",
                self.grace_seconds
            )));
        }
        if self.fallback_limit == 0 {
            return Err(BrassError::Config("BRASS_RATE_LIMIT must be > 0".into()));
        }
        Ok(())
    }
}

fn require_var(name: &str) -> BrassResult<String> {
    std::env::var(name).map_err(|_| BrassError::Config(format!("{} is required", name)))
}

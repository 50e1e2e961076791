use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Typed identifiers — prevent stringly-typed confusion between tenants
// and policies
// ---------------------------------------------------------------------------

macro_rules! define_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

define_id!(ProjectId, "Tenant identifier; prefixes every persisted key.");
define_id!(PolicyId, "Rate-limit policy identifier, parsed out of AADr.");

// ---------------------------------------------------------------------------
// WindowId — the accumulation window a budget counts against
// ---------------------------------------------------------------------------

/// One accumulation window. Currently a one-day window whose id equals the
/// epoch-day number; kept as a distinct type so sub-day windows can slot in
/// without touching any derivation call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WindowId(pub u64);

impl WindowId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// CounterKey — addresses one (tenant, origin, policy, window, nullifier)
// budget counter
// ---------------------------------------------------------------------------

/// Fully-qualified counter address. The `wire()` form is bit-stable:
/// third-party debug tooling and migration code parse it, so neither the
/// field order nor the `project:` prefix may change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CounterKey {
    pub project_id: ProjectId,
    /// base64url of the issuer public key's compressed encoding.
    pub issuer_pk: String,
    /// Canonical origin, e.g. `https://example.com`.
    pub origin: String,
    pub epoch_days: u64,
    pub policy_id: PolicyId,
    pub window_id: WindowId,
    /// base64url of the 32-byte nullifier y.
    pub nullifier: String,
}

impl CounterKey {
    /// Serialize into the pipe-separated namespaced identifier:
    /// `project:<pid>|<issuerPk>|<origin>|<epoch>|<policyId>|<windowId>|<y>`.
    pub fn wire(&self) -> String {
        format!(
            "project:{}|{}|{}|{}|{}|{}|{}",
            self.project_id,
            self.issuer_pk,
            self.origin,
            self.epoch_days,
            self.policy_id,
            self.window_id,
            self.nullifier
        )
    }
}

// ---------------------------------------------------------------------------
// SpendRequest / SpendDecision — the counter-store exchange
// ---------------------------------------------------------------------------

/// One spend attempt against a counter.
#[derive(Debug, Clone)]
pub struct SpendRequest {
    pub key: CounterKey,
    /// Keyed hash of (y, c); identifies one logical spend across retries.
    pub idempotency_key: String,
    pub limit: u64,
    /// TTL for both the counter and the idempotency record, aligned with
    /// the end of the current window.
    pub ttl_seconds: u64,
}

/// The stored, replayable outcome of a spend. Idempotent replays return
/// this byte-for-byte (modulo the `idempotent` flag).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendDecision {
    pub ok: bool,
    pub remaining: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub idempotent: bool,
}

impl SpendDecision {
    pub fn accepted(remaining: u64) -> Self {
        Self {
            ok: true,
            remaining,
            error: None,
            idempotent: false,
        }
    }

    pub fn denied(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            remaining: 0,
            error: Some(error.into()),
            idempotent: false,
        }
    }

    /// The same decision, flagged as an idempotent replay.
    pub fn replayed(&self) -> Self {
        Self {
            idempotent: true,
            ..self.clone()
        }
    }
}

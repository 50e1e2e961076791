//! API-key authentication.
//!
//! The lookup is the only source of tenancy and limits; its project id is
//! threaded into every counter and grace key.

use std::collections::HashMap;

use brass_core::ProjectId;

use crate::config::Config;

/// Tenancy record behind a valid API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKeyRecord {
    pub project_id: ProjectId,
    pub limit: u64,
}

pub trait ApiKeyLookup: Send + Sync {
    /// `None` means the key is unknown or revoked.
    fn lookup(&self, api_key: &str) -> Option<ApiKeyRecord>;
}

/// In-memory key table. Production deployments back this with a control
/// plane; the fallback single-key mode covers self-hosted setups.
#[derive(Debug, Default)]
pub struct StaticKeyTable {
    keys: HashMap<String, ApiKeyRecord>,
}

/// Project id used by the fallback key configured via the environment.
pub const FALLBACK_PROJECT: &str = "default";

impl StaticKeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from config: the fallback API key maps to the fallback limit.
    pub fn from_config(config: &Config) -> Self {
        let mut table = Self::new();
        if let Some(key) = &config.api_key {
            table.insert(
                key.clone(),
                ApiKeyRecord {
                    project_id: ProjectId::new(FALLBACK_PROJECT),
                    limit: config.fallback_limit,
                },
            );
        }
        table
    }

    pub fn insert(&mut self, api_key: impl Into<String>, record: ApiKeyRecord) {
        self.keys.insert(api_key.into(), record);
    }
}

impl ApiKeyLookup for StaticKeyTable {
    fn lookup(&self, api_key: &str) -> Option<ApiKeyRecord> {
        self.keys.get(api_key).cloned()
    }
}

/// Extract the key from an `Authorization: Bearer <key>` header value.
pub fn bearer_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

//! Persisted key families.
//!
//! Three prefixes, all tenant-scoped. The shapes are load-bearing:
//! debug tooling and migration code parse them.

use brass_core::{CounterKey, ProjectId};

/// Budget counters: `count:<counterKey>`.
pub const COUNT_KEY_PREFIX: &str = "count:";

/// Cached spend decisions: `ik:project:<projectId>:<IK>`.
pub const IK_KEY_PREFIX: &str = "ik:project:";

/// Cached boundary-grace decisions: `grace:project:<projectId>:<graceKey>`.
pub const GRACE_KEY_PREFIX: &str = "grace:project:";

pub fn count_record_key(key: &CounterKey) -> String {
    format!("{}{}", COUNT_KEY_PREFIX, key.wire())
}

pub fn ik_record_key(project_id: &ProjectId, idempotency_key: &str) -> String {
    format!("{}{}:{}", IK_KEY_PREFIX, project_id, idempotency_key)
}

pub fn grace_record_key(project_id: &ProjectId, grace_key: &str) -> String {
    format!("{}{}:{}", GRACE_KEY_PREFIX, project_id, grace_key)
}

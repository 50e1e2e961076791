//! Policy routing out of client-supplied AADr.

use brass_core::PolicyId;

/// Policy id used when AADr carries no `policy=` token.
pub const DEFAULT_POLICY: &str = "default";

/// Extract the policy id from AADr: the first `policy=VALUE` token of the
/// `|`-separated string. AADr is otherwise opaque bytes; only this one
/// token is interpreted, and only for routing.
pub fn parse_policy_id(aadr: &str) -> PolicyId {
    aadr.split('|')
        .find_map(|token| token.strip_prefix("policy="))
        .filter(|value| !value.is_empty())
        .map(PolicyId::new)
        .unwrap_or_else(|| PolicyId::new(DEFAULT_POLICY))
}

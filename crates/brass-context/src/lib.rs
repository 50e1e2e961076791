//! Deterministic derivation layer for the BRASS spend verifier.
//!
//! Everything here is a total, deterministic function of *public* inputs:
//! the server — not the client — is the authoritative choice of salt and
//! nullifier. Origin canonicalization is a security boundary and lives
//! here next to the derivations that consume its output.

pub mod derive;
pub mod error;
pub mod origin;
pub mod policy;
pub mod window;

pub use derive::{
    grace_nullifier, http_context_digest, idempotency_key, nullifier_y, salt_eta, tls_binding,
    PROTOCOL_VERSION, SUITE_ID,
};
pub use error::{OriginError, OriginResult};
pub use origin::canonical_origin;
pub use policy::parse_policy_id;
pub use window::{epoch_days, in_boundary_grace, seconds_until_window_end, window_id};

//! Deterministic derivations: per-window salt, nullifiers, idempotency
//! key, TLS channel binding, and the HTTP-context digest.
//!
//! Every input is public (or, for the idempotency key, a server-held
//! secret); the derivations are the server's authoritative replacement for
//! any client-chosen salt or nullifier.

use brass_core::codec::b64url_encode;
use brass_core::hash::{be64, h3, hmac_sha256, sha256};
use brass_core::{CoreResult, PolicyId, WindowId};

/// Cipher-suite identifier bound into proofs and grace keys.
pub const SUITE_ID: &str = "P256_SHA256";

/// Protocol version bound into proofs and grace keys.
pub const PROTOCOL_VERSION: &str = "BRASS_v2.0";

const SALT_DOMAIN: &str = "BRASS_SALT_v1";
const NULLIFIER_DOMAIN: &str = "BRASS_NULLIFIER_v1";
const GRACE_DOMAIN: &str = "BRASS_GRACE_v1";
const HTTP_CTX_DOMAIN: &str = "BRASS:HTTP_CTX_v1:";
const TLS_EXPORTER_DOMAIN: &str = "tls_exporter";
const TLS_NO_EXPORTER_DOMAIN: &str = "no_exporter";

/// Per-window salt η. Rotates every window; identical for
/// canonical-equivalent origins, distinct across origins and policies.
pub fn salt_eta(
    issuer_pk: &[u8],
    canonical_origin: &str,
    epoch_days: u64,
    policy_id: &PolicyId,
    window_id: WindowId,
) -> [u8; 32] {
    h3(&[
        SALT_DOMAIN.as_bytes(),
        issuer_pk,
        canonical_origin.as_bytes(),
        &be64(epoch_days),
        policy_id.as_str().as_bytes(),
        &be64(window_id.as_u64()),
    ])
}

/// Nullifier y: the single-use tag for one token in one window. η folds
/// in origin and window, so replay across either lands on a different y.
pub fn nullifier_y(z_prime_enc: &[u8], kid: &str, aadr: &str, eta: &[u8; 32]) -> [u8; 32] {
    h3(&[
        NULLIFIER_DOMAIN.as_bytes(),
        z_prime_enc,
        kid.as_bytes(),
        aadr.as_bytes(),
        eta,
    ])
}

/// Window-agnostic grace nullifier y_g. Deliberately omits the window so
/// the same token presented on either side of UTC midnight collides.
pub fn grace_nullifier(
    z_prime_enc: &[u8],
    kid: &str,
    issuer_pk: &[u8],
    canonical_origin: &str,
    policy_id: &PolicyId,
    aadr: &str,
) -> [u8; 32] {
    h3(&[
        GRACE_DOMAIN.as_bytes(),
        z_prime_enc,
        kid.as_bytes(),
        issuer_pk,
        canonical_origin.as_bytes(),
        policy_id.as_str().as_bytes(),
        SUITE_ID.as_bytes(),
        PROTOCOL_VERSION.as_bytes(),
        aadr.as_bytes(),
    ])
}

/// Idempotency key: base64url of
/// `HMAC-SHA-256(kv_secret, len(y) ‖ y ‖ len(c) ‖ c)` with 4-byte
/// big-endian lengths. Keyed so clients cannot enumerate the IK space.
pub fn idempotency_key(kv_secret: &[u8], y: &[u8; 32], client_nonce: &[u8]) -> CoreResult<String> {
    let mut preimage = Vec::with_capacity(8 + y.len() + client_nonce.len());
    preimage.extend_from_slice(&(y.len() as u32).to_be_bytes());
    preimage.extend_from_slice(y);
    preimage.extend_from_slice(&(client_nonce.len() as u32).to_be_bytes());
    preimage.extend_from_slice(client_nonce);
    Ok(b64url_encode(&hmac_sha256(kv_secret, &preimage)?))
}

/// TLS channel-binding digest. The two modes are domain-separated so an
/// absent exporter can never collide with any exporter value.
pub fn tls_binding(exporter: Option<&[u8]>) -> [u8; 32] {
    match exporter {
        Some(bytes) => h3(&[TLS_EXPORTER_DOMAIN.as_bytes(), bytes]),
        None => h3(&[TLS_NO_EXPORTER_DOMAIN.as_bytes()]),
    }
}

/// HTTP-context digest d over (uppercased method, path as presented,
/// SHA-256 of the raw body).
pub fn http_context_digest(method: &str, path: &str, body_sha256: &[u8; 32]) -> [u8; 32] {
    h3(&[
        HTTP_CTX_DOMAIN.as_bytes(),
        method.to_ascii_uppercase().as_bytes(),
        path.as_bytes(),
        body_sha256,
    ])
}

/// Convenience: digest straight from the raw body bytes.
pub fn http_context_digest_for_body(method: &str, path: &str, body: &[u8]) -> [u8; 32] {
    http_context_digest(method, path, &sha256(body))
}

//! SHA-256, HMAC-SHA-256, the length-prefixed domain-separated hash `H3`,
//! and constant-time byte comparison.

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{CoreError, CoreResult};

type HmacSha256 = Hmac<Sha256>;

/// Plain SHA-256.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Domain-separated hash over length-prefixed parts:
/// `SHA-256(len(p1) ‖ p1 ‖ len(p2) ‖ p2 ‖ …)` with 4-byte big-endian lengths.
///
/// The prefix defeats boundary-shift collisions: `["a|b", "c"]` and
/// `["a", "b|c"]` hash differently even though their concatenations agree.
/// Empty parts are permitted and still contribute a zero-length prefix, so
/// the number of parts matters.
pub fn h3(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u32).to_be_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Fixed 8-byte big-endian encoding for integers fed into `h3`.
pub fn be64(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// HMAC-SHA-256 over `message` with `key`.
pub fn hmac_sha256(key: &[u8], message: &[u8]) -> CoreResult<[u8; 32]> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|_| CoreError::Crypto("hmac key rejected".into()))?;
    mac.update(message);
    Ok(mac.finalize().into_bytes().into())
}

/// Constant-time equality for byte strings. Lengths are public, so a
/// length mismatch may short-circuit; contents are compared in constant
/// time via `subtle`.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

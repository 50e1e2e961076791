//! Schnorr-style DLEQ proofs over P-256 with a Fiat-Shamir challenge.
//!
//! A proof (c, s) for the tuple (g1, h1, g2, h2) convinces the verifier
//! that one scalar w satisfies h1 = w·g1 and h2 = w·g2 without revealing
//! w. The challenge is derived from the length-prefixed transcript hash,
//! domain-separated by a label and an application binding.

use core::fmt;

use p256::elliptic_curve::ops::Reduce;
use p256::{AffinePoint, FieldBytes, ProjectivePoint, Scalar};
use rand_core::{CryptoRng, RngCore};
use subtle::ConstantTimeEq;

use brass_core::codec::encode_point;
use brass_core::hash::h3;

/// A DLEQ proof: Fiat-Shamir challenge `c` and Schnorr response `s`.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct DleqProof {
    pub c: Scalar,
    pub s: Scalar,
}

impl fmt::Debug for DleqProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Scalars are public proof material, but full transcripts are
        // noisy; show a short prefix.
        write!(
            f,
            "DleqProof {{ c: {}.., s: {}.. }}",
            hex::encode(&self.c.to_bytes()[..4]),
            hex::encode(&self.s.to_bytes()[..4])
        )
    }
}

/// Fiat-Shamir challenge: `H3("BRASS:"+label+":", enc(g1), enc(h1),
/// enc(g2), enc(h2), enc(A1), enc(A2), bind) mod n`.
pub fn challenge_scalar(
    label: &str,
    g1: &AffinePoint,
    h1: &AffinePoint,
    g2: &AffinePoint,
    h2: &AffinePoint,
    a1: &AffinePoint,
    a2: &AffinePoint,
    bind: &[u8],
) -> Scalar {
    let domain = format!("BRASS:{}:", label);
    let digest = h3(&[
        domain.as_bytes(),
        &encode_point(g1),
        &encode_point(h1),
        &encode_point(g2),
        &encode_point(h2),
        &encode_point(a1),
        &encode_point(a2),
        bind,
    ]);
    Scalar::reduce_bytes(&FieldBytes::from(digest))
}

/// Create a DLEQ proof for witness `w` with `h1 = w·g1`, `h2 = w·g2`.
///
/// The verifier reconstructs commitments as `A = s·g + c·h`, so the
/// response is `s = t − c·w` for a fresh nonce t.
pub fn prove<R: RngCore + CryptoRng>(
    w: &Scalar,
    g1: &AffinePoint,
    h1: &AffinePoint,
    g2: &AffinePoint,
    h2: &AffinePoint,
    label: &str,
    bind: &[u8],
    rng: &mut R,
) -> DleqProof {
    let t = random_scalar(rng);
    let a1 = (ProjectivePoint::from(*g1) * t).to_affine();
    let a2 = (ProjectivePoint::from(*g2) * t).to_affine();
    let c = challenge_scalar(label, g1, h1, g2, h2, &a1, &a2, bind);
    let s = t - c * w;
    DleqProof { c, s }
}

/// Verify a DLEQ proof: reconstruct `A1' = s·g1 + c·h1`,
/// `A2' = s·g2 + c·h2`, recompute the challenge, and accept iff it equals
/// `c`. The final comparison is constant-time.
pub fn verify(
    g1: &AffinePoint,
    h1: &AffinePoint,
    g2: &AffinePoint,
    h2: &AffinePoint,
    proof: &DleqProof,
    label: &str,
    bind: &[u8],
) -> bool {
    let a1 = (ProjectivePoint::from(*g1) * proof.s + ProjectivePoint::from(*h1) * proof.c)
        .to_affine();
    let a2 = (ProjectivePoint::from(*g2) * proof.s + ProjectivePoint::from(*h2) * proof.c)
        .to_affine();
    let expected = challenge_scalar(label, g1, h1, g2, h2, &a1, &a2, bind);
    bool::from(expected.to_bytes().ct_eq(&proof.c.to_bytes()))
}

fn random_scalar<R: RngCore + CryptoRng>(rng: &mut R) -> Scalar {
    // Rejection-free wide reduction of 32 fresh bytes.
    let mut bytes = FieldBytes::default();
    rng.fill_bytes(&mut bytes);
    Scalar::reduce_bytes(&bytes)
}

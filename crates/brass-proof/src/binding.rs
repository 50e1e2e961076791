//! The two spend proofs and the client-proof binding context.

use p256::AffinePoint;

use brass_context::{PROTOCOL_VERSION, SUITE_ID};
use brass_core::hash::{be64, h3};
use brass_core::{PolicyId, WindowId};

use crate::dleq::{self, DleqProof};
use crate::error::{ProofError, ProofResult};

/// Shared Fiat-Shamir label for both spend proofs.
pub const DLEQ_LABEL: &str = "OPRF_METERING_DLEQ_v1";

const BIND_DOMAIN: &str = "BIND";

/// Verify the issuer proof π_I over (G, Y, M, Z): the issuer applied the
/// same secret scalar k to the base point (producing its public key Y) and
/// to the blinded token M (producing Z).
pub fn verify_issuer_proof(
    issuer_pk: &AffinePoint,
    m: &AffinePoint,
    z: &AffinePoint,
    proof: &DleqProof,
) -> ProofResult<()> {
    let ok = dleq::verify(
        &AffinePoint::GENERATOR,
        issuer_pk,
        m,
        z,
        proof,
        DLEQ_LABEL,
        b"",
    );
    if ok {
        Ok(())
    } else {
        Err(ProofError::IssuerProof)
    }
}

/// Inputs to the client-proof binding tuple. All server-derived or
/// cross-checked; only AADr and KID originate with the client, and neither
/// is security-critical in this position.
pub struct BindingContext<'a> {
    pub nullifier: &'a [u8; 32],
    pub client_nonce: &'a [u8],
    pub http_context: &'a [u8; 32],
    pub tls_binding: &'a [u8; 32],
    pub window_id: WindowId,
    pub policy_id: &'a PolicyId,
    pub aadr: &'a str,
    pub kid: &'a str,
    pub eta: &'a [u8; 32],
}

/// The binding hash for π_C. A presentation moved to a different HTTP
/// target, window, policy, or tenant context changes this value and
/// invalidates the proof.
pub fn client_binding(ctx: &BindingContext<'_>) -> [u8; 32] {
    h3(&[
        BIND_DOMAIN.as_bytes(),
        ctx.nullifier,
        ctx.client_nonce,
        ctx.http_context,
        ctx.tls_binding,
        &be64(ctx.window_id.as_u64()),
        SUITE_ID.as_bytes(),
        PROTOCOL_VERSION.as_bytes(),
        ctx.policy_id.as_str().as_bytes(),
        ctx.aadr.as_bytes(),
        ctx.kid.as_bytes(),
        ctx.eta,
    ])
}

/// Verify the client unblinding proof π_C over (P, M, Z', Z): one scalar r
/// satisfies M = r·P and Z = r·Z', i.e. the presenter knows the blinding
/// scalar that links the blinded token to the unblinded one.
pub fn verify_client_proof(
    p: &AffinePoint,
    m: &AffinePoint,
    z_prime: &AffinePoint,
    z: &AffinePoint,
    proof: &DleqProof,
    bind: &[u8; 32],
) -> ProofResult<()> {
    if dleq::verify(p, m, z_prime, z, proof, DLEQ_LABEL, bind) {
        Ok(())
    } else {
        Err(ProofError::ClientProof)
    }
}

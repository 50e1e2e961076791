//! The presentation payload a client submits with a spend.
//!
//! Byte-string fields are unpadded base64url on the wire. Unknown JSON
//! fields are ignored; required fields missing fail decoding (surfaced as
//! a server error, not a proof error).

use p256::{AffinePoint, Scalar};
use serde::{Deserialize, Serialize};

use brass_core::codec::{b64url_decode, decode_point, decode_scalar};
use brass_core::ErrorKind;

use crate::dleq::DleqProof;
use crate::error::{ProofError, ProofResult};

/// A DLEQ proof as carried on the wire: base64url 32-byte scalars.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofScalars {
    pub c: String,
    pub r: String,
}

/// Wire form of a presentation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presentation {
    /// Issuer key identifier.
    pub kid: String,
    /// Client-supplied associated data; opaque bytes except for the
    /// `policy=` token.
    pub aadr: String,
    /// The origin the pass was issued against (canonicalized server-side).
    pub origin: String,
    /// Days since the Unix epoch the pass was minted for. Not
    /// authoritative; the server recomputes.
    pub epoch: u64,
    /// P = H2C(origin ‖ epoch ‖ policy), compressed.
    pub p: String,
    /// M = r·P, the blinded token.
    pub m: String,
    /// Z = k·M, the issuer's evaluation.
    pub z: String,
    /// Z' = k·P, the unblinded token.
    pub z_prime: String,
    /// 16-byte client nonce.
    pub c: String,
    /// Issuer DLEQ proof over (G, Y, M, Z).
    pub pi_i: ProofScalars,
    /// Client unblinding proof, context-bound.
    pub pi_c: ProofScalars,
    /// Client's copy of the HTTP-context digest, cross-checked if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub d_client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_body_hash_b64: Option<String>,
    /// RFC 5705 TLS exporter bytes for channel binding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_exporter_b64: Option<String>,
}

impl Presentation {
    pub fn from_json(body: &[u8]) -> ProofResult<Self> {
        serde_json::from_slice(body)
            .map_err(|e| ProofError::Decode(format!("presentation json: {}", e)))
    }

    pub fn decode(&self) -> ProofResult<DecodedPresentation> {
        DecodedPresentation::decode(self)
    }
}

/// A presentation with every point and scalar validated.
#[derive(Debug, Clone)]
pub struct DecodedPresentation {
    pub p: AffinePoint,
    pub m: AffinePoint,
    pub z: AffinePoint,
    pub z_prime: AffinePoint,
    /// Compressed encoding of Z', an input to the nullifier derivations.
    pub z_prime_enc: [u8; 33],
    pub nonce: Vec<u8>,
    pub pi_i: DleqProof,
    pub pi_c: DleqProof,
    pub d_client: Option<Vec<u8>>,
    pub tls_exporter: Option<Vec<u8>>,
}

impl DecodedPresentation {
    pub fn decode(wire: &Presentation) -> ProofResult<Self> {
        let p = decode_point_field(&wire.p)?;
        let m = decode_point_field(&wire.m)?;
        let z = decode_point_field(&wire.z)?;
        let z_prime = decode_point_field(&wire.z_prime)?;
        let z_prime_enc = brass_core::codec::encode_point(&z_prime);

        let nonce = b64url_decode(&wire.c)
            .map_err(|_| ProofError::Decode("client nonce is not base64url".into()))?;

        let pi_i = decode_proof(&wire.pi_i)?;
        let pi_c = decode_proof(&wire.pi_c)?;

        let d_client = match &wire.d_client {
            Some(d) => Some(
                b64url_decode(d)
                    .map_err(|_| ProofError::Decode("d_client is not base64url".into()))?,
            ),
            None => None,
        };
        let tls_exporter = match &wire.tls_exporter_b64 {
            Some(e) => Some(
                b64url_decode(e)
                    .map_err(|_| ProofError::Decode("tls exporter is not base64url".into()))?,
            ),
            None => None,
        };

        Ok(Self {
            p,
            m,
            z,
            z_prime,
            z_prime_enc,
            nonce,
            pi_i,
            pi_c,
            d_client,
            tls_exporter,
        })
    }
}

fn decode_point_field(field: &str) -> ProofResult<AffinePoint> {
    let bytes = b64url_decode(field)
        .map_err(|_| ProofError::Decode("point is not base64url".into()))?;
    decode_point(&bytes).map_err(wrap_point_error)
}

fn wrap_point_error(kind: ErrorKind) -> ProofError {
    ProofError::Point(kind)
}

fn decode_proof(wire: &ProofScalars) -> ProofResult<DleqProof> {
    Ok(DleqProof {
        c: decode_scalar_field(&wire.c)?,
        s: decode_scalar_field(&wire.r)?,
    })
}

fn decode_scalar_field(field: &str) -> ProofResult<Scalar> {
    let bytes = b64url_decode(field)
        .map_err(|_| ProofError::Decode("proof scalar is not base64url".into()))?;
    decode_scalar(&bytes).map_err(|_| ProofError::Decode("proof scalar out of range".into()))
}

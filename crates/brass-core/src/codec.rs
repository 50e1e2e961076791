//! Byte-string and P-256 codecs.
//!
//! Wire carriers are unpadded base64url. Points travel as 33-byte
//! compressed SEC1; decoding enforces canonical form, on-curve, and
//! non-identity, and any failure is fatal for the whole verification.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use p256::elliptic_curve::PrimeField;
use p256::{AffinePoint, EncodedPoint, FieldBytes, Scalar};

use crate::error::{CoreError, CoreResult, ErrorKind};

/// Length of a compressed SEC1 point encoding.
pub const COMPRESSED_POINT_LEN: usize = 33;

/// Encode bytes as unpadded base64url.
pub fn b64url_encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Decode unpadded base64url.
pub fn b64url_decode(data: &str) -> CoreResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(data)
        .map_err(|_| CoreError::Codec("invalid base64url".into()))
}

/// Encode a point in compressed SEC1 form.
pub fn encode_point(point: &AffinePoint) -> [u8; 33] {
    let enc = point.to_encoded_point(true);
    let mut out = [0u8; 33];
    out.copy_from_slice(enc.as_bytes());
    out
}

/// Decode and validate a compressed P-256 point.
///
/// Enforced: canonical compressed form (33 bytes, 0x02/0x03 tag), the
/// point lies on the curve, and the point is not the identity. P-256 is
/// prime order, so a subgroup check is unnecessary.
pub fn decode_point(bytes: &[u8]) -> Result<AffinePoint, ErrorKind> {
    // The SEC1 identity encoding is the single byte 0x00.
    if bytes.len() == 1 && bytes[0] == 0x00 {
        return Err(ErrorKind::InvalidPointInfinity);
    }
    if bytes.len() != COMPRESSED_POINT_LEN || (bytes[0] != 0x02 && bytes[0] != 0x03) {
        return Err(ErrorKind::InvalidPointEncoding);
    }
    let encoded =
        EncodedPoint::from_bytes(bytes).map_err(|_| ErrorKind::InvalidPointEncoding)?;
    if encoded.is_identity() {
        return Err(ErrorKind::InvalidPointInfinity);
    }
    // Rejects x >= p and x with no square root on the curve.
    let point = Option::<AffinePoint>::from(AffinePoint::from_encoded_point(&encoded))
        .ok_or(ErrorKind::InvalidPointEncoding)?;
    if point == AffinePoint::IDENTITY {
        return Err(ErrorKind::InvalidPointInfinity);
    }
    Ok(point)
}

/// Decode a canonical 32-byte big-endian scalar in [0, n).
pub fn decode_scalar(bytes: &[u8]) -> CoreResult<Scalar> {
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| CoreError::Codec("scalar must be 32 bytes".into()))?;
    Option::<Scalar>::from(Scalar::from_repr(FieldBytes::from(arr)))
        .ok_or_else(|| CoreError::Codec("scalar out of range".into()))
}

/// Encode a scalar as 32 big-endian bytes.
pub fn encode_scalar(scalar: &Scalar) -> [u8; 32] {
    scalar.to_bytes().into()
}

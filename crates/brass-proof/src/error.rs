use brass_core::ErrorKind;
use thiserror::Error;

/// Proof-layer failures. Display strings are oracle-safe: they never say
/// which verification equation broke, only which proof failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProofError {
    #[error("issuer proof rejected")]
    IssuerProof,

    #[error("client proof rejected")]
    ClientProof,

    #[error("point rejected: {0}")]
    Point(ErrorKind),

    #[error("presentation decoding failed: {0}")]
    Decode(String),
}

impl ProofError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProofError::IssuerProof => ErrorKind::InvalidIssuerProof,
            ProofError::ClientProof => ErrorKind::InvalidClientProof,
            ProofError::Point(kind) => *kind,
            ProofError::Decode(_) => ErrorKind::ServerError,
        }
    }
}

pub type ProofResult<T> = Result<T, ProofError>;

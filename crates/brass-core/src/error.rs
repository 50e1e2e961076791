use std::fmt;
use thiserror::Error;

/// Surface-visible error kinds. The `as_str` form is the wire contract:
/// callers match on these strings, so they are append-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingApiKey,
    InvalidApiKey,
    InvalidPointEncoding,
    InvalidPointInfinity,
    InvalidIssuerProof,
    InvalidClientProof,
    DigestMismatch,
    InvalidOrigin,
    OriginMustBeHttps,
    OriginMustNotContainPathQueryFragment,
    InvalidHostname,
    LimitExceeded,
    ServerError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MissingApiKey => "missing_api_key",
            ErrorKind::InvalidApiKey => "invalid_api_key",
            ErrorKind::InvalidPointEncoding => "invalid_point_encoding",
            ErrorKind::InvalidPointInfinity => "invalid_point_infinity",
            ErrorKind::InvalidIssuerProof => "invalid_piI",
            ErrorKind::InvalidClientProof => "invalid_piC",
            ErrorKind::DigestMismatch => "d_mismatch",
            ErrorKind::InvalidOrigin => "invalid_origin",
            ErrorKind::OriginMustBeHttps => "origin_must_be_https",
            ErrorKind::OriginMustNotContainPathQueryFragment => {
                "origin_must_not_contain_path_query_fragment"
            }
            ErrorKind::InvalidHostname => "invalid_hostname",
            ErrorKind::LimitExceeded => "limit_exceeded",
            ErrorKind::ServerError => "server_error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::error::Error for ErrorKind {}

/// Internal error type shared across the workspace's lower layers.
/// Messages are safe to log; they never carry key material.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("codec error: {0}")]
    Codec(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CoreError {
    /// The wire-visible kind this error collapses to. Lower-layer failures
    /// never leak detail past the process boundary.
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::ServerError
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

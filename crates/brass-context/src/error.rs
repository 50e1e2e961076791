use brass_core::ErrorKind;
use thiserror::Error;

/// Origin canonicalization failures. Each variant maps 1:1 onto a
/// surface-visible error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OriginError {
    #[error("invalid origin")]
    InvalidOrigin,

    #[error("origin must be https")]
    MustBeHttps,

    #[error("origin must not contain path, query, or fragment")]
    MustNotContainPathQueryFragment,

    #[error("invalid hostname")]
    InvalidHostname,
}

impl OriginError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OriginError::InvalidOrigin => ErrorKind::InvalidOrigin,
            OriginError::MustBeHttps => ErrorKind::OriginMustBeHttps,
            OriginError::MustNotContainPathQueryFragment => {
                ErrorKind::OriginMustNotContainPathQueryFragment
            }
            OriginError::InvalidHostname => ErrorKind::InvalidHostname,
        }
    }
}

pub type OriginResult<T> = Result<T, OriginError>;

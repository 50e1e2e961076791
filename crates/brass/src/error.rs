use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrassError {
    #[error("config error: {0}")]
    Config(String),

    #[error("core error: {0}")]
    Core(#[from] brass_core::CoreError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type BrassResult<T> = Result<T, BrassError>;

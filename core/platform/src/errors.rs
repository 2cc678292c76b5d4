use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("logging error: {0}")]
    Logging(String),

    #[error("metrics error: {0}")]
    Metrics(String),
}

pub type PlatformResult<T> = Result<T, PlatformError>;

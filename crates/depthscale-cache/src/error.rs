//! Cache client error types.

use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid cache url: {0}")]
    InvalidUrl(String),

    #[error("unsupported cache url scheme: {0}")]
    UnsupportedScheme(String),

    #[error("connect to {target} failed: {reason}")]
    Connect { target: String, reason: String },

    #[error("{0} timed out")]
    Timeout(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("connection already closed")]
    Closed,
}

//! Error types for the server engine

use thiserror::Error;

/// Result type alias for server operations
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Server engine error types
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Wire codec failure; header-level failures are connection-fatal
    #[error(transparent)]
    Protocol(#[from] citp_core::Error),

    /// Invalid service configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

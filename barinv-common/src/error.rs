//! Common error types for the stock-take client

use thiserror::Error;

/// Common result type for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared across the client cores
///
/// `NotFound` exists for completeness of the HTTP normalization; a product
/// lookup that misses is reported as a regular value (`Lookup::NotFound`),
/// never through this variant.
#[derive(Error, Debug)]
pub enum Error {
    /// Login rejected by the backend (wrong operator id or password)
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Bearer token expired or invalid; the session must be terminated
    #[error("Unauthorized")]
    Unauthorized,

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Validation error: {0}")]
    Validation(String),

    /// Connectivity failure or request timeout
    #[error("Network error: {0}")]
    Network(String),

    /// 5xx response or a body that failed to parse as the expected shape
    #[error("Server error: {0}")]
    ServerError(String),

    /// Durable storage read/write failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for failures that end the session rather than the operation
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Error::Unauthorized)
    }
}

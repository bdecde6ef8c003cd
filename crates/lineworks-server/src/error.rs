//! Server error types.

use thiserror::Error;

/// Errors that can occur in the server.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Configuration error (invalid bind address, unusable model directory).
    ///
    /// Fatal; prevents server startup.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transport/network error (bind failure, handshake failure, I/O error).
    ///
    /// Fatal for the affected connection, or for the server if raised while
    /// binding.
    #[error("transport error: {0}")]
    Transport(String),

    /// Internal error (worker thread panicked or was cancelled).
    ///
    /// Indicates a bug.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(err.to_string())
    }
}

//! Client error types.

use thiserror::Error;

/// Errors from creating or using a backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Endpoint is not a URL this client understands.
    #[error("invalid endpoint '{0}'")]
    InvalidEndpoint(String),

    /// Endpoint names a protocol other than the encrypted WebSocket one.
    #[error("unsupported endpoint '{0}': only ws:// and wss:// are served here")]
    UnsupportedEndpoint(String),

    /// Backend has stopped; no further requests are accepted.
    #[error("backend closed")]
    Closed,
}

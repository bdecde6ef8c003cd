//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Structural errors in a protocol document.
///
/// These never indicate a key mismatch: the payload authenticated correctly
/// (or was never encrypted) but is not a valid message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// CBOR serialization failed.
    #[error("CBOR encode error: {0}")]
    CborEncode(String),

    /// CBOR bytes are not a valid message document.
    #[error("CBOR decode error: {0}")]
    CborDecode(String),

    /// Fragment size limit of zero was requested.
    #[error("fragment size must be positive")]
    ZeroFragmentSize,

    /// Transport delivered a message with no fragments.
    #[error("message has no fragments")]
    EmptyMessage,
}

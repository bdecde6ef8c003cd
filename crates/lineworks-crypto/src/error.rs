//! Error types for AEAD framing.

use thiserror::Error;

/// Errors returned when opening an encrypted frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Authentication tag did not verify.
    ///
    /// The frame was sealed under a different key (wrong secret on one side)
    /// or was modified in transit. The two cases are indistinguishable.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Frame is too short to hold a nonce and an authentication tag.
    ///
    /// This is structural corruption or foreign data, not a key mismatch.
    #[error("frame too short: {len} bytes, need at least {min}")]
    FrameTooShort {
        /// Length of the received frame
        len: usize,
        /// Minimum length of a valid frame
        min: usize,
    },
}

impl CryptoError {
    /// Whether this error indicates that the peers hold different secrets.
    pub fn is_key_mismatch(&self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }
}

//! Sealing messages into fragments and opening them again.
//!
//! ```text
//! seal: message → CBOR → encrypt → fragment
//! open: fragments → reassemble → decrypt → CBOR → message
//! ```
//!
//! [`WireError`] separates the two ways opening can fail. A frame that does
//! not authenticate means the peers disagree on the key; a frame that
//! authenticates but does not decode is a malformed message. Peers react to
//! those differently.

use bytes::Bytes;
use lineworks_crypto::{CryptoError, CryptoScheme};
use thiserror::Error;

use crate::{
    errors::ProtocolError,
    fragment::{fragment, reassemble},
    messages::Message,
};

/// Failure to seal or open a message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    /// Frame could not be decrypted.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// Frame decrypted but is not a valid message, or encoding failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl WireError {
    /// True if the frame failed authentication, which means the peers
    /// derived different keys.
    #[must_use]
    pub fn is_key_mismatch(&self) -> bool {
        match self {
            Self::Crypto(e) => e.is_key_mismatch(),
            Self::Protocol(_) => false,
        }
    }
}

/// Encode, encrypt and fragment a message.
///
/// # Errors
///
/// - `WireError::Protocol` if encoding fails or `max_fragment` is zero
pub fn seal<M: Message>(
    scheme: &CryptoScheme,
    message: &M,
    max_fragment: usize,
) -> Result<Vec<Bytes>, WireError> {
    let plaintext = message.encode()?;
    let frame = scheme.encrypt(&plaintext);
    Ok(fragment(frame, max_fragment)?)
}

/// Reassemble, decrypt and decode a message.
///
/// # Errors
///
/// - `WireError::Protocol(EmptyMessage)` if there are no fragments
/// - `WireError::Crypto` if the frame is too short or fails authentication
/// - `WireError::Protocol(CborDecode)` if the plaintext is not a valid message
pub fn open<M: Message>(scheme: &CryptoScheme, fragments: &[Bytes]) -> Result<M, WireError> {
    if fragments.is_empty() {
        return Err(ProtocolError::EmptyMessage.into());
    }

    let frame = reassemble(fragments);
    let plaintext = scheme.decrypt(&frame)?;
    Ok(M::decode(&plaintext)?)
}

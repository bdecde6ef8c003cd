//! Lineworks wire protocol.
//!
//! Defines everything that crosses the connection between a client and a
//! generation server:
//!
//! - [`Request`] / [`Response`]: the single method surface (options, load,
//!   unload, generate, abort) and its response multiplex, encoded as CBOR
//!   documents of the form `{type, data}`
//! - [`fragment`] / [`reassemble`]: splitting an encrypted payload into
//!   bounded chunks and joining them back
//! - [`wire::seal`] / [`wire::open`]: encode → encrypt → fragment, and the
//!   inverse, with errors that keep "wrong key" apart from "malformed data"
//!
//! With the `transport` feature, [`channel::SecureChannel`] runs the wire
//! format over a WebSocket, mapping each fragment to one WebSocket frame of a
//! single fragmented message.
//!
//! # Layering
//!
//! ```text
//! Request / Response
//!        │  CBOR
//!        ▼
//!    plaintext
//!        │  CryptoScheme::encrypt
//!        ▼
//! nonce ∥ ciphertext ∥ tag
//!        │  fragment(FRAGMENT_SIZE)
//!        ▼
//!  [chunk, chunk, ...]  ── one transport message
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

#[cfg(feature = "transport")]
pub mod channel;
pub mod errors;
pub mod fragment;
pub mod messages;
pub mod wire;

pub use errors::{ProtocolError, Result};
pub use fragment::{FRAGMENT_SIZE, fragment, reassemble};
pub use messages::{
    DEFAULT_MAX_TOKENS, GenerateParams, LoadParams, Message, OutputData, Request, Response,
    StopCondition,
};
pub use wire::WireError;

//! CBOR-encoded protocol messages.
//!
//! Every message is a document `{type, data}`: `type` names the method or
//! response kind in snake case, `data` carries its parameters. Variants
//! without parameters omit `data`.
//!
//! # Invariants
//!
//! - Decoding an encoded message produces an equal value
//! - Keys a peer does not know are ignored, so either side can add optional
//!   parameters without breaking the other

mod params;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub use self::params::{DEFAULT_MAX_TOKENS, GenerateParams, LoadParams, OutputData, StopCondition};
use crate::errors::{ProtocolError, Result};

/// A document that can be carried over the wire.
pub trait Message: Serialize + DeserializeOwned {
    /// Encode to CBOR.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborEncode` if serialization fails
    fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(buf)
    }

    /// Decode from CBOR.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::CborDecode` if the bytes are not a valid document of
    ///   this kind
    fn decode(bytes: &[u8]) -> Result<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
    }
}

/// Client → server method call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Request {
    /// List available models and the compute device
    Options,
    /// Load a model, replacing any loaded one
    Load(LoadParams),
    /// Release the loaded model
    Unload,
    /// Generate text from a prompt with the loaded model
    Generate(GenerateParams),
    /// Interrupt the running generation
    Abort,
}

impl Message for Request {}

impl Request {
    /// Method name as it appears in the `type` field.
    #[must_use]
    pub const fn method(&self) -> &'static str {
        match self {
            Self::Options => "options",
            Self::Load(_) => "load",
            Self::Unload => "unload",
            Self::Generate(_) => "generate",
            Self::Abort => "abort",
        }
    }
}

/// Server → client response.
///
/// A request produces a sequence of responses. Load, unload and generate
/// sequences end with exactly one terminal response (see
/// [`is_terminal`](Response::is_terminal)).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Response {
    /// Progress notice ("loading", "generating", ...)
    Status {
        /// Human-readable status
        message: String,
    },
    /// Reply to an options request
    Options {
        /// Model names, without extension
        models: Vec<String>,
        /// Compute device the engine runs on, if known
        #[serde(default, skip_serializing_if = "Option::is_none")]
        device: Option<String>,
    },
    /// Text newly committed to the generation output
    Stream {
        /// Appended text
        next: String,
    },
    /// Final generation result
    Output(OutputData),
    /// Request completed
    Done,
    /// Request failed
    Error {
        /// Human-readable reason
        message: String,
    },
    /// Generation was interrupted by an abort
    Aborted,
}

impl Message for Response {}

impl Response {
    /// Build a status response.
    pub fn status(message: impl Into<String>) -> Self {
        Self::Status { message: message.into() }
    }

    /// Build an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error { message: message.into() }
    }

    /// Build a stream response.
    pub fn stream(next: impl Into<String>) -> Self {
        Self::Stream { next: next.into() }
    }

    /// True for responses that end a request's sequence.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. } | Self::Aborted)
    }

    /// Kind name as it appears in the `type` field.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Options { .. } => "options",
            Self::Stream { .. } => "stream",
            Self::Output(_) => "output",
            Self::Done => "done",
            Self::Error { .. } => "error",
            Self::Aborted => "aborted",
        }
    }
}

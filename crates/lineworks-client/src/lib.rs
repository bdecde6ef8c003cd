//! Lineworks client backends.
//!
//! A [`Backend`] takes [`Request`](lineworks_proto::Request)s and delivers
//! [`Response`](lineworks_proto::Response)s on a channel, in order. Two
//! implementations share that surface:
//!
//! - [`RemoteBackend`]: encrypted WebSocket connection to a Lineworks server
//! - [`LocalBackend`]: an [`InferenceEngine`](lineworks_core::InferenceEngine)
//!   running in this process
//!
//! # Example
//!
//! ```no_run
//! use lineworks_client::{ClientConfig, RemoteBackend};
//! use lineworks_proto::{GenerateParams, LoadParams, Request};
//!
//! # async fn demo() -> Result<(), lineworks_client::ClientError> {
//! let mut backend = RemoteBackend::spawn(ClientConfig::new("ws://127.0.0.1:29999", "secret"))?;
//! backend.send(Request::Load(LoadParams::new("tiny")))?;
//! backend.send(Request::Generate(GenerateParams::new("Once upon a time")))?;
//!
//! while let Some(response) = backend.recv().await {
//!     if response.is_terminal() {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod backend;
pub mod endpoint;
pub mod error;
mod local;
mod remote;

pub use backend::Backend;
pub use endpoint::Endpoint;
pub use error::ClientError;
pub use local::LocalBackend;
pub use remote::{ClientConfig, DEFAULT_CONNECT_TIMEOUT, RemoteBackend};

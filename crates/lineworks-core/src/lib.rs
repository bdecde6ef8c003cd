//! Lineworks request processing core.
//!
//! Everything between a decoded [`Request`](lineworks_proto::Request) and the
//! [`Response`](lineworks_proto::Response)s it produces, with no I/O of its
//! own:
//!
//! - [`StopConditionEngine`]: decides per fragment how much generated text is
//!   committed and when a line, paragraph or sentence boundary ends generation
//! - [`GenerationSession`]: runs one generate request through the stop engine
//!   and emits `stream`, `output` and the terminal response
//! - [`Processor`]: dispatches requests to an [`InferenceEngine`] one at a
//!   time
//! - [`queue`]: the request/response mailboxes and the [`AbortFlag`] side
//!   channel shared with the connection's I/O loop
//!
//! # Threading
//!
//! ```text
//!   I/O loop (async)                     worker (blocking)
//!  ┌──────────────────┐  RequestQueue   ┌───────────────────┐
//!  │ decrypt + decode │────────────────>│ Processor         │
//!  │                  │   AbortFlag     │  GenerationSession│
//!  │                  │════════════════>│   StopCondition.. │
//!  │ encode + encrypt │<────────────────│  InferenceEngine  │
//!  └──────────────────┘  ResponseQueue  └───────────────────┘
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod engine;
pub mod error;
pub mod models;
pub mod processor;
pub mod queue;
pub mod sentence;
pub mod session;
pub mod stop;

pub use engine::{EngineFactory, InferenceEngine, TokenStream};
pub use error::EngineError;
pub use models::{MODEL_EXTENSION, ModelDirectory};
pub use processor::Processor;
pub use queue::{
    AbortFlag, QueueClosed, RESPONSE_QUEUE_CAPACITY, RequestReceiver, RequestSender,
    ResponseReceiver, ResponseSender, ResponseSink, bounded_response_queue, request_queue,
    response_queue,
};
pub use sentence::{SentenceSplit, split_sentences};
pub use session::{GenerationSession, SessionOutcome};
pub use stop::{Emission, StopConditionEngine};

//! Test support for Lineworks.
//!
//! - [`ScriptedEngine`]: an inference engine that replays fixed fragments,
//!   with knobs for slow streams, failures and aborts
//! - [`check_generation`]: rules every generate response sequence follows
//! - [`TestServer`]: a real server on an ephemeral loopback port
//!
//! Processor tests drive [`ScriptedEngine`] directly; end-to-end tests put
//! it behind a [`TestServer`] and talk to it with [`connect_channel`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod scripted;
pub mod server;
pub mod transcript;

pub use scripted::ScriptedEngine;
pub use server::{
    TEST_KDF_ITERATIONS, TEST_SECRET, TestChannel, TestServer, connect_channel, connect_raw,
    test_config,
};
pub use transcript::{Transcript, Violation, check_generation};

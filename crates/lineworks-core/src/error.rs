//! Errors raised by inference engines.
//!
//! Every variant is reported to the client as an `error` response and leaves
//! the connection usable for the next request.

use std::path::PathBuf;

use thiserror::Error;

/// Failure inside an inference engine.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// No backend is available to run models.
    #[error("no inference engine configured")]
    NotConfigured,

    /// Model name is not a plain file name.
    #[error("invalid model name: {0:?}")]
    InvalidModelName(String),

    /// Model file does not exist.
    #[error("model not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// Generation was requested without a loaded model.
    #[error("no model loaded")]
    NotLoaded,

    /// Backend failed to start or load the model.
    #[error("{0}")]
    Load(String),

    /// Backend failed while producing tokens.
    #[error("generation failed: {0}")]
    Generation(String),

    /// I/O failure talking to the backend.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

//! Boundary to the text-generation backend.
//!
//! The backend is opaque: it lists models, loads one, and turns a prompt into
//! a blocking stream of text fragments. Everything protocol-related (status
//! messages, stop conditions, abort) happens above this trait.

use lineworks_proto::{GenerateParams, LoadParams};

use crate::error::EngineError;

/// Blocking stream of generated fragments.
///
/// Dropping the stream before it is exhausted must stop generation.
pub type TokenStream<'a> = Box<dyn Iterator<Item = Result<String, EngineError>> + 'a>;

/// A text-generation backend bound to one connection.
pub trait InferenceEngine: Send {
    /// Names of the models that can be loaded.
    ///
    /// # Errors
    ///
    /// Backend-specific; reported to the client as an `error` response.
    fn models(&self) -> Result<Vec<String>, EngineError>;

    /// Compute device the backend runs on, if it knows.
    fn device(&self) -> Option<String>;

    /// Load a model, replacing any loaded one.
    ///
    /// # Errors
    ///
    /// Backend-specific; reported as `failed to load model: <reason>`.
    fn load(&mut self, params: &LoadParams) -> Result<(), EngineError>;

    /// Release the loaded model. No-op if none is loaded.
    fn unload(&mut self);

    /// Start generating from `params.prompt`.
    ///
    /// # Errors
    ///
    /// - `EngineError::NotLoaded` if no model is loaded
    /// - Backend-specific start-up failures
    fn generate(&mut self, params: &GenerateParams) -> Result<TokenStream<'_>, EngineError>;
}

/// Creates one engine per accepted connection.
pub trait EngineFactory: Send + Sync + 'static {
    /// Build a fresh engine.
    fn create(&self) -> Box<dyn InferenceEngine>;
}

impl<F> EngineFactory for F
where
    F: Fn() -> Box<dyn InferenceEngine> + Send + Sync + 'static,
{
    fn create(&self) -> Box<dyn InferenceEngine> {
        self()
    }
}

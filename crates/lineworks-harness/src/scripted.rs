//! Deterministic inference engine.
//!
//! Replays a fixed list of fragments instead of running a model. Knobs cover
//! the failure and timing cases the protocol has to handle: load failure,
//! mid-stream failure, slow fragments, and an abort raised after a given
//! fragment.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
    time::Duration,
};

use lineworks_core::{AbortFlag, EngineError, InferenceEngine, TokenStream};
use lineworks_proto::{GenerateParams, LoadParams};

/// Engine that streams a scripted list of fragments.
///
/// Clones share the pulled-fragment counter, so a test can keep a clone and
/// observe what an engine owned by the server did.
#[derive(Debug, Clone)]
pub struct ScriptedEngine {
    models: Vec<String>,
    device: Option<String>,
    fragments: Vec<String>,
    endless: bool,
    delay: Duration,
    fail_load: Option<String>,
    fail_at: Option<usize>,
    abort_after: Option<(usize, AbortFlag)>,
    loaded: Option<LoadParams>,
    pulled: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    /// Engine offering one model (`"tiny"`) that streams `fragments`.
    pub fn new<S: Into<String>>(fragments: impl IntoIterator<Item = S>) -> Self {
        Self {
            models: vec!["tiny".to_owned()],
            device: Some("cpu".to_owned()),
            fragments: fragments.into_iter().map(Into::into).collect(),
            endless: false,
            delay: Duration::ZERO,
            fail_load: None,
            fail_at: None,
            abort_after: None,
            loaded: None,
            pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the advertised model names.
    #[must_use]
    pub fn with_models<S: Into<String>>(mut self, models: impl IntoIterator<Item = S>) -> Self {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// Repeat the fragments until the token budget is spent.
    #[must_use]
    pub fn endless(mut self) -> Self {
        self.endless = true;
        self
    }

    /// Sleep before producing each fragment.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail every load with `reason`.
    #[must_use]
    pub fn failing_load(mut self, reason: impl Into<String>) -> Self {
        self.fail_load = Some(reason.into());
        self
    }

    /// Fail instead of producing the fragment at `index`.
    #[must_use]
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Set `flag` right after producing `count` fragments.
    #[must_use]
    pub fn aborting_after(mut self, count: usize, flag: AbortFlag) -> Self {
        self.abort_after = Some((count, flag));
        self
    }

    /// Number of fragments produced so far, across all clones.
    pub fn pulled(&self) -> usize {
        self.pulled.load(Ordering::SeqCst)
    }
}

impl InferenceEngine for ScriptedEngine {
    fn models(&self) -> Result<Vec<String>, EngineError> {
        Ok(self.models.clone())
    }

    fn device(&self) -> Option<String> {
        self.device.clone()
    }

    fn load(&mut self, params: &LoadParams) -> Result<(), EngineError> {
        if let Some(reason) = &self.fail_load {
            return Err(EngineError::Load(reason.clone()));
        }
        if !self.models.contains(&params.model_path) {
            return Err(EngineError::Load(format!("unknown model {}", params.model_path)));
        }

        self.loaded = Some(params.clone());
        Ok(())
    }

    fn unload(&mut self) {
        self.loaded = None;
    }

    fn generate(&mut self, params: &GenerateParams) -> Result<TokenStream<'_>, EngineError> {
        if self.loaded.is_none() {
            return Err(EngineError::NotLoaded);
        }

        let fragments = self.fragments.clone();
        let source: Box<dyn Iterator<Item = String> + Send> = if self.endless {
            Box::new(fragments.into_iter().cycle())
        } else {
            Box::new(fragments.into_iter())
        };

        let delay = self.delay;
        let fail_at = self.fail_at;
        let abort_after = self.abort_after.clone();
        let pulled = Arc::clone(&self.pulled);

        let stream = source.take(params.max_tokens as usize).enumerate().map(move |(i, fragment)| {
            if !delay.is_zero() {
                thread::sleep(delay);
            }
            if fail_at == Some(i) {
                return Err(EngineError::Generation("scripted failure".into()));
            }

            pulled.fetch_add(1, Ordering::SeqCst);
            if let Some((_, flag)) = abort_after.as_ref().filter(|(count, _)| i + 1 == *count) {
                flag.set();
            }
            Ok(fragment)
        });

        Ok(Box::new(stream))
    }
}

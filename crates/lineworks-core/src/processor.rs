//! Per-connection request processor.
//!
//! Owns one inference engine and executes requests strictly one at a time.
//! Each request produces its responses through a [`ResponseSink`]:
//!
//! | Request    | Responses                                              |
//! |------------|--------------------------------------------------------|
//! | `options`  | `options{models, device}` or `error`                   |
//! | `load`     | `status{loading}` then `done` or `error`               |
//! | `unload`   | `status{unloading}` then `done`                        |
//! | `generate` | `status{generating}` then a [`GenerationSession`], or  |
//! |            | `error{no model loaded}`                               |
//! | `abort`    | nothing (applied through the abort flag)               |
//!
//! Engine failures become `error` responses; the processor stays usable.

use lineworks_proto::{GenerateParams, LoadParams, Request, Response};

use crate::{
    engine::InferenceEngine,
    queue::{AbortFlag, RequestReceiver, ResponseSink},
    session::GenerationSession,
};

/// Executes requests against one engine.
pub struct Processor {
    engine: Box<dyn InferenceEngine>,
    loaded: Option<LoadParams>,
    abort: AbortFlag,
}

impl Processor {
    /// Create a processor with no model loaded.
    pub fn new(engine: Box<dyn InferenceEngine>, abort: AbortFlag) -> Self {
        Self { engine, loaded: None, abort }
    }

    /// Parameters of the loaded model, if any.
    pub fn loaded(&self) -> Option<&LoadParams> {
        self.loaded.as_ref()
    }

    /// Serve requests until the queue closes, then release the model.
    ///
    /// Requests still queued after the sink has closed are drained without
    /// being executed. Blocks the calling thread; run it on a dedicated
    /// worker.
    pub fn run(mut self, requests: &mut RequestReceiver, sink: &mut impl ResponseSink) {
        while let Some(request) = requests.blocking_recv() {
            if sink.is_closed() {
                tracing::debug!(method = request.method(), "dropping request, connection gone");
                continue;
            }
            self.process(request, sink);
        }

        tracing::debug!("request queue closed, releasing engine");
        self.engine.unload();
    }

    /// Execute one request.
    pub fn process(&mut self, request: Request, sink: &mut impl ResponseSink) {
        tracing::debug!(method = request.method(), "processing request");

        match request {
            Request::Options => self.options(sink),
            Request::Load(params) => self.load(params, sink),
            Request::Unload => self.unload(sink),
            Request::Generate(params) => self.generate(&params, sink),
            // Queued aborts arrive after the generation they targeted.
            Request::Abort => tracing::debug!("ignoring queued abort"),
        }
    }

    fn options(&self, sink: &mut impl ResponseSink) {
        match self.engine.models() {
            Ok(models) => sink.send(Response::Options { models, device: self.engine.device() }),
            Err(e) => {
                tracing::warn!(error = %e, "failed to list models");
                sink.send(Response::error(e.to_string()));
            },
        }
    }

    fn load(&mut self, params: LoadParams, sink: &mut impl ResponseSink) {
        sink.send(Response::status("loading"));

        if self.loaded.take().is_some() {
            self.engine.unload();
        }

        match self.engine.load(&params) {
            Ok(()) => {
                tracing::info!(model = %params.model_path, "model loaded");
                self.loaded = Some(params);
                sink.send(Response::Done);
            },
            Err(e) => {
                tracing::warn!(model = %params.model_path, error = %e, "model load failed");
                sink.send(Response::error(format!("failed to load model: {e}")));
            },
        }
    }

    fn unload(&mut self, sink: &mut impl ResponseSink) {
        sink.send(Response::status("unloading"));
        self.engine.unload();
        if let Some(model) = self.loaded.take() {
            tracing::info!(model = %model.model_path, "model unloaded");
        }
        sink.send(Response::Done);
    }

    fn generate(&mut self, params: &GenerateParams, sink: &mut impl ResponseSink) {
        let Some(model) = self.loaded.as_ref() else {
            sink.send(Response::error("no model loaded"));
            return;
        };

        sink.send(Response::status("generating"));

        let tokens = match self.engine.generate(params) {
            Ok(tokens) => tokens,
            Err(e) => {
                tracing::warn!(error = %e, "generation did not start");
                self.abort.clear();
                sink.send(Response::error(e.to_string()));
                return;
            },
        };

        let outcome = GenerationSession::new(params, model, &self.abort).run(tokens, sink);
        tracing::debug!(?outcome, "generation finished");
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor").field("loaded", &self.loaded).finish_non_exhaustive()
    }
}

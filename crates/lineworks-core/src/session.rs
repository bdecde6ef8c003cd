//! One generate request, from first fragment to terminal response.
//!
//! ```text
//! fragment ──► StopConditionEngine ──► stream{next}
//!                    │                    │
//!                    │ boundary           │ abort flag set
//!                    ▼                    ▼
//!          output{errored=false}   output{errored=true}
//!                 done                  aborted
//! ```
//!
//! # Invariants
//!
//! - Every pulled fragment produces exactly one `stream` response, truncated
//!   if it crossed the boundary, before any stop or abort is acted on
//! - No fragment is pulled after a boundary or an observed abort
//! - A boundary takes precedence over an abort seen on the same fragment
//! - Exactly one terminal response (`done`, `aborted` or `error`) is sent,
//!   and the abort flag is cleared when it is
//! - An engine error discards the partial output: only `error` is sent

use lineworks_proto::{GenerateParams, LoadParams, OutputData, Response};

use crate::{
    error::EngineError,
    queue::{AbortFlag, ResponseSink},
    stop::StopConditionEngine,
};

/// How a generation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Engine finished or a stop boundary was reached
    Completed,
    /// Abort was observed between fragments
    Aborted,
    /// Engine reported an error
    Failed,
}

/// Drives a token stream through the stop-condition engine.
#[derive(Debug)]
pub struct GenerationSession<'a> {
    params: &'a GenerateParams,
    model: &'a LoadParams,
    abort: &'a AbortFlag,
    stop: StopConditionEngine,
}

impl<'a> GenerationSession<'a> {
    /// Prepare a session for `params` running on `model`.
    pub fn new(params: &'a GenerateParams, model: &'a LoadParams, abort: &'a AbortFlag) -> Self {
        let stop = StopConditionEngine::new(params.stop_condition, &params.prompt);
        Self { params, model, abort, stop }
    }

    /// Consume fragments until the stream ends, a boundary is found, or an
    /// abort is observed, sending every response to `sink`.
    pub fn run<I>(mut self, tokens: I, sink: &mut impl ResponseSink) -> SessionOutcome
    where
        I: IntoIterator<Item = Result<String, EngineError>>,
    {
        let mut errored = false;
        let mut fragments = 0usize;

        for token in tokens {
            let next = match token {
                Ok(next) => next,
                Err(e) => {
                    tracing::warn!(error = %e, fragments, "generation failed");
                    self.abort.clear();
                    sink.send(Response::error(e.to_string()));
                    return SessionOutcome::Failed;
                },
            };
            fragments += 1;

            let emission = self.stop.push(&next);
            sink.send(Response::stream(emission.next));

            if emission.stop {
                tracing::debug!(fragments, condition = %self.stop.condition(), "stop boundary reached");
                break;
            }

            if self.abort.is_set() {
                tracing::debug!(fragments, "generation aborted");
                errored = true;
                break;
            }
        }

        sink.send(Response::Output(OutputData {
            parameters: self.params.clone(),
            model: self.model.clone(),
            output: self.stop.into_output(),
            errored,
        }));

        self.abort.clear();
        if errored {
            sink.send(Response::Aborted);
            SessionOutcome::Aborted
        } else {
            sink.send(Response::Done);
            SessionOutcome::Completed
        }
    }
}

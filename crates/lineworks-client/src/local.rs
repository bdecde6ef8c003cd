//! Backend that runs an engine in this process.
//!
//! Requests go straight to a [`Processor`] on a blocking worker; no socket or
//! encryption is involved. The response sequence is the same as a remote
//! server's, minus the connection notices: the first response answers an
//! implicit `options` request, and the last is `status{"disconnected"}`.

use lineworks_core::{
    AbortFlag, InferenceEngine, Processor, RequestSender, ResponseSender, ResponseSink,
    request_queue, response_queue,
};
use lineworks_proto::{Request, Response};
use tokio::sync::{mpsc, watch};

use crate::backend::Backend;

/// In-process engine.
#[derive(Debug)]
pub struct LocalBackend;

impl LocalBackend {
    /// Start serving requests with `engine`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(engine: Box<dyn InferenceEngine>) -> Backend {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (response_tx, response_rx) = response_queue();

        let task = tokio::spawn(run(engine, request_rx, response_tx, stop_rx));
        Backend::new(request_tx, response_rx, stop_tx, task)
    }
}

async fn run(
    engine: Box<dyn InferenceEngine>,
    mut inbound: mpsc::UnboundedReceiver<Request>,
    mut responses: ResponseSender,
    mut stop: watch::Receiver<bool>,
) {
    let abort = AbortFlag::new();
    let (requests, mut request_rx) = request_queue(abort.clone());

    let worker_abort = abort.clone();
    let mut worker_sink = StopAwareSink { inner: responses.clone(), stop: stop.clone() };
    let worker = tokio::task::spawn_blocking(move || {
        Processor::new(engine, worker_abort).run(&mut request_rx, &mut worker_sink);
    });

    forward(Request::Options, &requests);

    loop {
        tokio::select! {
            biased;

            _ = stop.changed() => break,

            request = inbound.recv() => {
                let Some(request) = request else {
                    break;
                };
                if !forward(request, &requests) {
                    break;
                }
            },
        }
    }

    abort.set();
    drop(requests);
    if let Err(e) = worker.await {
        tracing::error!("local engine worker failed: {}", e);
    }

    responses.send(Response::status("disconnected"));
}

/// Response sink that counts as closed once the backend is stopping, so
/// requests still queued at that point are dropped instead of executed.
struct StopAwareSink {
    inner: ResponseSender,
    stop: watch::Receiver<bool>,
}

impl ResponseSink for StopAwareSink {
    fn send(&mut self, response: Response) {
        self.inner.send(response);
    }

    fn is_closed(&self) -> bool {
        *self.stop.borrow() || self.inner.is_closed()
    }
}

/// Hand a request to the worker; aborts take effect immediately.
fn forward(request: Request, requests: &RequestSender) -> bool {
    tracing::debug!(method = request.method(), "local request");
    requests.send(request).is_ok()
}

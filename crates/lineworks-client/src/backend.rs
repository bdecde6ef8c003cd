//! Handle shared by every backend.

use lineworks_core::ResponseReceiver;
use lineworks_proto::{Request, Response};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};

use crate::error::ClientError;

/// Running backend: send requests in, read responses out.
///
/// Responses arrive in order on one channel, including the backend's own
/// `status` notices. The last response of every backend is
/// `status{"disconnected"}`, after which [`recv`](Self::recv) returns `None`.
///
/// Dropping the handle stops the backend.
#[derive(Debug)]
pub struct Backend {
    requests: mpsc::UnboundedSender<Request>,
    responses: ResponseReceiver,
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl Backend {
    pub(crate) fn new(
        requests: mpsc::UnboundedSender<Request>,
        responses: ResponseReceiver,
        stop: watch::Sender<bool>,
        task: JoinHandle<()>,
    ) -> Self {
        Self { requests, responses, stop, task: Some(task) }
    }

    /// Queue a request.
    ///
    /// # Errors
    ///
    /// - `ClientError::Closed` if the backend has already stopped
    pub fn send(&self, request: Request) -> Result<(), ClientError> {
        self.requests.send(request).map_err(|_| ClientError::Closed)
    }

    /// Wait for the next response.
    pub async fn recv(&mut self) -> Option<Response> {
        self.responses.recv().await
    }

    /// Take a response if one is ready.
    pub fn try_recv(&mut self) -> Option<Response> {
        self.responses.try_recv()
    }

    /// Ask the backend to stop. Safe to call repeatedly and from any thread.
    pub fn stop(&self) {
        self.stop.send_replace(true);
    }

    /// Stop the backend and wait for it to finish.
    ///
    /// Responses produced while stopping stay readable through
    /// [`recv`](Self::recv).
    pub async fn shutdown(&mut self) {
        self.stop();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!("backend task failed: {}", e);
            }
        }
    }
}

impl Drop for Backend {
    fn drop(&mut self) {
        self.stop();
    }
}

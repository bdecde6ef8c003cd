//! Mailboxes between the connection I/O loop and the processing worker.
//!
//! Requests and responses each travel through a FIFO channel with a single
//! consumer. `abort` never enters the request queue: [`RequestSender::send`]
//! routes it to the shared [`AbortFlag`] so it reaches a running generation
//! while later requests wait their turn.
//!
//! The receiving side of the request queue blocks (it runs on a worker
//! thread); the receiving side of the response queue is async (it runs in
//! the I/O loop). Sending a request never blocks. Sending a response blocks
//! only on a [`bounded_response_queue`] that is full, which holds a fast
//! engine back to the pace of the socket.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use lineworks_proto::{Request, Response};
use thiserror::Error;
use tokio::sync::mpsc;

/// The receiving side of a queue has gone away.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("queue closed")]
pub struct QueueClosed;

/// Cooperative cancellation flag shared by one connection.
///
/// Checked by the generation session between fragments, so cancellation
/// latency is one fragment.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    /// Create a cleared flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Reset after a generation has ended.
    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// True if cancellation has been requested.
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Create a request queue whose `abort` messages go to `abort`.
pub fn request_queue(abort: AbortFlag) -> (RequestSender, RequestReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RequestSender { tx, abort }, RequestReceiver { rx })
}

/// Producer side of the request queue.
#[derive(Debug, Clone)]
pub struct RequestSender {
    tx: mpsc::UnboundedSender<Request>,
    abort: AbortFlag,
}

impl RequestSender {
    /// Enqueue a request, or apply it immediately if it is an abort.
    ///
    /// # Errors
    ///
    /// - `QueueClosed` if the worker has exited
    pub fn send(&self, request: Request) -> Result<(), QueueClosed> {
        if matches!(request, Request::Abort) {
            tracing::debug!("abort requested");
            self.abort.set();
            return Ok(());
        }

        self.tx.send(request).map_err(|_| QueueClosed)
    }
}

/// Consumer side of the request queue.
#[derive(Debug)]
pub struct RequestReceiver {
    rx: mpsc::UnboundedReceiver<Request>,
}

impl RequestReceiver {
    /// Block the current thread until the next request arrives.
    ///
    /// Returns `None` once every sender has been dropped and the queue is
    /// drained. Must not be called from an async context.
    pub fn blocking_recv(&mut self) -> Option<Request> {
        self.rx.blocking_recv()
    }

    /// Wait for the next request.
    pub async fn recv(&mut self) -> Option<Request> {
        self.rx.recv().await
    }
}

/// Responses a [`bounded_response_queue`] holds before the worker waits.
pub const RESPONSE_QUEUE_CAPACITY: usize = 64;

/// Create an unbounded response queue.
///
/// Suits producers that run on an async task and must never wait.
pub fn response_queue() -> (ResponseSender, ResponseReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ResponseSender { tx: Tx::Unbounded(tx) }, ResponseReceiver { rx: Rx::Unbounded(rx) })
}

/// Create a response queue holding at most `capacity` responses.
///
/// [`ResponseSink::send`] blocks the calling thread while the queue is full,
/// so the sender must live on a blocking worker, never on an async task.
/// Dropping the receiver releases a waiting sender.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn bounded_response_queue(capacity: usize) -> (ResponseSender, ResponseReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (ResponseSender { tx: Tx::Bounded(tx) }, ResponseReceiver { rx: Rx::Bounded(rx) })
}

/// Destination for responses produced while processing a request.
pub trait ResponseSink {
    /// Deliver one response.
    fn send(&mut self, response: Response);

    /// True once nobody will read further responses.
    fn is_closed(&self) -> bool {
        false
    }
}

impl ResponseSink for Vec<Response> {
    fn send(&mut self, response: Response) {
        self.push(response);
    }
}

#[derive(Debug, Clone)]
enum Tx {
    Unbounded(mpsc::UnboundedSender<Response>),
    Bounded(mpsc::Sender<Response>),
}

#[derive(Debug)]
enum Rx {
    Unbounded(mpsc::UnboundedReceiver<Response>),
    Bounded(mpsc::Receiver<Response>),
}

/// Producer side of the response queue.
#[derive(Debug, Clone)]
pub struct ResponseSender {
    tx: Tx,
}

impl ResponseSink for ResponseSender {
    fn send(&mut self, response: Response) {
        let delivered = match &self.tx {
            Tx::Unbounded(tx) => tx.send(response).is_ok(),
            Tx::Bounded(tx) => tx.blocking_send(response).is_ok(),
        };
        if !delivered {
            tracing::trace!("response dropped, connection gone");
        }
    }

    fn is_closed(&self) -> bool {
        match &self.tx {
            Tx::Unbounded(tx) => tx.is_closed(),
            Tx::Bounded(tx) => tx.is_closed(),
        }
    }
}

/// Consumer side of the response queue.
#[derive(Debug)]
pub struct ResponseReceiver {
    rx: Rx,
}

impl ResponseReceiver {
    /// Wait for the next response.
    ///
    /// Returns `None` once every sender has been dropped and the queue is
    /// drained. Cancel-safe.
    pub async fn recv(&mut self) -> Option<Response> {
        match &mut self.rx {
            Rx::Unbounded(rx) => rx.recv().await,
            Rx::Bounded(rx) => rx.recv().await,
        }
    }

    /// Take a response if one is ready.
    pub fn try_recv(&mut self) -> Option<Response> {
        match &mut self.rx {
            Rx::Unbounded(rx) => rx.try_recv().ok(),
            Rx::Bounded(rx) => rx.try_recv().ok(),
        }
    }

    /// Block the current thread until the next response arrives.
    pub fn blocking_recv(&mut self) -> Option<Response> {
        match &mut self.rx {
            Rx::Unbounded(rx) => rx.blocking_recv(),
            Rx::Bounded(rx) => rx.blocking_recv(),
        }
    }
}

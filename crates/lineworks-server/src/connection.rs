//! Per-connection I/O loop.
//!
//! Each accepted connection gets its own engine, processing worker and
//! queues:
//!
//! ```text
//!            ┌──────────── I/O loop (async task) ────────────┐
//! socket ───►│ recv ─► open ─► RequestSender ─┬─► request queue ──► worker
//!            │                                └─► AbortFlag ══════► worker
//! socket ◄───│ send ◄─ seal ◄─ response queue ◄──────────────────── worker
//!            │ ping every `ping_interval` of idleness             │
//!            └────────────────────────────────────────────────────┘
//! ```
//!
//! The loop services server shutdown, pending responses, inbound messages
//! and idle pings without fixed priority, so a generation streaming as fast
//! as the socket allows cannot keep an `abort` from being read. It never
//! waits on the worker; the worker waits on the loop once
//! [`RESPONSE_QUEUE_CAPACITY`] responses are queued.
//!
//! # Errors on the wire
//!
//! - Inbound data that fails authentication → `error{"incorrect key"}`
//! - Inbound data that authenticates but does not decode, or a text message →
//!   `error{"invalid request"}`
//!
//! Neither closes the connection. Transport failure or peer close ends the
//! loop; the running generation is then aborted and queued requests are
//! drained unexecuted.

use std::{net::SocketAddr, sync::Arc};

use lineworks_core::{
    AbortFlag, EngineFactory, Processor, RESPONSE_QUEUE_CAPACITY, bounded_response_queue,
    request_queue,
};
use lineworks_crypto::CryptoScheme;
use lineworks_proto::{
    Request, Response,
    channel::{ChannelError, SecureChannel},
};
use tokio::{
    net::TcpStream,
    sync::watch,
    time::{self, MissedTickBehavior},
};

use crate::{config::ServerConfig, error::ServerError, transport};

/// Response sent when inbound data fails authentication.
pub const INCORRECT_KEY: &str = "incorrect key";

/// Response sent when inbound data is not a valid request.
pub const INVALID_REQUEST: &str = "invalid request";

/// Why the I/O loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exit {
    Shutdown,
    PeerClosed,
    WorkerExited,
    TransportFailed,
}

/// Serve one accepted TCP connection until it closes or the server shuts
/// down.
///
/// # Errors
///
/// - `ServerError::Transport` if the WebSocket handshake fails
/// - `ServerError::Internal` if the processing worker panicked
pub(crate) async fn serve(
    stream: TcpStream,
    peer: SocketAddr,
    config: Arc<ServerConfig>,
    scheme: Arc<CryptoScheme>,
    factory: Arc<dyn EngineFactory>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), ServerError> {
    let ws = transport::upgrade(stream).await?;
    let (mut writer, mut reader) =
        SecureChannel::new(ws, scheme).with_fragment_size(config.fragment_size).split();

    tracing::debug!(%peer, "websocket established");

    let abort = AbortFlag::new();
    let (requests, mut request_rx) = request_queue(abort.clone());
    let (mut response_tx, mut responses) = bounded_response_queue(RESPONSE_QUEUE_CAPACITY);

    let worker_abort = abort.clone();
    let worker = tokio::task::spawn_blocking(move || {
        let processor = Processor::new(factory.create(), worker_abort);
        processor.run(&mut request_rx, &mut response_tx);
    });

    let mut ping = time::interval(config.ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ping.reset();

    let exit = loop {
        tokio::select! {
            _ = shutdown.changed() => break Exit::Shutdown,

            response = responses.recv() => {
                let Some(response) = response else {
                    break Exit::WorkerExited;
                };
                tracing::debug!(%peer, kind = response.kind(), "sending response");
                if let Err(e) = writer.send(&response).await {
                    tracing::debug!(%peer, error = %e, "send failed");
                    break Exit::TransportFailed;
                }
                ping.reset();
            },

            inbound = reader.recv::<Request>() => {
                ping.reset();
                let request = match inbound {
                    None => break Exit::PeerClosed,
                    Some(Ok(request)) => request,
                    Some(Err(ChannelError::WebSocket(e))) => {
                        tracing::debug!(%peer, error = %e, "transport error");
                        break Exit::TransportFailed;
                    },
                    Some(Err(e)) => {
                        let message = if e.is_key_mismatch() { INCORRECT_KEY } else { INVALID_REQUEST };
                        tracing::warn!(%peer, error = %e, "rejected inbound message");
                        if writer.send(&Response::error(message)).await.is_err() {
                            break Exit::TransportFailed;
                        }
                        continue;
                    },
                };

                tracing::debug!(%peer, method = request.method(), "request received");
                if requests.send(request).is_err() {
                    break Exit::WorkerExited;
                }
            },

            _ = ping.tick() => {
                tracing::trace!(%peer, "idle ping");
                if writer.ping().await.is_err() {
                    break Exit::TransportFailed;
                }
            },
        }
    };

    tracing::debug!(%peer, ?exit, "connection loop finished");

    // Stop the running generation; dropping the response queue releases a
    // worker waiting for room, which then drains what is queued.
    abort.set();
    drop(requests);
    drop(responses);

    let joined = worker.await;

    if exit == Exit::Shutdown {
        let _ = writer.close().await;
    }

    joined.map_err(ServerError::from)
}

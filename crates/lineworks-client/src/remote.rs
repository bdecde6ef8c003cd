//! Backend that talks to a Lineworks server.
//!
//! ```text
//! disconnected ──► connecting ──► connected ──► disconnected
//!                     │  ▲                          ▲
//!                     └──┘ attempt timed out        │
//!                     └──── refused / stop ─────────┘
//! ```
//!
//! While connected, one task services the stop signal, inbound responses and
//! outbound requests without fixed priority, so an `abort` goes out even
//! while the server streams faster than it is read. Requests sent before the
//! connection is up wait in the queue.
//!
//! # Errors on the wire
//!
//! | Condition                         | Response                  | Connection |
//! |-----------------------------------|---------------------------|------------|
//! | Server refused the TCP connection | `error{connection refused}` | never made |
//! | Response fails authentication     | `error{incorrect key}`    | torn down  |
//! | Response authenticates, not valid | `error{invalid response}` | kept       |
//! | Server closed or transport failed | `error{connection closed}` | torn down  |

use std::{io, sync::Arc, time::Duration};

use lineworks_core::{ResponseSender, ResponseSink, response_queue};
use lineworks_crypto::{CryptoScheme, DEFAULT_KDF_ITERATIONS};
use lineworks_proto::{
    FRAGMENT_SIZE, Request, Response,
    channel::{ChannelError, SecureChannel, websocket_config},
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, watch},
    time,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async_with_config, tungstenite,
};

use crate::{backend::Backend, endpoint::Endpoint, error::ClientError};

/// Time allowed for one connection attempt before it is retried.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Settings for a [`RemoteBackend`].
#[derive(Clone)]
pub struct ClientConfig {
    /// Server URL (`ws://` or `wss://`)
    pub endpoint: String,
    /// Shared secret; must match the server's
    pub secret: String,
    /// PBKDF2 rounds; must match the server's
    pub kdf_iterations: u32,
    /// Per-attempt connection timeout
    pub connect_timeout: Duration,
    /// Largest WebSocket frame sent
    pub fragment_size: usize,
}

impl ClientConfig {
    /// Configuration for `endpoint` with `secret` and default timings.
    pub fn new(endpoint: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            secret: secret.into(),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            fragment_size: FRAGMENT_SIZE,
        }
    }
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("endpoint", &self.endpoint)
            .field("secret", &"<redacted>")
            .field("kdf_iterations", &self.kdf_iterations)
            .field("connect_timeout", &self.connect_timeout)
            .field("fragment_size", &self.fragment_size)
            .finish()
    }
}

/// Connection to a remote server.
#[derive(Debug)]
pub struct RemoteBackend;

impl RemoteBackend {
    /// Start connecting in the background.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidEndpoint` or `ClientError::UnsupportedEndpoint`
    ///   if the endpoint cannot be served
    pub fn spawn(config: ClientConfig) -> Result<Backend, ClientError> {
        let endpoint = Endpoint::parse(&config.endpoint)?;

        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (response_tx, response_rx) = response_queue();
        let (stop_tx, stop_rx) = watch::channel(false);

        let connection = Connection { endpoint, config, responses: response_tx, stop: stop_rx };
        let task = tokio::spawn(connection.run(request_rx));

        Ok(Backend::new(request_tx, response_rx, stop_tx, task))
    }
}

type ClientWs = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Why connecting gave up.
enum ConnectFailure {
    Stopped,
    Failed(String),
}

struct Connection {
    endpoint: Endpoint,
    config: ClientConfig,
    responses: ResponseSender,
    stop: watch::Receiver<bool>,
}

impl Connection {
    async fn run(mut self, requests: mpsc::UnboundedReceiver<Request>) {
        self.emit(Response::status("connecting"));

        match self.establish().await {
            Ok((ws, scheme)) => {
                tracing::info!(endpoint = %self.endpoint, "connected");
                self.emit(Response::status("connected"));
                self.serve(ws, scheme, requests).await;
            },
            Err(ConnectFailure::Stopped) => tracing::debug!("stopped while connecting"),
            Err(ConnectFailure::Failed(message)) => {
                tracing::warn!(endpoint = %self.endpoint, %message, "connection failed");
                self.emit(Response::error(message));
            },
        }

        self.emit(Response::status("disconnected"));
    }

    fn emit(&mut self, response: Response) {
        self.responses.send(response);
    }

    fn stopped(&self) -> bool {
        *self.stop.borrow()
    }

    async fn establish(&mut self) -> Result<(ClientWs, Arc<CryptoScheme>), ConnectFailure> {
        let secret = self.config.secret.clone();
        let iterations = self.config.kdf_iterations;
        let scheme = tokio::task::spawn_blocking(move || {
            CryptoScheme::derive_with_iterations(&secret, iterations)
        })
        .await
        .map_err(|e| ConnectFailure::Failed(format!("key derivation failed: {e}")))?;

        let mut attempt = 0u32;
        loop {
            if self.stopped() {
                return Err(ConnectFailure::Stopped);
            }
            attempt += 1;
            tracing::debug!(endpoint = %self.endpoint, attempt, "connecting");

            let connect = connect_async_with_config(
                self.endpoint.url(),
                Some(websocket_config()),
                false,
            );

            tokio::select! {
                biased;

                _ = self.stop.changed() => return Err(ConnectFailure::Stopped),

                result = time::timeout(self.config.connect_timeout, connect) => match result {
                    Ok(Ok((ws, _))) => return Ok((ws, Arc::new(scheme))),
                    Ok(Err(e)) => return Err(ConnectFailure::Failed(describe(&e))),
                    Err(_) => tracing::debug!(attempt, "connection attempt timed out, retrying"),
                },
            }
        }
    }

    async fn serve(
        &mut self,
        ws: ClientWs,
        scheme: Arc<CryptoScheme>,
        mut requests: mpsc::UnboundedReceiver<Request>,
    ) {
        let (mut writer, mut reader) =
            SecureChannel::new(ws, scheme).with_fragment_size(self.config.fragment_size).split();

        if writer.send(&Request::Options).await.is_err() {
            self.emit(Response::error("connection closed"));
            return;
        }

        loop {
            tokio::select! {
                _ = self.stop.changed() => {
                    tracing::debug!("stop requested");
                    break;
                },

                inbound = reader.recv::<Response>() => match inbound {
                    Some(Ok(response)) => {
                        tracing::debug!(kind = response.kind(), "response received");
                        self.emit(response);
                    },
                    Some(Err(e)) if e.is_key_mismatch() => {
                        tracing::warn!(error = %e, "response failed authentication");
                        self.emit(Response::error("incorrect key"));
                        break;
                    },
                    Some(Err(ChannelError::WebSocket(e))) => {
                        tracing::debug!(error = %e, "transport error");
                        self.emit(Response::error("connection closed"));
                        break;
                    },
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "discarding invalid response");
                        self.emit(Response::error("invalid response"));
                    },
                    None => {
                        self.emit(Response::error("connection closed"));
                        break;
                    },
                },

                request = requests.recv() => {
                    let Some(request) = request else {
                        break;
                    };
                    tracing::debug!(method = request.method(), "sending request");
                    if let Err(e) = writer.send(&request).await {
                        tracing::debug!(error = %e, "send failed");
                        self.emit(Response::error("connection closed"));
                        break;
                    }
                },
            }
        }

        if let Err(e) = writer.close().await {
            tracing::trace!(error = %e, "close failed");
        }
    }
}

/// Turn a handshake failure into the message reported to the caller.
fn describe(error: &tungstenite::Error) -> String {
    match error {
        tungstenite::Error::Io(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
            "connection refused".to_owned()
        },
        other => format!("connection failed: {other}"),
    }
}

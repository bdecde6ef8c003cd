//! Loopback servers for end-to-end tests.
//!
//! [`TestServer`] runs a real [`Server`] on an ephemeral port with a cheap
//! key derivation, so tests exercise the full socket path without paying for
//! the production iteration count.

use std::{net::SocketAddr, sync::Arc};

use lineworks_core::EngineFactory;
use lineworks_crypto::CryptoScheme;
use lineworks_proto::channel::{SecureChannel, websocket_config};
use lineworks_server::{Server, ServerConfig, ServerError};
use tokio::{
    net::TcpStream,
    sync::oneshot,
    task::JoinHandle,
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async_with_config, tungstenite,
};

/// Secret every test server is started with.
pub const TEST_SECRET: &str = "Lineworks";

/// PBKDF2 rounds used by test servers and clients.
pub const TEST_KDF_ITERATIONS: u32 = 16;

/// Client side of a loopback connection.
pub type TestChannel = SecureChannel<MaybeTlsStream<TcpStream>>;

/// Server running on a background task.
pub struct TestServer {
    addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    /// Start a server on `127.0.0.1` with an ephemeral port.
    ///
    /// # Errors
    ///
    /// - `ServerError::Transport` if binding fails
    pub async fn start(factory: impl EngineFactory) -> Result<Self, ServerError> {
        Self::start_with(test_config(), factory).await
    }

    /// Start a server with a custom configuration.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` or `ServerError::Transport` if binding fails
    pub async fn start_with(
        config: ServerConfig,
        factory: impl EngineFactory,
    ) -> Result<Self, ServerError> {
        let server = Server::bind(config, factory).await?;
        let addr = server.local_addr()?;

        let (stop, stopped) = oneshot::channel();
        let task = tokio::spawn(server.run_until(async move {
            let _ = stopped.await;
        }));

        tracing::debug!(%addr, "test server started");
        Ok(Self { addr, stop: Some(stop), task })
    }

    /// Address the server listens on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// WebSocket URL of the server.
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Stop the server and wait until every connection has finished.
    ///
    /// # Errors
    ///
    /// - `ServerError::Internal` if the server task panicked
    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        (&mut self.task).await?
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if self.stop.is_some() {
            self.task.abort();
        }
    }
}

/// Configuration used by [`TestServer::start`].
pub fn test_config() -> ServerConfig {
    ServerConfig {
        bind_address: "127.0.0.1:0".into(),
        secret: TEST_SECRET.into(),
        kdf_iterations: TEST_KDF_ITERATIONS,
        ..Default::default()
    }
}

/// Open a raw WebSocket to `addr`.
///
/// # Errors
///
/// - `tungstenite::Error` if the connection or handshake fails
pub async fn connect_raw(
    addr: SocketAddr,
) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>, tungstenite::Error> {
    let url = format!("ws://{addr}");
    let (ws, _) = connect_async_with_config(url, Some(websocket_config()), false).await?;
    Ok(ws)
}

/// Open an encrypted channel to `addr` keyed with `secret`.
///
/// # Errors
///
/// - `tungstenite::Error` if the connection or handshake fails
pub async fn connect_channel(
    addr: SocketAddr,
    secret: &str,
) -> Result<TestChannel, tungstenite::Error> {
    let ws = connect_raw(addr).await?;
    let scheme = CryptoScheme::derive_with_iterations(secret, TEST_KDF_ITERATIONS);
    Ok(SecureChannel::new(ws, Arc::new(scheme)))
}

//! WebSocket listener.
//!
//! Plain TCP with a WebSocket upgrade. Confidentiality and integrity come from
//! the message layer ([`lineworks_proto::channel`]), not from TLS; anyone who
//! can reach the port can connect, but cannot do anything without the secret.

use std::net::SocketAddr;

use lineworks_proto::channel::websocket_config;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{WebSocketStream, accept_async_with_config};

use crate::error::ServerError;

/// TCP listener that hands out upgraded WebSocket connections.
pub struct WsTransport {
    listener: TcpListener,
}

impl WsTransport {
    /// Bind to `address`.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if the address does not parse
    /// - `ServerError::Transport` if binding fails
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::info!("WebSocket transport bound to {}", listener.local_addr()?);

        Ok(Self { listener })
    }

    /// Accept the next TCP connection.
    ///
    /// The WebSocket handshake is left to [`upgrade`], so a slow client does
    /// not hold up the accept loop.
    ///
    /// # Errors
    ///
    /// - `ServerError::Transport` if accepting fails
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        Ok(self.listener.accept().await?)
    }

    /// Local address the transport is bound to.
    ///
    /// # Errors
    ///
    /// - `ServerError::Transport` if the socket has no local address
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }
}

/// Complete the WebSocket handshake on an accepted connection.
///
/// # Errors
///
/// - `ServerError::Transport` if the peer does not speak WebSocket
pub async fn upgrade(stream: TcpStream) -> Result<WebSocketStream<TcpStream>, ServerError> {
    accept_async_with_config(stream, Some(websocket_config()))
        .await
        .map_err(|e| ServerError::Transport(format!("websocket handshake failed: {e}")))
}

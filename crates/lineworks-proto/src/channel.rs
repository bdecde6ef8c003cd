//! Encrypted message channel over a WebSocket.
//!
//! A sealed message is sent as one WebSocket message. When it spans more than
//! one fragment, each fragment becomes one frame of a fragmented binary
//! message (first frame binary, the rest continuation frames), so the
//! receiving WebSocket layer hands back the reassembled payload.
//!
//! Text messages are never valid on this channel. Control frames (ping, pong)
//! are handled by the WebSocket layer and not surfaced.

use std::sync::Arc;

use bytes::Bytes;
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use lineworks_crypto::CryptoScheme;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{
    WebSocketStream,
    tungstenite::{
        self, Message,
        protocol::{
            WebSocketConfig,
            frame::{
                Frame,
                coding::{Data, OpCode},
            },
        },
    },
};

use crate::{
    fragment::FRAGMENT_SIZE,
    messages::Message as WireMessage,
    wire::{self, WireError},
};

/// Errors from sending or receiving on a [`SecureChannel`].
#[derive(Error, Debug)]
pub enum ChannelError {
    /// Message could not be sealed or opened.
    #[error(transparent)]
    Wire(#[from] WireError),

    /// Peer sent a text message.
    #[error("unexpected text message")]
    UnexpectedText,

    /// WebSocket transport failed.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

impl ChannelError {
    /// True if a received frame failed authentication.
    #[must_use]
    pub fn is_key_mismatch(&self) -> bool {
        matches!(self, Self::Wire(e) if e.is_key_mismatch())
    }
}

/// WebSocket configuration for both peers.
///
/// Message and frame size limits are lifted: a sealed message is bounded by
/// what the application sends, and fragments are already capped at
/// [`FRAGMENT_SIZE`].
#[must_use]
pub fn websocket_config() -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = None;
    config.max_frame_size = None;
    config
}

/// Bidirectional encrypted channel.
pub struct SecureChannel<S> {
    writer: ChannelWriter<S>,
    reader: ChannelReader<S>,
}

impl<S> SecureChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an established WebSocket.
    pub fn new(ws: WebSocketStream<S>, scheme: Arc<CryptoScheme>) -> Self {
        let (sink, stream) = ws.split();
        Self {
            writer: ChannelWriter { sink, scheme: Arc::clone(&scheme), max_fragment: FRAGMENT_SIZE },
            reader: ChannelReader { stream, scheme },
        }
    }

    /// Override the fragment size used for outgoing messages.
    #[must_use]
    pub fn with_fragment_size(mut self, max_fragment: usize) -> Self {
        self.writer.max_fragment = max_fragment;
        self
    }

    /// Seal and send a message.
    ///
    /// # Errors
    ///
    /// - `ChannelError::Wire` if the message cannot be sealed
    /// - `ChannelError::WebSocket` if the transport fails
    pub async fn send<M: WireMessage>(&mut self, message: &M) -> Result<(), ChannelError> {
        self.writer.send(message).await
    }

    /// Receive and open the next message.
    ///
    /// Returns `None` once the peer has closed the connection.
    pub async fn recv<M: WireMessage>(&mut self) -> Option<Result<M, ChannelError>> {
        self.reader.recv().await
    }

    /// Split into independently usable halves.
    pub fn split(self) -> (ChannelWriter<S>, ChannelReader<S>) {
        (self.writer, self.reader)
    }
}

/// Sending half of a [`SecureChannel`].
pub struct ChannelWriter<S> {
    sink: SplitSink<WebSocketStream<S>, Message>,
    scheme: Arc<CryptoScheme>,
    max_fragment: usize,
}

impl<S> ChannelWriter<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Seal and send a message.
    ///
    /// # Errors
    ///
    /// - `ChannelError::Wire` if the message cannot be sealed
    /// - `ChannelError::WebSocket` if the transport fails
    pub async fn send<M: WireMessage>(&mut self, message: &M) -> Result<(), ChannelError> {
        let fragments = wire::seal(&self.scheme, message, self.max_fragment)?;
        let last = fragments.len().saturating_sub(1);

        if last == 0 {
            let payload = fragments.into_iter().next().map(Vec::from).unwrap_or_default();
            self.sink.send(Message::Binary(payload)).await?;
            return Ok(());
        }

        for (i, chunk) in fragments.into_iter().enumerate() {
            let opcode = if i == 0 { Data::Binary } else { Data::Continue };
            let frame = Frame::message(Vec::from(chunk), OpCode::Data(opcode), i == last);
            self.sink.feed(Message::Frame(frame)).await?;
        }
        self.sink.flush().await?;

        Ok(())
    }

    /// Send a WebSocket ping.
    ///
    /// # Errors
    ///
    /// - `ChannelError::WebSocket` if the transport fails
    pub async fn ping(&mut self) -> Result<(), ChannelError> {
        self.sink.send(Message::Ping(Vec::new())).await?;
        Ok(())
    }

    /// Send a close frame and flush.
    ///
    /// # Errors
    ///
    /// - `ChannelError::WebSocket` if the transport fails
    pub async fn close(&mut self) -> Result<(), ChannelError> {
        self.sink.close().await?;
        Ok(())
    }
}

/// Receiving half of a [`SecureChannel`].
pub struct ChannelReader<S> {
    stream: SplitStream<WebSocketStream<S>>,
    scheme: Arc<CryptoScheme>,
}

impl<S> ChannelReader<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Receive and open the next message.
    ///
    /// Returns `None` once the peer has closed the connection. Cancel-safe:
    /// dropping the future before it completes loses no data.
    pub async fn recv<M: WireMessage>(&mut self) -> Option<Result<M, ChannelError>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                    return None;
                },
                Err(e) => return Some(Err(e.into())),
            };

            match message {
                Message::Binary(data) => {
                    let fragments = [Bytes::from(data)];
                    return Some(wire::open(&self.scheme, &fragments).map_err(ChannelError::from));
                },
                Message::Text(_) => return Some(Err(ChannelError::UnexpectedText)),
                Message::Close(_) => return None,
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {
                    tracing::trace!("skipping control frame");
                },
            }
        }
    }
}

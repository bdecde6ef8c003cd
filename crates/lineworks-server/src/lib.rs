//! Lineworks generation server.
//!
//! Accepts WebSocket connections, authenticates every message with a key
//! derived from the shared secret, and runs each connection's requests
//! against its own inference engine.
//!
//! # Architecture
//!
//! [`lineworks_core`] holds the request processing logic and knows nothing
//! about sockets. This crate is the glue that runs it: one async I/O loop and
//! one blocking worker per connection (see [`connection`]).
//!
//! # Components
//!
//! - [`Server`]: accept loop and shutdown coordination
//! - [`WsTransport`]: TCP listener with WebSocket upgrade
//! - [`ProcessEngine`]: engine that runs an external generator program
//! - [`ServerConfig`]: bind address, secret, key derivation cost, timings

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
pub mod connection;
mod error;
mod process_engine;
mod transport;

use std::{future::Future, net::SocketAddr, sync::Arc};

pub use config::{DEFAULT_BIND_ADDRESS, DEFAULT_PING_INTERVAL, DEFAULT_SECRET, ServerConfig};
pub use error::ServerError;
use lineworks_core::EngineFactory;
use lineworks_crypto::CryptoScheme;
pub use process_engine::ProcessEngine;
use tokio::{sync::watch, task::JoinSet};
pub use transport::{WsTransport, upgrade};

/// Lineworks server bound to a local address.
pub struct Server {
    transport: WsTransport,
    config: Arc<ServerConfig>,
    scheme: Arc<CryptoScheme>,
    factory: Arc<dyn EngineFactory>,
}

impl Server {
    /// Derive the connection key and bind the listener.
    ///
    /// Key derivation runs on a blocking thread; with the default iteration
    /// count it takes a noticeable fraction of a second.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if the bind address is invalid
    /// - `ServerError::Transport` if binding fails
    pub async fn bind(
        config: ServerConfig,
        factory: impl EngineFactory,
    ) -> Result<Self, ServerError> {
        let secret = config.secret.clone();
        let iterations = config.kdf_iterations;
        let scheme = tokio::task::spawn_blocking(move || {
            CryptoScheme::derive_with_iterations(&secret, iterations)
        })
        .await?;

        let transport = WsTransport::bind(&config.bind_address).await?;

        Ok(Self {
            transport,
            config: Arc::new(config),
            scheme: Arc::new(scheme),
            factory: Arc::new(factory),
        })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Serve until the process is killed.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` completes.
    ///
    /// On shutdown the listener stops accepting, every connection is told to
    /// stop, and this returns once all connection tasks have finished.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), ServerError> {
        let Self { transport, config, scheme, factory } = self;

        tracing::info!("Server starting on {}", transport.local_addr()?);

        let (stop_tx, stop_rx) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,

                accepted = transport.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::info!(%peer, "connection accepted");

                        let config = Arc::clone(&config);
                        let scheme = Arc::clone(&scheme);
                        let factory = Arc::clone(&factory);
                        let stop = stop_rx.clone();

                        connections.spawn(async move {
                            if let Err(e) =
                                connection::serve(stream, peer, config, scheme, factory, stop).await
                            {
                                tracing::warn!(%peer, error = %e, "connection failed");
                            }
                            tracing::info!(%peer, "connection closed");
                        });
                    },
                    Err(e) => tracing::error!("Accept error: {}", e),
                },

                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("connection task failed: {}", e);
                    }
                },
            }
        }

        tracing::info!("Shutting down, waiting for {} connection(s)", connections.len());
        drop(transport);
        let _ = stop_tx.send(true);

        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                tracing::error!("connection task failed: {}", e);
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }
}

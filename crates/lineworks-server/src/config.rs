//! Server configuration.

use std::{fmt, time::Duration};

use lineworks_crypto::DEFAULT_KDF_ITERATIONS;
use lineworks_proto::FRAGMENT_SIZE;

/// Address the server binds to unless told otherwise.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:29999";

/// Well-known secret used when none is configured. Provides no security.
pub const DEFAULT_SECRET: &str = "Lineworks";

/// Idle time after which the server pings the client.
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(2);

/// Runtime configuration for [`Server`](crate::Server).
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "127.0.0.1:29999")
    pub bind_address: String,
    /// Shared secret the connection key is derived from
    pub secret: String,
    /// PBKDF2 rounds; clients must use the same count
    pub kdf_iterations: u32,
    /// Ping the client after this much idle time
    pub ping_interval: Duration,
    /// Largest WebSocket frame sent
    pub fragment_size: usize,
}

impl ServerConfig {
    /// True if the well-known default secret is in use.
    pub fn uses_default_secret(&self) -> bool {
        self.secret == DEFAULT_SECRET
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            secret: DEFAULT_SECRET.to_string(),
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            ping_interval: DEFAULT_PING_INTERVAL,
            fragment_size: FRAGMENT_SIZE,
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_address", &self.bind_address)
            .field("secret", &"<redacted>")
            .field("kdf_iterations", &self.kdf_iterations)
            .field("ping_interval", &self.ping_interval)
            .field("fragment_size", &self.fragment_size)
            .finish()
    }
}

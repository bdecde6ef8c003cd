//! Server endpoint URLs.
//!
//! `ws://` and `wss://` select the encrypted WebSocket protocol. `http://`
//! and `https://` name the plain HTTP API, which is recognised so it can be
//! rejected with a clear error.

use std::fmt;

use crate::error::ClientError;

/// A parsed encrypted-protocol endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    url: String,
    tls: bool,
}

impl Endpoint {
    /// Parse `url`.
    ///
    /// # Errors
    ///
    /// - `ClientError::UnsupportedEndpoint` for `http://` and `https://`
    /// - `ClientError::InvalidEndpoint` for anything else that is not a
    ///   `ws://` or `wss://` URL with a host
    pub fn parse(url: &str) -> Result<Self, ClientError> {
        let url = url.trim();
        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ClientError::InvalidEndpoint(url.to_owned()));
        };

        let tls = match scheme.to_ascii_lowercase().as_str() {
            "ws" => false,
            "wss" => true,
            "http" | "https" => return Err(ClientError::UnsupportedEndpoint(url.to_owned())),
            _ => return Err(ClientError::InvalidEndpoint(url.to_owned())),
        };

        let host = rest.split(['/', '?', '#']).next().unwrap_or("");
        if host.is_empty() || host.starts_with(':') {
            return Err(ClientError::InvalidEndpoint(url.to_owned()));
        }

        Ok(Self { url: url.to_owned(), tls })
    }

    /// Full URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// True for `wss://` endpoints.
    pub fn is_tls(&self) -> bool {
        self.tls
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn websocket_urls_parse() {
        let plain = Endpoint::parse("ws://127.0.0.1:29999").unwrap();
        assert!(!plain.is_tls());
        assert_eq!(plain.url(), "ws://127.0.0.1:29999");

        let secure = Endpoint::parse(" wss://example.com/lineworks ").unwrap();
        assert!(secure.is_tls());
        assert_eq!(secure.to_string(), "wss://example.com/lineworks");
    }

    #[test]
    fn http_is_unsupported() {
        for url in ["http://localhost:8080", "HTTPS://example.com"] {
            assert_eq!(Endpoint::parse(url), Err(ClientError::UnsupportedEndpoint(url.into())));
        }
    }

    #[test]
    fn garbage_is_invalid() {
        for url in ["", "localhost:29999", "ftp://host", "ws://", "ws://:29999", "ws:///path"] {
            assert!(matches!(Endpoint::parse(url), Err(ClientError::InvalidEndpoint(_))), "{url}");
        }
    }
}

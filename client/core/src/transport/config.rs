//! Transport Configuration
//!
//! Where the per-exchange socket connects and how long it may take.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::messages::DEFAULT_ENDPOINT_PATH;

/// First port the webserve server tries when none is given
pub const DEFAULT_PORT: u16 = 8010;

/// Transport configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Full `ws://` or `wss://` URL of the streaming endpoint
    pub url: String,

    /// Connection timeout in milliseconds
    ///
    /// How long an exchange may wait for the socket to open before it is
    /// reported as failed.
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            connect_timeout_ms: 5000,
        }
    }
}

impl TransportConfig {
    /// Configuration for a given endpoint URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Connection timeout as a duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Whether the URL uses TLS
    pub fn is_secure(&self) -> bool {
        self.url.starts_with("wss://")
    }
}

/// Default endpoint: the server's first candidate port on localhost
pub fn default_url() -> String {
    format!("ws://127.0.0.1:{DEFAULT_PORT}{DEFAULT_ENDPOINT_PATH}")
}

/// Build the endpoint URL for a server address
///
/// `host` may be `host:port`; `secure` selects `wss`.
pub fn endpoint_url(host: &str, secure: bool) -> String {
    let scheme = if secure { "wss" } else { "ws" };
    format!("{scheme}://{host}{DEFAULT_ENDPOINT_PATH}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transport_config_default() {
        let config = TransportConfig::default();
        assert_eq!(config.url, "ws://127.0.0.1:8010/v1/retrieveResponse");
        assert_eq!(config.connect_timeout(), Duration::from_secs(5));
        assert!(!config.is_secure());
    }

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("example.com:8443", true),
            "wss://example.com:8443/v1/retrieveResponse"
        );
        assert_eq!(
            endpoint_url("localhost:8011", false),
            "ws://localhost:8011/v1/retrieveResponse"
        );
    }

    #[test]
    fn test_with_url() {
        let config = TransportConfig::with_url("wss://chat.local/v1/retrieveResponse");
        assert!(config.is_secure());
        assert_eq!(config.connect_timeout_ms, 5000);
    }
}

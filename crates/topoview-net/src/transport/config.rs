//! Transport configuration.

use std::collections::HashMap;
use std::time::Duration;

/// Default address of the topology source.
pub const DEFAULT_URL: &str = "ws://127.0.0.1:9000";

/// Default pause between a lost connection and the next attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Configuration for the transport connection.
#[derive(Clone, Debug, PartialEq)]
pub struct TransportConfig {
    /// The WebSocket URL (ws:// or wss://).
    pub url: String,
    /// Custom headers to send during the handshake.
    pub headers: HashMap<String, String>,
    /// Fixed delay before each reconnection attempt.
    pub reconnect_delay: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

impl TransportConfig {
    /// Create a configuration for `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: HashMap::new(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }

    /// Add a custom header for the WebSocket handshake.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add multiple headers.
    pub fn headers(mut self, headers: impl IntoIterator<Item = (String, String)>) -> Self {
        self.headers.extend(headers);
        self
    }

    /// Set the delay before each reconnection attempt.
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }
}

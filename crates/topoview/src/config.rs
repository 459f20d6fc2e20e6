//! Session configuration.
//!
//! A [`SessionConfig`] is usually read from a TOML file. Every field has a
//! default, so a file only needs the keys it changes:
//!
//! ```toml
//! url = "ws://10.0.0.5:9000"
//! flush_interval_ms = 250
//! registry_mode = "strict"
//!
//! [headers]
//! Authorization = "Bearer token"
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use topoview_core::RegistryMode;
use topoview_net::TransportConfig;
use topoview_net::transport::DEFAULT_URL;

/// Errors raised while loading a configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("Failed to read config '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The text is not valid TOML for a session config.
    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("Invalid value for '{key}': {message}")]
    Invalid { key: &'static str, message: String },
}

impl ConfigError {
    fn invalid(key: &'static str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            message: message.into(),
        }
    }
}

/// Settings for a [`Session`](crate::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// WebSocket URL of the topology source.
    pub url: String,
    /// Delay before each reconnection attempt, in milliseconds.
    pub reconnect_delay_ms: u64,
    /// Period of the update buffer flush, in milliseconds.
    pub flush_interval_ms: u64,
    /// How conflicting node registrations are treated.
    pub registry_mode: RegistryMode,
    /// Prefix of node image paths.
    pub image_dir: String,
    /// Factor applied to source coordinates.
    pub coordinate_scale: f64,
    /// Extra handshake headers.
    pub headers: HashMap<String, String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            reconnect_delay_ms: 2000,
            flush_interval_ms: 500,
            registry_mode: RegistryMode::Permissive,
            image_dir: "img/".to_string(),
            coordinate_scale: 50.0,
            headers: HashMap::new(),
        }
    }
}

impl SessionConfig {
    /// Create a configuration for `url` with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.url.is_empty() {
            return Err(ConfigError::invalid("url", "must not be empty"));
        }
        if self.reconnect_delay_ms == 0 {
            return Err(ConfigError::invalid("reconnect_delay_ms", "must be positive"));
        }
        if self.flush_interval_ms == 0 {
            return Err(ConfigError::invalid("flush_interval_ms", "must be positive"));
        }
        if !self.coordinate_scale.is_finite() || self.coordinate_scale <= 0.0 {
            return Err(ConfigError::invalid(
                "coordinate_scale",
                format!("must be a positive number, got {}", self.coordinate_scale),
            ));
        }
        Ok(())
    }

    /// Set the reconnection delay.
    pub fn reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay_ms = millis(delay);
        self
    }

    /// Set the flush period.
    pub fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval_ms = millis(interval);
        self
    }

    /// Set the registry mode.
    pub fn registry_mode(mut self, mode: RegistryMode) -> Self {
        self.registry_mode = mode;
        self
    }

    /// Set the image directory prefix.
    pub fn image_dir(mut self, dir: impl Into<String>) -> Self {
        self.image_dir = dir.into();
        self
    }

    /// Set the coordinate scale.
    pub fn coordinate_scale(mut self, scale: f64) -> Self {
        self.coordinate_scale = scale;
        self
    }

    /// Add a handshake header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// The flush period.
    pub fn flush_period(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }

    /// Transport settings derived from this configuration.
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new(self.url.clone())
            .headers(self.headers.clone())
            .reconnect_delay(Duration::from_millis(self.reconnect_delay_ms))
    }
}

// Saturates instead of truncating.
fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

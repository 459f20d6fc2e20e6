//! Error types for the networking module.

use std::fmt;

/// Network-specific errors.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkError {
    /// The connection is not open; nothing was sent.
    NotConnected,
    /// The connection went away while a frame was being handed to it.
    TransportClosed(String),
    /// WebSocket protocol or I/O error.
    WebSocket(String),
    /// Invalid URL provided.
    InvalidUrl(String),
    /// Invalid header name or value.
    InvalidHeader(String),
    /// JSON serialization error.
    Json(String),
    /// No async runtime was available to drive the connection.
    NoRuntime,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "Not connected"),
            Self::TransportClosed(msg) => write!(f, "Transport closed: {msg}"),
            Self::WebSocket(msg) => write!(f, "WebSocket error: {msg}"),
            Self::InvalidUrl(msg) => write!(f, "Invalid URL: {msg}"),
            Self::InvalidHeader(msg) => write!(f, "Invalid header: {msg}"),
            Self::Json(msg) => write!(f, "JSON error: {msg}"),
            Self::NoRuntime => write!(f, "No tokio runtime available"),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<topoview_core::CoreError> for NetworkError {
    fn from(err: topoview_core::CoreError) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for NetworkError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        use tokio_tungstenite::tungstenite::Error;
        match err {
            Error::Url(e) => Self::InvalidUrl(e.to_string()),
            Error::ConnectionClosed | Error::AlreadyClosed => Self::TransportClosed(err.to_string()),
            other => Self::WebSocket(other.to_string()),
        }
    }
}

impl From<http::header::InvalidHeaderName> for NetworkError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for NetworkError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// A specialized Result type for network operations.
pub type Result<T> = std::result::Result<T, NetworkError>;

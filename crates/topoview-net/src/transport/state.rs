//! Connection state and close codes.

use std::fmt;

/// Current state of the transport connection.
///
/// ```text
/// Closed --open()--> Connecting --ok--> Open --remote close--> Closed
///   Closed --reconnect timer or open()--> Reconnecting --ok--> Open
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Not connected. A reconnection may be pending.
    #[default]
    Closed,
    /// First connection attempt in progress.
    Connecting,
    /// Connected and ready to send and receive frames.
    Open,
    /// A reconnection attempt is in progress.
    Reconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Closed => write!(f, "Closed"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Open => write!(f, "Open"),
            Self::Reconnecting => write!(f, "Reconnecting"),
        }
    }
}

/// WebSocket close codes (RFC 6455) the source is known to send.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CloseCode {
    /// Normal closure.
    #[default]
    Normal,
    /// Endpoint is going away (source restarting).
    Away,
    /// Protocol error.
    Protocol,
    /// Connection dropped without a close frame.
    Abnormal,
    /// Unexpected condition on the source.
    Error,
    /// Any other code.
    Other(u16),
}

impl CloseCode {
    /// Convert to the numeric close code.
    pub fn as_u16(&self) -> u16 {
        match self {
            Self::Normal => 1000,
            Self::Away => 1001,
            Self::Protocol => 1002,
            Self::Abnormal => 1006,
            Self::Error => 1011,
            Self::Other(code) => *code,
        }
    }

    /// Create from a numeric close code.
    pub fn from_u16(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::Away,
            1002 => Self::Protocol,
            1006 => Self::Abnormal,
            1011 => Self::Error,
            code => Self::Other(code),
        }
    }
}

//! Error types for Topoview core.

use std::fmt;

use crate::entity::EntityId;

/// The main error type for Topoview core operations.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreError {
    /// An inbound frame could not be decoded into a message.
    MalformedFrame(String),
    /// An update query could not be resolved to a single entity.
    AmbiguousTarget {
        /// Rendering of the filter that failed to resolve.
        filter: String,
    },
    /// A node id was registered a second time under a different name.
    DuplicateId {
        /// The conflicting id.
        id: EntityId,
        /// The name already registered for the id.
        existing: String,
        /// The name of the rejected registration.
        requested: String,
    },
    /// A name is already held by another node id.
    DuplicateName {
        /// The contested name.
        name: String,
        /// The id holding the name.
        holder: EntityId,
        /// The id that asked for it.
        requested: EntityId,
    },
    /// The params of a message did not match the expected record shape.
    InvalidParams {
        /// Entity kind of the offending message.
        kind: String,
        /// Decoder message.
        message: String,
    },
    /// A query could not be encoded for the wire.
    Encode(String),
    /// Timer-related error.
    Timer(TimerError),
}

impl CoreError {
    /// Create a malformed frame error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedFrame(message.into())
    }

    /// Returns `true` if the error is recovered by dropping the offending input.
    pub fn is_droppable(&self) -> bool {
        matches!(
            self,
            Self::MalformedFrame(_) | Self::AmbiguousTarget { .. } | Self::InvalidParams { .. }
        )
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedFrame(msg) => write!(f, "Malformed frame: {msg}"),
            Self::AmbiguousTarget { filter } => {
                write!(f, "Update target cannot be resolved from filter {filter}")
            }
            Self::DuplicateId {
                id,
                existing,
                requested,
            } => write!(
                f,
                "Entity {id} is already registered as '{existing}', refusing '{requested}'"
            ),
            Self::DuplicateName {
                name,
                holder,
                requested,
            } => write!(
                f,
                "Name '{name}' already belongs to entity {holder}, refusing it for {requested}"
            ),
            Self::InvalidParams { kind, message } => {
                write!(f, "Invalid params for '{kind}': {message}")
            }
            Self::Encode(msg) => write!(f, "Failed to encode query: {msg}"),
            Self::Timer(err) => write!(f, "Timer error: {err}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Timer(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TimerError> for CoreError {
    fn from(err: TimerError) -> Self {
        Self::Timer(err)
    }
}

/// Timer-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// The timer ID is invalid or has already been removed.
    InvalidTimerId,
}

impl fmt::Display for TimerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimerId => write!(f, "Invalid or expired timer ID"),
        }
    }
}

impl std::error::Error for TimerError {}

/// A specialized Result type for Topoview core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

//! Query actions and entity kinds.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Entity kind carrying synthetic connectivity events.
pub const CONNECTION_KIND: &str = "local.connection";

/// The action of a query or message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Read entities.
    Select,
    /// An entity was created (or should be).
    Insert,
    /// An entity was modified (or should be).
    Update,
    /// An entity was removed (or should be).
    Delete,
    /// Invoke a method on the source.
    Execute,
}

impl Action {
    /// The wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Execute => "execute",
        }
    }

    /// Parse a wire name. Matching is case-sensitive.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "select" => Some(Self::Select),
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "execute" => Some(Self::Execute),
            _ => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of entity a query or message is about (the wire `object_name`).
///
/// Known kinds get their own variant so handlers can match exhaustively;
/// anything else is kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// A graph node.
    Node,
    /// A channel, rendered as one or more edges.
    Channel,
    /// The local connection to the source (`local.connection`).
    Connection,
    /// Any other kind, case preserved.
    Other(String),
}

impl EntityKind {
    /// Map a wire name to a kind. Matching is case-sensitive.
    pub fn from_name(name: &str) -> Self {
        match name {
            "node" => Self::Node,
            "channel" => Self::Channel,
            CONNECTION_KIND => Self::Connection,
            other => Self::Other(other.to_string()),
        }
    }

    /// The wire name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Node => "node",
            Self::Channel => "channel",
            Self::Connection => CONNECTION_KIND,
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for EntityKind {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl From<String> for EntityKind {
    fn from(name: String) -> Self {
        Self::from_name(&name)
    }
}

impl Serialize for EntityKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EntityKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names() {
        for action in [
            Action::Select,
            Action::Insert,
            Action::Update,
            Action::Delete,
            Action::Execute,
        ] {
            assert_eq!(Action::parse(action.as_str()), Some(action));
        }
        assert_eq!(Action::parse("INSERT"), None);
        assert_eq!(Action::parse(""), None);
    }

    #[test]
    fn test_entity_kind_is_case_sensitive() {
        assert_eq!(EntityKind::from_name("node"), EntityKind::Node);
        assert_eq!(
            EntityKind::from_name("Node"),
            EntityKind::Other("Node".to_string())
        );
        assert_eq!(EntityKind::from_name(CONNECTION_KIND), EntityKind::Connection);
        assert_eq!(EntityKind::Other("lxc".into()).as_str(), "lxc");
    }
}

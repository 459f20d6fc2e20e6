//! Inbound messages.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::action::{Action, EntityKind};
use super::filter::Filter;
use super::query::WireQuery;
use crate::error::{CoreError, Result};

/// A decoded inbound frame (or a synthetic connectivity event).
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// What happened.
    pub action: Action,
    /// What it happened to.
    pub kind: EntityKind,
    /// Entity attributes.
    pub params: Map<String, Value>,
    /// Target predicates (updates identify their target this way).
    pub filter: Filter,
    /// End of a paginated result set.
    pub last: bool,
}

/// Frame layout as sent by the source. Everything but the routing fields is optional.
#[derive(Deserialize)]
struct RawFrame {
    action: String,
    object_name: String,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    filter: Option<Filter>,
    #[serde(default)]
    last: Option<bool>,
}

impl Message {
    /// Create a message with empty params and filter.
    pub fn new(action: Action, kind: impl Into<EntityKind>) -> Self {
        Self {
            action,
            kind: kind.into(),
            params: Map::new(),
            filter: Filter::new(),
            last: false,
        }
    }

    /// Synthetic connectivity event for the local connection.
    pub fn connectivity(action: Action) -> Self {
        Self::new(action, EntityKind::Connection)
    }

    /// Set the params from a JSON object. Non-object values leave params empty.
    pub fn with_params(mut self, params: Value) -> Self {
        if let Value::Object(map) = params {
            self.params = map;
        }
        self
    }

    /// Set the filter.
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the last-page flag.
    pub fn with_last(mut self, last: bool) -> Self {
        self.last = last;
        self
    }

    /// Decode a text frame.
    ///
    /// Missing `params`, `filter` and `last` default to empty, empty and
    /// `false`. Anything that is not an object with a known `action` and an
    /// `object_name` is rejected as malformed.
    pub fn decode(text: &str) -> Result<Self> {
        let raw: RawFrame =
            serde_json::from_str(text).map_err(|e| CoreError::malformed(e.to_string()))?;

        let action = Action::parse(&raw.action)
            .ok_or_else(|| CoreError::malformed(format!("unknown action '{}'", raw.action)))?;

        let params = match raw.params {
            Value::Null => Map::new(),
            Value::Object(map) => map,
            other => {
                return Err(CoreError::malformed(format!(
                    "params must be an object, got {other}"
                )));
            }
        };

        Ok(Self {
            action,
            kind: EntityKind::from_name(&raw.object_name),
            params,
            filter: raw.filter.unwrap_or_default(),
            last: raw.last.unwrap_or(false),
        })
    }

    /// Deserialize the params into a typed record.
    pub fn params_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.params.clone())).map_err(|e| {
            CoreError::InvalidParams {
                kind: self.kind.to_string(),
                message: e.to_string(),
            }
        })
    }

    /// Look up a single param.
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }
}

impl From<WireQuery> for Message {
    fn from(wire: WireQuery) -> Self {
        Self {
            action: wire.action,
            kind: wire.object_name,
            params: wire.params.unwrap_or_default(),
            filter: wire.filter.unwrap_or_default(),
            last: wire.last,
        }
    }
}

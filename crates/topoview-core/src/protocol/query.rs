//! Outbound query descriptors.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::action::{Action, EntityKind};
use super::filter::{Filter, Operator};
use crate::error::{CoreError, Result};

/// A request sent to the source.
///
/// Queries are values: the builder methods consume the query and return a
/// new one, and nothing is validated. The source evaluates filters.
///
/// # Example
///
/// ```
/// use topoview_core::protocol::{Action, Query};
///
/// let query = Query::new(Action::Select, "node").field("id").field("name");
/// assert_eq!(
///     query.to_json().unwrap(),
///     r#"{"action":"select","object_name":"node","filter":null,"params":null,"fields":["id","name"],"last":false}"#
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    action: Action,
    object_name: EntityKind,
    filter: Option<Filter>,
    params: Option<Map<String, Value>>,
    fields: Option<Vec<String>>,
    last: bool,
}

impl Query {
    /// Create a query with no filter, params or projection.
    pub fn new(action: Action, object_name: impl Into<EntityKind>) -> Self {
        Self {
            action,
            object_name: object_name.into(),
            filter: None,
            params: None,
            fields: None,
            last: false,
        }
    }

    /// Shorthand for a `select` query.
    pub fn select(object_name: impl Into<EntityKind>) -> Self {
        Self::new(Action::Select, object_name)
    }

    /// Replace the filter.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Append a predicate to the filter.
    pub fn filter_by(mut self, key: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        let filter = self.filter.take().unwrap_or_default();
        self.filter = Some(filter.and(key, op, value));
        self
    }

    /// Replace the params.
    pub fn params(mut self, params: Map<String, Value>) -> Self {
        self.params = Some(params);
        self
    }

    /// Set a single param.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// Replace the field projection.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Add a field to the projection.
    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.fields.get_or_insert_with(Vec::new).push(field.into());
        self
    }

    /// Mark the query as the last page of a result set.
    pub fn last(mut self, last: bool) -> Self {
        self.last = last;
        self
    }

    /// The action.
    pub fn action(&self) -> Action {
        self.action
    }

    /// The entity kind.
    pub fn object_name(&self) -> &EntityKind {
        &self.object_name
    }

    /// The filter, if any.
    pub fn filter_ref(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    /// The params, if any.
    pub fn params_ref(&self) -> Option<&Map<String, Value>> {
        self.params.as_ref()
    }

    /// The field projection, if any.
    pub fn fields_ref(&self) -> Option<&[String]> {
        self.fields.as_deref()
    }

    /// Whether this is the last page.
    pub fn is_last(&self) -> bool {
        self.last
    }

    /// Project the query onto its transmitted structure.
    pub fn to_wire(&self) -> WireQuery {
        WireQuery {
            action: self.action,
            object_name: self.object_name.clone(),
            filter: self.filter.clone(),
            params: self.params.clone(),
            fields: self.fields.clone(),
            last: self.last,
        }
    }

    /// Encode the query as JSON text.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.to_wire()).map_err(|e| CoreError::Encode(e.to_string()))
    }
}

impl From<WireQuery> for Query {
    fn from(wire: WireQuery) -> Self {
        Self {
            action: wire.action,
            object_name: wire.object_name,
            filter: wire.filter,
            params: wire.params,
            fields: wire.fields,
            last: wire.last,
        }
    }
}

/// The transmitted form of a query.
///
/// Absent optionals are sent as `null` rather than omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireQuery {
    /// The action.
    pub action: Action,
    /// The entity kind.
    pub object_name: EntityKind,
    /// Filter triples.
    #[serde(default)]
    pub filter: Option<Filter>,
    /// Field values for writes.
    #[serde(default)]
    pub params: Option<Map<String, Value>>,
    /// Field projection.
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    /// End of a paginated result set.
    #[serde(default)]
    pub last: bool,
}

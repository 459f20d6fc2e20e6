//! Filter predicates.
//!
//! A filter is an ordered conjunction of `(key, operator, value)` triples. The
//! client never evaluates filters; it forwards them to the source and, for
//! update messages, reads the equality predicates back to find the target.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A predicate operator.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operator {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `{`: the field value is included in the given set.
    Included,
    /// `}`: the field contains the given value.
    Contains,
    /// `&&`
    And,
    /// `||`
    Or,
    /// `~`: pattern match.
    Matches,
    /// An operator this client does not know, forwarded verbatim.
    Other(String),
}

impl Operator {
    /// Parse an operator from its wire form.
    pub fn parse(op: &str) -> Self {
        match op {
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "{" => Self::Included,
            "}" => Self::Contains,
            "&&" => Self::And,
            "||" => Self::Or,
            "~" => Self::Matches,
            other => Self::Other(other.to_string()),
        }
    }

    /// The wire form of the operator.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Included => "{",
            Self::Contains => "}",
            Self::And => "&&",
            Self::Or => "||",
            Self::Matches => "~",
            Self::Other(op) => op,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `(key, operator, value)` triple.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    /// Field name.
    pub key: String,
    /// Comparison operator.
    pub op: Operator,
    /// Operand.
    pub value: Value,
}

impl Predicate {
    /// Create a predicate.
    pub fn new(key: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            op,
            value: value.into(),
        }
    }

    /// Create an equality predicate.
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(key, Operator::Eq, value)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.key, self.op, self.value)
    }
}

impl Serialize for Predicate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.key, self.op.as_str(), &self.value).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Predicate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let (key, op, value) = <(String, String, Value)>::deserialize(deserializer)?;
        Ok(Self {
            key,
            op: Operator::parse(&op),
            value,
        })
    }
}

/// An ordered list of predicates.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Vec<Predicate>);

impl Filter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a predicate.
    pub fn and(mut self, key: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        self.0.push(Predicate::new(key, op, value));
        self
    }

    /// Append an equality predicate.
    pub fn and_eq(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.and(key, Operator::Eq, value)
    }

    /// Iterate predicates in order.
    pub fn iter(&self) -> impl Iterator<Item = &Predicate> {
        self.0.iter()
    }

    /// Number of predicates.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the filter has no predicates.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Collect the equality predicates into a key→value map.
    ///
    /// Other operators are ignored. When a key appears twice the later
    /// predicate wins.
    pub fn equalities(&self) -> HashMap<&str, &Value> {
        self.0
            .iter()
            .filter(|p| p.op == Operator::Eq)
            .map(|p| (p.key.as_str(), &p.value))
            .collect()
    }
}

impl From<Vec<Predicate>> for Filter {
    fn from(predicates: Vec<Predicate>) -> Self {
        Self(predicates)
    }
}

impl FromIterator<Predicate> for Filter {
    fn from_iter<I: IntoIterator<Item = Predicate>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Filter {
    type Item = &'a Predicate;
    type IntoIter = std::slice::Iter<'a, Predicate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<empty filter>");
        }
        for (i, predicate) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" AND ")?;
            }
            write!(f, "{predicate}")?;
        }
        Ok(())
    }
}

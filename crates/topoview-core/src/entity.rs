//! Graph entities and the mutations handed to the renderer.
//!
//! Mutations are partial: every attribute except the id is optional, and the
//! renderer applies them as an id-keyed upsert. Two mutations for the same id
//! in one batch are legal; the later one wins.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier of a node or edge, assigned by the source.
///
/// The source uses integers in some deployments and UUID strings in others,
/// so both are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Numeric id.
    Int(i64),
    /// String id (typically a UUID).
    Str(String),
}

impl EntityId {
    /// Convert a JSON value to an id. Only integers and strings qualify.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(id) => write!(f, "{id}"),
            Self::Str(id) => f.write_str(id),
        }
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        Self::Int(id)
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self::Str(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self::Str(id)
    }
}

/// Vertical alignment of a label relative to its entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelAlign {
    /// Above the entity.
    #[default]
    Top,
    /// Centered on the entity.
    Middle,
    /// Below the entity.
    Bottom,
}

/// Label font attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Font {
    /// Font size in pixels.
    pub size: u32,
    /// Text color.
    pub color: String,
    /// Outline color.
    pub stroke_color: String,
    /// Outline width in pixels.
    pub stroke_width: u32,
    /// Label alignment.
    pub align: LabelAlign,
    /// Vertical offset in pixels.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vadjust: Option<i32>,
}

impl Font {
    /// Font used for node labels.
    pub fn node_label() -> Self {
        Self {
            size: 40,
            color: "#000000".to_string(),
            stroke_color: "white".to_string(),
            stroke_width: 2,
            align: LabelAlign::Top,
            vadjust: None,
        }
    }

    /// Font used for edge labels.
    pub fn edge_label() -> Self {
        Self {
            size: 35,
            color: "black".to_string(),
            stroke_color: "white".to_string(),
            stroke_width: 2,
            align: LabelAlign::Top,
            vadjust: Some(-20),
        }
    }
}

/// Canvas position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

impl Position {
    /// Create a position.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A partial node upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMutation {
    /// Node id.
    pub id: EntityId,
    /// Display label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Canvas position.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    /// Image path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Rendered size.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    /// Label font.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
    /// Whether the layout physics may move the node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physics: Option<bool>,
}

impl NodeMutation {
    /// Create a mutation that only names the target node.
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            label: None,
            position: None,
            image: None,
            size: None,
            font: None,
            physics: None,
        }
    }

    /// Set the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the position.
    pub fn position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Set the image path.
    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Set the rendered size.
    pub fn size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    /// Set the label font.
    pub fn font(mut self, font: Font) -> Self {
        self.font = Some(font);
        self
    }

    /// Set the physics flag.
    pub fn physics(mut self, physics: bool) -> Self {
        self.physics = Some(physics);
        self
    }
}

/// A partial edge upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeMutation {
    /// Edge id.
    pub id: EntityId,
    /// Source node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<EntityId>,
    /// Destination node.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<EntityId>,
    /// Nominal capacity as reported by the source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<f64>,
    /// Measured bandwidth in Mbps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bandwidth_mbps: Option<f64>,
    /// Display label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Whether the layout physics may act on the edge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physics: Option<bool>,
    /// Whether the edge is drawn dashed (radio links).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashed: Option<bool>,
    /// Label font.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub font: Option<Font>,
}

impl EdgeMutation {
    /// Create a mutation that only names the target edge.
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            from: None,
            to: None,
            capacity: None,
            bandwidth_mbps: None,
            label: None,
            physics: None,
            dashed: None,
            font: None,
        }
    }

    /// Set both endpoints. Unresolved endpoints stay `None`.
    pub fn endpoints(mut self, from: Option<EntityId>, to: Option<EntityId>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// Set the capacity.
    pub fn capacity(mut self, capacity: Option<f64>) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the measured bandwidth.
    pub fn bandwidth_mbps(mut self, bandwidth: f64) -> Self {
        self.bandwidth_mbps = Some(bandwidth);
        self
    }

    /// Set the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Set the physics flag.
    pub fn physics(mut self, physics: bool) -> Self {
        self.physics = Some(physics);
        self
    }

    /// Mark the edge as dashed.
    pub fn dashed(mut self) -> Self {
        self.dashed = Some(true);
        self
    }

    /// Set the label font.
    pub fn font(mut self, font: Font) -> Self {
        self.font = Some(font);
        self
    }
}

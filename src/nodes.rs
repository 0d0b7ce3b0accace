use std::fmt;

use serde::Deserialize;
use serde_json::{Map, Value};

/// One node of a Figma document tree, reduced to the fields the exporter reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "RawNode")]
pub struct Node {
    pub name: String,
    pub visible: bool,
    pub kind: NodeKind,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    /// FRAME or SECTION: contributes its name to the nesting path.
    Container { children: Vec<Node> },
    Instance {
        properties: Vec<ComponentProperty>,
        children: Vec<Node>,
    },
    Text {
        characters: String,
        /// `componentPropertyReferences.characters`, when the layer is bound to a property.
        bound_property: Option<String>,
    },
    Other { children: Vec<Node> },
}

/// A component property in document order, e.g. `"🟣 ID#123:0" => "Q1"`.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentProperty {
    pub key: String,
    pub value: PropertyValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Flag(bool),
    Text(String),
    Other(Value),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Flag(b) => write!(f, "{}", b),
            PropertyValue::Text(s) => f.write_str(s),
            PropertyValue::Other(Value::Null) => Ok(()),
            PropertyValue::Other(v) => write!(f, "{}", v),
        }
    }
}

impl Node {
    pub fn children(&self) -> &[Node] {
        match &self.kind {
            NodeKind::Container { children }
            | NodeKind::Instance { children, .. }
            | NodeKind::Other { children } => children,
            NodeKind::Text { .. } => &[],
        }
    }

    pub fn properties(&self) -> &[ComponentProperty] {
        match &self.kind {
            NodeKind::Instance { properties, .. } => properties,
            _ => &[],
        }
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container { .. })
    }

    pub fn is_instance(&self) -> bool {
        matches!(self.kind, NodeKind::Instance { .. })
    }
}

/// Wire shape of a node. Every field is optional; `Node` is built from it.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNode {
    #[serde(rename = "type", default)]
    node_type: String,
    #[serde(default)]
    name: String,
    visible: Option<bool>,
    #[serde(default)]
    children: Vec<Node>,
    characters: Option<String>,
    component_properties: Option<Map<String, Value>>,
    component_property_references: Option<Map<String, Value>>,
}

impl From<RawNode> for Node {
    fn from(raw: RawNode) -> Self {
        let kind = match raw.node_type.as_str() {
            "FRAME" | "SECTION" => NodeKind::Container {
                children: raw.children,
            },
            "INSTANCE" => NodeKind::Instance {
                properties: raw
                    .component_properties
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(key, wrapper)| ComponentProperty {
                        key,
                        value: property_value(wrapper),
                    })
                    .collect(),
                children: raw.children,
            },
            "TEXT" => NodeKind::Text {
                characters: raw.characters.unwrap_or_default(),
                bound_property: raw
                    .component_property_references
                    .as_ref()
                    .and_then(|refs| refs.get("characters"))
                    .and_then(|v| v.as_str())
                    .map(str::to_string),
            },
            _ => NodeKind::Other {
                children: raw.children,
            },
        };

        Node {
            name: raw.name,
            // absent means visible
            visible: raw.visible.unwrap_or(true),
            kind,
        }
    }
}

/// Unwrap `{ "type": "TEXT", "value": ... }` into its value.
fn property_value(wrapper: Value) -> PropertyValue {
    let value = match wrapper {
        Value::Object(mut obj) => obj.remove("value").unwrap_or(Value::Null),
        other => other,
    };
    match value {
        Value::Bool(b) => PropertyValue::Flag(b),
        Value::String(s) => PropertyValue::Text(s),
        other => PropertyValue::Other(other),
    }
}

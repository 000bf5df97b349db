//! Node representation in the property graph

use crate::normalize::categorical;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

categorical! {
    /// Node labels; `Entity` is the base label of every customer node
    NodeLabel ("node_label") {
        Entity => "Entity",
        Company => "Company",
        Person => "Person",
        Address => "Address",
        Filing => "Filing",
        Event => "Event",
    }
    aliases {
        "ENTITY" => Entity,
        "COMPANY" => Company,
        "PERSON" => Person,
        "ADDRESS" => Address,
        "FILING" => Filing,
        "EVENT" => Event,
    }
}

/// Typed property values
///
/// The graph holds scalars only. Arrays and objects are stored as their JSON
/// text (see [`PropertyValue::from_json`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl PropertyValue {
    /// Convert a JSON value; `None` for null
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(PropertyValue::Bool(*b)),
            Value::Number(n) => Some(match n.as_i64() {
                Some(i) => PropertyValue::Int(i),
                None => PropertyValue::Float(n.as_f64().unwrap_or_default()),
            }),
            Value::String(s) => Some(PropertyValue::String(s.clone())),
            nested @ (Value::Array(_) | Value::Object(_)) => {
                Some(PropertyValue::String(nested.to_string()))
            }
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(i) => Some(*i as f64),
            PropertyValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(s: &str) -> Self {
        PropertyValue::String(s.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(s: String) -> Self {
        PropertyValue::String(s)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<f64> for PropertyValue {
    fn from(f: f64) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<i64> for PropertyValue {
    fn from(i: i64) -> Self {
        PropertyValue::Int(i)
    }
}

/// Properties collection
pub type Properties = BTreeMap<String, PropertyValue>;

/// A node in the graph, keyed by a stable identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub labels: BTreeSet<NodeLabel>,
    pub properties: Properties,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, label: NodeLabel) -> Self {
        Self {
            id: id.into(),
            labels: BTreeSet::from([label]),
            properties: Properties::new(),
        }
    }

    /// Add a secondary label
    pub fn with_label(mut self, label: NodeLabel) -> Self {
        self.labels.insert(label);
        self
    }

    /// Add a property to the node
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Add a property when a value is present
    pub fn with_optional(self, key: &str, value: Option<impl Into<PropertyValue>>) -> Self {
        match value {
            Some(value) => self.with_property(key, value),
            None => self,
        }
    }

    pub fn has_label(&self, label: NodeLabel) -> bool {
        self.labels.contains(&label)
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn name(&self) -> Option<&str> {
        self.property("name").and_then(PropertyValue::as_str)
    }

    /// Merge another version of this node: labels union, properties overwrite
    pub fn merge(&mut self, other: GraphNode) {
        self.labels.extend(other.labels);
        self.properties.extend(other.properties);
    }
}

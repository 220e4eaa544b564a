//! Value: runtime data flowing along connections and stored in node parameters.
//! All numeric types use f32.

use hashbrown::HashMap;
use serde::{Deserialize, Serialize};

/// Coarse kind of a [`Value`], used for quick dispatch and error messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ValueKind {
    Float,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Color,
    Text,
    File,
    List,
    Record,
}

impl ValueKind {
    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Float => "float",
            ValueKind::Bool => "bool",
            ValueKind::Vec2 => "vec2",
            ValueKind::Vec3 => "vec3",
            ValueKind::Vec4 => "vec4",
            ValueKind::Color => "color",
            ValueKind::Text => "text",
            ValueKind::File => "file",
            ValueKind::List => "list",
            ValueKind::Record => "record",
        }
    }
}

impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum Value {
    /// Scalar float
    Float(f32),

    /// Boolean
    Bool(bool),

    /// 2D vector
    Vec2([f32; 2]),

    /// 3D vector
    Vec3([f32; 3]),

    /// 4D vector
    Vec4([f32; 4]),

    /// RGBA color (linear by convention)
    Color([f32; 4]),

    /// Text / string, also used for enum selections
    Text(String),

    /// Path to an external resource
    File(String),

    /// Ordered collection, produced for multi-input handles
    List(Vec<Value>),

    /// Named fields; geometry and light descriptors are records
    Record(HashMap<String, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Float(0.0)
    }
}

impl Value {
    /// Return the coarse kind of this value.
    #[inline]
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Bool(_) => ValueKind::Bool,
            Value::Vec2(_) => ValueKind::Vec2,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Vec4(_) => ValueKind::Vec4,
            Value::Color(_) => ValueKind::Color,
            Value::Text(_) => ValueKind::Text,
            Value::File(_) => ValueKind::File,
            Value::List(_) => ValueKind::List,
            Value::Record(_) => ValueKind::Record,
        }
    }

    /// Convenience constructors
    pub fn f(v: f32) -> Self {
        Value::Float(v)
    }

    pub fn vec3(x: f32, y: f32, z: f32) -> Self {
        Value::Vec3([x, y, z])
    }

    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Build a record from `(name, value)` pairs.
    pub fn record(pairs: impl IntoIterator<Item = (impl Into<String>, Value)>) -> Self {
        Value::Record(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Numeric components for vector-like values, `None` for everything else.
    pub fn components(&self) -> Option<&[f32]> {
        match self {
            Value::Float(f) => Some(std::slice::from_ref(f)),
            Value::Vec2(a) => Some(&a[..]),
            Value::Vec3(a) => Some(&a[..]),
            Value::Vec4(a) | Value::Color(a) => Some(&a[..]),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::File(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Field lookup on record values.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record(map) => map.get(name),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_uses_tagged_lowercase_form() {
        let json = serde_json::to_value(Value::vec3(1.0, 2.0, 3.0)).unwrap();
        assert_eq!(json["type"], "vec3");
        assert_eq!(json["data"][2], 3.0);

        let parsed: Value =
            serde_json::from_value(serde_json::json!({ "type": "color", "data": [1, 0, 0, 1] }))
                .unwrap();
        assert_eq!(parsed, Value::Color([1.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn components_cover_numeric_kinds_only() {
        assert_eq!(Value::f(2.0).components(), Some(&[2.0][..]));
        assert_eq!(Value::Vec2([1.0, 2.0]).components().map(|c| c.len()), Some(2));
        assert!(Value::text("box").components().is_none());
    }

    #[test]
    fn record_field_lookup() {
        let rec = Value::record([("primitive", Value::text("box")), ("size", Value::f(1.0))]);
        assert_eq!(rec.field("primitive").and_then(Value::as_str), Some("box"));
        assert!(rec.field("missing").is_none());
        assert_eq!(rec.kind(), ValueKind::Record);
    }
}

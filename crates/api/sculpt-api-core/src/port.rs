//! Declared value types for node input and output handles.

use serde::{Deserialize, Serialize};

use crate::value::{Value, ValueKind};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PortType {
    Float,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Color,
    Text,
    Geometry,
    Light,
    Any,
}

impl PortType {
    /// Whether an output of type `output` may feed an input of type `self`.
    ///
    /// `Any` on either side matches everything; a float output may also feed a vector
    /// input, which broadcasts the scalar across components.
    pub fn accepts(self, output: PortType) -> bool {
        if self == output || self == PortType::Any || output == PortType::Any {
            return true;
        }
        matches!(
            (output, self),
            (PortType::Float, PortType::Vec2 | PortType::Vec3 | PortType::Vec4)
        )
    }

    /// Whether a concrete runtime value conforms to this port type.
    pub fn admits(self, value: &Value) -> bool {
        match self {
            PortType::Any => true,
            PortType::Float => value.kind() == ValueKind::Float,
            PortType::Bool => value.kind() == ValueKind::Bool,
            PortType::Vec2 => matches!(value.kind(), ValueKind::Vec2 | ValueKind::Float),
            PortType::Vec3 => matches!(value.kind(), ValueKind::Vec3 | ValueKind::Float),
            PortType::Vec4 => matches!(value.kind(), ValueKind::Vec4 | ValueKind::Float),
            PortType::Color => value.kind() == ValueKind::Color,
            PortType::Text => matches!(value.kind(), ValueKind::Text | ValueKind::File),
            PortType::Geometry => value
                .field("primitive")
                .is_some_and(|p| p.kind() == ValueKind::Text),
            PortType::Light => value
                .field("light")
                .is_some_and(|p| p.kind() == ValueKind::Text),
        }
    }
}

impl std::fmt::Display for PortType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PortType::Float => "float",
            PortType::Bool => "bool",
            PortType::Vec2 => "vec2",
            PortType::Vec3 => "vec3",
            PortType::Vec4 => "vec4",
            PortType::Color => "color",
            PortType::Text => "text",
            PortType::Geometry => "geometry",
            PortType::Light => "light",
            PortType::Any => "any",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_matches_both_directions() {
        assert!(PortType::Any.accepts(PortType::Geometry));
        assert!(PortType::Light.accepts(PortType::Any));
    }

    #[test]
    fn scalar_broadcasts_into_vectors_only() {
        assert!(PortType::Vec3.accepts(PortType::Float));
        assert!(!PortType::Float.accepts(PortType::Vec3));
        assert!(!PortType::Geometry.accepts(PortType::Light));
    }

    #[test]
    fn geometry_admits_descriptor_records() {
        let mesh = Value::record([("primitive", Value::text("box"))]);
        assert!(PortType::Geometry.admits(&mesh));
        assert!(!PortType::Geometry.admits(&Value::f(1.0)));
    }
}

//! Parameter metadata: typed, constrained descriptions of node parameters.
//!
//! A [`ParamMeta`] both drives the property editor (defaults, ranges, option lists) and
//! validates user-supplied values. Validation never clamps: an out-of-range value is
//! rejected with a descriptive [`ParamError`] so the caller can keep the field in an
//! editing state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{Value, ValueKind};

const VECTOR_COMPONENTS: [&str; 4] = ["x", "y", "z", "w"];
const COLOR_COMPONENTS: [&str; 4] = ["r", "g", "b", "a"];

/// Reasons a value fails validation against its [`ParamMeta`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParamError {
    #[error("expected a {expected} value, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: ValueKind,
    },
    #[error("value {value} is not a finite number")]
    NotFinite { value: f32 },
    #[error("value {value} is below the minimum {min}")]
    BelowMinimum { value: f32, min: f32 },
    #[error("value {value} is above the maximum {max}")]
    AboveMaximum { value: f32, max: f32 },
    #[error("expected {expected} components, found {found}")]
    WrongDimension { expected: usize, found: usize },
    #[error("component '{component}' is invalid: {source}")]
    ComponentOutOfRange {
        component: &'static str,
        source: Box<ParamError>,
    },
    #[error("'{value}' is not one of {options:?}")]
    NotInEnum { value: String, options: Vec<String> },
    #[error("'{path}' does not have one of the extensions {allowed:?}")]
    DisallowedExtension { path: String, allowed: Vec<String> },
    #[error("no such parameter in the node's schema")]
    UnknownParameter,
}

/// Schema entry for a single parameter, tagged by parameter kind.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ParamMeta {
    Number {
        default: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<f32>,
    },
    Vector {
        /// Component count, 2..=4.
        dims: usize,
        default: Vec<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<f32>,
    },
    Boolean {
        default: bool,
    },
    Enum {
        options: Vec<String>,
        default: String,
    },
    Color {
        default: [f32; 4],
    },
    String {
        #[serde(default)]
        default: String,
    },
    File {
        #[serde(default)]
        default: String,
        /// Accepted extensions without the dot; empty accepts anything.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        extensions: Vec<String>,
    },
}

impl ParamMeta {
    pub fn number(default: f32) -> Self {
        ParamMeta::Number {
            default,
            min: None,
            max: None,
            step: None,
        }
    }

    pub fn number_in(default: f32, min: f32, max: f32) -> Self {
        ParamMeta::Number {
            default,
            min: Some(min),
            max: Some(max),
            step: None,
        }
    }

    pub fn vector(default: &[f32]) -> Self {
        ParamMeta::Vector {
            dims: default.len(),
            default: default.to_vec(),
            min: None,
            max: None,
            step: None,
        }
    }

    pub fn enumeration(options: &[&str], default: &str) -> Self {
        ParamMeta::Enum {
            options: options.iter().map(|s| s.to_string()).collect(),
            default: default.to_string(),
        }
    }

    /// Short name of the parameter kind, as used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            ParamMeta::Number { .. } => "number",
            ParamMeta::Vector { .. } => "vector",
            ParamMeta::Boolean { .. } => "boolean",
            ParamMeta::Enum { .. } => "enum",
            ParamMeta::Color { .. } => "color",
            ParamMeta::String { .. } => "string",
            ParamMeta::File { .. } => "file",
        }
    }

    /// The value a freshly created node starts with.
    pub fn default_value(&self) -> Value {
        match self {
            ParamMeta::Number { default, .. } => Value::Float(*default),
            ParamMeta::Vector { dims, default, .. } => vector_value(*dims, default),
            ParamMeta::Boolean { default } => Value::Bool(*default),
            ParamMeta::Enum { default, .. } => Value::Text(default.clone()),
            ParamMeta::Color { default } => Value::Color(*default),
            ParamMeta::String { default } => Value::Text(default.clone()),
            ParamMeta::File { default, .. } => Value::File(default.clone()),
        }
    }

    /// Check `value` against this schema entry. No side effects.
    pub fn validate(&self, value: &Value) -> Result<(), ParamError> {
        match self {
            ParamMeta::Number { min, max, .. } => {
                let Value::Float(f) = value else {
                    return Err(self.mismatch(value));
                };
                check_bounds(*f, *min, *max)
            }
            ParamMeta::Vector { dims, min, max, .. } => {
                let components = match value {
                    Value::Vec2(_) | Value::Vec3(_) | Value::Vec4(_) => {
                        value.components().unwrap_or_default()
                    }
                    _ => return Err(self.mismatch(value)),
                };
                if components.len() != *dims {
                    return Err(ParamError::WrongDimension {
                        expected: *dims,
                        found: components.len(),
                    });
                }
                check_components(components, &VECTOR_COMPONENTS, *min, *max)
            }
            ParamMeta::Boolean { .. } => match value {
                Value::Bool(_) => Ok(()),
                _ => Err(self.mismatch(value)),
            },
            ParamMeta::Enum { options, .. } => {
                let Value::Text(choice) = value else {
                    return Err(self.mismatch(value));
                };
                if options.iter().any(|o| o == choice) {
                    Ok(())
                } else {
                    Err(ParamError::NotInEnum {
                        value: choice.clone(),
                        options: options.clone(),
                    })
                }
            }
            ParamMeta::Color { .. } => {
                let Value::Color(rgba) = value else {
                    return Err(self.mismatch(value));
                };
                check_components(rgba, &COLOR_COMPONENTS, Some(0.0), Some(1.0))
            }
            ParamMeta::String { .. } => match value {
                Value::Text(_) => Ok(()),
                _ => Err(self.mismatch(value)),
            },
            ParamMeta::File { extensions, .. } => {
                let path = match value {
                    Value::File(p) | Value::Text(p) => p,
                    _ => return Err(self.mismatch(value)),
                };
                if path.is_empty() || extensions.is_empty() {
                    return Ok(());
                }
                let ext = std::path::Path::new(path)
                    .extension()
                    .and_then(|e| e.to_str())
                    .unwrap_or_default();
                if extensions.iter().any(|allowed| allowed.eq_ignore_ascii_case(ext)) {
                    Ok(())
                } else {
                    Err(ParamError::DisallowedExtension {
                        path: path.clone(),
                        allowed: extensions.clone(),
                    })
                }
            }
        }
    }

    fn mismatch(&self, value: &Value) -> ParamError {
        ParamError::TypeMismatch {
            expected: self.kind_name(),
            found: value.kind(),
        }
    }
}

/// Free-function form of [`ParamMeta::validate`].
pub fn validate(value: &Value, meta: &ParamMeta) -> Result<(), ParamError> {
    meta.validate(value)
}

fn check_bounds(value: f32, min: Option<f32>, max: Option<f32>) -> Result<(), ParamError> {
    if !value.is_finite() {
        return Err(ParamError::NotFinite { value });
    }
    if let Some(min) = min {
        if value < min {
            return Err(ParamError::BelowMinimum { value, min });
        }
    }
    if let Some(max) = max {
        if value > max {
            return Err(ParamError::AboveMaximum { value, max });
        }
    }
    Ok(())
}

fn check_components(
    components: &[f32],
    names: &[&'static str; 4],
    min: Option<f32>,
    max: Option<f32>,
) -> Result<(), ParamError> {
    for (value, component) in components.iter().zip(names.iter()) {
        check_bounds(*value, min, max).map_err(|err| ParamError::ComponentOutOfRange {
            component: *component,
            source: Box::new(err),
        })?;
    }
    Ok(())
}

fn vector_value(dims: usize, data: &[f32]) -> Value {
    let at = |i: usize| data.get(i).copied().unwrap_or(0.0);
    match dims {
        2 => Value::Vec2([at(0), at(1)]),
        4 => Value::Vec4([at(0), at(1), at(2), at(3)]),
        _ => Value::Vec3([at(0), at(1), at(2)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_rejects_out_of_range_without_clamping() {
        let meta = ParamMeta::number_in(1.0, 0.0, 10.0);
        assert_eq!(meta.validate(&Value::f(5.0)), Ok(()));
        assert_eq!(
            meta.validate(&Value::f(11.0)),
            Err(ParamError::AboveMaximum {
                value: 11.0,
                max: 10.0
            })
        );
        assert_eq!(
            meta.validate(&Value::f(-0.5)),
            Err(ParamError::BelowMinimum {
                value: -0.5,
                min: 0.0
            })
        );
        assert!(matches!(
            meta.validate(&Value::f(f32::NAN)),
            Err(ParamError::NotFinite { .. })
        ));
    }

    #[test]
    fn number_rejects_wrong_kind() {
        let meta = ParamMeta::number(0.0);
        let err = meta.validate(&Value::Bool(true)).unwrap_err();
        assert_eq!(
            err,
            ParamError::TypeMismatch {
                expected: "number",
                found: ValueKind::Bool
            }
        );
        assert_eq!(err.to_string(), "expected a number value, found bool");
    }

    #[test]
    fn vector_reports_failing_component() {
        let meta = ParamMeta::Vector {
            dims: 3,
            default: vec![1.0, 1.0, 1.0],
            min: Some(0.0),
            max: Some(5.0),
            step: None,
        };
        assert_eq!(meta.validate(&Value::vec3(1.0, 2.0, 3.0)), Ok(()));
        let err = meta.validate(&Value::vec3(1.0, 9.0, 3.0)).unwrap_err();
        match &err {
            ParamError::ComponentOutOfRange { component, source } => {
                assert_eq!(*component, "y");
                assert!(matches!(**source, ParamError::AboveMaximum { .. }));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(err.to_string().contains("'y'"));
    }

    #[test]
    fn vector_checks_dimension() {
        let meta = ParamMeta::vector(&[0.0, 0.0]);
        assert_eq!(
            meta.validate(&Value::vec3(0.0, 0.0, 0.0)),
            Err(ParamError::WrongDimension {
                expected: 2,
                found: 3
            })
        );
        assert_eq!(meta.default_value(), Value::Vec2([0.0, 0.0]));
    }

    #[test]
    fn enum_checks_membership() {
        let meta = ParamMeta::enumeration(&["union", "difference"], "union");
        assert_eq!(meta.validate(&Value::text("difference")), Ok(()));
        assert!(matches!(
            meta.validate(&Value::text("xor")),
            Err(ParamError::NotInEnum { .. })
        ));
        assert_eq!(meta.default_value(), Value::text("union"));
    }

    #[test]
    fn color_components_are_unit_range() {
        let meta = ParamMeta::Color {
            default: [1.0, 1.0, 1.0, 1.0],
        };
        let err = meta
            .validate(&Value::Color([0.5, 0.5, 1.5, 1.0]))
            .unwrap_err();
        assert!(matches!(
            err,
            ParamError::ComponentOutOfRange { component: "b", .. }
        ));
    }

    #[test]
    fn file_extension_filter() {
        let meta = ParamMeta::File {
            default: String::new(),
            extensions: vec!["obj".into(), "gltf".into()],
        };
        assert_eq!(meta.validate(&Value::File("mesh.OBJ".into())), Ok(()));
        assert_eq!(meta.validate(&Value::File(String::new())), Ok(()));
        assert!(matches!(
            meta.validate(&Value::File("mesh.png".into())),
            Err(ParamError::DisallowedExtension { .. })
        ));
    }

    #[test]
    fn metadata_deserializes_from_tagged_json() {
        let meta: ParamMeta = serde_json::from_value(serde_json::json!({
            "kind": "number", "default": 1.0, "min": 0.0
        }))
        .unwrap();
        assert_eq!(
            meta,
            ParamMeta::Number {
                default: 1.0,
                min: Some(0.0),
                max: None,
                step: None
            }
        );
    }
}

//! Built-in node library.
//!
//! Geometry and light nodes emit opaque descriptor records (`primitive` / `light` tagged)
//! for the rendering collaborator; no geometry is evaluated here.

use sculpt_api_core::{coercion, ParamMeta, PortType, Value};
use serde::{Deserialize, Serialize};

use crate::compute::{keyed_output, ComputeError, NodeInputs};
use crate::registry::{NodeBehavior, NodeTypeDefinition, PortSpec};
use crate::types::{NodeParams, OutputMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Builtin {
    // Scalars / arithmetic
    Constant,
    Add,
    Multiply,
    Double,
    AddOne,
    Sum,
    Vec3,

    // Geometry
    Box,
    Sphere,
    Import,
    Translate,
    Boolean,

    // Lights
    PointLight,

    // Sinks
    Output,
}

fn p_out(ty: PortType) -> PortSpec {
    PortSpec::new("out", ty)
}

fn def(name: &str, category: &str, op: Builtin) -> NodeTypeDefinition {
    NodeTypeDefinition::with_behavior(name, category, NodeBehavior::Builtin(op))
}

/// Every built-in definition, including the `group` container type.
pub fn definitions() -> Vec<NodeTypeDefinition> {
    use Builtin::*;
    let mut defs = Vec::new();

    defs.push(
        def("constant", "Math", Constant)
            .output(p_out(PortType::Float))
            .param("value", "value", ParamMeta::number(0.0)),
    );
    defs.push(
        def("add", "Math", Add)
            .input(PortSpec::new("a", PortType::Float).optional())
            .input(PortSpec::new("b", PortType::Float).optional())
            .output(p_out(PortType::Float)),
    );
    defs.push(
        def("multiply", "Math", Multiply)
            .input(PortSpec::new("a", PortType::Float))
            .input(PortSpec::new("b", PortType::Float))
            .output(p_out(PortType::Float)),
    );
    defs.push(
        def("double", "Math", Double)
            .input(PortSpec::new("in", PortType::Float))
            .output(p_out(PortType::Float)),
    );
    defs.push(
        def("add_one", "Math", AddOne)
            .input(PortSpec::new("in", PortType::Float))
            .output(p_out(PortType::Float)),
    );
    defs.push(
        def("sum", "Math", Sum)
            .input(PortSpec::new("values", PortType::Float).multi().optional())
            .output(p_out(PortType::Float)),
    );
    defs.push(
        def("vec3", "Math", Vec3)
            .input(PortSpec::new("x", PortType::Float).optional())
            .input(PortSpec::new("y", PortType::Float).optional())
            .input(PortSpec::new("z", PortType::Float).optional())
            .output(p_out(PortType::Vec3)),
    );

    defs.push(
        def("box", "Geometry", Box)
            .output(p_out(PortType::Geometry))
            .param("geometry", "width", ParamMeta::number_in(1.0, 0.0, 1000.0))
            .param("geometry", "height", ParamMeta::number_in(1.0, 0.0, 1000.0))
            .param("geometry", "depth", ParamMeta::number_in(1.0, 0.0, 1000.0)),
    );
    defs.push(
        def("sphere", "Geometry", Sphere)
            .output(p_out(PortType::Geometry))
            .param("geometry", "radius", ParamMeta::number_in(0.5, 0.0, 1000.0))
            .param(
                "geometry",
                "segments",
                ParamMeta::Number {
                    default: 32.0,
                    min: Some(3.0),
                    max: Some(256.0),
                    step: Some(1.0),
                },
            ),
    );
    defs.push(
        def("import", "Geometry", Import)
            .output(p_out(PortType::Geometry))
            .param(
                "source",
                "path",
                ParamMeta::File {
                    default: String::new(),
                    extensions: vec!["obj".into(), "gltf".into(), "glb".into(), "stl".into()],
                },
            ),
    );
    defs.push(
        def("translate", "Transform", Translate)
            .input(PortSpec::new("geometry", PortType::Geometry))
            .input(PortSpec::new("offset", PortType::Vec3).optional())
            .output(p_out(PortType::Geometry))
            .param("transform", "offset", ParamMeta::vector(&[0.0, 0.0, 0.0])),
    );
    defs.push(
        def("boolean", "Geometry", Boolean)
            .input(PortSpec::new("shapes", PortType::Geometry).multi())
            .output(p_out(PortType::Geometry))
            .param(
                "boolean",
                "operation",
                ParamMeta::enumeration(&["union", "difference", "intersection"], "union"),
            ),
    );

    defs.push(
        def("point_light", "Light", PointLight)
            .output(p_out(PortType::Light))
            .param(
                "light",
                "color",
                ParamMeta::Color {
                    default: [1.0, 1.0, 1.0, 1.0],
                },
            )
            .param("light", "intensity", ParamMeta::number_in(1.0, 0.0, 100.0))
            .param("light", "cast_shadows", ParamMeta::Boolean { default: true })
            .param("transform", "position", ParamMeta::vector(&[0.0, 5.0, 0.0])),
    );

    defs.push(
        def("output", "Flow", Output)
            .input(PortSpec::new("in", PortType::Any))
            .output(p_out(PortType::Any)),
    );
    defs.push(
        NodeTypeDefinition::with_behavior("group", "Flow", NodeBehavior::Container)
            .output(p_out(PortType::Any))
            .param("display", "label", ParamMeta::String {
                default: "Group".into(),
            }),
    );

    defs
}

fn float_in(inputs: &NodeInputs, key: &str, fallback: f32) -> f32 {
    inputs.get(key).map(coercion::to_float).unwrap_or(fallback)
}

fn require_float(inputs: &NodeInputs, key: &str) -> Result<f32, ComputeError> {
    inputs.require(key).map(coercion::to_float)
}

fn geometry(primitive: &str, fields: Vec<(&str, Value)>) -> Value {
    let mut pairs = vec![("primitive", Value::text(primitive))];
    pairs.extend(fields);
    Value::record(pairs)
}

/// Evaluate built-in `op`.
pub fn compute(
    op: Builtin,
    inputs: &NodeInputs,
    params: &NodeParams,
) -> Result<OutputMap, ComputeError> {
    let out = match op {
        Builtin::Constant => Value::f(params.float("value", "value")?),
        Builtin::Add => Value::f(float_in(inputs, "a", 0.0) + float_in(inputs, "b", 0.0)),
        Builtin::Multiply => Value::f(require_float(inputs, "a")? * require_float(inputs, "b")?),
        Builtin::Double => Value::f(require_float(inputs, "in")? * 2.0),
        Builtin::AddOne => Value::f(require_float(inputs, "in")? + 1.0),
        Builtin::Sum => Value::f(inputs.all("values").iter().map(coercion::to_float).sum()),
        Builtin::Vec3 => Value::Vec3([
            float_in(inputs, "x", 0.0),
            float_in(inputs, "y", 0.0),
            float_in(inputs, "z", 0.0),
        ]),

        Builtin::Box => {
            let size = [
                params.float("geometry", "width")?,
                params.float("geometry", "height")?,
                params.float("geometry", "depth")?,
            ];
            geometry("box", vec![("size", Value::Vec3(size))])
        }
        Builtin::Sphere => geometry(
            "sphere",
            vec![
                ("radius", Value::f(params.float("geometry", "radius")?)),
                (
                    "segments",
                    Value::f(params.float("geometry", "segments")?.round()),
                ),
            ],
        ),
        Builtin::Import => {
            let path = params.text("source", "path")?;
            if path.is_empty() {
                return Err(ComputeError::msg("no file selected"));
            }
            geometry("import", vec![("path", Value::File(path.to_string()))])
        }
        Builtin::Translate => {
            let source = inputs.require("geometry")?;
            if !PortType::Geometry.admits(source) {
                return Err(ComputeError::InvalidInput {
                    handle: "geometry".into(),
                    reason: format!("expected geometry, found {}", source.kind()),
                });
            }
            let offset = match inputs.get("offset") {
                Some(v) => coercion::to_vec3(v),
                None => params.vec3("transform", "offset")?,
            };
            geometry(
                "transform",
                vec![("source", source.clone()), ("offset", Value::Vec3(offset))],
            )
        }
        Builtin::Boolean => {
            let operands = inputs.all("shapes");
            if operands.is_empty() {
                return Err(ComputeError::msg("boolean needs at least one operand"));
            }
            let operation = params.text("boolean", "operation")?;
            geometry(
                "boolean",
                vec![
                    ("operation", Value::text(operation)),
                    ("operands", Value::List(operands.to_vec())),
                ],
            )
        }

        Builtin::PointLight => Value::record([
            ("light", Value::text("point")),
            ("color", params.require("light", "color")?.clone()),
            ("intensity", Value::f(params.float("light", "intensity")?)),
            (
                "cast_shadows",
                Value::Bool(coercion::to_bool(params.require("light", "cast_shadows")?)),
            ),
            (
                "position",
                Value::Vec3(params.vec3("transform", "position")?),
            ),
        ]),

        Builtin::Output => inputs.require("in")?.clone(),
    };
    Ok(keyed_output("out", out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults(name: &str) -> NodeParams {
        definitions()
            .into_iter()
            .find(|d| d.name == name)
            .map(|d| d.default_params())
            .expect("builtin exists")
    }

    #[test]
    fn arithmetic_nodes() {
        let inputs = NodeInputs::new().with("in", Value::f(5.0));
        let out = compute(Builtin::Double, &inputs, &NodeParams::new()).unwrap();
        assert_eq!(out["out"], Value::f(10.0));
        let out = compute(Builtin::AddOne, &inputs, &NodeParams::new()).unwrap();
        assert_eq!(out["out"], Value::f(6.0));

        let sum_inputs = NodeInputs::new()
            .with("values", Value::f(1.0))
            .with("values", Value::f(2.5));
        let out = compute(Builtin::Sum, &sum_inputs, &NodeParams::new()).unwrap();
        assert_eq!(out["out"], Value::f(3.5));
    }

    #[test]
    fn missing_required_input_fails() {
        let err = compute(Builtin::Double, &NodeInputs::new(), &NodeParams::new()).unwrap_err();
        assert_eq!(err, ComputeError::MissingInput("in".into()));
    }

    #[test]
    fn box_descriptor_uses_params() {
        let params = defaults("box").with("geometry", "height", Value::f(3.0));
        let out = compute(Builtin::Box, &NodeInputs::new(), &params).unwrap();
        let desc = &out["out"];
        assert_eq!(desc.field("primitive"), Some(&Value::text("box")));
        assert_eq!(desc.field("size"), Some(&Value::vec3(1.0, 3.0, 1.0)));
        assert!(PortType::Geometry.admits(desc));
    }

    #[test]
    fn translate_prefers_connected_offset() {
        let source = compute(Builtin::Box, &NodeInputs::new(), &defaults("box")).unwrap()["out"].clone();
        let inputs = NodeInputs::new()
            .with("geometry", source.clone())
            .with("offset", Value::f(2.0));
        let out = compute(Builtin::Translate, &inputs, &defaults("translate")).unwrap();
        assert_eq!(out["out"].field("offset"), Some(&Value::vec3(2.0, 2.0, 2.0)));
        assert_eq!(out["out"].field("source"), Some(&source));
    }

    #[test]
    fn boolean_without_operands_fails() {
        let err = compute(Builtin::Boolean, &NodeInputs::new(), &defaults("boolean")).unwrap_err();
        assert_eq!(err.to_string(), "boolean needs at least one operand");
    }

    #[test]
    fn import_requires_a_path() {
        let err = compute(Builtin::Import, &NodeInputs::new(), &defaults("import")).unwrap_err();
        assert!(matches!(err, ComputeError::Failed(_)));
        let params = defaults("import").with("source", "path", Value::File("rock.obj".into()));
        let out = compute(Builtin::Import, &NodeInputs::new(), &params).unwrap();
        assert_eq!(out["out"].field("path"), Some(&Value::File("rock.obj".into())));
    }

    #[test]
    fn point_light_descriptor() {
        let out = compute(Builtin::PointLight, &NodeInputs::new(), &defaults("point_light")).unwrap();
        let light = &out["out"];
        assert!(PortType::Light.admits(light));
        assert_eq!(light.field("intensity"), Some(&Value::f(1.0)));
        assert_eq!(light.field("cast_shadows"), Some(&Value::Bool(true)));
    }

    #[test]
    fn translate_rejects_values_that_are_not_geometry() {
        let inputs = NodeInputs::new().with("geometry", Value::f(1.0));
        let err = compute(Builtin::Translate, &inputs, &defaults("translate")).unwrap_err();
        assert_eq!(
            err,
            ComputeError::InvalidInput {
                handle: "geometry".into(),
                reason: "expected geometry, found float".into(),
            }
        );
        let light = compute(Builtin::PointLight, &NodeInputs::new(), &defaults("point_light"))
            .unwrap()["out"]
            .clone();
        let inputs = NodeInputs::new().with("geometry", light);
        assert!(compute(Builtin::Translate, &inputs, &defaults("translate")).is_err());
    }
}

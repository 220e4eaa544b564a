//! Node type definitions and the registry that resolves them by name.

use std::sync::Arc;

use hashbrown::HashMap;
use indexmap::IndexMap;
use sculpt_api_core::{ParamMeta, PortType};
use serde::{Deserialize, Serialize};

use crate::builtins::{self, Builtin};
use crate::compute::{ComputeError, NodeInputs};
use crate::error::GraphError;
use crate::types::{NodeParams, OutputMap};

/// Parameter schema of a node type: category -> key -> metadata.
pub type ParamSchema = IndexMap<String, IndexMap<String, ParamMeta>>;

/// User-supplied compute function. Must be pure in its inputs and parameters.
pub type ComputeFn =
    Arc<dyn Fn(&NodeInputs, &NodeParams) -> Result<OutputMap, ComputeError> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortSpec {
    pub id: String,
    pub ty: PortType,
    /// Accepts any number of incoming connections.
    #[serde(default)]
    pub multi: bool,
    /// The node computes without this input connected.
    #[serde(default)]
    pub optional: bool,
}

impl PortSpec {
    pub fn new(id: &str, ty: PortType) -> Self {
        PortSpec {
            id: id.to_string(),
            ty,
            multi: false,
            optional: false,
        }
    }

    pub fn multi(mut self) -> Self {
        self.multi = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// How a node type produces its output.
#[derive(Clone)]
pub enum NodeBehavior {
    Builtin(Builtin),
    Custom(ComputeFn),
    /// Owns a nested sub-graph; its output is the sub-graph's active output node value.
    Container,
}

impl std::fmt::Debug for NodeBehavior {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeBehavior::Builtin(op) => f.debug_tuple("Builtin").field(op).finish(),
            NodeBehavior::Custom(_) => f.write_str("Custom(..)"),
            NodeBehavior::Container => f.write_str("Container"),
        }
    }
}

/// Immutable description of a node type, shared by every node instance of that type.
#[derive(Debug, Clone)]
pub struct NodeTypeDefinition {
    pub name: String,
    pub category: String,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub params: ParamSchema,
    pub behavior: NodeBehavior,
}

impl NodeTypeDefinition {
    /// Start a definition with a custom compute function.
    pub fn new<F>(name: &str, category: &str, compute: F) -> Self
    where
        F: Fn(&NodeInputs, &NodeParams) -> Result<OutputMap, ComputeError> + Send + Sync + 'static,
    {
        Self::with_behavior(name, category, NodeBehavior::Custom(Arc::new(compute)))
    }

    pub fn with_behavior(name: &str, category: &str, behavior: NodeBehavior) -> Self {
        NodeTypeDefinition {
            name: name.to_string(),
            category: category.to_string(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            params: ParamSchema::new(),
            behavior,
        }
    }

    pub fn input(mut self, port: PortSpec) -> Self {
        self.inputs.push(port);
        self
    }

    pub fn output(mut self, port: PortSpec) -> Self {
        self.outputs.push(port);
        self
    }

    pub fn param(mut self, category: &str, key: &str, meta: ParamMeta) -> Self {
        self.params
            .entry(category.to_string())
            .or_default()
            .insert(key.to_string(), meta);
        self
    }

    pub fn is_container(&self) -> bool {
        matches!(self.behavior, NodeBehavior::Container)
    }

    pub fn input_port(&self, id: &str) -> Option<&PortSpec> {
        self.inputs.iter().find(|p| p.id == id)
    }

    pub fn output_port(&self, id: &str) -> Option<&PortSpec> {
        self.outputs.iter().find(|p| p.id == id)
    }

    /// The first declared output; its value is what a SubFlow contributes when this node
    /// is the active output.
    pub fn primary_output(&self) -> Option<&PortSpec> {
        self.outputs.first()
    }

    pub fn param_meta(&self, category: &str, key: &str) -> Option<&ParamMeta> {
        self.params.get(category).and_then(|metas| metas.get(key))
    }

    /// Parameter values a new node of this type starts with.
    pub fn default_params(&self) -> NodeParams {
        let mut params = NodeParams::new();
        for (category, metas) in &self.params {
            for (key, meta) in metas {
                params.set(category, key, meta.default_value());
            }
        }
        params
    }

    /// Run the compute function. Containers have no compute function and yield an empty map.
    pub fn compute(
        &self,
        inputs: &NodeInputs,
        params: &NodeParams,
    ) -> Result<OutputMap, ComputeError> {
        match &self.behavior {
            NodeBehavior::Builtin(op) => builtins::compute(*op, inputs, params),
            NodeBehavior::Custom(f) => f(inputs, params),
            NodeBehavior::Container => Ok(OutputMap::new()),
        }
    }

    pub fn signature(&self) -> NodeSignature {
        NodeSignature {
            name: self.name.clone(),
            category: self.category.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            params: self.params.clone(),
            container: self.is_container(),
        }
    }
}

/// Serializable palette entry for a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSignature {
    pub name: String,
    pub category: String,
    pub inputs: Vec<PortSpec>,
    pub outputs: Vec<PortSpec>,
    pub params: ParamSchema,
    #[serde(default)]
    pub container: bool,
}

/// Palette metadata handed to the editor surface.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryExport {
    pub version: &'static str,
    pub nodes: Vec<NodeSignature>,
}

/// Maps node type names to their definitions.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    types: HashMap<String, Arc<NodeTypeDefinition>>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        NodeRegistry::default()
    }

    /// A registry holding the built-in node library.
    pub fn with_builtins() -> Self {
        let mut registry = NodeRegistry::new();
        for def in builtins::definitions() {
            registry.types.insert(def.name.clone(), Arc::new(def));
        }
        registry
    }

    /// Register `definition` under its name. Names are registered once.
    pub fn register(&mut self, definition: NodeTypeDefinition) -> Result<(), GraphError> {
        if self.types.contains_key(&definition.name) {
            return Err(GraphError::DuplicateNodeType(definition.name));
        }
        self.types
            .insert(definition.name.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, type_name: &str) -> Result<Arc<NodeTypeDefinition>, GraphError> {
        self.types
            .get(type_name)
            .cloned()
            .ok_or_else(|| GraphError::UnknownNodeType(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.types.contains_key(type_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Signatures of every registered type, sorted by name.
    pub fn signatures(&self) -> Vec<NodeSignature> {
        let mut out: Vec<NodeSignature> = self.types.values().map(|def| def.signature()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn export(&self) -> RegistryExport {
        RegistryExport {
            version: env!("CARGO_PKG_VERSION"),
            nodes: self.signatures(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::keyed_output;
    use sculpt_api_core::Value;

    fn negate() -> NodeTypeDefinition {
        NodeTypeDefinition::new("negate", "Math", |inputs, _| {
            let v = inputs.require("in")?.as_f32().unwrap_or_default();
            Ok(keyed_output("out", Value::f(-v)))
        })
        .input(PortSpec::new("in", PortType::Float))
        .output(PortSpec::new("out", PortType::Float))
    }

    #[test]
    fn register_then_get() {
        let mut registry = NodeRegistry::new();
        registry.register(negate()).unwrap();
        let def = registry.get("negate").unwrap();
        let out = def
            .compute(&NodeInputs::new().with("in", Value::f(2.0)), &NodeParams::new())
            .unwrap();
        assert_eq!(out.get("out"), Some(&Value::f(-2.0)));
    }

    #[test]
    fn unknown_and_duplicate_names_fail() {
        let mut registry = NodeRegistry::new();
        registry.register(negate()).unwrap();
        assert_eq!(
            registry.register(negate()),
            Err(GraphError::DuplicateNodeType("negate".into()))
        );
        assert!(matches!(
            registry.get("nope"),
            Err(GraphError::UnknownNodeType(name)) if name == "nope"
        ));
    }

    #[test]
    fn default_params_follow_schema() {
        let def = negate()
            .param("value", "scale", ParamMeta::number(2.0))
            .param("value", "mode", ParamMeta::enumeration(&["a", "b"], "b"));
        let params = def.default_params();
        assert_eq!(params.get("value", "scale"), Some(&Value::f(2.0)));
        assert_eq!(params.get("value", "mode"), Some(&Value::text("b")));
    }

    #[test]
    fn builtin_signatures_are_sorted_and_serializable() {
        let registry = NodeRegistry::with_builtins();
        let sigs = registry.signatures();
        assert!(sigs.windows(2).all(|w| w[0].name <= w[1].name));
        let group = sigs.iter().find(|s| s.name == "group").expect("group registered");
        assert!(group.container);
        let json = serde_json::to_value(registry.export()).unwrap();
        assert!(json["nodes"].as_array().is_some_and(|a| a.len() == sigs.len()));
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }
}

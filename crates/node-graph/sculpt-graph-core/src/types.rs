use hashbrown::HashMap;
use indexmap::IndexMap;
use sculpt_api_core::{coercion, Value};
use serde::{Deserialize, Serialize};

use crate::compute::ComputeError;

pub type NodeId = String;
pub type ConnectionId = String;

/// Output values of a node keyed by output handle.
pub type OutputMap = HashMap<String, Value>;

/// An isolated graph: the root graph, or the nested graph owned by a container node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "container")]
pub enum ScopeId {
    Root,
    SubFlow(NodeId),
}

impl ScopeId {
    pub fn subflow(container: impl Into<NodeId>) -> Self {
        ScopeId::SubFlow(container.into())
    }

    /// The container node owning this scope, `None` for the root.
    pub fn container(&self) -> Option<&NodeId> {
        match self {
            ScopeId::Root => None,
            ScopeId::SubFlow(id) => Some(id),
        }
    }
}

impl std::fmt::Display for ScopeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeId::Root => f.write_str("root"),
            ScopeId::SubFlow(id) => write!(f, "subflow({id})"),
        }
    }
}

/// A typed data link from one node's output handle to another node's input handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub source: NodeId,
    pub source_handle: String,
    pub target: NodeId,
    pub target_handle: String,
}

/// A proposed connection. Omitted handles resolve to the source's first output and the
/// target's first input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionRequest {
    pub source: NodeId,
    pub target: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

impl ConnectionRequest {
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        ConnectionRequest {
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
        }
    }

    pub fn with_source_handle(mut self, handle: impl Into<String>) -> Self {
        self.source_handle = Some(handle.into());
        self
    }

    pub fn with_target_handle(mut self, handle: impl Into<String>) -> Self {
        self.target_handle = Some(handle.into());
        self
    }
}

/// Current parameter values of a node: category -> key -> value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeParams(IndexMap<String, IndexMap<String, Value>>);

impl NodeParams {
    pub fn new() -> Self {
        NodeParams::default()
    }

    /// Builder-style insert, handy for partial updates.
    pub fn with(mut self, category: &str, key: &str, value: Value) -> Self {
        self.set(category, key, value);
        self
    }

    pub fn set(&mut self, category: &str, key: &str, value: Value) {
        self.0
            .entry(category.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    pub fn get(&self, category: &str, key: &str) -> Option<&Value> {
        self.0.get(category).and_then(|values| values.get(key))
    }

    /// Iterate `(category, key, value)` triples in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        self.0.iter().flat_map(|(category, values)| {
            values
                .iter()
                .map(move |(key, value)| (category.as_str(), key.as_str(), value))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|values| values.is_empty())
    }

    /// Overwrite the entries present in `updates`, leaving all others untouched.
    pub fn merge(&mut self, updates: &NodeParams) {
        for (category, key, value) in updates.iter() {
            self.set(category, key, value.clone());
        }
    }

    pub fn float(&self, category: &str, key: &str) -> Result<f32, ComputeError> {
        self.require(category, key).map(coercion::to_float)
    }

    pub fn vec3(&self, category: &str, key: &str) -> Result<[f32; 3], ComputeError> {
        self.require(category, key).map(coercion::to_vec3)
    }

    pub fn text(&self, category: &str, key: &str) -> Result<&str, ComputeError> {
        self.require(category, key)?
            .as_str()
            .ok_or_else(|| ComputeError::InvalidParameter(format!("{category}.{key}")))
    }

    pub fn require(&self, category: &str, key: &str) -> Result<&Value, ComputeError> {
        self.get(category, key)
            .ok_or_else(|| ComputeError::MissingParameter(format!("{category}.{key}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_touches_given_entries() {
        let mut params = NodeParams::new()
            .with("geometry", "width", Value::f(1.0))
            .with("geometry", "height", Value::f(2.0));
        params.merge(&NodeParams::new().with("geometry", "height", Value::f(5.0)));
        assert_eq!(params.get("geometry", "width"), Some(&Value::f(1.0)));
        assert_eq!(params.get("geometry", "height"), Some(&Value::f(5.0)));
    }

    #[test]
    fn typed_accessors_report_missing_entries() {
        let params = NodeParams::new().with("light", "kind", Value::text("point"));
        assert_eq!(params.text("light", "kind").unwrap(), "point");
        assert!(matches!(
            params.float("light", "intensity"),
            Err(ComputeError::MissingParameter(field)) if field == "light.intensity"
        ));
    }

    #[test]
    fn scope_display_and_serde() {
        let scope = ScopeId::subflow("group-1");
        assert_eq!(scope.to_string(), "subflow(group-1)");
        let json = serde_json::to_value(&scope).unwrap();
        assert_eq!(json["kind"], "subflow");
        assert_eq!(json["container"], "group-1");
        assert_eq!(ScopeId::Root.container(), None);
    }
}

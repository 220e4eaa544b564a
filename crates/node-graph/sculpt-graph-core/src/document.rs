//! JSON graph documents used to seed an engine.
//!
//! A document is applied through the same validating mutation calls an editor uses, so a
//! document can never produce a state the editor could not. Parameter values accept the
//! shorthand forms of [`sculpt_api_core::json::parse_value`].

use indexmap::IndexMap;
use log::debug;
use sculpt_api_core::json::parse_value;
use serde::{Deserialize, Serialize};

use crate::config::RecomputePolicy;
use crate::engine::GraphEngine;
use crate::error::GraphError;
use crate::types::{ConnectionRequest, NodeId, NodeParams, ScopeId};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    #[serde(default)]
    pub nodes: Vec<DocumentNode>,
    #[serde(default)]
    pub edges: Vec<ConnectionRequest>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentNode {
    /// Generated when omitted; edges can only reference nodes with an explicit id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default)]
    pub params: IndexMap<String, IndexMap<String, serde_json::Value>>,
    #[serde(default = "visible_default")]
    pub visible: bool,
    /// Contents of a container's SubFlow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subflow: Option<SubflowDocument>,
}

fn visible_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubflowDocument {
    #[serde(flatten)]
    pub graph: GraphDocument,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_output: Option<NodeId>,
}

impl GraphDocument {
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        serde_json::from_str(json).map_err(|e| GraphError::InvalidDocument(e.to_string()))
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self, GraphError> {
        serde_json::from_value(value).map_err(|e| GraphError::InvalidDocument(e.to_string()))
    }
}

fn parse_params(node: &DocumentNode) -> Result<NodeParams, GraphError> {
    let mut params = NodeParams::new();
    for (category, values) in &node.params {
        for (key, raw) in values {
            let value = parse_value(raw.clone()).map_err(|e| {
                GraphError::InvalidDocument(format!("parameter {category}.{key}: {e}"))
            })?;
            params.set(category, key, value);
        }
    }
    Ok(params)
}

impl GraphEngine {
    /// Build an engine with the built-in node library and load `document` into its root.
    pub fn from_document(document: &GraphDocument) -> Result<Self, GraphError> {
        let mut engine = GraphEngine::default();
        engine.load_document(document, &ScopeId::Root)?;
        Ok(engine)
    }

    /// Add the contents of `document` to `scope`. Either everything is applied or, on the
    /// first failure, nothing is. Returns the ids of the top-level nodes in document order.
    pub fn load_document(
        &mut self,
        document: &GraphDocument,
        scope: &ScopeId,
    ) -> Result<Vec<NodeId>, GraphError> {
        let backup = self.clone();
        let policy = std::mem::replace(&mut self.config.recompute, RecomputePolicy::Manual);
        let applied = self.apply_document(document, scope);
        self.config.recompute = policy;

        match applied {
            Ok(ids) => {
                debug!("loaded {} node(s) into {scope}", ids.len());
                self.settle(scope)?;
                Ok(ids)
            }
            Err(err) => {
                *self = backup;
                Err(err)
            }
        }
    }

    fn apply_document(
        &mut self,
        document: &GraphDocument,
        scope: &ScopeId,
    ) -> Result<Vec<NodeId>, GraphError> {
        let mut ids = Vec::with_capacity(document.nodes.len());
        for node in &document.nodes {
            let id = match &node.id {
                Some(id) => self.add_node_with_id(&node.node_type, scope, id.clone())?,
                None => self.add_node(&node.node_type, scope)?,
            };
            let params = parse_params(node)?;
            if !params.is_empty() {
                self.set_params(&id, &params, scope)?;
            }
            if !node.visible {
                self.set_visible(&id, false, scope)?;
            }
            if let Some(subflow) = &node.subflow {
                let inner = ScopeId::subflow(id.clone());
                self.require_scope(&inner)?;
                self.apply_document(&subflow.graph, &inner)?;
                if let Some(active) = &subflow.active_output {
                    self.set_active_output(&id, Some(active.as_str()))?;
                }
            }
            ids.push(id);
        }
        for edge in &document.edges {
            self.add_edge(edge, scope)?;
        }
        Ok(ids)
    }
}

//! Per-node runtime state.

use std::sync::Arc;

use sculpt_api_core::Value;
use serde::{Deserialize, Serialize};

use crate::error::NodeError;
use crate::registry::NodeTypeDefinition;
use crate::types::{NodeId, NodeParams, OutputMap};

/// One placed node. `output`, `error` and `dirty` are only written together, by the
/// recompute pass that resolves the node.
#[derive(Debug, Clone)]
pub struct NodeRuntime {
    pub id: NodeId,
    pub definition: Arc<NodeTypeDefinition>,
    pub params: NodeParams,
    /// Last successfully computed value; kept when a later recompute fails.
    pub output: Option<OutputMap>,
    /// Present iff the last recompute attempt failed.
    pub error: Option<NodeError>,
    /// `output` may be stale relative to current inputs and parameters.
    pub dirty: bool,
    /// Rendering hint only; never affects evaluation.
    pub visible: bool,
}

impl NodeRuntime {
    pub fn new(id: NodeId, definition: Arc<NodeTypeDefinition>) -> Self {
        let params = definition.default_params();
        NodeRuntime {
            id,
            definition,
            params,
            output: None,
            error: None,
            dirty: true,
            visible: true,
        }
    }

    pub fn type_name(&self) -> &str {
        &self.definition.name
    }

    /// Cached value of output handle `handle`.
    pub fn output_value(&self, handle: &str) -> Option<&Value> {
        self.output.as_ref().and_then(|out| out.get(handle))
    }

    /// Cached value of the first declared output handle.
    pub fn primary_output(&self) -> Option<&Value> {
        let port = self.definition.primary_output()?;
        self.output_value(&port.id)
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    pub(crate) fn resolve_ok(&mut self, output: Option<OutputMap>) {
        self.output = output;
        self.error = None;
        self.dirty = false;
    }

    pub(crate) fn resolve_err(&mut self, error: NodeError) {
        self.error = Some(error);
        self.dirty = false;
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id.clone(),
            node_type: self.definition.name.clone(),
            params: self.params.clone(),
            output: self.output.clone(),
            error: self.error.clone(),
            dirty: self.dirty,
            visible: self.visible,
        }
    }
}

/// Owned copy of a node's state handed to rendering and property-panel consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: String,
    pub params: NodeParams,
    pub output: Option<OutputMap>,
    pub error: Option<NodeError>,
    pub dirty: bool,
    pub visible: bool,
}

impl NodeSnapshot {
    pub fn output_value(&self, handle: &str) -> Option<&Value> {
        self.output.as_ref().and_then(|out| out.get(handle))
    }
}

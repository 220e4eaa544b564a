//! Error taxonomy of the graph engine.
//!
//! Structural errors ([`GraphError`], [`ConnectionRejection`]) are returned from mutation
//! calls and never enter graph state. Compute-time failures are contained in a node's
//! `error` field as a [`NodeError`] and never escape a recompute pass.

use sculpt_api_core::{ParamError, PortType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{NodeId, ScopeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleDirection {
    Input,
    Output,
}

impl std::fmt::Display for HandleDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandleDirection::Input => f.write_str("input"),
            HandleDirection::Output => f.write_str("output"),
        }
    }
}

/// Why a proposed connection was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ConnectionRejection {
    #[error("endpoint node '{0}' does not exist")]
    EndpointMissing(NodeId),
    #[error("endpoints belong to different scopes")]
    CrossScope,
    #[error("a node cannot connect to itself")]
    SelfLoop,
    #[error("node '{node}' has no {direction} handle '{handle}'")]
    UnknownHandle {
        node: NodeId,
        handle: String,
        direction: HandleDirection,
    },
    #[error("input '{handle}' of node '{node}' is already connected")]
    HandleOccupied { node: NodeId, handle: String },
    #[error("a {output} output cannot feed a {input} input")]
    TypeMismatch { output: PortType, input: PortType },
    #[error("connection would create a cycle")]
    WouldCycle,
}

/// Errors returned synchronously by engine calls.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("unknown node type '{0}'")]
    UnknownNodeType(String),
    #[error("node type '{0}' is already registered")]
    DuplicateNodeType(String),
    #[error("invalid value for parameter '{field}': {reason}")]
    InvalidParameterValue { field: String, reason: ParamError },
    #[error("connection rejected: {0}")]
    InvalidConnection(#[from] ConnectionRejection),
    #[error("node '{0}' not found")]
    NodeNotFound(NodeId),
    #[error("connection {0} not found")]
    ConnectionNotFound(String),
    #[error("scope {0} does not exist")]
    ScopeNotFound(ScopeId),
    #[error("node '{0}' is not a container")]
    NotAContainer(NodeId),
    #[error("node id '{0}' is already in use")]
    DuplicateNodeId(NodeId),
    #[error("invalid graph document: {0}")]
    InvalidDocument(String),
    /// Raised only when the connection validator was bypassed; never a user error.
    #[error("cycle detected in scope {scope} among {nodes:?}")]
    CycleDetected { scope: ScopeId, nodes: Vec<NodeId> },
}

/// Failure state resolved into a node's `error` field by a recompute pass.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeError {
    #[error("node '{node}' failed to compute: {cause}")]
    ComputeFailure { node: NodeId, cause: String },
    #[error("node '{node}' was not computed because upstream node '{upstream}' failed")]
    UpstreamFailure { node: NodeId, upstream: NodeId },
}

impl NodeError {
    pub fn node(&self) -> &NodeId {
        match self {
            NodeError::ComputeFailure { node, .. } | NodeError::UpstreamFailure { node, .. } => {
                node
            }
        }
    }
}

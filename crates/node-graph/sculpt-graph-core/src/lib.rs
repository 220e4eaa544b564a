//! Incremental dataflow engine for procedural-modeling node graphs.
//!
//! Nodes live in scopes: the root graph and one SubFlow per container node. Edits go
//! through [`GraphEngine`], which validates connections, keeps each scope acyclic and
//! dirty-marks what an edit invalidates. [`GraphEngine::recompute`] then resolves dirty
//! nodes in topological order, containing node failures in node state.

pub mod builtins;
pub mod compute;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod eval;
pub mod registry;
pub mod runtime;
pub mod scope;
pub mod topo;
pub mod types;
pub mod validate;

pub use compute::{keyed_output, ComputeError, NodeInputs};
pub use config::{EngineConfig, RecomputePolicy};
pub use document::{DocumentNode, GraphDocument, SubflowDocument};
pub use engine::GraphEngine;
pub use error::{ConnectionRejection, GraphError, HandleDirection, NodeError};
pub use eval::RecomputeReport;
pub use registry::{NodeRegistry, NodeSignature, NodeTypeDefinition, PortSpec, RegistryExport};
pub use runtime::{NodeRuntime, NodeSnapshot};
pub use scope::Scope;
pub use topo::{CycleDetected, DependencyMap};
pub use types::*;
pub use validate::{is_valid, validate_connection, ConnectionContext, ResolvedConnection};

pub use sculpt_api_core::{ParamError, ParamMeta, PortType, Value};

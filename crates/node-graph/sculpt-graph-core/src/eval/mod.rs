//! Incremental recompute.
//!
//! A pass walks one scope in topological order and resolves every dirty node exactly once:
//!
//! - inputs are read from upstream cached outputs; an upstream in error short-circuits the
//!   node to [`NodeError::UpstreamFailure`] without calling its compute function,
//! - a compute failure (or caught panic) keeps the last good output and records
//!   [`NodeError::ComputeFailure`],
//! - a dirty container first runs its SubFlow pass, then takes the active output node's
//!   primary value as its own primary output. No active output, a missing one, or one in
//!   error all resolve the container to "no contribution" without an error.
//!
//! A pass never edits connections or dependency maps.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, trace, warn};
use serde::Serialize;

use crate::compute::{keyed_output, ComputeError, NodeInputs};
use crate::engine::GraphEngine;
use crate::error::{GraphError, NodeError};
use crate::registry::NodeTypeDefinition;
use crate::scope::Scope;
use crate::types::{NodeId, NodeParams, OutputMap, ScopeId};


/// What a recompute pass did, in evaluation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecomputeReport {
    pub scope: Option<ScopeId>,
    /// Nodes resolved successfully (containers included).
    pub computed: Vec<NodeId>,
    /// Nodes resolved into an error state.
    pub failed: Vec<NodeError>,
    /// Nodes that were already clean.
    pub skipped: Vec<NodeId>,
    /// Passes run for the SubFlows of dirty containers.
    pub subflows: Vec<RecomputeReport>,
}

impl RecomputeReport {
    fn new(scope: &ScopeId) -> Self {
        RecomputeReport {
            scope: Some(scope.clone()),
            ..Default::default()
        }
    }

    /// Whether the pass resolved no node at all.
    pub fn is_noop(&self) -> bool {
        self.computed.is_empty() && self.failed.is_empty()
    }

    pub fn failed_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.failed.iter().map(NodeError::node)
    }
}

/// What to do with one node of the evaluation order.
enum Step {
    Clean,
    Upstream(NodeId),
    /// A required input handle has no value.
    Missing(String),
    Compute {
        definition: Arc<NodeTypeDefinition>,
        inputs: NodeInputs,
        params: NodeParams,
    },
    Container,
}

/// Gather the inputs of `id` from upstream cached outputs. `Err` carries the first
/// upstream (in connection order) that is in error.
fn gather_inputs(scope: &Scope, id: &NodeId) -> Result<NodeInputs, NodeId> {
    let mut inputs = NodeInputs::new();
    for conn_id in scope.deps.incoming(id) {
        let Some(conn) = scope.connections.get(conn_id) else {
            continue;
        };
        let Some(source) = scope.nodes.get(&conn.source) else {
            continue;
        };
        if source.has_error() {
            return Err(source.id.clone());
        }
        if let Some(value) = source.output_value(&conn.source_handle) {
            inputs.push(&conn.target_handle, value.clone());
        }
    }
    Ok(inputs)
}

fn plan(scope: &Scope, id: &NodeId) -> Step {
    let Some(node) = scope.nodes.get(id) else {
        return Step::Clean;
    };
    if !node.dirty {
        return Step::Clean;
    }
    let inputs = match gather_inputs(scope, id) {
        Err(upstream) => return Step::Upstream(upstream),
        Ok(inputs) => inputs,
    };
    if node.definition.is_container() {
        return Step::Container;
    }
    let unconnected = node
        .definition
        .inputs
        .iter()
        .find(|port| !port.optional && !inputs.is_connected(&port.id));
    match unconnected {
        Some(port) => Step::Missing(port.id.clone()),
        None => Step::Compute {
            definition: node.definition.clone(),
            inputs,
            params: node.params.clone(),
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {s}")
    } else {
        "panicked".to_string()
    }
}

impl GraphEngine {
    /// Recompute every dirty node of `scope`. Node failures are contained in node state;
    /// the only error is a cycle, which means the connection validator was bypassed.
    pub fn recompute(&mut self, scope: &ScopeId) -> Result<RecomputeReport, GraphError> {
        self.require_scope(scope)?;
        let mut report = RecomputeReport::new(scope);
        let Some(target) = self.scopes.get(scope) else {
            return Ok(report);
        };
        let order = target.deps.order().map_err(|cycle| {
            error!(
                "cycle in {scope} among {:?}: connection validation was bypassed",
                cycle.remaining
            );
            GraphError::CycleDetected {
                scope: scope.clone(),
                nodes: cycle.remaining,
            }
        })?;

        for id in order {
            let step = match self.scopes.get(scope) {
                Some(target) => plan(target, &id),
                None => break,
            };
            match step {
                Step::Clean => report.skipped.push(id),
                Step::Upstream(upstream) => {
                    let err = NodeError::UpstreamFailure {
                        node: id.clone(),
                        upstream,
                    };
                    trace!("{err}");
                    self.resolve(scope, &id, Err(err.clone()));
                    report.failed.push(err);
                }
                Step::Missing(handle) => {
                    let err = NodeError::ComputeFailure {
                        node: id.clone(),
                        cause: ComputeError::MissingInput(handle).to_string(),
                    };
                    trace!("{err}");
                    self.resolve(scope, &id, Err(err.clone()));
                    report.failed.push(err);
                }
                Step::Container => {
                    let child = self.recompute(&ScopeId::subflow(id.clone()))?;
                    report.subflows.push(child);
                    let contribution = self.contribution(&id);
                    trace!("container '{id}' contributes {:?}", contribution.is_some());
                    self.resolve(scope, &id, Ok(contribution));
                    report.computed.push(id);
                }
                Step::Compute {
                    definition,
                    inputs,
                    params,
                } => {
                    trace!("computing '{id}' ({})", definition.name);
                    match self.run_compute(&definition, &inputs, &params) {
                        Ok(output) => {
                            self.resolve(scope, &id, Ok(Some(output)));
                            report.computed.push(id);
                        }
                        Err(cause) => {
                            let err = NodeError::ComputeFailure {
                                node: id.clone(),
                                cause,
                            };
                            warn!("{err}");
                            self.resolve(scope, &id, Err(err.clone()));
                            report.failed.push(err);
                        }
                    }
                }
            }
        }

        if self.config.log_passes {
            debug!(
                "recompute {scope}: {} computed, {} failed, {} clean",
                report.computed.len(),
                report.failed.len(),
                report.skipped.len()
            );
        }
        Ok(report)
    }

    /// Recompute the root scope.
    pub fn recompute_root(&mut self) -> Result<RecomputeReport, GraphError> {
        self.recompute(&ScopeId::Root)
    }

    fn run_compute(
        &self,
        definition: &NodeTypeDefinition,
        inputs: &NodeInputs,
        params: &NodeParams,
    ) -> Result<OutputMap, String> {
        let result = if self.config.catch_panics {
            catch_unwind(AssertUnwindSafe(|| definition.compute(inputs, params)))
                .map_err(|payload| panic_message(&*payload))?
        } else {
            definition.compute(inputs, params)
        };
        result.map_err(|e| e.to_string())
    }

    /// Output map a container resolves to: its SubFlow's active output value under the
    /// container's primary output handle, or `None` when there is nothing to contribute.
    fn contribution(&self, container: &NodeId) -> Option<OutputMap> {
        let subflow = self.scopes.get(&ScopeId::subflow(container.clone()))?;
        let active = subflow.node(subflow.active_output.as_ref()?)?;
        if active.has_error() {
            return None;
        }
        let value = active.primary_output()?.clone();
        let handle = self.node(container)?.definition.primary_output()?.id.clone();
        Some(keyed_output(&handle, value))
    }

    fn resolve(&mut self, scope: &ScopeId, id: &NodeId, outcome: Result<Option<OutputMap>, NodeError>) {
        let Some(node) = self.scopes.get_mut(scope).and_then(|s| s.nodes.get_mut(id)) else {
            return;
        };
        match outcome {
            Ok(output) => node.resolve_ok(output),
            Err(err) => node.resolve_err(err),
        }
    }
}

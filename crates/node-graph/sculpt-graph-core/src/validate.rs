//! Connection validation. Pure: inspects a scope, never mutates it.
//!
//! Checks run in order and stop at the first failure:
//! 1. both endpoints exist in the scope
//! 2. no self-loop
//! 3. handles exist and the input handle is free (unless multi-input)
//! 4. output type is compatible with input type
//! 5. the edge would not close a cycle

use hashbrown::HashMap;
use indexmap::IndexMap;

use crate::error::{ConnectionRejection, HandleDirection};
use crate::registry::PortSpec;
use crate::runtime::NodeRuntime;
use crate::scope::Scope;
use crate::topo::DependencyMap;
use crate::types::{Connection, ConnectionId, ConnectionRequest, NodeId, ScopeId};

/// Everything the validator looks at.
#[derive(Clone, Copy)]
pub struct ConnectionContext<'a> {
    pub scope: &'a ScopeId,
    pub nodes: &'a IndexMap<NodeId, NodeRuntime>,
    pub connections: &'a IndexMap<ConnectionId, Connection>,
    pub deps: &'a DependencyMap,
    /// Scope membership of every node in the engine, used to tell "elsewhere" from "nowhere".
    pub node_index: &'a HashMap<NodeId, ScopeId>,
}

impl<'a> ConnectionContext<'a> {
    pub fn new(
        scope_id: &'a ScopeId,
        scope: &'a Scope,
        node_index: &'a HashMap<NodeId, ScopeId>,
    ) -> Self {
        ConnectionContext {
            scope: scope_id,
            nodes: &scope.nodes,
            connections: &scope.connections,
            deps: &scope.deps,
            node_index,
        }
    }
}

/// A request whose handles have been resolved against the endpoint node types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConnection {
    pub source: NodeId,
    pub source_handle: String,
    pub target: NodeId,
    pub target_handle: String,
}

impl ResolvedConnection {
    pub fn into_connection(self, id: ConnectionId) -> Connection {
        Connection {
            id,
            source: self.source,
            source_handle: self.source_handle,
            target: self.target,
            target_handle: self.target_handle,
        }
    }
}

fn locate<'a>(
    id: &NodeId,
    ctx: &ConnectionContext<'a>,
) -> Result<&'a NodeRuntime, ConnectionRejection> {
    if let Some(node) = ctx.nodes.get(id) {
        return Ok(node);
    }
    match ctx.node_index.get(id) {
        Some(other) if other != ctx.scope => Err(ConnectionRejection::CrossScope),
        _ => Err(ConnectionRejection::EndpointMissing(id.clone())),
    }
}

fn resolve_port<'p>(
    node: &'p NodeRuntime,
    requested: Option<&str>,
    direction: HandleDirection,
) -> Result<&'p PortSpec, ConnectionRejection> {
    let definition = &node.definition;
    let found = match (direction, requested) {
        (HandleDirection::Input, Some(handle)) => definition.input_port(handle),
        (HandleDirection::Output, Some(handle)) => definition.output_port(handle),
        (HandleDirection::Input, None) => definition.inputs.first(),
        (HandleDirection::Output, None) => definition.outputs.first(),
    };
    found.ok_or_else(|| ConnectionRejection::UnknownHandle {
        node: node.id.clone(),
        handle: requested.unwrap_or_default().to_string(),
        direction,
    })
}

/// Validate `candidate` and resolve its handles.
pub fn validate_connection(
    candidate: &ConnectionRequest,
    ctx: &ConnectionContext<'_>,
) -> Result<ResolvedConnection, ConnectionRejection> {
    // 1. endpoints
    let source = locate(&candidate.source, ctx)?;
    let target = locate(&candidate.target, ctx)?;

    // 2. self-loop
    if source.id == target.id {
        return Err(ConnectionRejection::SelfLoop);
    }

    // 3. handles and occupancy
    let out_port = resolve_port(source, candidate.source_handle.as_deref(), HandleDirection::Output)?;
    let in_port = resolve_port(target, candidate.target_handle.as_deref(), HandleDirection::Input)?;
    let occupied = ctx.connections.values().any(|c| {
        c.target == target.id
            && c.target_handle == in_port.id
            && (!in_port.multi || (c.source == source.id && c.source_handle == out_port.id))
    });
    if occupied {
        return Err(ConnectionRejection::HandleOccupied {
            node: target.id.clone(),
            handle: in_port.id.clone(),
        });
    }

    // 4. types
    if !in_port.ty.accepts(out_port.ty) {
        return Err(ConnectionRejection::TypeMismatch {
            output: out_port.ty,
            input: in_port.ty,
        });
    }

    // 5. cycles: target would depend on source, so source must not already depend on target
    if ctx.deps.depends_on(&source.id, &target.id) {
        return Err(ConnectionRejection::WouldCycle);
    }

    Ok(ResolvedConnection {
        source: source.id.clone(),
        source_handle: out_port.id.clone(),
        target: target.id.clone(),
        target_handle: in_port.id.clone(),
    })
}

/// Boolean form of [`validate_connection`], for live drag feedback.
pub fn is_valid(candidate: &ConnectionRequest, ctx: &ConnectionContext<'_>) -> bool {
    validate_connection(candidate, ctx).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::NodeRegistry;

    struct Fixture {
        scope_id: ScopeId,
        scope: Scope,
        index: HashMap<NodeId, ScopeId>,
    }

    impl Fixture {
        fn new(nodes: &[(&str, &str)]) -> Self {
            let registry = NodeRegistry::with_builtins();
            let mut scope = Scope::default();
            let mut index = HashMap::new();
            for (id, ty) in nodes {
                let node = NodeRuntime::new(id.to_string(), registry.get(ty).unwrap());
                scope.nodes.insert(id.to_string(), node);
                index.insert(id.to_string(), ScopeId::Root);
            }
            scope.rebuild_dependencies();
            Fixture {
                scope_id: ScopeId::Root,
                scope,
                index,
            }
        }

        fn check(&self, req: &ConnectionRequest) -> Result<ResolvedConnection, ConnectionRejection> {
            let ctx = ConnectionContext::new(&self.scope_id, &self.scope, &self.index);
            validate_connection(req, &ctx)
        }

        fn connect(&mut self, req: ConnectionRequest) {
            let resolved = self.check(&req).expect("valid connection");
            let id = format!("e{}", self.scope.connections.len() + 1);
            self.scope
                .connections
                .insert(id.clone(), resolved.into_connection(id));
            self.scope.rebuild_dependencies();
        }
    }

    #[test]
    fn default_handles_resolve_to_first_ports() {
        let f = Fixture::new(&[("a", "constant"), ("b", "add")]);
        let resolved = f.check(&ConnectionRequest::new("a", "b")).unwrap();
        assert_eq!(resolved.source_handle, "out");
        assert_eq!(resolved.target_handle, "a");
    }

    #[test]
    fn rejects_missing_and_foreign_endpoints() {
        let mut f = Fixture::new(&[("a", "constant")]);
        assert_eq!(
            f.check(&ConnectionRequest::new("a", "ghost")),
            Err(ConnectionRejection::EndpointMissing("ghost".into()))
        );
        f.index.insert("inner".into(), ScopeId::subflow("g"));
        assert_eq!(
            f.check(&ConnectionRequest::new("a", "inner")),
            Err(ConnectionRejection::CrossScope)
        );
    }

    #[test]
    fn rejects_self_loop() {
        let f = Fixture::new(&[("a", "add")]);
        assert_eq!(
            f.check(&ConnectionRequest::new("a", "a")),
            Err(ConnectionRejection::SelfLoop)
        );
    }

    #[test]
    fn rejects_unknown_handle() {
        let f = Fixture::new(&[("a", "constant"), ("b", "add")]);
        let err = f
            .check(&ConnectionRequest::new("a", "b").with_target_handle("c"))
            .unwrap_err();
        assert!(matches!(
            err,
            ConnectionRejection::UnknownHandle { direction: HandleDirection::Input, .. }
        ));
        // constant has no inputs at all
        let err = f.check(&ConnectionRequest::new("b", "a")).unwrap_err();
        assert!(matches!(err, ConnectionRejection::UnknownHandle { .. }));
    }

    #[test]
    fn single_input_accepts_one_connection() {
        let mut f = Fixture::new(&[("a", "constant"), ("x", "constant"), ("b", "double")]);
        f.connect(ConnectionRequest::new("a", "b"));
        assert_eq!(
            f.check(&ConnectionRequest::new("x", "b")),
            Err(ConnectionRejection::HandleOccupied {
                node: "b".into(),
                handle: "in".into()
            })
        );
    }

    #[test]
    fn multi_input_accepts_many_but_not_duplicates() {
        let mut f = Fixture::new(&[("a", "constant"), ("x", "constant"), ("s", "sum")]);
        f.connect(ConnectionRequest::new("a", "s"));
        assert!(f.check(&ConnectionRequest::new("x", "s")).is_ok());
        assert!(matches!(
            f.check(&ConnectionRequest::new("a", "s")),
            Err(ConnectionRejection::HandleOccupied { .. })
        ));
    }

    #[test]
    fn rejects_type_mismatch() {
        let f = Fixture::new(&[("light", "point_light"), ("t", "translate")]);
        assert_eq!(
            f.check(&ConnectionRequest::new("light", "t")),
            Err(ConnectionRejection::TypeMismatch {
                output: sculpt_api_core::PortType::Light,
                input: sculpt_api_core::PortType::Geometry,
            })
        );
    }

    #[test]
    fn rejects_cycles() {
        let mut f = Fixture::new(&[("a", "add"), ("b", "double"), ("c", "add_one")]);
        f.connect(ConnectionRequest::new("a", "b"));
        f.connect(ConnectionRequest::new("b", "c"));
        let ctx = ConnectionContext::new(&f.scope_id, &f.scope, &f.index);
        assert_eq!(
            validate_connection(&ConnectionRequest::new("c", "a"), &ctx),
            Err(ConnectionRejection::WouldCycle)
        );
        assert!(!is_valid(&ConnectionRequest::new("c", "a"), &ctx));
    }
}

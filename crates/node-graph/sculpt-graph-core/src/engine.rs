//! The graph engine: owns every scope, applies validated mutations and keeps dirty state
//! consistent across the container/SubFlow boundary.
//!
//! All mutations take `&mut self`, so a mutation can never interleave with a recompute
//! pass. A rejected mutation leaves the engine untouched.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use indexmap::IndexMap;
use log::{debug, trace};

use crate::config::{EngineConfig, RecomputePolicy};
use crate::error::GraphError;
use crate::registry::NodeRegistry;
use crate::runtime::{NodeRuntime, NodeSnapshot};
use crate::scope::Scope;
use crate::topo::DependencyMap;
use crate::types::{Connection, ConnectionId, ConnectionRequest, NodeId, NodeParams, ScopeId};
use crate::validate::{validate_connection, ConnectionContext, ResolvedConnection};

#[derive(Debug, Clone)]
pub struct GraphEngine {
    registry: Arc<NodeRegistry>,
    pub(crate) config: EngineConfig,
    pub(crate) scopes: HashMap<ScopeId, Scope>,
    /// Which scope every live node belongs to. Node ids are unique engine-wide.
    node_index: HashMap<NodeId, ScopeId>,
    current: ScopeId,
    next_node: u64,
    next_connection: u64,
}

impl Default for GraphEngine {
    fn default() -> Self {
        GraphEngine::new(NodeRegistry::with_builtins())
    }
}

impl GraphEngine {
    pub fn new(registry: NodeRegistry) -> Self {
        GraphEngine::with_config(registry, EngineConfig::default())
    }

    pub fn with_config(registry: NodeRegistry, config: EngineConfig) -> Self {
        let mut scopes = HashMap::new();
        scopes.insert(ScopeId::Root, Scope::default());
        GraphEngine {
            registry: Arc::new(registry),
            config,
            scopes,
            node_index: HashMap::new(),
            current: ScopeId::Root,
            next_node: 0,
            next_connection: 0,
        }
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    // ---- navigation ----

    /// Scope that editor commands currently target.
    pub fn current_scope(&self) -> &ScopeId {
        &self.current
    }

    /// Make the SubFlow of `container` current, creating it empty on first entry.
    pub fn enter_subflow(&mut self, container: &NodeId) -> Result<ScopeId, GraphError> {
        let scope = ScopeId::subflow(container.clone());
        self.materialize(&scope)?;
        debug!("entered {scope}");
        self.current = scope.clone();
        Ok(scope)
    }

    pub fn return_to_root(&mut self) {
        self.current = ScopeId::Root;
    }

    /// Step out of the current SubFlow into the scope holding its container.
    pub fn exit_subflow(&mut self) -> &ScopeId {
        if let Some(parent) = self.parent_of(&self.current) {
            self.current = parent;
        }
        &self.current
    }

    /// Scope holding the container that owns `scope`; `None` for the root.
    pub fn parent_of(&self, scope: &ScopeId) -> Option<ScopeId> {
        scope
            .container()
            .and_then(|container| self.node_index.get(container))
            .cloned()
    }

    /// Scopes that currently hold state (the root plus every entered SubFlow).
    pub fn scopes(&self) -> impl Iterator<Item = &ScopeId> {
        self.scopes.keys()
    }

    /// Borrow a materialized scope.
    pub fn scope(&self, scope: &ScopeId) -> Option<&Scope> {
        self.scopes.get(scope)
    }

    // ---- queries ----

    pub fn nodes_in(&self, scope: &ScopeId) -> Result<Vec<&NodeRuntime>, GraphError> {
        Ok(self
            .existing(scope)?
            .map(|s| s.nodes().collect())
            .unwrap_or_default())
    }

    pub fn connections_in(&self, scope: &ScopeId) -> Result<Vec<&Connection>, GraphError> {
        Ok(self
            .existing(scope)?
            .map(|s| s.connections().collect())
            .unwrap_or_default())
    }

    pub fn dependency_map(&self, scope: &ScopeId) -> Result<Option<&DependencyMap>, GraphError> {
        Ok(self.existing(scope)?.map(Scope::dependencies))
    }

    /// Look a node up in whichever scope holds it.
    pub fn node(&self, id: &str) -> Option<&NodeRuntime> {
        let scope = self.node_index.get(id)?;
        self.scopes.get(scope)?.node(id)
    }

    pub fn scope_of(&self, id: &str) -> Option<&ScopeId> {
        self.node_index.get(id)
    }

    /// Snapshot of node `id` in `scope` for rendering and property-panel consumers.
    pub fn get_runtime(&self, id: &str, scope: &ScopeId) -> Result<NodeSnapshot, GraphError> {
        self.runtime(id, scope).map(NodeRuntime::snapshot)
    }

    pub fn active_output(&self, container: &NodeId) -> Option<&NodeId> {
        self.scopes
            .get(&ScopeId::subflow(container.clone()))
            .and_then(|s| s.active_output())
    }

    // ---- node mutations ----

    /// Place a new node of `type_name` in `scope`. Returns the generated id.
    pub fn add_node(&mut self, type_name: &str, scope: &ScopeId) -> Result<NodeId, GraphError> {
        self.insert_node(type_name, scope, None)
    }

    /// Place a node under a caller-chosen id. Ids are unique across all scopes.
    pub fn add_node_with_id(
        &mut self,
        type_name: &str,
        scope: &ScopeId,
        id: impl Into<NodeId>,
    ) -> Result<NodeId, GraphError> {
        self.insert_node(type_name, scope, Some(id.into()))
    }

    fn insert_node(
        &mut self,
        type_name: &str,
        scope: &ScopeId,
        id: Option<NodeId>,
    ) -> Result<NodeId, GraphError> {
        let definition = self.registry.get(type_name)?;
        if let Some(id) = &id {
            if self.node_index.contains_key(id) {
                return Err(GraphError::DuplicateNodeId(id.clone()));
            }
        }
        self.require_scope(scope)?;

        let id = id.unwrap_or_else(|| self.generate_node_id(type_name));
        let target = self.materialize(scope)?;
        target
            .nodes
            .insert(id.clone(), NodeRuntime::new(id.clone(), definition));
        target.rebuild_dependencies();
        self.node_index.insert(id.clone(), scope.clone());
        debug!("added {type_name} node '{id}' to {scope}");

        self.settle(scope)?;
        Ok(id)
    }

    fn generate_node_id(&mut self, type_name: &str) -> NodeId {
        loop {
            self.next_node += 1;
            let candidate = format!("{type_name}-{}", self.next_node);
            if !self.node_index.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Remove node `id` from `scope` with its incident connections. A container takes its
    /// whole SubFlow with it. Former dependents are marked dirty.
    pub fn remove_node(&mut self, id: &str, scope: &ScopeId) -> Result<(), GraphError> {
        let node = self.runtime(id, scope)?;
        let id = node.id.clone();
        let is_container = node.definition.is_container();

        let target = self.scope_mut(scope)?;
        let dependents: Vec<NodeId> = target.deps.dependents(&id).cloned().collect();
        for conn in target.incident_connections(&id) {
            target.connections.shift_remove(&conn);
        }
        target.nodes.shift_remove(&id);
        target.rebuild_dependencies();
        let was_active = target.active_output.as_ref() == Some(&id);
        if was_active {
            target.active_output = None;
        }
        self.node_index.remove(&id);
        if is_container {
            self.destroy_subflow(&id);
        }
        if self.existing(&self.current).is_err() {
            self.current = scope.clone();
        }
        debug!("removed node '{id}' from {scope}");

        for dependent in &dependents {
            self.propagate_dirty(scope, dependent);
        }
        if was_active {
            self.dirty_container_of(scope);
        }
        self.settle(scope)
    }

    fn destroy_subflow(&mut self, container: &NodeId) {
        let Some(scope) = self.scopes.remove(&ScopeId::subflow(container.clone())) else {
            return;
        };
        debug!("destroyed subflow({container}) with {} nodes", scope.nodes.len());
        for (id, node) in scope.nodes {
            self.node_index.remove(&id);
            if node.definition.is_container() {
                self.destroy_subflow(&id);
            }
        }
    }

    /// Validate and merge partial parameter values into node `id`, then mark it dirty.
    /// Nothing is applied unless every entry is valid.
    pub fn set_params(
        &mut self,
        id: &str,
        updates: &NodeParams,
        scope: &ScopeId,
    ) -> Result<(), GraphError> {
        let node = self.runtime(id, scope)?;
        for (category, key, value) in updates.iter() {
            let field = format!("{category}.{key}");
            let meta = node.definition.param_meta(category, key).ok_or_else(|| {
                GraphError::InvalidParameterValue {
                    field: field.clone(),
                    reason: sculpt_api_core::ParamError::UnknownParameter,
                }
            })?;
            meta.validate(value)
                .map_err(|reason| GraphError::InvalidParameterValue { field, reason })?;
        }

        let id = node.id.clone();
        if let Some(node) = self.scope_mut(scope)?.nodes.get_mut(&id) {
            node.params.merge(updates);
        }
        debug!("updated params of '{id}' in {scope}");
        self.propagate_dirty(scope, &id);
        self.settle(scope)
    }

    /// Toggle the rendering visibility of node `id`. Never dirties anything.
    pub fn set_visible(&mut self, id: &str, visible: bool, scope: &ScopeId) -> Result<(), GraphError> {
        self.runtime(id, scope)?;
        if let Some(node) = self.scope_mut(scope)?.nodes.get_mut(id) {
            node.visible = visible;
        }
        Ok(())
    }

    /// Designate the node whose value `container` contributes to its parent scope, or
    /// clear the designation with `None`. The container is marked dirty either way.
    pub fn set_active_output(
        &mut self,
        container: &NodeId,
        node: Option<&str>,
    ) -> Result<(), GraphError> {
        let subflow = ScopeId::subflow(container.clone());
        self.require_scope(&subflow)?;
        if let Some(node) = node {
            self.runtime(node, &subflow)?;
        }
        self.materialize(&subflow)?.active_output = node.map(str::to_string);
        debug!("active output of '{container}' set to {node:?}");
        self.dirty_container_of(&subflow);
        match self.parent_of(&subflow) {
            Some(parent) => self.settle(&parent),
            None => Ok(()),
        }
    }

    // ---- connection mutations ----

    /// Validate `request` against `scope` without changing anything.
    pub fn check_connection(
        &self,
        request: &ConnectionRequest,
        scope: &ScopeId,
    ) -> Result<ResolvedConnection, GraphError> {
        let empty;
        let target = match self.existing(scope)? {
            Some(target) => target,
            None => {
                empty = Scope::default();
                &empty
            }
        };
        let ctx = ConnectionContext::new(scope, target, &self.node_index);
        Ok(validate_connection(request, &ctx)?)
    }

    /// Live predicate for editor drag feedback.
    pub fn can_connect(&self, request: &ConnectionRequest, scope: &ScopeId) -> bool {
        self.check_connection(request, scope).is_ok()
    }

    /// Add a connection after validation. Returns the new connection id.
    pub fn add_edge(
        &mut self,
        request: &ConnectionRequest,
        scope: &ScopeId,
    ) -> Result<ConnectionId, GraphError> {
        let resolved = self.check_connection(request, scope)?;
        let id = self.generate_connection_id();
        let conn = resolved.into_connection(id.clone());
        let target_node = conn.target.clone();

        let target = self.scope_mut(scope)?;
        target.deps.link(&conn);
        target.connections.insert(id.clone(), conn);
        debug!("connected {} -> {} as {id} in {scope}", request.source, target_node);

        self.propagate_dirty(scope, &target_node);
        self.settle(scope)?;
        Ok(id)
    }

    fn generate_connection_id(&mut self) -> ConnectionId {
        self.next_connection += 1;
        format!("e{}", self.next_connection)
    }

    /// Remove every connection from `source` to `target`, narrowed to the handles given in
    /// `request`. Fails if nothing matched.
    pub fn remove_edge(&mut self, request: &ConnectionRequest, scope: &ScopeId) -> Result<(), GraphError> {
        let not_found = || {
            GraphError::ConnectionNotFound(format!("{} -> {}", request.source, request.target))
        };
        self.existing(scope)?;
        let target = self.scopes.get_mut(scope).ok_or_else(not_found)?;
        let matching: Vec<ConnectionId> = target
            .connections
            .values()
            .filter(|c| {
                c.source == request.source
                    && c.target == request.target
                    && request.source_handle.as_ref().map_or(true, |h| *h == c.source_handle)
                    && request.target_handle.as_ref().map_or(true, |h| *h == c.target_handle)
            })
            .map(|c| c.id.clone())
            .collect();
        if matching.is_empty() {
            return Err(not_found());
        }
        for id in &matching {
            target.connections.shift_remove(id);
        }
        target.rebuild_dependencies();
        debug!("removed {} connection(s) {} -> {} in {scope}", matching.len(), request.source, request.target);

        self.propagate_dirty(scope, &request.target);
        self.settle(scope)
    }

    /// Remove the connection `id`.
    pub fn remove_connection(&mut self, id: &str, scope: &ScopeId) -> Result<(), GraphError> {
        self.existing(scope)?;
        let conn = self
            .scopes
            .get_mut(scope)
            .and_then(|target| target.connections.shift_remove(id))
            .ok_or_else(|| GraphError::ConnectionNotFound(id.to_string()))?;
        let target = self.scope_mut(scope)?;
        target.rebuild_dependencies();
        debug!("removed connection {id} in {scope}");
        self.propagate_dirty(scope, &conn.target);
        self.settle(scope)
    }

    /// Replace connection `id` by `request` in one step. The request is validated as if the
    /// old connection were absent; on rejection the old connection stays.
    pub fn reconnect_edge(
        &mut self,
        id: &str,
        request: &ConnectionRequest,
        scope: &ScopeId,
    ) -> Result<ConnectionId, GraphError> {
        let not_found = || GraphError::ConnectionNotFound(id.to_string());
        self.existing(scope)?;
        let target = self.scopes.get(scope).ok_or_else(not_found)?;
        let old = target.connections.get(id).cloned().ok_or_else(not_found)?;

        let mut connections = target.connections.clone();
        connections.shift_remove(id);
        let deps = DependencyMap::rebuild(target.nodes.keys(), connections.values());
        let ctx = ConnectionContext {
            scope,
            nodes: &target.nodes,
            connections: &connections,
            deps: &deps,
            node_index: &self.node_index,
        };
        let resolved = validate_connection(request, &ctx)?;

        let new_id = self.generate_connection_id();
        let conn = resolved.into_connection(new_id.clone());
        let new_target = conn.target.clone();
        let target = self.scope_mut(scope)?;
        target.connections.shift_remove(id);
        target.connections.insert(new_id.clone(), conn);
        target.rebuild_dependencies();
        debug!("reconnected {id} as {new_id} in {scope}");

        self.propagate_dirty(scope, &old.target);
        self.propagate_dirty(scope, &new_target);
        self.settle(scope)?;
        Ok(new_id)
    }

    /// Replace the whole connection set of `scope`. Every request is validated against the
    /// set built so far; the first rejection aborts without applying anything.
    pub fn reset_edges(
        &mut self,
        requests: &[ConnectionRequest],
        scope: &ScopeId,
    ) -> Result<Vec<ConnectionId>, GraphError> {
        // a SubFlow that was never entered has no edges yet
        let empty;
        let target = match self.existing(scope)? {
            Some(target) => target,
            None => {
                empty = Scope::default();
                &empty
            }
        };
        let mut connections: IndexMap<ConnectionId, Connection> = IndexMap::new();
        let mut deps = DependencyMap::rebuild(target.nodes.keys(), std::iter::empty());
        let mut first_id = self.next_connection;
        for request in requests {
            let ctx = ConnectionContext {
                scope,
                nodes: &target.nodes,
                connections: &connections,
                deps: &deps,
                node_index: &self.node_index,
            };
            let resolved = validate_connection(request, &ctx)?;
            first_id += 1;
            let conn = resolved.into_connection(format!("e{first_id}"));
            deps.link(&conn);
            connections.insert(conn.id.clone(), conn);
        }

        let mut touched: HashSet<NodeId> = target.connections.values().map(|c| c.target.clone()).collect();
        touched.extend(connections.values().map(|c| c.target.clone()));
        let ids: Vec<ConnectionId> = connections.keys().cloned().collect();

        self.next_connection = first_id;
        let target = self.materialize(scope)?;
        target.connections = connections;
        target.deps = deps;
        debug!("reset {scope} to {} connection(s)", ids.len());

        for node in &touched {
            self.propagate_dirty(scope, node);
        }
        self.settle(scope)?;
        Ok(ids)
    }

    // ---- invalidation ----

    /// Mark node `id` and its transitive dependents dirty. When the dirtied set reaches a
    /// SubFlow's active output, the owning container is dirtied in its parent scope.
    pub fn mark_dirty(&mut self, id: &str, scope: &ScopeId) -> Result<(), GraphError> {
        let id = self.runtime(id, scope)?.id.clone();
        self.propagate_dirty(scope, &id);
        Ok(())
    }

    pub(crate) fn propagate_dirty(&mut self, scope: &ScopeId, id: &NodeId) {
        let mut scope = scope.clone();
        let mut id = id.clone();
        loop {
            let Some(target) = self.scopes.get_mut(&scope) else {
                return;
            };
            let newly_dirty = target.mark_dirty(&id);
            if !newly_dirty.is_empty() {
                trace!("dirtied {newly_dirty:?} in {scope}");
            }
            let reaches_active = target
                .active_output
                .as_ref()
                .is_some_and(|active| newly_dirty.contains(active));
            if !reaches_active {
                return;
            }
            let Some((parent, container)) = self.container_link(&scope) else {
                return;
            };
            scope = parent;
            id = container;
        }
    }

    /// Dirty the container owning `subflow` (and what depends on it) in its parent scope.
    fn dirty_container_of(&mut self, subflow: &ScopeId) {
        if let Some((parent, container)) = self.container_link(subflow) {
            self.propagate_dirty(&parent, &container);
        }
    }

    fn container_link(&self, subflow: &ScopeId) -> Option<(ScopeId, NodeId)> {
        let container = subflow.container()?;
        let parent = self.node_index.get(container)?;
        Some((parent.clone(), container.clone()))
    }

    /// Under the eager policy, recompute `scope` and then every enclosing scope.
    pub(crate) fn settle(&mut self, scope: &ScopeId) -> Result<(), GraphError> {
        if self.config.recompute != RecomputePolicy::Eager {
            return Ok(());
        }
        let mut next = Some(scope.clone());
        while let Some(scope) = next {
            self.recompute(&scope)?;
            next = self.parent_of(&scope);
        }
        Ok(())
    }

    // ---- scope plumbing ----

    /// `Ok(Some)` for a materialized scope, `Ok(None)` for the not-yet-entered SubFlow of a
    /// live container, `Err` otherwise.
    fn existing(&self, scope: &ScopeId) -> Result<Option<&Scope>, GraphError> {
        if let Some(found) = self.scopes.get(scope) {
            return Ok(Some(found));
        }
        self.require_scope(scope)?;
        Ok(None)
    }

    /// Succeeds if `scope` is the root or the SubFlow of a live container node.
    pub(crate) fn require_scope(&self, scope: &ScopeId) -> Result<(), GraphError> {
        let Some(container) = scope.container() else {
            return Ok(());
        };
        let node = self
            .node(container)
            .ok_or_else(|| GraphError::NodeNotFound(container.clone()))?;
        if node.definition.is_container() {
            Ok(())
        } else {
            Err(GraphError::NotAContainer(container.clone()))
        }
    }

    fn materialize(&mut self, scope: &ScopeId) -> Result<&mut Scope, GraphError> {
        self.require_scope(scope)?;
        Ok(self.scopes.entry(scope.clone()).or_default())
    }

    fn scope_mut(&mut self, scope: &ScopeId) -> Result<&mut Scope, GraphError> {
        self.scopes
            .get_mut(scope)
            .ok_or_else(|| GraphError::ScopeNotFound(scope.clone()))
    }

    fn runtime(&self, id: &str, scope: &ScopeId) -> Result<&NodeRuntime, GraphError> {
        self.scopes
            .get(scope)
            .and_then(|s| s.node(id))
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }
}

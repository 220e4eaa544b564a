//! One isolated graph: node arena, connection set and derived dependency map.

use indexmap::IndexMap;

use crate::runtime::NodeRuntime;
use crate::topo::DependencyMap;
use crate::types::{Connection, ConnectionId, NodeId};

#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub(crate) nodes: IndexMap<NodeId, NodeRuntime>,
    pub(crate) connections: IndexMap<ConnectionId, Connection>,
    pub(crate) deps: DependencyMap,
    /// SubFlow only: the node whose value the owning container contributes to its parent.
    pub(crate) active_output: Option<NodeId>,
}

impl Scope {
    pub fn nodes(&self) -> impl Iterator<Item = &NodeRuntime> {
        self.nodes.values()
    }

    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    pub fn node(&self, id: &str) -> Option<&NodeRuntime> {
        self.nodes.get(id)
    }

    pub fn dependencies(&self) -> &DependencyMap {
        &self.deps
    }

    pub fn active_output(&self) -> Option<&NodeId> {
        self.active_output.as_ref()
    }

    pub(crate) fn rebuild_dependencies(&mut self) {
        self.deps = DependencyMap::rebuild(self.nodes.keys(), self.connections.values());
    }

    /// Mark `id` and everything downstream of it dirty. Traversal stops at nodes that are
    /// already dirty. Returns the nodes that changed from clean to dirty.
    pub(crate) fn mark_dirty(&mut self, id: &NodeId) -> Vec<NodeId> {
        let mut newly_dirty = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(&current) else {
                continue;
            };
            if node.dirty {
                continue;
            }
            node.dirty = true;
            stack.extend(self.deps.dependents(&current).cloned());
            newly_dirty.push(current);
        }
        newly_dirty
    }

    /// Connections with `id` at either end.
    pub(crate) fn incident_connections(&self, id: &NodeId) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|c| &c.source == id || &c.target == id)
            .map(|c| c.id.clone())
            .collect()
    }
}

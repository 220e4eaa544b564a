//! Dependency map derived from a scope's connections, and the topological scheduler.

use std::collections::BTreeSet;

use hashbrown::HashMap;
use indexmap::{IndexMap, IndexSet};
use thiserror::Error;

use crate::types::{Connection, ConnectionId, NodeId};

/// The scheduler could not order every node; `remaining` lists the nodes left on a cycle
/// (or downstream of one), in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cycle detected among {remaining:?}")]
pub struct CycleDetected {
    pub remaining: Vec<NodeId>,
}

/// "Depends on" adjacency for one scope.
///
/// Keys of `upstream` are every node of the scope in insertion order; that order breaks
/// ties in [`DependencyMap::order`]. The map is never edited directly by callers: it is
/// rebuilt from the connection set whenever edges change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyMap {
    upstream: IndexMap<NodeId, IndexSet<NodeId>>,
    downstream: HashMap<NodeId, IndexSet<NodeId>>,
    incoming: HashMap<NodeId, Vec<ConnectionId>>,
}

impl DependencyMap {
    /// Build the map for `nodes` (in insertion order) from `connections`. O(N + E).
    pub fn rebuild<'a>(
        nodes: impl IntoIterator<Item = &'a NodeId>,
        connections: impl IntoIterator<Item = &'a Connection>,
    ) -> Self {
        let mut map = DependencyMap::default();
        for id in nodes {
            map.upstream.entry(id.clone()).or_default();
        }
        for conn in connections {
            map.link(conn);
        }
        map
    }

    /// Record `conn` in the map. Endpoints unknown to the map are registered on the fly.
    pub(crate) fn link(&mut self, conn: &Connection) {
        self.upstream.entry(conn.source.clone()).or_default();
        self.upstream
            .entry(conn.target.clone())
            .or_default()
            .insert(conn.source.clone());
        self.downstream
            .entry(conn.source.clone())
            .or_default()
            .insert(conn.target.clone());
        self.incoming
            .entry(conn.target.clone())
            .or_default()
            .push(conn.id.clone());
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.upstream.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.upstream.len()
    }

    pub fn is_empty(&self) -> bool {
        self.upstream.is_empty()
    }

    /// Direct upstream sources of `id`, in connection order.
    pub fn dependencies(&self, id: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.upstream.get(id).into_iter().flatten()
    }

    /// Direct downstream consumers of `id`.
    pub fn dependents(&self, id: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.downstream.get(id).into_iter().flatten()
    }

    /// Ids of connections targeting `id`, in creation order.
    pub fn incoming(&self, id: &NodeId) -> &[ConnectionId] {
        self.incoming
            .get(id)
            .map(|ids| ids.as_slice())
            .unwrap_or_default()
    }

    /// Whether `node` transitively depends on `ancestor`.
    pub fn depends_on(&self, node: &NodeId, ancestor: &NodeId) -> bool {
        let mut seen: IndexSet<&NodeId> = IndexSet::new();
        let mut stack: Vec<&NodeId> = self.dependencies(node).collect();
        while let Some(current) = stack.pop() {
            if current == ancestor {
                return true;
            }
            if seen.insert(current) {
                stack.extend(self.dependencies(current));
            }
        }
        false
    }

    /// Every node reachable downstream from `id`, excluding `id` itself.
    pub fn downstream_closure(&self, id: &NodeId) -> IndexSet<NodeId> {
        let mut seen = IndexSet::new();
        let mut stack: Vec<&NodeId> = self.dependents(id).collect();
        while let Some(current) = stack.pop() {
            if seen.insert(current.clone()) {
                stack.extend(self.dependents(current));
            }
        }
        seen
    }

    /// Topological evaluation order (Kahn). Ready nodes are taken lowest insertion index
    /// first, so the order is reproducible for a given edit history.
    pub fn order(&self) -> Result<Vec<NodeId>, CycleDetected> {
        let mut indeg: Vec<usize> = self.upstream.values().map(|deps| deps.len()).collect();
        let mut ready: BTreeSet<usize> = indeg
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d == 0)
            .map(|(idx, _)| idx)
            .collect();

        let mut order = Vec::with_capacity(self.upstream.len());
        while let Some(idx) = ready.pop_first() {
            let Some((id, _)) = self.upstream.get_index(idx) else {
                continue;
            };
            order.push(id.clone());
            for dependent in self.dependents(id) {
                if let Some(pos) = self.upstream.get_index_of(dependent) {
                    indeg[pos] -= 1;
                    if indeg[pos] == 0 {
                        ready.insert(pos);
                    }
                }
            }
        }

        if order.len() != self.upstream.len() {
            let remaining = self
                .upstream
                .keys()
                .enumerate()
                .filter(|(idx, _)| indeg[*idx] > 0)
                .map(|(_, id)| id.clone())
                .collect();
            return Err(CycleDetected { remaining });
        }
        Ok(order)
    }
}

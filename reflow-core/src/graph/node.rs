//! Graph Nodes
//!
//! This module defines node identifiers and the per-node edge sets that
//! live in the dependency graph.

use indexmap::IndexSet;

/// Unique identifier for a node in the dependency graph.
///
/// Identifiers are allocated by the identity registry of the owning
/// [`ReactiveContext`](crate::reactive::ReactiveContext), starting at 1 and
/// increasing monotonically. An entity keeps its identifier for its whole
/// lifetime; identifiers are never reassigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node in the dependency graph.
///
/// Edge sets are insertion-ordered so that graph traversal, and therefore
/// topological-sort tie-breaking, is deterministic for a fixed sequence of
/// edge insertions.
#[derive(Debug, Default)]
pub struct Node {
    /// Nodes this node reads from ("feeds into" edges pointing at us).
    dependencies: IndexSet<NodeId>,

    /// Nodes that read from this node.
    dependents: IndexSet<NodeId>,
}

impl Node {
    /// Create a node with no edges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency (a node that this node reads from).
    pub fn add_dependency(&mut self, node_id: NodeId) {
        self.dependencies.insert(node_id);
    }

    /// Remove a dependency.
    pub fn remove_dependency(&mut self, node_id: NodeId) {
        self.dependencies.shift_remove(&node_id);
    }

    /// Get all dependencies, in edge-insertion order.
    pub fn dependencies(&self) -> &IndexSet<NodeId> {
        &self.dependencies
    }

    /// Add a dependent (a node that reads from this node).
    pub fn add_dependent(&mut self, node_id: NodeId) {
        self.dependents.insert(node_id);
    }

    /// Remove a dependent.
    pub fn remove_dependent(&mut self, node_id: NodeId) {
        self.dependents.shift_remove(&node_id);
    }

    /// Get all dependents, in edge-insertion order.
    pub fn dependents(&self) -> &IndexSet<NodeId> {
        &self.dependents
    }

    /// Number of incoming edges.
    pub fn indegree(&self) -> usize {
        self.dependencies.len()
    }

    /// Number of outgoing edges.
    pub fn outdegree(&self) -> usize {
        self.dependents.len()
    }

    /// True when the node has no edges in either direction.
    pub fn is_isolated(&self) -> bool {
        self.dependencies.is_empty() && self.dependents.is_empty()
    }
}

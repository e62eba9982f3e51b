//! Dependency Graph
//!
//! The directed graph that records "feeds into" relationships between
//! observable values and computed bindings, plus the seeded topological
//! sort the digest engine runs over it.
//!
//! # Algorithm
//!
//! A digest pass hands `topological_sort` the set of changed node ids (the
//! seeds). The sort:
//!
//! 1. Walks outgoing edges from every seed, collecting the strict
//!    descendants (seeds themselves are excluded: their values are already
//!    final for the current pass).
//! 2. Runs Kahn's algorithm restricted to that descendant set, so for every
//!    edge (u -> v) inside the set, u is ordered before v. Edges arriving
//!    from outside the set carry no ordering constraint.
//! 3. Fails with [`Error::CycleDetected`] if any descendant could not be
//!    ordered, which means the descendant set contains a cycle.
//!
//! Excluding seeds is what lets mutually-constraining binding systems
//! (every node both an input and an output of some binding) digest without
//! tripping cycle detection: the cyclic edges always pass through a
//! freshly-written seed, leaving the descendant set acyclic.
//!
//! All node and edge storage is insertion-ordered, so the sort is
//! deterministic for a fixed graph state and tests can assert exact
//! sequences.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use tracing::warn;

use super::node::{Node, NodeId};
use crate::error::Error;

/// Directed dependency graph indexed by node ID.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// All nodes, in first-seen order.
    nodes: IndexMap<NodeId, Node>,
}

impl DependencyGraph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node with no edges if it is not already present.
    ///
    /// Used for nodes that belong to a live binding but have no edges yet
    /// (the output of a zero-input binding).
    pub fn ensure_node(&mut self, node_id: NodeId) {
        self.nodes.entry(node_id).or_default();
    }

    /// Whether the graph currently contains a node.
    pub fn contains(&self, node_id: NodeId) -> bool {
        self.nodes.contains_key(&node_id)
    }

    /// Add a directed edge `from -> to`, creating either endpoint as needed.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.nodes.entry(from).or_default().add_dependent(to);
        self.nodes.entry(to).or_default().add_dependency(from);
    }

    /// Remove the directed edge `from -> to`, if present.
    ///
    /// Endpoints stay in the graph; node removal is a separate, explicit
    /// operation invoked from binding teardown.
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) {
        if let Some(node) = self.nodes.get_mut(&from) {
            node.remove_dependent(to);
        }
        if let Some(node) = self.nodes.get_mut(&to) {
            node.remove_dependency(from);
        }
    }

    /// Number of incoming edges, 0 for absent nodes.
    pub fn indegree(&self, node_id: NodeId) -> usize {
        self.nodes.get(&node_id).map_or(0, Node::indegree)
    }

    /// Number of outgoing edges, 0 for absent nodes.
    pub fn outdegree(&self, node_id: NodeId) -> usize {
        self.nodes.get(&node_id).map_or(0, Node::outdegree)
    }

    /// Remove a node from the graph.
    ///
    /// Only valid once both degrees have reached zero; a node that still
    /// has edges is left in place and `false` is returned.
    pub fn remove_node(&mut self, node_id: NodeId) -> bool {
        match self.nodes.get(&node_id) {
            Some(node) if node.is_isolated() => {
                self.nodes.shift_remove(&node_id);
                true
            }
            Some(_) => {
                warn!(node = %node_id, "refusing to remove node with live edges");
                false
            }
            None => false,
        }
    }

    /// Total number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of edges.
    pub fn edge_count(&self) -> usize {
        self.nodes.values().map(Node::outdegree).sum()
    }

    /// Iterate nodes in first-seen order.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().map(|(id, node)| (*id, node))
    }

    /// Topologically order the strict descendants of `seeds`.
    ///
    /// Seeds absent from the graph are skipped. See the module docs for the
    /// exclusion rule and the determinism guarantee.
    pub fn topological_sort(&self, seeds: &[NodeId]) -> Result<Vec<NodeId>, Error> {
        // Breadth-first reachability over outgoing edges. Seeds are marked
        // visited up front so traversal passes through them without ever
        // emitting them.
        let mut visited: IndexSet<NodeId> = seeds.iter().copied().collect();
        let mut descendants: IndexSet<NodeId> = IndexSet::new();
        let mut frontier: VecDeque<NodeId> = seeds.iter().copied().collect();

        while let Some(id) = frontier.pop_front() {
            if let Some(node) = self.nodes.get(&id) {
                for &dependent in node.dependents() {
                    if visited.insert(dependent) {
                        descendants.insert(dependent);
                        frontier.push_back(dependent);
                    }
                }
            }
        }

        // Kahn's algorithm restricted to the descendant set.
        let mut remaining: IndexMap<NodeId, usize> = IndexMap::with_capacity(descendants.len());
        for &id in &descendants {
            let constrained = self.nodes.get(&id).map_or(0, |node| {
                node.dependencies()
                    .iter()
                    .filter(|dep| descendants.contains(*dep))
                    .count()
            });
            remaining.insert(id, constrained);
        }

        let mut queue: VecDeque<NodeId> = remaining
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&id, _)| id)
            .collect();

        let mut order = Vec::with_capacity(descendants.len());
        while let Some(id) = queue.pop_front() {
            remaining.shift_remove(&id);
            order.push(id);

            if let Some(node) = self.nodes.get(&id) {
                for &dependent in node.dependents() {
                    if let Some(degree) = remaining.get_mut(&dependent) {
                        if *degree > 0 {
                            *degree -= 1;
                            if *degree == 0 {
                                queue.push_back(dependent);
                            }
                        }
                    }
                }
            }
        }

        if let Some((&stuck, _)) = remaining.first() {
            return Err(Error::CycleDetected(stuck));
        }

        Ok(order)
    }
}

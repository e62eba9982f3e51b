//! Dependency Graph
//!
//! This module implements the directed graph that tracks "feeds into"
//! relationships between observable values and computed bindings.
//!
//! # Overview
//!
//! - Nodes are the identifiers of observables and computed bindings.
//! - An edge (u -> v) means u is an input of the binding whose output is v.
//!
//! When an observable changes, the digest engine asks the graph for a
//! topological ordering of the affected subgraph, so that every ancestor of
//! a computed node is fully evaluated before the node itself. This is the
//! property that makes the diamond-dependency case correct: a converging
//! node is evaluated exactly once per pass, always with fully up-to-date
//! inputs, which naive breadth-first propagation does not guarantee.
//!
//! # Design Decisions
//!
//! 1. A centralized graph (rather than per-node linked lists) keeps the
//!    seeded topological sort and cycle detection simple.
//! 2. Storage is `IndexMap`/`IndexSet` so iteration order equals insertion
//!    order, making evaluation order deterministic and testable.
//! 3. Both forward (dependencies) and reverse (dependents) edges are
//!    maintained for O(1) degree queries in either direction.

mod digraph;
mod node;

pub use digraph::DependencyGraph;
pub use node::{Node, NodeId};

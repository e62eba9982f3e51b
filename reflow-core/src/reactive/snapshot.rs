//! Graph Snapshots
//!
//! Read-only, serializable view of the dependency graph for diagnostics
//! and visualization. There is no inverse operation; a snapshot cannot be
//! loaded back into a context.

use serde::Serialize;

/// Plain serializable picture of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    /// Every node currently in the graph, in first-seen order.
    pub nodes: Vec<NodeSnapshot>,

    /// Every "feeds into" edge, grouped by source in node order.
    pub links: Vec<LinkSnapshot>,
}

/// One graph node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    /// The node identifier, rendered as a string.
    pub id: String,

    /// Human-readable label carried verbatim from the property, when set.
    #[serde(rename = "propertyName", skip_serializing_if = "Option::is_none")]
    pub property_name: Option<String>,
}

/// One directed edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSnapshot {
    pub source: String,
    pub target: String,
}

//! Error Taxonomy
//!
//! Fallible operations across the crate return [`Error`]. Each variant maps
//! to one failure surface: bad wiring at bind time, a write through a
//! getter-only view, an unorderable digest subgraph, or use of a binding
//! after teardown.

use thiserror::Error;

use crate::graph::NodeId;

/// Errors produced by binding construction, digest passes, and binding
/// handles.
#[derive(Debug, Error)]
pub enum Error {
    /// A binding was configured with invalid wiring: a property that
    /// belongs to a different context, an output also listed as an input,
    /// or an output already driven by another binding.
    #[error("invalid binding input: {0}")]
    InvalidInput(String),

    /// A value was written through a binding's output view. Computed
    /// outputs are only ever written by evaluation.
    #[error("computed output is not settable")]
    NotASetter,

    /// The affected subgraph contains a dependency cycle that does not
    /// pass through any freshly-changed node, so no evaluation order
    /// exists.
    #[error("dependency cycle detected at node {0}")]
    CycleDetected(NodeId),

    /// The operation targeted a binding that has been destroyed.
    #[error("binding has been destroyed")]
    DestroyedBinding,
}

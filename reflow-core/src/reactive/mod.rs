//! Reactive Primitives
//!
//! This module implements the reactive layer on top of the dependency
//! graph: observable properties, computed bindings, and the context that
//! digests changes through the graph.
//!
//! # Concepts
//!
//! ## Properties
//!
//! A [`Property`] is a mutable value cell with subscribable change
//! notification. Its value is optional: the absent marker is the only
//! state the engine treats as undefined, so `0`, `false`, and empty
//! collections all count as defined.
//!
//! ## Bindings
//!
//! A [`Binding`] declares a computed value: an ordered list of input
//! properties and a pure combining function, optionally writing into a
//! caller-supplied output property. Bindings never recompute on read; they
//! are evaluated by digest passes, in topological dependency order.
//!
//! ## Context and digest
//!
//! A [`ReactiveContext`] owns one independent graph: the identity
//! registry, the dependency graph, and the set of changed nodes. Writing a
//! property that feeds a binding records the change and debounces a digest
//! onto the next frame boundary; [`ReactiveContext::digest`] runs a pass
//! synchronously.
//!
//! # Implementation Notes
//!
//! Dependencies are declared explicitly as the binding's ordered input
//! list, not discovered by tracking reads. Explicit inputs make the graph
//! a static artifact of construction: edges exist from the moment `bind`
//! returns until `destroy`, which is what lets the digest engine
//! topologically order whole subgraphs up front and evaluate each affected
//! binding exactly once per pass.

mod binding;
mod context;
mod frame;
mod property;
mod registry;
mod snapshot;

pub use binding::{Binding, BindingConfig, Callback};
pub use context::ReactiveContext;
pub use frame::{FrameCallback, FrameScheduler, ManualFrameScheduler, TimerFrameScheduler};
pub use property::{ListenerHandle, Property};
pub use snapshot::{GraphSnapshot, LinkSnapshot, NodeSnapshot};

//! Reflow Core
//!
//! This crate implements a reactive dependency-propagation engine: computed
//! values are declared as pure functions of observable values, and whenever
//! an upstream value changes, every downstream computed value is recomputed
//! in a consistent order.
//!
//! Propagation is a topological-sort-based *digest*: each pass orders the
//! affected subgraph so that every ancestor of a computed node is fully
//! evaluated before the node itself, and evaluates each node exactly once.
//! Naive breadth-first propagation can invoke a computation with a mix of
//! old and new ancestor values — the classic failure is a diamond-shaped
//! graph whose converging node briefly observes one fresh and one stale
//! input — and the digest ordering rules that out by construction.
//!
//! # Architecture
//!
//! - `graph`: the directed dependency graph and its seeded topological sort
//! - `reactive`: observable properties, computed bindings, the reactive
//!   context with its changed-set, digest engine, and frame scheduling
//! - `error`: the crate-wide error taxonomy
//!
//! # Example
//!
//! ```rust,ignore
//! use reflow_core::reactive::{BindingConfig, Property, ReactiveContext};
//!
//! let cx = ReactiveContext::new();
//!
//! let first = Property::new("Jane".to_string());
//! let last = Property::new("Smith".to_string());
//! let full = Property::empty();
//!
//! cx.bind(
//!     BindingConfig::new(vec![first.clone(), last.clone()], |v: &[String]| {
//!         format!("{} {}", v[0], v[1])
//!     })
//!     .output(full.clone()),
//! )?;
//!
//! first.set("John".to_string());
//! cx.digest()?;
//! assert_eq!(full.get(), Some("John Smith".to_string()));
//! ```
//!
//! # Concurrency model
//!
//! The engine is logically single-threaded and cooperative: one digest pass
//! at a time, no parallel evaluation of bindings, and the only suspension
//! point is the debounced wait for the next frame/tick boundary. The shared
//! context state is lock-protected solely because the timer scheduler
//! delivers deferred digests from another thread.

pub mod error;
pub mod graph;
pub mod reactive;

pub use error::Error;

//! Reactive Context
//!
//! The context is the central coordinator: it owns the identity registry,
//! the dependency graph, and the changed-set, and it runs the digest. It is
//! an explicit object rather than process-wide state, so independent graphs
//! (one per test, per document, per subsystem) can coexist.
//!
//! # Digest
//!
//! A digest pass:
//!
//! 1. Drains the changed-set atomically under the context lock. Changes
//!    arriving while bindings evaluate land in the set again and are
//!    handled by the *next* pass, never the running one.
//! 2. Topologically orders the strict descendants of the drained seeds.
//! 3. Resolves each ordered id to its binding via the registry (ids that
//!    belong to plain observables are skipped) and evaluates each binding
//!    exactly once, in order.
//!
//! This pass is the only mechanism that advances computed state; there is
//! no recomputation on read.
//!
//! # Scheduling
//!
//! Change listeners call [`queue_digest`]: the first call schedules a
//! digest on the next frame boundary, further calls while one is pending
//! are no-ops, so a burst of synchronous writes collapses into a single
//! pass. The pending flag resets when the deferred callback starts, so
//! changes made during the pass queue the next one. [`digest`] stays
//! available as a synchronous manual trigger.
//!
//! # Failure policy
//!
//! A digest that discovers a cycle aborts before evaluating anything. A
//! combining function that panics mid-pass unwinds out of `digest()`:
//! bindings already evaluated keep their new values, later bindings are
//! not evaluated this pass. Errors inside a *scheduled* digest have no
//! caller to return to; they are logged and re-raised in the scheduler
//! callback rather than swallowed.
//!
//! [`queue_digest`]: ReactiveContext::queue_digest
//! [`digest`]: ReactiveContext::digest

use std::sync::{Arc, Weak};

use indexmap::IndexSet;
use parking_lot::Mutex;
use tracing::{debug, error};

use crate::error::Error;
use crate::graph::{DependencyGraph, NodeId};

use super::binding::{Binding, BindingConfig, BindingInner};
use super::frame::{FrameScheduler, TimerFrameScheduler};
use super::property::Property;
use super::registry::IdentityRegistry;
use super::snapshot::{GraphSnapshot, LinkSnapshot, NodeSnapshot};

/// Lock-protected state shared by the context handle, bindings, and
/// change listeners.
pub(crate) struct ContextInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) registry: IdentityRegistry<T>,
    pub(crate) graph: DependencyGraph,
    pub(crate) changed: IndexSet<NodeId>,

    /// A digest is already scheduled on the next frame boundary.
    digest_queued: bool,

    /// The node the digest engine is currently writing, so that write does
    /// not re-mark the changed-set. Scoped to the one id: changes to any
    /// *other* node made during the write (a user listener on the output,
    /// a concurrent writer) still land in the changed-set for the next
    /// pass.
    pub(crate) suppressed: Option<NodeId>,
}

/// An independent reactive graph: registry, dependency graph, changed-set,
/// and digest engine in one explicit object.
///
/// Cloning produces another handle to the same context. All properties and
/// bindings wired through one context share one graph; a property may not
/// be referenced from two contexts.
pub struct ReactiveContext<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<Mutex<ContextInner<T>>>,
    scheduler: Arc<dyn FrameScheduler>,
}

impl<T> ReactiveContext<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Context backed by the timer-based frame scheduler.
    pub fn new() -> Self {
        Self::with_scheduler(Arc::new(TimerFrameScheduler::new()))
    }

    /// Context backed by an explicit frame scheduler (tests use
    /// [`ManualFrameScheduler`](super::frame::ManualFrameScheduler)).
    pub fn with_scheduler(scheduler: Arc<dyn FrameScheduler>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ContextInner {
                registry: IdentityRegistry::new(),
                graph: DependencyGraph::new(),
                changed: IndexSet::new(),
                digest_queued: false,
                suppressed: None,
            })),
            scheduler,
        }
    }

    /// Construct a computed binding.
    ///
    /// Registers identifiers for the output and every input, adds one edge
    /// per (input, output) pair in input order, subscribes change
    /// listeners, and runs one initial evaluation (a no-op while any input
    /// is absent).
    ///
    /// Fails with [`Error::InvalidInput`] when an input or the output
    /// belongs to a different context, when the output is also listed as
    /// an input, or when another binding already drives the output.
    pub fn bind(&self, config: BindingConfig<T>) -> Result<Binding<T>, Error> {
        let (inputs, output, callback) = config.into_parts();
        let output = output.unwrap_or_else(Property::empty);

        let binding = {
            let mut inner = self.inner.lock();

            // All validation happens before any id is stamped: a failed
            // construction registers nothing.
            for input in &inputs {
                if input.same_cell(&output) {
                    return Err(Error::InvalidInput(
                        "output cannot also be an input of the same binding".into(),
                    ));
                }
                inner.registry.admissible(input)?;
            }
            inner.registry.admissible(&output)?;
            if let Some(id) = output.id() {
                if inner.registry.has_binding(id) {
                    return Err(Error::InvalidInput(format!(
                        "output {id} is already driven by a binding"
                    )));
                }
            }

            let mut input_ids = Vec::with_capacity(inputs.len());
            for input in &inputs {
                input_ids.push(inner.registry.assign(input)?);
            }
            let output_id = inner.registry.assign(&output)?;

            inner.graph.ensure_node(output_id);
            for &input_id in &input_ids {
                inner.graph.add_edge(input_id, output_id);
            }

            let binding = Arc::new(BindingInner::new(
                Arc::downgrade(&self.inner),
                self.scheduler.clone(),
                output_id,
                inputs
                    .iter()
                    .cloned()
                    .zip(input_ids.iter().copied())
                    .collect(),
                output,
                callback,
            ));
            inner.registry.register_binding(output_id, binding.clone())?;
            debug!(binding = %output_id, inputs = input_ids.len(), "binding constructed");
            binding
        };

        // Listener subscription and the initial evaluation run outside the
        // context lock: both can fire listeners that take it.
        binding.subscribe_inputs();
        binding.evaluate(false)?;

        Ok(Binding::from_inner(binding))
    }

    /// One-way synchronization: a one-input identity binding writing
    /// `source`'s value through to `target`.
    pub fn link(&self, source: &Property<T>, target: &Property<T>) -> Result<Binding<T>, Error> {
        let config = BindingConfig::new(vec![source.clone()], |values: &[T]| values[0].clone())
            .output(target.clone());
        self.bind(config)
    }

    /// Run one synchronous digest pass now, bypassing the scheduler.
    pub fn digest(&self) -> Result<(), Error> {
        let plan: Vec<Arc<BindingInner<T>>> = {
            let mut inner = self.inner.lock();
            if inner.changed.is_empty() {
                return Ok(());
            }

            let seeds: Vec<NodeId> = inner.changed.drain(..).collect();
            let order = inner.graph.topological_sort(&seeds)?;
            debug!(seeds = seeds.len(), affected = order.len(), "digest pass");

            order
                .iter()
                .filter_map(|id| inner.registry.lookup_binding(*id).cloned())
                .collect()
        };

        for binding in plan {
            binding.evaluate(true)?;
        }
        Ok(())
    }

    /// Debounced digest request: schedules one digest on the next frame
    /// boundary; no-op while one is already pending.
    pub fn queue_digest(&self) {
        {
            let mut inner = self.inner.lock();
            if inner.digest_queued {
                return;
            }
            inner.digest_queued = true;
        }
        let context = self.clone();
        self.scheduler
            .schedule(Box::new(move || context.run_scheduled()));
    }

    /// Schedule an arbitrary callback on the next frame boundary.
    pub fn next_frame<F>(&self, callback: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.scheduler.schedule(Box::new(callback));
    }

    /// Read-only snapshot of the dependency graph for diagnostics.
    pub fn serialize_graph(&self) -> GraphSnapshot {
        let inner = self.inner.lock();
        let mut nodes = Vec::with_capacity(inner.graph.node_count());
        let mut links = Vec::new();

        for (id, node) in inner.graph.nodes() {
            nodes.push(NodeSnapshot {
                id: id.to_string(),
                property_name: inner
                    .registry
                    .lookup_property(id)
                    .and_then(|property| property.name()),
            });
            for &target in node.dependents() {
                links.push(LinkSnapshot {
                    source: id.to_string(),
                    target: target.to_string(),
                });
            }
        }

        GraphSnapshot { nodes, links }
    }

    /// Number of nodes currently in the graph.
    pub fn node_count(&self) -> usize {
        self.inner.lock().graph.node_count()
    }

    /// Number of edges currently in the graph.
    pub fn edge_count(&self) -> usize {
        self.inner.lock().graph.edge_count()
    }

    /// Number of node identifiers waiting for the next digest.
    pub fn pending_changes(&self) -> usize {
        self.inner.lock().changed.len()
    }

    /// Entry point of the deferred callback: reset the pending flag, then
    /// digest. Failures here have no caller; log and re-raise.
    fn run_scheduled(&self) {
        self.inner.lock().digest_queued = false;
        if let Err(err) = self.digest() {
            error!(error = %err, "scheduled digest failed");
            panic!("scheduled digest failed: {err}");
        }
    }
}

impl<T> Default for ReactiveContext<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for ReactiveContext<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            scheduler: Arc::clone(&self.scheduler),
        }
    }
}

/// Record a changed node and request a digest. Called by the change
/// listeners bindings subscribe on their inputs.
///
/// The one node the digest engine is currently writing is ignored (see
/// `ContextInner::suppressed`); membership is idempotent.
pub(crate) fn mark_changed<T>(
    context: &Weak<Mutex<ContextInner<T>>>,
    scheduler: &Arc<dyn FrameScheduler>,
    id: NodeId,
) where
    T: Clone + Send + Sync + 'static,
{
    let Some(inner) = context.upgrade() else {
        return;
    };

    {
        let mut guard = inner.lock();
        if guard.suppressed == Some(id) {
            return;
        }
        guard.changed.insert(id);
        if guard.digest_queued {
            return;
        }
        guard.digest_queued = true;
    }

    let context = ReactiveContext {
        inner,
        scheduler: scheduler.clone(),
    };
    let deferred = context.clone();
    context
        .scheduler
        .schedule(Box::new(move || deferred.run_scheduled()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::frame::ManualFrameScheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn manual_context<T: Clone + Send + Sync + 'static>(
    ) -> (ReactiveContext<T>, Arc<ManualFrameScheduler>) {
        let scheduler = Arc::new(ManualFrameScheduler::new());
        (
            ReactiveContext::with_scheduler(scheduler.clone()),
            scheduler,
        )
    }

    #[test]
    fn change_marking_is_idempotent() {
        let (cx, _) = manual_context();
        let a = Property::new(0);
        let out = Property::empty();

        cx.bind(BindingConfig::new(vec![a.clone()], |v: &[i32]| v[0]).output(out))
            .unwrap();

        a.set(1);
        a.set(2);
        a.set(3);
        // Three writes to the same input record one changed node.
        assert_eq!(cx.pending_changes(), 1);
    }

    #[test]
    fn digest_clears_the_changed_set() {
        let (cx, _) = manual_context();
        let a = Property::new(0);

        cx.bind(BindingConfig::new(vec![a.clone()], |v: &[i32]| v[0] + 1))
            .unwrap();

        a.set(5);
        assert_eq!(cx.pending_changes(), 1);
        cx.digest().unwrap();
        assert_eq!(cx.pending_changes(), 0);
    }

    #[test]
    fn digest_with_no_changes_is_a_no_op() {
        let (cx, _) = manual_context::<i32>();
        cx.digest().unwrap();
        assert_eq!(cx.node_count(), 0);
    }

    #[test]
    fn queue_digest_debounces() {
        let (cx, scheduler) = manual_context::<i32>();

        cx.queue_digest();
        cx.queue_digest();
        cx.queue_digest();
        assert_eq!(scheduler.pending(), 1);

        assert_eq!(scheduler.fire(), 1);
        // The flag reset during the run permits a new request.
        cx.queue_digest();
        assert_eq!(scheduler.pending(), 1);
    }

    #[test]
    fn side_effect_writes_land_in_the_next_pass() {
        let (cx, _) = manual_context();
        let a = Property::new(0);
        let side = Property::new(0);
        let out = Property::empty();

        let side_clone = side.clone();
        cx.bind(
            BindingConfig::new(vec![a.clone()], move |v: &[i32]| {
                // Impure on purpose: writing another observable mid-pass
                // must be captured for the next digest, not this one.
                side_clone.set(v[0] * 10);
                v[0] + 1
            })
            .output(out),
        )
        .unwrap();
        let observed = Arc::new(AtomicUsize::new(0));
        let observed_clone = observed.clone();
        cx.bind(BindingConfig::new(vec![side.clone()], move |v: &[i32]| {
            observed_clone.fetch_add(1, Ordering::SeqCst);
            v[0]
        }))
        .unwrap();

        let baseline = observed.load(Ordering::SeqCst);
        a.set(4);
        cx.digest().unwrap();

        // The side write was recorded but its dependent did not run yet.
        assert!(cx.pending_changes() > 0);
        assert_eq!(observed.load(Ordering::SeqCst), baseline);

        cx.digest().unwrap();
        assert_eq!(observed.load(Ordering::SeqCst), baseline + 1);
    }

    #[test]
    fn snapshot_carries_property_names() {
        let (cx, _) = manual_context();
        let first = Property::new("a".to_string());
        first.set_name("firstName");
        let full = Property::empty();
        full.set_name("fullName");

        cx.bind(
            BindingConfig::new(vec![first.clone()], |v: &[String]| v[0].clone())
                .output(full.clone()),
        )
        .unwrap();

        let snapshot = cx.serialize_graph();
        let first_id = first.id().unwrap().to_string();
        let full_id = full.id().unwrap().to_string();

        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.links.len(), 1);
        assert_eq!(snapshot.links[0].source, first_id);
        assert_eq!(snapshot.links[0].target, full_id);

        let names: Vec<Option<&str>> = snapshot
            .nodes
            .iter()
            .map(|n| n.property_name.as_deref())
            .collect();
        assert!(names.contains(&Some("firstName")));
        assert!(names.contains(&Some("fullName")));
    }

    #[test]
    fn snapshot_omits_missing_names() {
        let (cx, _) = manual_context();
        let a = Property::new(1);

        cx.bind(BindingConfig::new(vec![a], |v: &[i32]| v[0]))
            .unwrap();

        let snapshot = cx.serialize_graph();
        let value = serde_json::to_value(&snapshot).unwrap();
        for node in value["nodes"].as_array().unwrap() {
            assert!(node.get("propertyName").is_none());
        }
    }

    #[test]
    fn link_synchronizes_one_way() {
        let (cx, _) = manual_context();
        let source = Property::new(1);
        let target = Property::empty();

        cx.link(&source, &target).unwrap();
        assert_eq!(target.get(), Some(1));

        source.set(7);
        cx.digest().unwrap();
        assert_eq!(target.get(), Some(7));

        // The reverse direction is not wired.
        target.set(99);
        cx.digest().unwrap();
        assert_eq!(source.get(), Some(7));
    }
}

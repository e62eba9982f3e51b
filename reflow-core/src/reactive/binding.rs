//! Computed Binding
//!
//! A Binding couples an ordered list of input properties, a pure combining
//! function, and an output property. It is the unit the digest engine
//! evaluates: when every input is defined, the combining function is
//! invoked with the input values in declaration order and the result is
//! written to the output.
//!
//! # Lifecycle
//!
//! Construction (via [`ReactiveContext::bind`]) registers identifiers for
//! the output and all inputs, adds one graph edge per (input, output)
//! pair, subscribes a change listener on every input, and runs one initial
//! evaluation so already-defined inputs produce an output without waiting
//! for a change.
//!
//! The binding lives until [`destroy`] is called; the engine never tears a
//! binding down implicitly, because its listener subscriptions and graph
//! edges would otherwise leak. After `destroy`, every other operation
//! fails with [`Error::DestroyedBinding`].
//!
//! # Direct writes
//!
//! The binding's own output accessor is a getter-only view: [`set`] always
//! fails with [`Error::NotASetter`], preserving the invariant that a
//! computed value is purely a function of its current inputs. A
//! caller-supplied output *property* remains an ordinary observable and
//! keeps its own setter.
//!
//! [`ReactiveContext::bind`]: super::context::ReactiveContext::bind
//! [`destroy`]: Binding::destroy
//! [`set`]: Binding::set

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::error::Error;
use crate::graph::NodeId;

use super::context::{mark_changed, ContextInner};
use super::frame::FrameScheduler;
use super::property::{ListenerHandle, Property};

/// The combining function: receives the input values in declaration order.
pub type Callback<T> = Box<dyn Fn(&[T]) -> T + Send + Sync>;

/// Configuration for constructing a binding.
///
/// # Example
///
/// ```rust,ignore
/// let config = BindingConfig::new(vec![first, last], |values: &[String]| {
///     format!("{} {}", values[0], values[1])
/// })
/// .output(full_name);
/// let binding = context.bind(config)?;
/// ```
pub struct BindingConfig<T>
where
    T: Clone + Send + Sync + 'static,
{
    inputs: Vec<Property<T>>,
    output: Option<Property<T>>,
    callback: Callback<T>,
}

impl<T> BindingConfig<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Configure a binding over `inputs` with the given combining function.
    pub fn new<F>(inputs: Vec<Property<T>>, callback: F) -> Self
    where
        F: Fn(&[T]) -> T + Send + Sync + 'static,
    {
        Self {
            inputs,
            output: None,
            callback: Box::new(callback),
        }
    }

    /// Write results into `output` instead of a synthetic hidden property.
    pub fn output(mut self, output: Property<T>) -> Self {
        self.output = Some(output);
        self
    }

    pub(crate) fn into_parts(self) -> (Vec<Property<T>>, Option<Property<T>>, Callback<T>) {
        (self.inputs, self.output, self.callback)
    }
}

/// State that exists only while the binding is live. `destroy()` takes it,
/// which both releases the input/callback references and serves as the
/// destroyed flag.
struct LiveState<T>
where
    T: Clone + Send + Sync + 'static,
{
    inputs: Vec<(Property<T>, NodeId)>,
    output: Property<T>,
    callback: Callback<T>,
    subscriptions: Vec<(Property<T>, ListenerHandle)>,
}

/// Shared core of a binding; held by the handle and by the registry.
pub(crate) struct BindingInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    context: Weak<Mutex<ContextInner<T>>>,
    scheduler: Arc<dyn FrameScheduler>,
    output_id: NodeId,
    live: Mutex<Option<LiveState<T>>>,
}

impl<T> BindingInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(
        context: Weak<Mutex<ContextInner<T>>>,
        scheduler: Arc<dyn FrameScheduler>,
        output_id: NodeId,
        inputs: Vec<(Property<T>, NodeId)>,
        output: Property<T>,
        callback: Callback<T>,
    ) -> Self {
        Self {
            context,
            scheduler,
            output_id,
            live: Mutex::new(Some(LiveState {
                inputs,
                output,
                callback,
                subscriptions: Vec::new(),
            })),
        }
    }

    pub(crate) fn output_id(&self) -> NodeId {
        self.output_id
    }

    /// Subscribe the change listener on every input. Each listener adds
    /// the input's identifier to the changed-set and queues a digest.
    pub(crate) fn subscribe_inputs(&self) {
        let mut live = self.live.lock();
        let Some(state) = live.as_mut() else { return };

        let pairs: Vec<(Property<T>, NodeId)> = state.inputs.clone();
        for (input, input_id) in pairs {
            let context = self.context.clone();
            let scheduler = self.scheduler.clone();
            let handle = input.on(move |_| {
                mark_changed(&context, &scheduler, input_id);
            });
            state.subscriptions.push((input, handle));
        }
    }

    /// Evaluate once. Skips entirely (no write, no error) while any input
    /// is still absent.
    ///
    /// `silent` keeps the output write from re-marking the changed-set:
    /// the digest engine uses it because every downstream node is already
    /// part of the sorted pass, and re-marking would break digest
    /// idempotence. Suppression covers only the output id; writes to other
    /// observables made by listeners during the notification still land in
    /// the changed-set for the next pass. Non-silent writes (construction,
    /// manual evaluation) notify normally so pre-existing downstream
    /// bindings get scheduled.
    pub(crate) fn evaluate(&self, silent: bool) -> Result<(), Error> {
        let live = self.live.lock();
        let state = live.as_ref().ok_or(Error::DestroyedBinding)?;

        let mut values: SmallVec<[T; 4]> = SmallVec::with_capacity(state.inputs.len());
        for (input, input_id) in &state.inputs {
            match input.get() {
                Some(value) => values.push(value),
                None => {
                    trace!(binding = %self.output_id, input = %input_id, "skipping evaluation, input undefined");
                    return Ok(());
                }
            }
        }

        let result = (state.callback)(&values);
        trace!(binding = %self.output_id, silent, "evaluated");

        if silent {
            self.set_suppressed(Some(self.output_id));
            state.output.set(result);
            self.set_suppressed(None);
        } else {
            state.output.set(result);
        }
        Ok(())
    }

    /// Read the output value.
    pub(crate) fn value(&self) -> Result<Option<T>, Error> {
        let live = self.live.lock();
        let state = live.as_ref().ok_or(Error::DestroyedBinding)?;
        Ok(state.output.get())
    }

    pub(crate) fn is_destroyed(&self) -> bool {
        self.live.lock().is_none()
    }

    /// Tear the binding down: unsubscribe every listener, remove every
    /// edge added at construction, drop nodes whose degree reached zero
    /// (unless a live binding still owns them), and delete the registry
    /// entries. Idempotent; the second call is a no-op.
    pub(crate) fn destroy(&self) {
        let Some(state) = self.live.lock().take() else {
            return;
        };

        for (input, handle) in &state.subscriptions {
            input.off(*handle);
        }

        let Some(context) = self.context.upgrade() else {
            return;
        };
        let mut inner = context.lock();

        for (_, input_id) in &state.inputs {
            inner.graph.remove_edge(*input_id, self.output_id);
        }
        inner.registry.remove_binding(self.output_id);

        let mut touched: Vec<NodeId> = state.inputs.iter().map(|(_, id)| *id).collect();
        touched.push(self.output_id);
        for id in touched {
            let isolated = inner.graph.indegree(id) == 0 && inner.graph.outdegree(id) == 0;
            if isolated && inner.graph.contains(id) && !inner.registry.has_binding(id) {
                inner.graph.remove_node(id);
                inner.registry.remove_property(id);
                inner.changed.shift_remove(&id);
            }
        }

        debug!(binding = %self.output_id, "binding destroyed");
    }

    fn set_suppressed(&self, node: Option<NodeId>) {
        if let Some(context) = self.context.upgrade() {
            context.lock().suppressed = node;
        }
    }
}

/// Handle to a live computed binding.
///
/// Cloning produces another handle to the same binding.
pub struct Binding<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<BindingInner<T>>,
}

impl<T> Binding<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn from_inner(inner: Arc<BindingInner<T>>) -> Self {
        Self { inner }
    }

    /// The node identifier of the binding's output.
    pub fn id(&self) -> NodeId {
        self.inner.output_id()
    }

    /// Re-run the combining function now, outside any digest.
    ///
    /// Follows the same defined-ness gating as a digest evaluation; the
    /// resulting write notifies listeners so downstream bindings get
    /// scheduled.
    pub fn evaluate(&self) -> Result<(), Error> {
        self.inner.evaluate(false)
    }

    /// Read the current output value.
    pub fn get(&self) -> Result<Option<T>, Error> {
        self.inner.value()
    }

    /// Getter-only view: always fails with [`Error::NotASetter`] and
    /// leaves the stored value unchanged. Computed outputs are only ever
    /// written by evaluation.
    pub fn set(&self, _value: T) -> Result<(), Error> {
        Err(Error::NotASetter)
    }

    /// Tear the binding down. See the module docs; idempotent.
    pub fn destroy(&self) {
        self.inner.destroy();
    }

    /// True once `destroy()` has run.
    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }
}

impl<T> Clone for Binding<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Binding<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binding")
            .field("id", &self.id())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::context::ReactiveContext;
    use crate::reactive::frame::ManualFrameScheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn test_context<T: Clone + Send + Sync + 'static>() -> ReactiveContext<T> {
        ReactiveContext::with_scheduler(Arc::new(ManualFrameScheduler::new()))
    }

    #[test]
    fn construction_evaluates_defined_inputs() {
        let cx = test_context();
        let a = Property::new(2);
        let b = Property::new(3);
        let sum = Property::empty();

        let binding = cx
            .bind(BindingConfig::new(vec![a, b], |v: &[i32]| v[0] + v[1]).output(sum.clone()))
            .unwrap();

        assert_eq!(sum.get(), Some(5));
        assert_eq!(binding.get().unwrap(), Some(5));
    }

    #[test]
    fn undefined_input_gates_evaluation() {
        let cx = test_context();
        let a = Property::new(2);
        let b: Property<i32> = Property::empty();
        let out = Property::empty();
        let calls = Arc::new(AtomicUsize::new(0));

        let calls_clone = calls.clone();
        cx.bind(
            BindingConfig::new(vec![a, b.clone()], move |v: &[i32]| {
                calls_clone.fetch_add(1, Ordering::SeqCst);
                v[0] + v[1]
            })
            .output(out.clone()),
        )
        .unwrap();

        // One undefined input: no invocation, no write.
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(out.get(), None);

        b.set(4);
        cx.digest().unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(out.get(), Some(6));
    }

    #[test]
    fn direct_write_is_rejected() {
        let cx = test_context();
        let a = Property::new(1);
        let out = Property::empty();

        let binding = cx
            .bind(BindingConfig::new(vec![a], |v: &[i32]| v[0] * 10).output(out))
            .unwrap();

        assert_eq!(binding.get().unwrap(), Some(10));
        assert!(matches!(binding.set(99), Err(Error::NotASetter)));
        // Stored value unchanged.
        assert_eq!(binding.get().unwrap(), Some(10));
    }

    #[test]
    fn synthetic_output_gives_graph_identity() {
        let cx = test_context();
        let a = Property::new(1);

        let binding = cx
            .bind(BindingConfig::new(vec![a.clone()], |v: &[i32]| v[0]))
            .unwrap();

        // Two nodes: the input and the synthesized output.
        assert_eq!(cx.node_count(), 2);
        assert_ne!(Some(binding.id()), a.id());
        assert_eq!(binding.get().unwrap(), Some(1));
    }

    #[test]
    fn destroyed_binding_rejects_operations() {
        let cx = test_context();
        let a = Property::new(1);

        let binding = cx
            .bind(BindingConfig::new(vec![a], |v: &[i32]| v[0]))
            .unwrap();

        binding.destroy();
        assert!(binding.is_destroyed());
        assert!(matches!(binding.evaluate(), Err(Error::DestroyedBinding)));
        assert!(matches!(binding.get(), Err(Error::DestroyedBinding)));

        // Second destroy is a no-op.
        binding.destroy();
    }

    #[test]
    fn destroy_removes_edges_nodes_and_listeners() {
        let cx = test_context();
        let a = Property::new(1);
        let out = Property::empty();

        let binding = cx
            .bind(BindingConfig::new(vec![a.clone()], |v: &[i32]| v[0]).output(out))
            .unwrap();

        assert_eq!(cx.edge_count(), 1);
        assert_eq!(a.listener_count(), 1);

        binding.destroy();

        assert_eq!(cx.edge_count(), 0);
        assert_eq!(cx.node_count(), 0);
        assert_eq!(a.listener_count(), 0);
    }

    #[test]
    fn destroy_keeps_nodes_shared_with_live_bindings() {
        let cx = test_context();
        let a = Property::new(1);

        let first = cx
            .bind(BindingConfig::new(vec![a.clone()], |v: &[i32]| v[0]))
            .unwrap();
        let second = cx
            .bind(BindingConfig::new(vec![a.clone()], |v: &[i32]| v[0] * 2))
            .unwrap();

        first.destroy();

        // The shared input still feeds the second binding.
        let a_id = a.id().unwrap();
        assert_eq!(cx.edge_count(), 1);
        assert!(cx.serialize_graph().nodes.iter().any(|n| n.id == a_id.to_string()));

        second.destroy();
        assert_eq!(cx.node_count(), 0);
    }

    #[test]
    fn output_listed_as_input_is_rejected() {
        let cx = test_context();
        let a = Property::new(1);

        let err = cx
            .bind(BindingConfig::new(vec![a.clone()], |v: &[i32]| v[0]).output(a))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn double_driving_an_output_is_rejected() {
        let cx = test_context();
        let a = Property::new(1);
        let b = Property::new(2);
        let out = Property::empty();

        cx.bind(BindingConfig::new(vec![a], |v: &[i32]| v[0]).output(out.clone()))
            .unwrap();
        let err = cx
            .bind(BindingConfig::new(vec![b], |v: &[i32]| v[0]).output(out))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn failed_bind_registers_nothing() {
        let cx = test_context();
        let other = test_context();

        let foreign = Property::new(2);
        other
            .bind(BindingConfig::new(vec![foreign.clone()], |v: &[i32]| v[0]))
            .unwrap();

        let a = Property::new(1);
        let out = Property::empty();
        let err = cx
            .bind(
                BindingConfig::new(vec![a.clone(), foreign], |v: &[i32]| v[0] + v[1])
                    .output(out.clone()),
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));

        // The earlier input and the output were never stamped or wired.
        assert_eq!(a.id(), None);
        assert_eq!(out.id(), None);
        assert_eq!(cx.node_count(), 0);
        assert_eq!(a.listener_count(), 0);
    }

    #[test]
    fn foreign_input_is_rejected() {
        let home = test_context();
        let away = test_context();

        let foreign = Property::new(1);
        home.bind(BindingConfig::new(vec![foreign.clone()], |v: &[i32]| v[0]))
            .unwrap();

        let err = away
            .bind(BindingConfig::new(vec![foreign], |v: &[i32]| v[0]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}

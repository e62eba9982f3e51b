//! Observable Property
//!
//! A Property is the mutable value cell the engine propagates between. It
//! holds an optional value, a change-listener table, and the node identity
//! assigned by the registry of whichever context first sees it.
//!
//! # Defined-ness
//!
//! The stored value is `Option<T>`; `None` is the absent marker and the
//! only value the engine treats as undefined. `0`, `false`, empty strings
//! and empty collections are all ordinary defined values. A binding whose
//! inputs are not all defined skips evaluation for that pass.
//!
//! # Identity
//!
//! Properties are not created by a context; they are external collaborators
//! the core refers to by identifier. The identity slot is a side table
//! entry written exactly once by an [`IdentityRegistry`] the first time a
//! binding references the property, so externally-owned values are never
//! mutated beyond this crate's own handle state.
//!
//! [`IdentityRegistry`]: super::registry::IdentityRegistry

use std::fmt::Debug;
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, RwLock};

use crate::graph::NodeId;

/// Subscription handle returned by [`Property::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerHandle(u64);

/// Identity stamped by the first registry that sees the cell: the issuing
/// registry's token plus the node id it allocated. The token is what tells
/// a property from another context apart from a local one, since every
/// context numbers its nodes from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellIdentity {
    pub(crate) context: u64,
    pub(crate) id: NodeId,
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct ListenerTable<T> {
    next_handle: u64,
    entries: Vec<(ListenerHandle, Listener<T>)>,
}

impl<T> ListenerTable<T> {
    fn new() -> Self {
        Self {
            next_handle: 0,
            entries: Vec::new(),
        }
    }
}

struct PropertyInner<T> {
    /// Node identity, written once by the registry that first sees us.
    identity: OnceLock<CellIdentity>,

    /// Optional human-readable label, carried into graph snapshots.
    name: RwLock<Option<String>>,

    /// The current value; `None` is the absent marker.
    value: RwLock<Option<T>>,

    /// Change listeners, fired on every write.
    listeners: Mutex<ListenerTable<T>>,
}

/// A mutable observable value with subscribable change notification.
///
/// Cloning a `Property` produces another handle to the same cell.
///
/// # Example
///
/// ```rust,ignore
/// let first = Property::new("Jane".to_string());
/// first.set("John".to_string());
/// assert_eq!(first.get(), Some("John".to_string()));
/// ```
pub struct Property<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<PropertyInner<T>>,
}

impl<T> Property<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a property holding an initial value.
    pub fn new(value: T) -> Self {
        Self::build(Some(value))
    }

    /// Create a property with no value yet (the absent marker).
    pub fn empty() -> Self {
        Self::build(None)
    }

    fn build(value: Option<T>) -> Self {
        Self {
            inner: Arc::new(PropertyInner {
                identity: OnceLock::new(),
                name: RwLock::new(None),
                value: RwLock::new(value),
                listeners: Mutex::new(ListenerTable::new()),
            }),
        }
    }

    /// The node identity, once a context has assigned one.
    pub fn id(&self) -> Option<NodeId> {
        self.inner.identity.get().map(|identity| identity.id)
    }

    /// The full identity, including the issuing registry's token.
    pub(crate) fn identity(&self) -> Option<CellIdentity> {
        self.inner.identity.get().copied()
    }

    /// Write the identity slot. Returns false if an identity was already
    /// assigned (the slot is write-once).
    pub(crate) fn bind_identity(&self, context: u64, id: NodeId) -> bool {
        self.inner.identity.set(CellIdentity { context, id }).is_ok()
    }

    /// Whether two handles refer to the same underlying cell.
    pub(crate) fn same_cell(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Attach a human-readable name, carried into graph snapshots as
    /// `propertyName`.
    pub fn set_name(&self, name: impl Into<String>) {
        *self.inner.name.write() = Some(name.into());
    }

    /// The attached name, if any.
    pub fn name(&self) -> Option<String> {
        self.inner.name.read().clone()
    }

    /// Get the current value, or `None` while the property is absent.
    pub fn get(&self) -> Option<T> {
        self.inner.value.read().clone()
    }

    /// True once the property holds a value.
    pub fn is_defined(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Set a new value and fire all subscribed listeners with it.
    pub fn set(&self, value: T) {
        {
            let mut guard = self.inner.value.write();
            *guard = Some(value.clone());
        }
        self.notify(&value);
    }

    /// Subscribe a change listener; returns the handle needed to remove it.
    pub fn on<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut table = self.inner.listeners.lock();
        let handle = ListenerHandle(table.next_handle);
        table.next_handle += 1;
        table.entries.push((handle, Arc::new(listener)));
        handle
    }

    /// Remove a previously subscribed listener.
    pub fn off(&self, handle: ListenerHandle) {
        let mut table = self.inner.listeners.lock();
        table.entries.retain(|(h, _)| *h != handle);
    }

    /// Number of subscribed listeners.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.lock().entries.len()
    }

    fn notify(&self, value: &T) {
        // Snapshot under the lock and invoke outside it: a listener may
        // call `on`/`off` on this same property. A listener removed by
        // another listener still sees the notification it was snapshotted
        // into.
        let snapshot: Vec<Listener<T>> = {
            let table = self.inner.listeners.lock();
            table
                .entries
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in snapshot {
            listener(value);
        }
    }
}

impl<T> Clone for Property<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Property<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Property")
            .field("id", &self.id())
            .field("name", &self.name())
            .field("value", &self.get())
            .field("listener_count", &self.listener_count())
            .finish()
    }
}

//! Identity Registry
//!
//! Assigns each property or computed binding a stable node identifier the
//! first time it is seen, and keeps the reverse lookup the digest engine
//! uses to map ordered node ids back to the entities they belong to.
//!
//! Identifiers come from a per-context monotonically increasing counter
//! starting at 1; an entity that already carries one is never reassigned.
//! Because every registry numbers from 1, an id alone cannot tell a local
//! property from a foreign one, so the identity a registry stamps also
//! carries a process-unique registry token and ownership is checked against
//! the token, never the id.
//!
//! The registry is a side table: external observables are never mutated
//! beyond their write-once identity slot. Entries are removed explicitly
//! during binding teardown, when the corresponding graph node loses its
//! last edge, so the table cannot grow without bound across
//! construct/destroy cycles.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::Error;
use crate::graph::NodeId;

use super::binding::BindingInner;
use super::property::Property;

/// Source of process-unique registry tokens.
static NEXT_REGISTRY_TOKEN: AtomicU64 = AtomicU64::new(1);

pub(crate) struct IdentityRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Process-unique token stamped into every identity this registry
    /// issues.
    token: u64,

    /// Next identifier to allocate. Starts at 1.
    next_id: u64,

    /// Properties indexed by their assigned identifier.
    properties: HashMap<NodeId, Property<T>>,

    /// Live bindings indexed by their output node identifier.
    bindings: HashMap<NodeId, Arc<BindingInner<T>>>,
}

impl<T> IdentityRegistry<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new() -> Self {
        Self {
            token: NEXT_REGISTRY_TOKEN.fetch_add(1, Ordering::Relaxed),
            next_id: 1,
            properties: HashMap::new(),
            bindings: HashMap::new(),
        }
    }

    /// Check that a property either carries no identity yet or one this
    /// registry stamped. Rejects foreign properties without assigning
    /// anything.
    pub(crate) fn admissible(&self, property: &Property<T>) -> Result<(), Error> {
        match property.identity() {
            Some(identity) if identity.context != self.token => Err(Error::InvalidInput(format!(
                "property {} belongs to a different context",
                identity.id
            ))),
            _ => Ok(()),
        }
    }

    /// Assign an identifier to a property, or return the one it already
    /// carries.
    ///
    /// A property stamped by a different registry is rejected with
    /// [`Error::InvalidInput`], even when its id collides with one issued
    /// here. A property this registry stamped whose entry was removed
    /// during teardown is re-admitted under its original id.
    pub(crate) fn assign(&mut self, property: &Property<T>) -> Result<NodeId, Error> {
        if let Some(identity) = property.identity() {
            if identity.context != self.token {
                return Err(Error::InvalidInput(format!(
                    "property {} belongs to a different context",
                    identity.id
                )));
            }
            self.properties
                .entry(identity.id)
                .or_insert_with(|| property.clone());
            return Ok(identity.id);
        }

        let id = NodeId::from(self.next_id);
        self.next_id += 1;
        // The slot is empty (checked above) and we hold the context lock,
        // so the write cannot race another assignment.
        property.bind_identity(self.token, id);
        self.properties.insert(id, property.clone());
        Ok(id)
    }

    /// Look up the property registered under an identifier.
    pub(crate) fn lookup_property(&self, id: NodeId) -> Option<&Property<T>> {
        self.properties.get(&id)
    }

    /// Look up the binding whose output carries an identifier.
    pub(crate) fn lookup_binding(&self, id: NodeId) -> Option<&Arc<BindingInner<T>>> {
        self.bindings.get(&id)
    }

    /// Whether a live binding drives the node.
    pub(crate) fn has_binding(&self, id: NodeId) -> bool {
        self.bindings.contains_key(&id)
    }

    /// Index a binding under its output identifier.
    ///
    /// Two bindings may not drive the same output.
    pub(crate) fn register_binding(
        &mut self,
        output_id: NodeId,
        binding: Arc<BindingInner<T>>,
    ) -> Result<(), Error> {
        if self.bindings.contains_key(&output_id) {
            return Err(Error::InvalidInput(format!(
                "output {output_id} is already driven by a binding"
            )));
        }
        self.bindings.insert(output_id, binding);
        Ok(())
    }

    /// Drop the binding entry for an output identifier.
    pub(crate) fn remove_binding(&mut self, output_id: NodeId) {
        self.bindings.remove(&output_id);
    }

    /// Drop the property entry for an identifier. The property keeps its
    /// stamped identity and can be re-admitted by a later `assign`.
    pub(crate) fn remove_property(&mut self, id: NodeId) {
        self.properties.remove(&id);
    }
}

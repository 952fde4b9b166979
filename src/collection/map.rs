//! EntityMap - Per-entity values bound to entity lifetimes.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use super::{EntityCollection, TrackOutcome};
use crate::error::LifecycleError;
use crate::tree::HostRef;
use crate::types::EntityId;

/// Map from entity to `V`.
///
/// When an entity leaves the tree (or is removed explicitly) its entry goes
/// first, then any cleanup added with [`attach_cleanup`](Self::attach_cleanup).
pub struct EntityMap<V> {
    collection: EntityCollection,
    values: Rc<RefCell<IndexMap<EntityId, V>>>,
}

impl<V: 'static> EntityMap<V> {
    pub fn new(host: HostRef) -> Self {
        Self {
            collection: EntityCollection::new(host),
            values: Rc::new(RefCell::new(IndexMap::new())),
        }
    }

    /// Set the value for `entity`.
    ///
    /// Returns the previous value, or `Err(value)` if the entity is dead and
    /// nothing was stored.
    pub fn insert(&self, entity: EntityId, value: V) -> Result<Option<V>, V> {
        if let Some(slot) = self.values.borrow_mut().get_mut(&entity) {
            return Ok(Some(std::mem::replace(slot, value)));
        }

        let values = Rc::downgrade(&self.values);
        let outcome = self.collection.track(entity, move || {
            if let Some(values) = values.upgrade() {
                let removed = values.borrow_mut().shift_remove(&entity);
                drop(removed);
            }
        });

        match outcome {
            TrackOutcome::Tracked | TrackOutcome::AlreadyTracked => {
                self.values.borrow_mut().insert(entity, value);
                Ok(None)
            }
            TrackOutcome::Rejected => Err(value),
        }
    }

    pub fn get(&self, entity: EntityId) -> Option<V>
    where
        V: Clone,
    {
        self.values.borrow().get(&entity).cloned()
    }

    /// Borrow the value for `entity`. `f` must not modify this map.
    pub fn with<R>(&self, entity: EntityId, f: impl FnOnce(&V) -> R) -> Option<R> {
        self.values.borrow().get(&entity).map(f)
    }

    pub fn contains_key(&self, entity: EntityId) -> bool {
        self.values.borrow().contains_key(&entity)
    }

    /// Remove `entity`'s entry and run its attached cleanup.
    pub fn remove(&self, entity: EntityId) -> Result<bool, LifecycleError> {
        self.collection.untrack(entity)
    }

    pub fn keys(&self) -> Vec<EntityId> {
        self.values.borrow().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }

    pub fn attach_cleanup(&self, entity: EntityId, cleanup: impl FnOnce() + 'static) -> bool {
        self.collection.attach_cleanup(entity, cleanup)
    }

    pub fn clear(&self) -> Result<(), LifecycleError> {
        self.collection.untrack_all()
    }

    pub fn collection(&self) -> &EntityCollection {
        &self.collection
    }
}

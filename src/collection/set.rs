//! EntitySet - Reactive membership bound to entity lifetimes.
//!
//! Membership lives in a `ReactiveSet`, so deriveds and effects that read
//! [`EntitySet::members`] or [`EntitySet::contains`] re-run when entities
//! join or drop out.

use std::cell::RefCell;
use std::rc::Rc;

use spark_signals::ReactiveSet;

use super::{EntityCollection, TrackOutcome};
use crate::error::LifecycleError;
use crate::tree::HostRef;
use crate::types::EntityId;

pub struct EntitySet {
    collection: EntityCollection,
    members: Rc<RefCell<ReactiveSet<EntityId>>>,
}

impl EntitySet {
    pub fn new(host: HostRef) -> Self {
        Self {
            collection: EntityCollection::new(host),
            members: Rc::new(RefCell::new(ReactiveSet::new())),
        }
    }

    /// Add `entity`. Returns `false` if it was already a member or is dead.
    pub fn insert(&self, entity: EntityId) -> bool {
        if self.contains(entity) {
            return false;
        }

        let members = Rc::downgrade(&self.members);
        let outcome = self.collection.track(entity, move || {
            if let Some(members) = members.upgrade() {
                members.borrow_mut().remove(&entity);
            }
        });

        match outcome {
            TrackOutcome::Tracked | TrackOutcome::AlreadyTracked => {
                self.members.borrow_mut().insert(entity);
                true
            }
            TrackOutcome::Rejected => false,
        }
    }

    /// Remove `entity`, running everything attached to it.
    pub fn remove(&self, entity: EntityId) -> Result<bool, LifecycleError> {
        self.collection.untrack(entity)
    }

    pub fn contains(&self, entity: EntityId) -> bool {
        self.members.borrow().contains(&entity)
    }

    /// Current members, in no particular order. Reactive when read inside a
    /// derived or effect.
    pub fn members(&self) -> Vec<EntityId> {
        self.members.borrow().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }

    /// Extra cleanup for a member, run when it leaves the set.
    pub fn attach_cleanup(&self, entity: EntityId, cleanup: impl FnOnce() + 'static) -> bool {
        self.collection.attach_cleanup(entity, cleanup)
    }

    /// Remove every member.
    pub fn clear(&self) -> Result<(), LifecycleError> {
        self.collection.untrack_all()
    }

    pub fn collection(&self) -> &EntityCollection {
        &self.collection
    }
}

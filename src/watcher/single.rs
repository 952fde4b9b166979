//! SingleEntityWatcher - The entity in one named slot of a parent.
//!
//! Same state machine as [`ChildWatcher`]; "match" means the child sits in
//! the slot (carries the slot name), whatever its class. Typical use is a
//! parent's active representative, e.g. a player's current avatar.

use spark_signals::Signal;

use super::child::ChildWatcher;
use super::matcher::SlotMatcher;
use super::Occurrence;
use crate::error::LifecycleError;
use crate::events::Subscription;
use crate::tree::HostRef;
use crate::types::{EntityId, WatchOptions};

pub struct SingleEntityWatcher {
    inner: ChildWatcher<SlotMatcher>,
}

impl SingleEntityWatcher {
    pub fn new(host: HostRef, parent: EntityId, slot: &str, options: WatchOptions) -> Self {
        Self {
            inner: ChildWatcher::with_matcher(host, parent, SlotMatcher::new(slot), options),
        }
    }

    pub fn watch(&self) -> Result<(), LifecycleError> {
        self.inner.watch()
    }

    pub fn set_watched_parent(&self, parent: EntityId) -> Result<(), LifecycleError> {
        self.inner.set_watched_parent(parent)
    }

    pub fn on_added(&self, listener: impl Fn(&Occurrence) + 'static) -> Subscription {
        self.inner.on_added(listener)
    }

    pub fn on_removed(&self, listener: impl Fn(&EntityId) + 'static) -> Subscription {
        self.inner.on_removed(listener)
    }

    pub fn current(&self) -> Option<EntityId> {
        self.inner.current()
    }

    pub fn current_signal(&self) -> Signal<Option<EntityId>> {
        self.inner.current_signal()
    }

    pub fn clear_current(&self) -> Result<(), LifecycleError> {
        self.inner.clear_current()
    }

    pub fn destroy(&self) -> Result<(), LifecycleError> {
        self.inner.destroy()
    }

    pub fn parent(&self) -> EntityId {
        self.inner.parent()
    }

    pub fn slot(&self) -> &str {
        self.inner.matcher().name()
    }

    pub fn is_watching(&self) -> bool {
        self.inner.is_watching()
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.is_destroyed()
    }
}

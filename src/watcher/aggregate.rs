//! AggregateWatcher - One slot watcher per member of a changing parent set.
//!
//! Each member gets its own [`SingleEntityWatcher`]. Its events are re-fired
//! from the aggregate tagged with the member they came from. A member that
//! leaves the set has its watcher destroyed (its open occurrence is
//! abandoned, so no removal is reported for it).

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::single::SingleEntityWatcher;
use super::Occurrence;
use crate::disposer::DisposerList;
use crate::error::LifecycleError;
use crate::events::{Event, Subscription};
use crate::tree::{ChildrenOf, HostRef, MemberSet};
use crate::types::{EntityId, WatchOptions, WatcherFlags};

/// An occurrence reported by one member's watcher.
#[derive(Clone, Debug)]
pub struct MemberOccurrence {
    pub member: EntityId,
    pub occurrence: Occurrence,
}

/// A child leaving one member's slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberRemoval {
    pub member: EntityId,
    pub child: EntityId,
}

struct MemberEntry {
    watcher: Rc<SingleEntityWatcher>,
    /// Forwarding subscriptions on `watcher`.
    forwards: DisposerList,
}

impl MemberEntry {
    fn teardown(self) -> Vec<LifecycleError> {
        let mut errors = Vec::new();
        if let Err(error) = self.forwards.release() {
            errors.push(error);
        }
        if let Err(error) = self.watcher.destroy() {
            errors.push(error);
        }
        errors
    }
}

struct AggregateCore<S> {
    host: HostRef,
    members: S,
    slot: String,
    options: WatchOptions,
    flags: Cell<WatcherFlags>,
    /// Join/leave subscriptions on the member set.
    connections: DisposerList,
    watchers: RefCell<IndexMap<EntityId, MemberEntry>>,
    added: Event<MemberOccurrence>,
    removed: Event<MemberRemoval>,
}

impl<S: MemberSet + 'static> AggregateCore<S> {
    fn has(&self, flag: WatcherFlags) -> bool {
        self.flags.get().contains(flag)
    }

    fn set_flag(&self, flag: WatcherFlags, value: bool) {
        let mut flags = self.flags.get();
        flags.set(flag, value);
        self.flags.set(flags);
    }

    fn watch(this: &Rc<Self>) -> Result<(), LifecycleError> {
        if this.has(WatcherFlags::DESTROYED) {
            tracing::error!(slot = %this.slot, "watch() called on a destroyed aggregate watcher");
            return Err(LifecycleError::WatcherDestroyed);
        }
        if this.has(WatcherFlags::WATCHING) {
            return Ok(());
        }
        this.set_flag(WatcherFlags::WATCHING, true);

        let weak = Rc::downgrade(this);
        this.connections.add_disposable(this.members.on_joined(Box::new(move |member: &EntityId| {
            if let Some(core) = weak.upgrade() {
                Self::register(&core, *member);
            }
        })));
        let weak = Rc::downgrade(this);
        this.connections.add_disposable(this.members.on_left(Box::new(move |member: &EntityId| {
            if let Some(core) = weak.upgrade() {
                Self::deregister(&core, *member);
            }
        })));
        tracing::debug!(slot = %this.slot, "aggregate watcher started");

        for member in this.members.members() {
            Self::register(this, member);
        }
        Ok(())
    }

    /// Create and start the watcher for `member`. No-op if it has one or
    /// is no longer in the set.
    fn register(this: &Rc<Self>, member: EntityId) {
        if !this.has(WatcherFlags::WATCHING) || this.watchers.borrow().contains_key(&member) {
            return;
        }
        // The initial pass works from a snapshot; earlier registrations can
        // fire listeners that remove later members
        if !this.members.members().contains(&member) {
            tracing::trace!(member = %member, "skipping member that already left");
            return;
        }

        let watcher = Rc::new(SingleEntityWatcher::new(this.host.clone(), member, &this.slot, this.options));
        let forwards = DisposerList::new();
        let weak: Weak<Self> = Rc::downgrade(this);
        forwards.add_disposable(watcher.on_added(move |occurrence: &Occurrence| {
            if let Some(core) = weak.upgrade() {
                core.added.emit(&MemberOccurrence { member, occurrence: occurrence.clone() });
            }
        }));
        let weak: Weak<Self> = Rc::downgrade(this);
        forwards.add_disposable(watcher.on_removed(move |child: &EntityId| {
            if let Some(core) = weak.upgrade() {
                core.removed.emit(&MemberRemoval { member, child: *child });
            }
        }));

        // Inserted before starting: listeners may react to the first
        // occurrence by touching this map
        this.watchers
            .borrow_mut()
            .insert(member, MemberEntry { watcher: watcher.clone(), forwards });
        tracing::debug!(member = %member, slot = %this.slot, "member registered");

        if let Err(error) = watcher.watch() {
            tracing::error!(member = %member, %error, "member watcher failed to start");
        }
    }

    fn deregister(this: &Rc<Self>, member: EntityId) {
        let Some(entry) = this.watchers.borrow_mut().shift_remove(&member) else { return };
        tracing::debug!(member = %member, slot = %this.slot, "member deregistered");
        for error in entry.teardown() {
            tracing::error!(member = %member, %error, "member watcher cleanup failed");
        }
    }
}

// =============================================================================
// AggregateWatcher
// =============================================================================

/// Watches one named slot on every member of `S`, current and future.
///
/// Dropping the watcher destroys it.
pub struct AggregateWatcher<S: MemberSet + 'static = ChildrenOf> {
    core: Rc<AggregateCore<S>>,
}

impl AggregateWatcher<ChildrenOf> {
    /// Members are the children of `container`.
    pub fn over_children(host: HostRef, container: EntityId, slot: &str, options: WatchOptions) -> Self {
        let members = ChildrenOf::new(host.clone(), container);
        Self::new(host, members, slot, options)
    }
}

impl<S: MemberSet + 'static> AggregateWatcher<S> {
    pub fn new(host: HostRef, members: S, slot: &str, options: WatchOptions) -> Self {
        Self {
            core: Rc::new(AggregateCore {
                host,
                members,
                slot: slot.to_string(),
                options,
                flags: Cell::new(WatcherFlags::NONE),
                connections: DisposerList::new(),
                watchers: RefCell::new(IndexMap::new()),
                added: Event::new(),
                removed: Event::new(),
            }),
        }
    }

    /// Start a watcher for every current member and follow joins and
    /// leaves. A no-op while already watching; an error after destroy.
    pub fn watch(&self) -> Result<(), LifecycleError> {
        AggregateCore::watch(&self.core)
    }

    pub fn on_added(&self, listener: impl Fn(&MemberOccurrence) + 'static) -> Subscription {
        self.core.added.connect(listener)
    }

    pub fn on_removed(&self, listener: impl Fn(&MemberRemoval) + 'static) -> Subscription {
        self.core.removed.connect(listener)
    }

    /// Members that currently have a watcher, in registration order.
    pub fn members(&self) -> Vec<EntityId> {
        self.core.watchers.borrow().keys().copied().collect()
    }

    pub fn watcher_count(&self) -> usize {
        self.core.watchers.borrow().len()
    }

    /// The entity currently in `member`'s slot.
    pub fn current_for(&self, member: EntityId) -> Option<EntityId> {
        self.core
            .watchers
            .borrow()
            .get(&member)
            .and_then(|entry| entry.watcher.current())
    }

    pub fn slot(&self) -> &str {
        &self.core.slot
    }

    /// Destroy every member watcher and stop following the member set.
    /// Idempotent.
    pub fn destroy(&self) -> Result<(), LifecycleError> {
        let core = &self.core;
        if core.has(WatcherFlags::DESTROYED) {
            return Ok(());
        }
        core.set_flag(WatcherFlags::DESTROYED, true);
        core.set_flag(WatcherFlags::WATCHING, false);

        let mut errors = Vec::new();
        if let Err(error) = core.connections.release() {
            errors.push(error);
        }
        let entries = std::mem::take(&mut *core.watchers.borrow_mut());
        for (_, entry) in entries {
            errors.extend(entry.teardown());
        }
        core.added.clear();
        core.removed.clear();
        tracing::debug!(slot = %core.slot, "aggregate watcher destroyed");
        LifecycleError::merge_releases(errors)
    }

    pub fn is_watching(&self) -> bool {
        self.core.has(WatcherFlags::WATCHING)
    }

    pub fn is_destroyed(&self) -> bool {
        self.core.has(WatcherFlags::DESTROYED)
    }
}

impl<S: MemberSet + 'static> Drop for AggregateWatcher<S> {
    fn drop(&mut self) {
        if let Err(error) = self.destroy() {
            tracing::error!(%error, "cleanup failed while dropping aggregate watcher");
        }
    }
}

//! ChildWatcher - Occurrences of a matching child under one parent.
//!
//! # Occurrence lifecycle
//!
//! ```text
//! no occurrence --match added / found on watch()--> open --child removed--> closed
//!                                                        --clear_current / re-target / destroy--> abandoned
//! ```
//!
//! - `closed`: the scope is released, then `on_removed` fires.
//! - `abandoned`: the scope is released, `on_removed` does not fire.
//!
//! First match wins: while an occurrence is open (or its scope is still
//! being released) other matching children are ignored. When the current
//! child leaves, the next matching child still under the parent is promoted
//! into a new occurrence.
//!
//! The watcher's own host subscriptions live in a separate list from the
//! occurrence scope, so tearing one down never releases the other twice.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use spark_signals::{signal, Signal};

use super::matcher::{ChildMatcher, ClassMatcher};
use super::Occurrence;
use crate::disposer::DisposerList;
use crate::error::LifecycleError;
use crate::events::{Event, Subscription};
use crate::tree::HostRef;
use crate::types::{EntityId, WatchOptions, WatcherFlags};

struct OpenOccurrence {
    child: EntityId,
    scope: DisposerList,
}

struct WatcherCore<M> {
    host: HostRef,
    matcher: M,
    options: WatchOptions,
    parent: Cell<EntityId>,
    flags: Cell<WatcherFlags>,
    /// Host subscriptions for the current parent.
    connections: DisposerList,
    occurrence: RefCell<Option<OpenOccurrence>>,
    current: Signal<Option<EntityId>>,
    added: Event<Occurrence>,
    removed: Event<EntityId>,
}

impl<M: ChildMatcher> WatcherCore<M> {
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
            tracing::error!(parent = %this.parent.get(), "watch() called on a destroyed watcher");
            return Err(LifecycleError::WatcherDestroyed);
        }
        if this.has(WatcherFlags::WATCHING) {
            return Ok(());
        }
        this.set_flag(WatcherFlags::WATCHING, true);

        let parent = this.parent.get();
        let weak = Rc::downgrade(this);
        this.connections.add_disposable(this.host.on_child_added(
            parent,
            Box::new(move |child: &EntityId| {
                if let Some(core) = weak.upgrade() {
                    Self::handle_added(&core, *child);
                }
            }),
        ));
        let weak = Rc::downgrade(this);
        this.connections.add_disposable(this.host.on_child_removed(
            parent,
            Box::new(move |child: &EntityId| {
                if let Some(core) = weak.upgrade() {
                    Self::handle_removed(&core, *child);
                }
            }),
        ));
        tracing::debug!(parent = %parent, "child watcher started");

        if this.options.report_existing {
            if let Some(child) = this.matcher.find_existing(this.host.as_ref(), parent) {
                Self::handle_added(this, child);
            }
        }
        Ok(())
    }

    fn handle_added(this: &Rc<Self>, child: EntityId) {
        if this.has(WatcherFlags::DESTROYED) || !this.matcher.matches(this.host.as_ref(), child) {
            return;
        }
        if this.has(WatcherFlags::RELEASING) {
            tracing::trace!(child = %child, "match arrived while previous occurrence is releasing");
            return;
        }
        if let Some(open) = this.occurrence.borrow().as_ref() {
            if open.child != child {
                tracing::trace!(child = %child, current = %open.child, "ignoring extra match");
            }
            return;
        }
        Self::open(this, child);
    }

    fn open(this: &Rc<Self>, child: EntityId) {
        let parent = this.parent.get();
        let scope = DisposerList::new();
        let handle = scope.handle();
        *this.occurrence.borrow_mut() = Some(OpenOccurrence { child, scope });
        this.current.set(Some(child));

        tracing::debug!(parent = %parent, child = %child, "occurrence opened");
        this.added.emit(&Occurrence { parent, child, scope: handle });
    }

    fn handle_removed(this: &Rc<Self>, child: EntityId) {
        let Some(result) = Self::close(this, Some(child)) else { return };
        if let Err(error) = result {
            tracing::error!(child = %child, %error, "occurrence cleanup failed");
        }
        this.removed.emit(&child);
        Self::promote(this, child);
    }

    /// After an occurrence for `closed` ended: open one for the first other
    /// match under the (possibly new) parent. Matches seen while the scope
    /// was releasing were dropped, so this is where they get picked up.
    fn promote(this: &Rc<Self>, closed: EntityId) {
        let idle = this.has(WatcherFlags::WATCHING)
            && !this.has(WatcherFlags::RELEASING)
            && this.occurrence.borrow().is_none();
        if !idle {
            return;
        }
        let host = this.host.as_ref();
        let next = host
            .children_of(this.parent.get())
            .into_iter()
            .find(|child| *child != closed && this.matcher.matches(host, *child));
        if let Some(next) = next {
            tracing::trace!(child = %next, previous = %closed, "promoting surviving match");
            Self::handle_added(this, next);
        }
    }

    /// End the open occurrence (only if it is `only`, when given) and release
    /// its scope. Fires nothing.
    fn close(this: &Rc<Self>, only: Option<EntityId>) -> Option<Result<(), LifecycleError>> {
        let open = {
            let mut slot = this.occurrence.borrow_mut();
            let targeted = slot
                .as_ref()
                .is_some_and(|open| only.is_none_or(|child| open.child == child));
            if !targeted {
                return None;
            }
            slot.take()?
        };
        this.current.set(None);

        this.set_flag(WatcherFlags::RELEASING, true);
        let result = open.scope.release();
        this.set_flag(WatcherFlags::RELEASING, false);

        tracing::debug!(parent = %this.parent.get(), child = %open.child, "occurrence closed");
        Some(result)
    }

    /// Drop host subscriptions and abandon the open occurrence.
    fn stop(this: &Rc<Self>) -> Vec<LifecycleError> {
        let mut errors = Vec::new();
        this.set_flag(WatcherFlags::WATCHING, false);
        if let Err(error) = this.connections.release() {
            errors.push(error);
        }
        if let Some(Err(error)) = Self::close(this, None) {
            errors.push(error);
        }
        errors
    }
}

// =============================================================================
// ChildWatcher
// =============================================================================

/// Watches one parent for a child accepted by `M`.
///
/// Dropping the watcher destroys it.
pub struct ChildWatcher<M: ChildMatcher = ClassMatcher> {
    core: Rc<WatcherCore<M>>,
}

impl ChildWatcher<ClassMatcher> {
    /// Watch `parent` for a child of class `class`, reporting an existing
    /// match on `watch()`.
    pub fn new(host: HostRef, parent: EntityId, class: &str) -> Self {
        Self::with_matcher(host, parent, ClassMatcher::new(class), WatchOptions::default())
    }

    pub fn with_options(host: HostRef, parent: EntityId, class: &str, options: WatchOptions) -> Self {
        Self::with_matcher(host, parent, ClassMatcher::new(class), options)
    }
}

impl<M: ChildMatcher> ChildWatcher<M> {
    pub fn with_matcher(host: HostRef, parent: EntityId, matcher: M, options: WatchOptions) -> Self {
        Self {
            core: Rc::new(WatcherCore {
                host,
                matcher,
                options,
                parent: Cell::new(parent),
                flags: Cell::new(WatcherFlags::NONE),
                connections: DisposerList::new(),
                occurrence: RefCell::new(None),
                current: signal(None),
                added: Event::new(),
                removed: Event::new(),
            }),
        }
    }

    /// Start listening. A no-op while already watching; an error after
    /// [`destroy`](Self::destroy).
    pub fn watch(&self) -> Result<(), LifecycleError> {
        WatcherCore::watch(&self.core)
    }

    /// Re-target the watcher. The open occurrence is abandoned (its scope
    /// released, `on_removed` not fired) and watching restarts on
    /// `parent`. Nothing happens if `parent` is already the watched parent.
    pub fn set_watched_parent(&self, parent: EntityId) -> Result<(), LifecycleError> {
        let core = &self.core;
        if core.has(WatcherFlags::DESTROYED) {
            tracing::error!(parent = %parent, "set_watched_parent() called on a destroyed watcher");
            return Err(LifecycleError::WatcherDestroyed);
        }
        if core.parent.get() == parent {
            return Ok(());
        }

        let previous = core.parent.get();
        let abandoned = self.current();
        let mut errors = WatcherCore::stop(core);
        if core.parent.get() != previous {
            // A cleanup re-targeted the watcher while it was being stopped
            if let Some(abandoned) = abandoned {
                WatcherCore::promote(core, abandoned);
            }
            return LifecycleError::merge_releases(errors);
        }

        tracing::debug!(from = %previous, to = %parent, "child watcher re-targeted");
        core.parent.set(parent);
        if let Err(error) = WatcherCore::watch(core) {
            errors.push(error);
        }
        LifecycleError::merge_releases(errors)
    }

    /// Subscribe to new occurrences. The [`Occurrence`] carries the scope
    /// for cleanup that must end with it.
    pub fn on_added(&self, listener: impl Fn(&Occurrence) + 'static) -> Subscription {
        self.core.added.connect(listener)
    }

    /// Subscribe to children leaving. Not fired for abandoned occurrences.
    pub fn on_removed(&self, listener: impl Fn(&EntityId) + 'static) -> Subscription {
        self.core.removed.connect(listener)
    }

    /// Child of the open occurrence.
    pub fn current(&self) -> Option<EntityId> {
        self.core.occurrence.borrow().as_ref().map(|open| open.child)
    }

    /// Reactive view of [`current`](Self::current).
    pub fn current_signal(&self) -> Signal<Option<EntityId>> {
        self.core.current.clone()
    }

    /// Abandon the open occurrence without firing `on_removed`. Another
    /// matching child still under the parent becomes the next occurrence;
    /// the abandoned child is not reopened.
    pub fn clear_current(&self) -> Result<(), LifecycleError> {
        let Some(abandoned) = self.current() else { return Ok(()) };
        let result = WatcherCore::close(&self.core, None).unwrap_or(Ok(()));
        WatcherCore::promote(&self.core, abandoned);
        result
    }

    /// Stop for good: drop host subscriptions, abandon the open occurrence
    /// and disconnect every listener. Idempotent.
    pub fn destroy(&self) -> Result<(), LifecycleError> {
        let core = &self.core;
        if core.has(WatcherFlags::DESTROYED) {
            return Ok(());
        }
        core.set_flag(WatcherFlags::DESTROYED, true);

        let errors = WatcherCore::stop(core);
        core.added.clear();
        core.removed.clear();
        tracing::debug!(parent = %core.parent.get(), "child watcher destroyed");
        LifecycleError::merge_releases(errors)
    }

    pub fn parent(&self) -> EntityId {
        self.core.parent.get()
    }

    pub fn matcher(&self) -> &M {
        &self.core.matcher
    }

    pub fn is_watching(&self) -> bool {
        self.core.has(WatcherFlags::WATCHING)
    }

    pub fn is_destroyed(&self) -> bool {
        self.core.has(WatcherFlags::DESTROYED)
    }
}

impl<M: ChildMatcher> Drop for ChildWatcher<M> {
    fn drop(&mut self) {
        if let Err(error) = self.destroy() {
            tracing::error!(%error, "cleanup failed while dropping child watcher");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::SceneTree;

    struct Probe {
        added: Rc<RefCell<Vec<EntityId>>>,
        removed: Rc<RefCell<Vec<EntityId>>>,
        scoped: Rc<RefCell<Vec<EntityId>>>,
        _subs: Vec<Subscription>,
    }

    /// Records events and registers one scoped cleanup per occurrence.
    fn probe<M: ChildMatcher>(watcher: &ChildWatcher<M>) -> Probe {
        let added = Rc::new(RefCell::new(Vec::new()));
        let removed = Rc::new(RefCell::new(Vec::new()));
        let scoped = Rc::new(RefCell::new(Vec::new()));

        let added_clone = added.clone();
        let scoped_clone = scoped.clone();
        let on_added = watcher.on_added(move |occurrence: &Occurrence| {
            added_clone.borrow_mut().push(occurrence.child());
            let scoped = scoped_clone.clone();
            let child = occurrence.child();
            occurrence.add_cleanup(move || scoped.borrow_mut().push(child));
        });
        let removed_clone = removed.clone();
        let on_removed = watcher.on_removed(move |child: &EntityId| removed_clone.borrow_mut().push(*child));

        Probe { added, removed, scoped, _subs: vec![on_added, on_removed] }
    }

    fn setup() -> (SceneTree, EntityId) {
        let tree = SceneTree::new();
        let parent = tree.spawn_child(tree.root(), "Folder", "Parent").unwrap();
        (tree, parent)
    }

    #[test]
    fn test_existing_match_reported_once_then_removed() {
        let (tree, parent) = setup();
        let w1 = tree.spawn_child(parent, "Widget", "W1").unwrap();

        let watcher = ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget");
        let probe = probe(&watcher);
        watcher.watch().unwrap();
        watcher.watch().unwrap();

        assert_eq!(*probe.added.borrow(), vec![w1]);
        assert_eq!(watcher.current(), Some(w1));
        assert_eq!(watcher.current_signal().get(), Some(w1));

        tree.destroy(w1).unwrap();
        assert_eq!(*probe.removed.borrow(), vec![w1]);
        assert_eq!(*probe.scoped.borrow(), vec![w1]);
        assert_eq!(watcher.current(), None);
        assert_eq!(watcher.current_signal().get(), None);
    }

    #[test]
    fn test_existing_match_ignored_when_not_reporting() {
        let (tree, parent) = setup();
        tree.spawn_child(parent, "Widget", "W1").unwrap();

        let watcher = ChildWatcher::with_options(
            Rc::new(tree.clone()),
            parent,
            "Widget",
            WatchOptions::default().report_existing(false),
        );
        let probe = probe(&watcher);
        watcher.watch().unwrap();

        assert!(probe.added.borrow().is_empty());
        assert_eq!(watcher.current(), None);

        let w2 = tree.spawn_child(parent, "Widget", "W2").unwrap();
        assert_eq!(*probe.added.borrow(), vec![w2]);
    }

    #[test]
    fn test_live_add_and_non_matching_children() {
        let (tree, parent) = setup();
        let watcher = ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget");
        let probe = probe(&watcher);
        watcher.watch().unwrap();

        let other = tree.spawn_child(parent, "Gadget", "G").unwrap();
        assert!(probe.added.borrow().is_empty());

        let w = tree.spawn_child(parent, "Widget", "W").unwrap();
        assert_eq!(*probe.added.borrow(), vec![w]);

        tree.destroy(other).unwrap();
        assert!(probe.removed.borrow().is_empty());

        tree.set_parent(w, Some(tree.root())).unwrap();
        assert_eq!(*probe.removed.borrow(), vec![w]);
    }

    #[test]
    fn test_first_match_wins_and_survivor_is_promoted() {
        let (tree, parent) = setup();
        let watcher = ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget");
        let probe = probe(&watcher);
        watcher.watch().unwrap();

        let first = tree.spawn_child(parent, "Widget", "First").unwrap();
        let second = tree.spawn_child(parent, "Widget", "Second").unwrap();
        assert_eq!(*probe.added.borrow(), vec![first]);

        tree.destroy(first).unwrap();
        assert_eq!(*probe.removed.borrow(), vec![first]);
        assert_eq!(*probe.added.borrow(), vec![first, second]);
        assert_eq!(watcher.current(), Some(second));
    }

    #[test]
    fn test_scope_released_before_on_removed() {
        let (tree, parent) = setup();
        let watcher = ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget");
        let order = Rc::new(RefCell::new(Vec::new()));

        let order_added = order.clone();
        let _a = watcher.on_added(move |occurrence: &Occurrence| {
            let order = order_added.clone();
            occurrence.add_cleanup(move || order.borrow_mut().push("scope"));
        });
        let order_removed = order.clone();
        let _r = watcher.on_removed(move |_: &EntityId| order_removed.borrow_mut().push("removed"));
        watcher.watch().unwrap();

        let w = tree.spawn_child(parent, "Widget", "W").unwrap();
        tree.destroy(w).unwrap();
        assert_eq!(*order.borrow(), vec!["scope", "removed"]);
    }

    #[test]
    fn test_set_watched_parent_same_parent_is_noop() {
        let (tree, parent) = setup();
        tree.spawn_child(parent, "Widget", "W").unwrap();
        let watcher = ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget");
        let probe = probe(&watcher);
        watcher.watch().unwrap();

        watcher.set_watched_parent(parent).unwrap();
        assert!(probe.scoped.borrow().is_empty());
        assert_eq!(probe.added.borrow().len(), 1);
    }

    #[test]
    fn test_set_watched_parent_abandons_without_on_removed() {
        let (tree, parent) = setup();
        let other = tree.spawn_child(tree.root(), "Folder", "Other").unwrap();
        let w1 = tree.spawn_child(parent, "Widget", "W1").unwrap();
        let w2 = tree.spawn_child(other, "Widget", "W2").unwrap();

        let watcher = ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget");
        let probe = probe(&watcher);
        watcher.watch().unwrap();

        watcher.set_watched_parent(other).unwrap();
        assert_eq!(*probe.scoped.borrow(), vec![w1]);
        assert!(probe.removed.borrow().is_empty());
        assert_eq!(*probe.added.borrow(), vec![w1, w2]);
        assert_eq!(watcher.parent(), other);

        // Old parent is no longer observed
        tree.spawn_child(parent, "Widget", "W3").unwrap();
        assert_eq!(probe.added.borrow().len(), 2);
    }

    #[test]
    fn test_clear_current_releases_scope_silently() {
        let (tree, parent) = setup();
        let w = tree.spawn_child(parent, "Widget", "W").unwrap();
        let watcher = ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget");
        let probe = probe(&watcher);
        watcher.watch().unwrap();

        watcher.clear_current().unwrap();
        assert_eq!(*probe.scoped.borrow(), vec![w]);
        assert!(probe.removed.borrow().is_empty());
        assert_eq!(watcher.current(), None);

        // The cleared child leaving later is not the current occurrence
        tree.destroy(w).unwrap();
        assert!(probe.removed.borrow().is_empty());
    }

    #[test]
    fn test_destroy_is_idempotent_and_watch_after_destroy_fails() {
        let (tree, parent) = setup();
        let w = tree.spawn_child(parent, "Widget", "W").unwrap();
        let watcher = ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget");
        let probe = probe(&watcher);
        watcher.watch().unwrap();

        watcher.destroy().unwrap();
        watcher.destroy().unwrap();
        assert!(watcher.is_destroyed());
        assert!(!watcher.is_watching());
        assert_eq!(*probe.scoped.borrow(), vec![w]);
        assert!(probe.removed.borrow().is_empty());

        assert!(matches!(watcher.watch(), Err(LifecycleError::WatcherDestroyed)));
        assert!(matches!(
            watcher.set_watched_parent(tree.root()),
            Err(LifecycleError::WatcherDestroyed)
        ));

        tree.destroy(w).unwrap();
        assert!(probe.removed.borrow().is_empty());
    }

    #[test]
    fn test_late_scope_registration_runs_immediately() {
        let (tree, parent) = setup();
        let watcher = ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget");
        let kept: Rc<RefCell<Option<Occurrence>>> = Rc::new(RefCell::new(None));

        let kept_clone = kept.clone();
        let _a = watcher.on_added(move |occurrence: &Occurrence| {
            *kept_clone.borrow_mut() = Some(occurrence.clone());
        });
        watcher.watch().unwrap();

        let w = tree.spawn_child(parent, "Widget", "W").unwrap();
        tree.destroy(w).unwrap();

        let ran = Rc::new(Cell::new(false));
        let ran_clone = ran.clone();
        let occurrence = kept.borrow_mut().take().unwrap();
        assert!(!occurrence.is_live());
        occurrence.add_cleanup(move || ran_clone.set(true));
        assert!(ran.get());
    }

    #[test]
    fn test_match_added_during_scope_release_is_promoted_afterwards() {
        let (tree, parent) = setup();
        let watcher = ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget");
        let probe = probe(&watcher);

        let tree_clone = tree.clone();
        let spawned = Rc::new(Cell::new(None));
        let spawned_clone = spawned.clone();
        let _a = watcher.on_added(move |occurrence: &Occurrence| {
            if spawned_clone.get().is_some() {
                return;
            }
            let tree = tree_clone.clone();
            let spawned = spawned_clone.clone();
            occurrence.add_cleanup(move || {
                let replacement = tree.spawn_child(parent, "Widget", "Replacement").unwrap();
                spawned.set(Some(replacement));
            });
        });
        watcher.watch().unwrap();

        let w = tree.spawn_child(parent, "Widget", "W").unwrap();
        tree.destroy(w).unwrap();

        let replacement = spawned.get().unwrap();
        assert_eq!(*probe.removed.borrow(), vec![w]);
        assert_eq!(*probe.added.borrow(), vec![w, replacement]);
        assert_eq!(watcher.current(), Some(replacement));
    }

    #[test]
    fn test_drop_destroys_watcher() {
        let (tree, parent) = setup();
        let w = tree.spawn_child(parent, "Widget", "W").unwrap();
        let scoped = Rc::new(Cell::new(0));
        {
            let watcher = ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget");
            let scoped_clone = scoped.clone();
            let _a = watcher.on_added(move |occurrence: &Occurrence| {
                let scoped = scoped_clone.clone();
                occurrence.add_cleanup(move || scoped.set(scoped.get() + 1));
            });
            watcher.watch().unwrap();
        }
        assert_eq!(scoped.get(), 1);
        tree.destroy(w).unwrap();
        assert_eq!(scoped.get(), 1);
    }

    #[test]
    fn test_clear_current_promotes_another_match() {
        let (tree, parent) = setup();
        let w1 = tree.spawn_child(parent, "Widget", "W1").unwrap();
        let w2 = tree.spawn_child(parent, "Widget", "W2").unwrap();
        let watcher = ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget");
        let probe = probe(&watcher);
        watcher.watch().unwrap();

        watcher.clear_current().unwrap();
        assert_eq!(*probe.scoped.borrow(), vec![w1]);
        assert_eq!(*probe.added.borrow(), vec![w1, w2]);
        assert_eq!(watcher.current(), Some(w2));
    }

    #[test]
    fn test_retarget_from_clear_current_cleanup_reports_new_parents_match() {
        let (tree, parent) = setup();
        let other = tree.spawn_child(tree.root(), "Folder", "Other").unwrap();
        let w1 = tree.spawn_child(parent, "Widget", "W1").unwrap();
        let w2 = tree.spawn_child(other, "Widget", "W2").unwrap();

        let watcher = Rc::new(ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget"));
        let probe = probe(&watcher);
        let weak = Rc::downgrade(&watcher);
        let _a = watcher.on_added(move |occurrence: &Occurrence| {
            if occurrence.parent() != parent {
                return;
            }
            let weak = weak.clone();
            occurrence.add_cleanup(move || {
                if let Some(watcher) = weak.upgrade() {
                    watcher.set_watched_parent(other).unwrap();
                }
            });
        });
        watcher.watch().unwrap();

        watcher.clear_current().unwrap();
        assert_eq!(watcher.parent(), other);
        assert!(watcher.is_watching());
        assert_eq!(watcher.current(), Some(w2));
        assert_eq!(*probe.added.borrow(), vec![w1, w2]);
    }

    #[test]
    fn test_retarget_from_cleanup_during_retarget_keeps_inner_target() {
        let (tree, parent) = setup();
        let second = tree.spawn_child(tree.root(), "Folder", "Second").unwrap();
        let third = tree.spawn_child(tree.root(), "Folder", "Third").unwrap();
        tree.spawn_child(parent, "Widget", "W1").unwrap();
        let w3 = tree.spawn_child(third, "Widget", "W3").unwrap();

        let watcher = Rc::new(ChildWatcher::new(Rc::new(tree.clone()), parent, "Widget"));
        let weak = Rc::downgrade(&watcher);
        let _a = watcher.on_added(move |occurrence: &Occurrence| {
            if occurrence.parent() != parent {
                return;
            }
            let weak = weak.clone();
            occurrence.add_cleanup(move || {
                if let Some(watcher) = weak.upgrade() {
                    watcher.set_watched_parent(third).unwrap();
                }
            });
        });
        watcher.watch().unwrap();

        watcher.set_watched_parent(second).unwrap();
        assert_eq!(watcher.parent(), third);
        assert_eq!(watcher.current(), Some(w3));

        // Only the final parent is observed
        tree.spawn_child(second, "Widget", "W2").unwrap();
        assert_eq!(watcher.current(), Some(w3));
    }
}

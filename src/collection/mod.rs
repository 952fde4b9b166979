//! Entity Collections - Bookkeeping bound to entity lifetimes.
//!
//! An [`EntityCollection`] ties a [`DisposerList`] to each tracked entity and
//! releases it when the tree host reports the entity left the tree
//! (destroyed, or detached from the scene). Application code never has to
//! notice removal itself.
//!
//! - [`EntitySet`] - Membership that drops out when the entity goes
//! - [`EntityMap`] - Per-entity values that drop out when the entity goes
//!
//! # Lifecycle per entity
//!
//! ```text
//! untracked --track--> tracked --untrack / removal notification--> untracked
//! ```
//!
//! The tracking record is removed before its disposers run, so tracking the
//! same entity again from inside a cleanup starts a fresh record.

mod map;
mod set;

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

pub use map::EntityMap;
pub use set::EntitySet;

use crate::disposer::{Disposer, DisposerList};
use crate::error::LifecycleError;
use crate::events::Subscription;
use crate::tree::HostRef;
use crate::types::{AncestryChange, EntityId};

/// What [`EntityCollection::track`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackOutcome {
    /// A new tracking record was created.
    Tracked,
    /// The entity was already tracked; the cleanup joined its list.
    AlreadyTracked,
    /// The host reports the entity dead. Its cleanup ran immediately and
    /// nothing was tracked.
    Rejected,
}

struct TrackRecord {
    cleanup: DisposerList,
    removal: Subscription,
}

type Records = RefCell<IndexMap<EntityId, TrackRecord>>;

/// Take the record out, disconnect its removal listener, then release it.
/// `None` if the entity was not tracked.
fn untrack_record(records: &Records, entity: EntityId) -> Option<Result<(), LifecycleError>> {
    let record = records.borrow_mut().shift_remove(&entity)?;
    let TrackRecord { cleanup, mut removal } = record;
    removal.unsubscribe();
    tracing::debug!(entity = %entity, disposers = cleanup.len(), "entity untracked");
    Some(cleanup.release())
}

// =============================================================================
// EntityCollection
// =============================================================================

/// Tracks entities and owns one cleanup list per tracked entity.
///
/// Dropping the collection untracks everything.
pub struct EntityCollection {
    host: HostRef,
    records: Rc<Records>,
}

impl EntityCollection {
    pub fn new(host: HostRef) -> Self {
        Self {
            host,
            records: Rc::new(RefCell::new(IndexMap::new())),
        }
    }

    /// Track `entity` with a cleanup callback.
    pub fn track(&self, entity: EntityId, cleanup: impl FnOnce() + 'static) -> TrackOutcome {
        self.track_disposer(entity, Disposer::action(cleanup))
    }

    /// Track `entity`. The first call subscribes to its removal; later calls
    /// only append `disposer` to the existing cleanup list.
    pub fn track_disposer(&self, entity: EntityId, disposer: Disposer) -> TrackOutcome {
        if let Some(record) = self.records.borrow().get(&entity) {
            record.cleanup.add_disposer(disposer);
            return TrackOutcome::AlreadyTracked;
        }

        if !self.host.is_alive(entity) {
            tracing::debug!(entity = %entity, "refusing to track dead entity, running cleanup now");
            if let Err(error) = disposer.run() {
                tracing::warn!(entity = %entity, %error, "cleanup for dead entity failed");
            }
            return TrackOutcome::Rejected;
        }

        let weak = Rc::downgrade(&self.records);
        let removal = self.host.on_ancestry_changed(
            entity,
            Box::new(move |change: &AncestryChange| {
                if !change.is_removal() {
                    return;
                }
                let Some(records) = weak.upgrade() else { return };
                if let Some(Err(error)) = untrack_record(&records, entity) {
                    tracing::error!(entity = %entity, %error, "cleanup failed for entity removed from tree");
                }
            }),
        );

        let cleanup = DisposerList::new();
        cleanup.add_disposer(disposer);
        self.records.borrow_mut().insert(entity, TrackRecord { cleanup, removal });
        tracing::debug!(entity = %entity, "entity tracked");
        TrackOutcome::Tracked
    }

    /// Release `entity`'s cleanup and stop tracking it. Returns whether it
    /// was tracked.
    pub fn untrack(&self, entity: EntityId) -> Result<bool, LifecycleError> {
        match untrack_record(&self.records, entity) {
            None => Ok(false),
            Some(result) => result.map(|()| true),
        }
    }

    /// Untrack every entity tracked when the call starts, in tracking order.
    pub fn untrack_all(&self) -> Result<(), LifecycleError> {
        let tracked = self.tracked();
        LifecycleError::merge_batch(tracked.into_iter().map(|entity| self.untrack(entity).map(|_| ())))
    }

    /// Add cleanup to an already-tracked entity. Does nothing (and returns
    /// `false`) if the entity is not tracked.
    pub fn attach_cleanup(&self, entity: EntityId, cleanup: impl FnOnce() + 'static) -> bool {
        self.attach_disposer(entity, Disposer::action(cleanup))
    }

    pub fn attach_disposer(&self, entity: EntityId, disposer: Disposer) -> bool {
        match self.records.borrow().get(&entity) {
            Some(record) => {
                record.cleanup.add_disposer(disposer);
                true
            }
            None => false,
        }
    }

    pub fn is_tracked(&self, entity: EntityId) -> bool {
        self.records.borrow().contains_key(&entity)
    }

    /// Tracked entities in tracking order.
    pub fn tracked(&self) -> Vec<EntityId> {
        self.records.borrow().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.records.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.borrow().is_empty()
    }

    pub fn host(&self) -> &HostRef {
        &self.host
    }
}

impl Drop for EntityCollection {
    fn drop(&mut self) {
        if let Err(error) = self.untrack_all() {
            tracing::error!(%error, "cleanup failed while dropping entity collection");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{SceneTree, TreeHost};
    use std::cell::Cell;

    fn setup() -> (SceneTree, EntityCollection) {
        let tree = SceneTree::new();
        let collection = EntityCollection::new(Rc::new(tree.clone()));
        (tree, collection)
    }

    #[test]
    fn test_retrack_appends_and_untrack_releases_in_order() {
        let (tree, collection) = setup();
        let a = tree.spawn_child(tree.root(), "Part", "A").unwrap();
        let log = Rc::new(RefCell::new(Vec::new()));

        let log1 = log.clone();
        assert_eq!(collection.track(a, move || log1.borrow_mut().push("c1")), TrackOutcome::Tracked);
        let log2 = log.clone();
        assert_eq!(
            collection.track(a, move || log2.borrow_mut().push("c2")),
            TrackOutcome::AlreadyTracked
        );

        assert!(collection.untrack(a).unwrap());
        assert_eq!(*log.borrow(), vec!["c1", "c2"]);
        assert!(!collection.is_tracked(a));
        assert!(!collection.untrack(a).unwrap());
    }

    #[test]
    fn test_destroy_releases_once_and_retrack_is_fresh() {
        let (tree, collection) = setup();
        let a = tree.spawn_child(tree.root(), "Part", "A").unwrap();
        let count = Rc::new(Cell::new(0));

        let count_clone = count.clone();
        collection.track(a, move || count_clone.set(count_clone.get() + 1));
        tree.destroy(a).unwrap();
        assert_eq!(count.get(), 1);
        assert!(collection.is_empty());

        let b = tree.spawn_child(tree.root(), "Part", "B").unwrap();
        let count_clone = count.clone();
        collection.track(b, move || count_clone.set(count_clone.get() + 10));
        tree.destroy(b).unwrap();
        assert_eq!(count.get(), 11);
    }

    #[test]
    fn test_detaching_from_scene_counts_as_removal() {
        let (tree, collection) = setup();
        let folder = tree.spawn_child(tree.root(), "Folder", "F").unwrap();
        let a = tree.spawn_child(folder, "Part", "A").unwrap();
        let released = Rc::new(Cell::new(false));

        let released_clone = released.clone();
        collection.track(a, move || released_clone.set(true));

        tree.set_parent(a, Some(tree.root())).unwrap();
        assert!(!released.get(), "moving inside the scene keeps tracking");

        tree.set_parent(folder, None).unwrap();
        assert!(!released.get(), "a no longer lives under folder");

        tree.set_parent(a, None).unwrap();
        assert!(released.get());
        assert!(!collection.is_tracked(a));
        assert!(tree.is_alive(a));
    }

    #[test]
    fn test_ancestor_detach_releases_descendant() {
        let (tree, collection) = setup();
        let folder = tree.spawn_child(tree.root(), "Folder", "F").unwrap();
        let a = tree.spawn_child(folder, "Part", "A").unwrap();
        let released = Rc::new(Cell::new(false));

        let released_clone = released.clone();
        collection.track(a, move || released_clone.set(true));
        tree.set_parent(folder, None).unwrap();
        assert!(released.get());
    }

    #[test]
    fn test_dead_entity_is_rejected_and_cleanup_runs_now() {
        let (tree, collection) = setup();
        let a = tree.spawn_child(tree.root(), "Part", "A").unwrap();
        tree.destroy(a).unwrap();

        let ran = Rc::new(Cell::new(false));
        let ran_clone = ran.clone();
        assert_eq!(collection.track(a, move || ran_clone.set(true)), TrackOutcome::Rejected);
        assert!(ran.get());
        assert!(collection.is_empty());
    }

    #[test]
    fn test_attach_cleanup_only_on_tracked() {
        let (tree, collection) = setup();
        let a = tree.spawn_child(tree.root(), "Part", "A").unwrap();
        let count = Rc::new(Cell::new(0));

        let count_clone = count.clone();
        assert!(!collection.attach_cleanup(a, move || count_clone.set(count_clone.get() + 1)));
        assert!(!collection.is_tracked(a));

        collection.track(a, || {});
        let count_clone = count.clone();
        assert!(collection.attach_cleanup(a, move || count_clone.set(count_clone.get() + 1)));
        tree.destroy(a).unwrap();
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn test_retrack_from_inside_cleanup_creates_fresh_record() {
        let tree = SceneTree::new();
        let collection = Rc::new(EntityCollection::new(Rc::new(tree.clone())));
        let a = tree.spawn_child(tree.root(), "Part", "A").unwrap();
        let second = Rc::new(Cell::new(false));

        let weak = Rc::downgrade(&collection);
        let second_clone = second.clone();
        collection.track(a, move || {
            if let Some(collection) = weak.upgrade() {
                let outcome = collection.track(a, move || second_clone.set(true));
                assert_eq!(outcome, TrackOutcome::Tracked);
            }
        });

        collection.untrack(a).unwrap();
        assert!(collection.is_tracked(a));
        assert!(!second.get());

        collection.untrack(a).unwrap();
        assert!(second.get());
    }

    #[test]
    fn test_untrack_all_and_failures_propagate() {
        let (tree, collection) = setup();
        let a = tree.spawn_child(tree.root(), "Part", "A").unwrap();
        let b = tree.spawn_child(tree.root(), "Part", "B").unwrap();

        collection.track_disposer(a, Disposer::fallible(|| Err("broken".into())));
        let ran = Rc::new(Cell::new(false));
        let ran_clone = ran.clone();
        collection.track(b, move || ran_clone.set(true));

        assert!(matches!(collection.untrack_all(), Err(LifecycleError::Release(_))));
        assert!(ran.get());
        assert!(collection.is_empty());
    }

    #[test]
    fn test_drop_untracks_and_disconnects() {
        let tree = SceneTree::new();
        let a = tree.spawn_child(tree.root(), "Part", "A").unwrap();
        let count = Rc::new(Cell::new(0));
        {
            let collection = EntityCollection::new(Rc::new(tree.clone()));
            let count_clone = count.clone();
            collection.track(a, move || count_clone.set(count_clone.get() + 1));
        }
        assert_eq!(count.get(), 1);
        tree.destroy(a).unwrap();
        assert_eq!(count.get(), 1);
        assert!(!tree.is_alive(a));
    }
}

//! Tree Host - The boundary to the entity tree this crate observes.
//!
//! The lifecycle core never owns entities. Everything it knows about them
//! comes through [`TreeHost`]:
//!
//! - existence and parent/child queries
//! - a per-entity ancestry notification (fires when the entity or one of its
//!   ancestors is reparented, and when the entity is destroyed)
//! - per-parent child-added / child-removed notifications
//!
//! [`MemberSet`] is the matching boundary for an open-ended set of parents
//! (joins, leaves, and a snapshot), used by
//! [`AggregateWatcher`](crate::watcher::AggregateWatcher).
//!
//! [`SceneTree`] is an in-memory host with those semantics; [`ChildrenOf`]
//! turns a container's children into a member set.
//!
//! Hosts must deliver notifications without holding internal borrows, since
//! listeners routinely call back into the host.

mod members;
mod scene;

use std::rc::Rc;

pub use members::ChildrenOf;
pub use scene::SceneTree;

use crate::events::Subscription;
use crate::types::{AncestryChange, EntityId};

/// Listener for a notification that carries an entity.
pub type EntityListener = Box<dyn Fn(&EntityId)>;

/// Listener for ancestry notifications.
pub type AncestryListener = Box<dyn Fn(&AncestryChange)>;

/// Shared reference to a tree host.
pub type HostRef = Rc<dyn TreeHost>;

/// Entity tree queries and notifications.
pub trait TreeHost {
    fn is_alive(&self, entity: EntityId) -> bool;

    /// Whether `entity` is reachable from the scene root.
    fn is_in_scene(&self, entity: EntityId) -> bool;

    fn parent_of(&self, entity: EntityId) -> Option<EntityId>;

    fn class_of(&self, entity: EntityId) -> Option<String>;

    fn name_of(&self, entity: EntityId) -> Option<String>;

    /// Current children of `parent`, in the order they were added.
    fn children_of(&self, parent: EntityId) -> Vec<EntityId>;

    /// Listen for ancestry changes of `entity`. Returns an inert
    /// subscription if the entity does not exist.
    fn on_ancestry_changed(&self, entity: EntityId, listener: AncestryListener) -> Subscription;

    fn on_child_added(&self, parent: EntityId, listener: EntityListener) -> Subscription;

    fn on_child_removed(&self, parent: EntityId, listener: EntityListener) -> Subscription;

    fn find_first_child_of_class(&self, parent: EntityId, class: &str) -> Option<EntityId> {
        self.children_of(parent)
            .into_iter()
            .find(|child| self.class_of(*child).as_deref() == Some(class))
    }

    fn find_first_child(&self, parent: EntityId, name: &str) -> Option<EntityId> {
        self.children_of(parent)
            .into_iter()
            .find(|child| self.name_of(*child).as_deref() == Some(name))
    }
}

/// An open-ended set of entities that members join and leave over time.
pub trait MemberSet {
    /// Current members.
    fn members(&self) -> Vec<EntityId>;

    fn on_joined(&self, listener: EntityListener) -> Subscription;

    fn on_left(&self, listener: EntityListener) -> Subscription;
}

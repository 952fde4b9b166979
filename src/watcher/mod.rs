//! Watchers - Observe matching children appearing and disappearing.
//!
//! - [`ChildWatcher`] - One parent, children accepted by a [`ChildMatcher`]
//! - [`SingleEntityWatcher`] - One parent, one well-known named slot
//! - [`AggregateWatcher`] - A slot watcher per member of a changing parent set
//!
//! # Pattern: Occurrence scopes
//!
//! Every time a matching child shows up, `on_added` listeners receive an
//! [`Occurrence`]. Cleanup registered on it runs when that child leaves (or
//! the watcher abandons it), before `on_removed` fires:
//!
//! ```ignore
//! let watcher = ChildWatcher::new(host, parent, "Tool");
//! let _sub = watcher.on_added(|occurrence| {
//!     let highlight = spawn_highlight(occurrence.child());
//!     occurrence.add_cleanup(move || highlight.remove());
//! });
//! watcher.watch()?;
//! ```

mod aggregate;
mod child;
mod matcher;
mod single;

pub use aggregate::{AggregateWatcher, MemberOccurrence, MemberRemoval};
pub use child::ChildWatcher;
pub use matcher::{ChildMatcher, ClassMatcher, SlotMatcher};
pub use single::SingleEntityWatcher;

use crate::disposer::{Disposable, DisposerHandle};
use crate::types::EntityId;

/// One continuous stay of a matching child under the watched parent.
#[derive(Clone, Debug)]
pub struct Occurrence {
    parent: EntityId,
    child: EntityId,
    scope: DisposerHandle,
}

impl Occurrence {
    pub fn parent(&self) -> EntityId {
        self.parent
    }

    pub fn child(&self) -> EntityId {
        self.child
    }

    /// Run `f` when this occurrence ends. Runs immediately if it already has.
    pub fn add_cleanup(&self, f: impl FnOnce() + 'static) {
        self.scope.add(f);
    }

    pub fn add_disposable(&self, disposable: impl Disposable + 'static) {
        self.scope.add_disposable(disposable);
    }

    /// Registration handle for this occurrence's scope.
    pub fn scope(&self) -> DisposerHandle {
        self.scope.clone()
    }

    /// Whether the occurrence is still open.
    pub fn is_live(&self) -> bool {
        self.scope.is_live()
    }
}

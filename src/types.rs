//! Core types shared by the lifecycle modules.
//!
//! - [`EntityId`] - Opaque identity of an entity owned by the tree host
//! - [`AncestryChange`] - Payload of the per-entity "ancestry changed" notification
//! - [`WatchOptions`] - Construction options for watchers
//! - [`WatcherFlags`] - Lifecycle state bits shared by every watcher

use std::fmt;

// =============================================================================
// Entity Identity
// =============================================================================

/// Identity of an entity that lives in the tree host.
///
/// Entities are never owned by this crate. An `EntityId` is only a key; the
/// host decides when the entity it names stops existing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// Ancestry Notification
// =============================================================================

/// Delivered to an entity's ancestry listeners whenever the entity itself or
/// one of its ancestors gets a new parent, and when the entity is destroyed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AncestryChange {
    /// The entity the listener was registered for.
    pub entity: EntityId,
    /// The entity that was actually moved (`entity` or one of its ancestors).
    pub moved: EntityId,
    /// New parent of `moved`. `None` means it was detached.
    pub new_parent: Option<EntityId>,
    /// Whether `entity` is still reachable from the scene root.
    pub in_scene: bool,
    /// Whether `entity` is being destroyed.
    pub destroyed: bool,
}

impl AncestryChange {
    /// True when the change takes `entity` out of the tree.
    pub fn is_removal(&self) -> bool {
        self.destroyed || !self.in_scene
    }
}

// =============================================================================
// Watch Options
// =============================================================================

/// Options shared by [`ChildWatcher`](crate::watcher::ChildWatcher),
/// [`SingleEntityWatcher`](crate::watcher::SingleEntityWatcher) and
/// [`AggregateWatcher`](crate::watcher::AggregateWatcher).
///
/// ```ignore
/// let options = WatchOptions::default().report_existing(false);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WatchOptions {
    /// Report a matching child that is already present when `watch()` runs.
    pub report_existing: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self { report_existing: true }
    }
}

impl WatchOptions {
    /// Set whether an already-present match is reported on `watch()`.
    pub fn report_existing(mut self, report_existing: bool) -> Self {
        self.report_existing = report_existing;
        self
    }
}

// =============================================================================
// Watcher Flags (bitflags)
// =============================================================================

bitflags::bitflags! {
    /// Lifecycle bits of a watcher.
    ///
    /// `DESTROYED` is terminal: once set, `WATCHING` is never set again.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WatcherFlags: u8 {
        const NONE = 0;
        const WATCHING = 1 << 0;
        const DESTROYED = 1 << 1;
        /// An occurrence scope is being released; new matches wait.
        const RELEASING = 1 << 2;
    }
}

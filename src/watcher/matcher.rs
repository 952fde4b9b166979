//! Child matchers - Decide which children a watcher cares about.

use crate::tree::TreeHost;
use crate::types::EntityId;

/// Discriminator used by [`ChildWatcher`](super::ChildWatcher).
pub trait ChildMatcher: 'static {
    fn matches(&self, host: &dyn TreeHost, child: EntityId) -> bool;

    /// First matching child currently under `parent`.
    fn find_existing(&self, host: &dyn TreeHost, parent: EntityId) -> Option<EntityId> {
        host.children_of(parent)
            .into_iter()
            .find(|child| self.matches(host, *child))
    }
}

/// Matches children of one exact class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassMatcher {
    class: String,
}

impl ClassMatcher {
    pub fn new(class: impl Into<String>) -> Self {
        Self { class: class.into() }
    }

    pub fn class(&self) -> &str {
        &self.class
    }
}

impl ChildMatcher for ClassMatcher {
    fn matches(&self, host: &dyn TreeHost, child: EntityId) -> bool {
        host.class_of(child).as_deref() == Some(self.class.as_str())
    }
}

/// Matches the child occupying a well-known named slot, whatever its class.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotMatcher {
    name: String,
}

impl SlotMatcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ChildMatcher for SlotMatcher {
    fn matches(&self, host: &dyn TreeHost, child: EntityId) -> bool {
        host.name_of(child).as_deref() == Some(self.name.as_str())
    }
}

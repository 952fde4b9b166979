//! ChildrenOf - A container's children as a [`MemberSet`].

use super::{EntityListener, HostRef, MemberSet};
use crate::events::Subscription;
use crate::types::EntityId;

/// Members are the current children of `container`. A child joins when it
/// is parented under the container and leaves when it is moved out or
/// destroyed.
#[derive(Clone)]
pub struct ChildrenOf {
    host: HostRef,
    container: EntityId,
}

impl ChildrenOf {
    pub fn new(host: HostRef, container: EntityId) -> Self {
        Self { host, container }
    }

    pub fn container(&self) -> EntityId {
        self.container
    }
}

impl MemberSet for ChildrenOf {
    fn members(&self) -> Vec<EntityId> {
        self.host.children_of(self.container)
    }

    fn on_joined(&self, listener: EntityListener) -> Subscription {
        self.host.on_child_added(self.container, listener)
    }

    fn on_left(&self, listener: EntityListener) -> Subscription {
        self.host.on_child_removed(self.container, listener)
    }
}

//! SceneTree - In-memory entity tree implementing [`TreeHost`].
//!
//! Manages entity identity and parent/child structure:
//! - A permanent scene root; entities reachable from it are "in the scene"
//! - Detached entities (spawned without a parent, or unparented) stay alive
//!   until destroyed
//! - `destroy` is recursive: children first, then the entity itself
//!
//! # Notification order
//!
//! `set_parent(entity, new)`:
//! 1. old parent's child-removed
//! 2. new parent's child-added
//! 3. ancestry change for `entity`, then for each descendant (pre-order)
//!
//! `destroy(entity)`, for every node bottom-up:
//! 1. parent's child-removed
//! 2. the node's own ancestry change (`destroyed: true`)
//! 3. the node's listeners are dropped
//!
//! All structure changes are applied before any notification is delivered,
//! and no borrow is held while listeners run.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::error::LifecycleError;
use crate::events::{Event, Subscription};
use crate::tree::{AncestryListener, EntityListener, TreeHost};
use crate::types::{AncestryChange, EntityId};

// =============================================================================
// Tree State
// =============================================================================

struct Node {
    class: String,
    name: String,
    parent: Option<EntityId>,
    children: Vec<EntityId>,
}

struct SceneState {
    nodes: HashMap<EntityId, Node>,
    next_id: u64,
    root: EntityId,
    ancestry: HashMap<EntityId, Event<AncestryChange>>,
    child_added: HashMap<EntityId, Event<EntityId>>,
    child_removed: HashMap<EntityId, Event<EntityId>>,
}

impl SceneState {
    fn allocate(&mut self, class: &str, name: &str) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(
            id,
            Node {
                class: class.to_string(),
                name: name.to_string(),
                parent: None,
                children: Vec::new(),
            },
        );
        id
    }

    fn in_scene(&self, entity: EntityId) -> bool {
        let mut current = Some(entity);
        while let Some(id) = current {
            if id == self.root {
                return true;
            }
            current = self.nodes.get(&id).and_then(|node| node.parent);
        }
        false
    }

    fn is_self_or_descendant(&self, ancestor: EntityId, candidate: EntityId) -> bool {
        let mut current = Some(candidate);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|node| node.parent);
        }
        false
    }

    /// `entity` followed by its descendants, pre-order.
    fn subtree(&self, entity: EntityId) -> Vec<EntityId> {
        let mut out = Vec::new();
        let mut stack = vec![entity];
        while let Some(id) = stack.pop() {
            out.push(id);
            if let Some(node) = self.nodes.get(&id) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    fn detach_from_parent(&mut self, entity: EntityId) -> Option<EntityId> {
        let parent = self.nodes.get_mut(&entity)?.parent.take()?;
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.retain(|child| *child != entity);
        }
        Some(parent)
    }
}

// =============================================================================
// SceneTree
// =============================================================================

/// Cloneable handle to an in-memory entity tree.
#[derive(Clone)]
pub struct SceneTree {
    state: Rc<RefCell<SceneState>>,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneTree {
    /// Create a tree containing only the scene root.
    pub fn new() -> Self {
        let mut state = SceneState {
            nodes: HashMap::new(),
            next_id: 0,
            root: EntityId(0),
            ancestry: HashMap::new(),
            child_added: HashMap::new(),
            child_removed: HashMap::new(),
        };
        state.root = state.allocate("Scene", "Scene");
        Self { state: Rc::new(RefCell::new(state)) }
    }

    pub fn root(&self) -> EntityId {
        self.state.borrow().root
    }

    /// Create a detached entity.
    pub fn spawn(&self, class: &str, name: &str) -> EntityId {
        let id = self.state.borrow_mut().allocate(class, name);
        tracing::trace!(entity = %id, class, name, "entity spawned");
        id
    }

    /// Create an entity and parent it under `parent`.
    pub fn spawn_child(&self, parent: EntityId, class: &str, name: &str) -> Result<EntityId, LifecycleError> {
        if !self.is_alive(parent) {
            return Err(LifecycleError::UnknownEntity(parent));
        }
        let id = self.spawn(class, name);
        self.set_parent(id, Some(parent))?;
        Ok(id)
    }

    /// Move `entity` under `parent`, or detach it with `None`.
    pub fn set_parent(&self, entity: EntityId, parent: Option<EntityId>) -> Result<(), LifecycleError> {
        let (removed_from, added_to, changes) = {
            let mut state = self.state.borrow_mut();

            if entity == state.root {
                return Err(LifecycleError::RootImmutable);
            }
            let Some(node) = state.nodes.get(&entity) else {
                return Err(LifecycleError::UnknownEntity(entity));
            };
            if node.parent == parent {
                return Ok(());
            }
            if let Some(parent) = parent {
                if !state.nodes.contains_key(&parent) {
                    return Err(LifecycleError::UnknownEntity(parent));
                }
                if state.is_self_or_descendant(entity, parent) {
                    return Err(LifecycleError::CyclicParent { child: entity, parent });
                }
            }

            let old_parent = state.detach_from_parent(entity);
            if let Some(parent) = parent {
                if let Some(node) = state.nodes.get_mut(&entity) {
                    node.parent = Some(parent);
                }
                if let Some(parent_node) = state.nodes.get_mut(&parent) {
                    parent_node.children.push(entity);
                }
            }

            let in_scene = state.in_scene(entity);
            let changes: Vec<(Event<AncestryChange>, AncestryChange)> = state
                .subtree(entity)
                .into_iter()
                .filter_map(|id| {
                    let event = state.ancestry.get(&id)?.clone();
                    Some((
                        event,
                        AncestryChange {
                            entity: id,
                            moved: entity,
                            new_parent: parent,
                            in_scene,
                            destroyed: false,
                        },
                    ))
                })
                .collect();

            let removed_from = old_parent.and_then(|p| state.child_removed.get(&p).cloned());
            let added_to = parent.and_then(|p| state.child_added.get(&p).cloned());
            (removed_from, added_to, changes)
        };

        tracing::trace!(entity = %entity, parent = ?parent, "entity reparented");

        if let Some(event) = removed_from {
            event.emit(&entity);
        }
        if let Some(event) = added_to {
            event.emit(&entity);
        }
        for (event, change) in changes {
            event.emit(&change);
        }
        Ok(())
    }

    /// Destroy `entity` and all of its descendants. Returns `false` if the
    /// entity did not exist.
    pub fn destroy(&self, entity: EntityId) -> Result<bool, LifecycleError> {
        if entity == self.root() {
            return Err(LifecycleError::RootImmutable);
        }
        if !self.is_alive(entity) {
            return Ok(false);
        }
        self.destroy_node(entity);
        Ok(true)
    }

    fn destroy_node(&self, entity: EntityId) {
        let children = match self.state.borrow().nodes.get(&entity) {
            Some(node) => node.children.clone(),
            None => return,
        };
        for child in children {
            self.destroy_node(child);
        }

        // A listener may have destroyed this node while its children went
        let (removed_from, ancestry) = {
            let mut state = self.state.borrow_mut();
            if !state.nodes.contains_key(&entity) {
                return;
            }
            let old_parent = state.detach_from_parent(entity);
            let removed_from = old_parent.and_then(|p| state.child_removed.get(&p).cloned());
            (removed_from, state.ancestry.get(&entity).cloned())
        };

        if let Some(event) = removed_from {
            event.emit(&entity);
        }
        if let Some(event) = ancestry {
            event.emit(&AncestryChange {
                entity,
                moved: entity,
                new_parent: None,
                in_scene: false,
                destroyed: true,
            });
        }

        let listeners = {
            let mut state = self.state.borrow_mut();
            // Listeners may have reparented it during the notifications above
            state.detach_from_parent(entity);
            state.nodes.remove(&entity);
            (
                state.ancestry.remove(&entity),
                state.child_added.remove(&entity),
                state.child_removed.remove(&entity),
            )
        };
        let (ancestry, added, removed) = listeners;
        if let Some(event) = ancestry {
            event.clear();
        }
        if let Some(event) = added {
            event.clear();
        }
        if let Some(event) = removed {
            event.clear();
        }

        tracing::trace!(entity = %entity, "entity destroyed");
    }

    /// Number of live entities, including the root.
    pub fn entity_count(&self) -> usize {
        self.state.borrow().nodes.len()
    }

    fn event_for<T: 'static>(
        &self,
        entity: EntityId,
        select: impl FnOnce(&mut SceneState) -> &mut HashMap<EntityId, Event<T>>,
    ) -> Option<Event<T>> {
        let mut state = self.state.borrow_mut();
        if !state.nodes.contains_key(&entity) {
            return None;
        }
        Some(select(&mut *state).entry(entity).or_default().clone())
    }
}

impl TreeHost for SceneTree {
    fn is_alive(&self, entity: EntityId) -> bool {
        self.state.borrow().nodes.contains_key(&entity)
    }

    fn is_in_scene(&self, entity: EntityId) -> bool {
        let state = self.state.borrow();
        state.nodes.contains_key(&entity) && state.in_scene(entity)
    }

    fn parent_of(&self, entity: EntityId) -> Option<EntityId> {
        self.state.borrow().nodes.get(&entity).and_then(|node| node.parent)
    }

    fn class_of(&self, entity: EntityId) -> Option<String> {
        self.state.borrow().nodes.get(&entity).map(|node| node.class.clone())
    }

    fn name_of(&self, entity: EntityId) -> Option<String> {
        self.state.borrow().nodes.get(&entity).map(|node| node.name.clone())
    }

    fn children_of(&self, parent: EntityId) -> Vec<EntityId> {
        self.state
            .borrow()
            .nodes
            .get(&parent)
            .map(|node| node.children.clone())
            .unwrap_or_default()
    }

    fn on_ancestry_changed(&self, entity: EntityId, listener: AncestryListener) -> Subscription {
        match self.event_for(entity, |state| &mut state.ancestry) {
            Some(event) => event.connect(listener),
            None => Subscription::inert(),
        }
    }

    fn on_child_added(&self, parent: EntityId, listener: EntityListener) -> Subscription {
        match self.event_for(parent, |state| &mut state.child_added) {
            Some(event) => event.connect(listener),
            None => Subscription::inert(),
        }
    }

    fn on_child_removed(&self, parent: EntityId, listener: EntityListener) -> Subscription {
        match self.event_for(parent, |state| &mut state.child_removed) {
            Some(event) => event.connect(listener),
            None => Subscription::inert(),
        }
    }
}

//! KeyedDisposerRegistry - One lazily-created [`DisposerList`] per key.
//!
//! Every operation that targets a key creates its list on first touch,
//! except [`has`](KeyedDisposerRegistry::has). The registry is a cloneable
//! handle so a disposer can re-enter it; releasing a key while one of its
//! disposers adds to the same key drains the new disposer too.
//!
//! Bulk operations walk keys in insertion order.

use std::cell::RefCell;
use std::hash::Hash;
use std::rc::Rc;

use indexmap::IndexMap;

use super::list::{Disposer, DisposerList};
use crate::error::LifecycleError;

pub struct KeyedDisposerRegistry<K> {
    lists: Rc<RefCell<IndexMap<K, Rc<DisposerList>>>>,
}

impl<K> Clone for KeyedDisposerRegistry<K> {
    fn clone(&self) -> Self {
        Self { lists: self.lists.clone() }
    }
}

impl<K: Hash + Eq + Clone + 'static> Default for KeyedDisposerRegistry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Hash + Eq + Clone + 'static> KeyedDisposerRegistry<K> {
    pub fn new() -> Self {
        Self { lists: Rc::new(RefCell::new(IndexMap::new())) }
    }

    fn list_for(&self, key: &K) -> Rc<DisposerList> {
        if let Some(list) = self.lists.borrow().get(key) {
            return list.clone();
        }
        let list = Rc::new(DisposerList::new());
        self.lists.borrow_mut().insert(key.clone(), list.clone());
        list
    }

    /// Add a cleanup callback under `key`.
    pub fn add(&self, key: K, f: impl FnOnce() + 'static) {
        self.add_disposer(key, Disposer::action(f));
    }

    pub fn add_disposer(&self, key: K, disposer: Disposer) {
        self.list_for(&key).add_disposer(disposer);
    }

    /// Release everything under `key`. The key stays registered with an
    /// empty list.
    pub fn release(&self, key: &K) -> Result<(), LifecycleError> {
        self.list_for(key).release()
    }

    /// Release every key's list, in insertion order. Keys first touched
    /// during this call are not part of it.
    pub fn release_all(&self) -> Result<(), LifecycleError> {
        let lists: Vec<Rc<DisposerList>> = self.lists.borrow().values().cloned().collect();
        LifecycleError::merge_batch(lists.iter().map(|list| list.release()))
    }

    /// Release `key`, then forget it.
    ///
    /// A disposer that re-adds to `key` while the release runs is drained by
    /// the same release. Anything added to `key` afterwards lands in a fresh
    /// list.
    pub fn delete(&self, key: &K) -> Result<(), LifecycleError> {
        let result = self.list_for(key).release();
        let removed = self.lists.borrow_mut().shift_remove(key);
        drop(removed);
        result
    }

    /// Delete every key, in insertion order.
    pub fn delete_all(&self) -> Result<(), LifecycleError> {
        let keys = self.keys();
        LifecycleError::merge_batch(keys.iter().map(|key| self.delete(key)))
    }

    /// Whether `key` has a list. Never creates one.
    pub fn has(&self, key: &K) -> bool {
        self.lists.borrow().contains_key(key)
    }

    pub fn keys(&self) -> Vec<K> {
        self.lists.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lists.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.borrow().is_empty()
    }
}

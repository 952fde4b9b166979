//! Events - Multi-listener broadcast with explicit subscriptions.
//!
//! Used for every notification point in the crate: watcher `on_added` /
//! `on_removed`, and the host's ancestry / child notifications.
//!
//! Listener subscriptions are deliberately a separate concept from
//! [`DisposerList`](crate::disposer::DisposerList): a [`Subscription`] only
//! disconnects a listener. It can still be parked in a disposer list because
//! it implements [`Disposable`].
//!
//! # Re-entrancy
//!
//! `emit` snapshots the listener list and releases its borrow before calling
//! anything, so a listener may connect, disconnect or emit again. A listener
//! disconnected mid-emit is skipped; one connected mid-emit first hears the
//! next emission.
//!
//! ```ignore
//! let event = Event::<u32>::new();
//! let mut sub = event.connect(|value| println!("got {value}"));
//! event.emit(&1);
//! sub.unsubscribe();
//! ```

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::disposer::Disposable;
use crate::error::DisposeResult;

type Listener<T> = Rc<dyn Fn(&T)>;

struct Listeners<T> {
    entries: Vec<(u64, Listener<T>)>,
    next_id: u64,
}

impl<T> Listeners<T> {
    fn contains(&self, id: u64) -> bool {
        self.entries.iter().any(|(entry_id, _)| *entry_id == id)
    }
}

// =============================================================================
// Event
// =============================================================================

/// Cloneable broadcast handle. Clones share the same listener list.
pub struct Event<T> {
    listeners: Rc<RefCell<Listeners<T>>>,
}

impl<T> Clone for Event<T> {
    fn clone(&self) -> Self {
        Self { listeners: self.listeners.clone() }
    }
}

impl<T: 'static> Default for Event<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Event<T> {
    pub fn new() -> Self {
        Self {
            listeners: Rc::new(RefCell::new(Listeners {
                entries: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Register a listener. It stays connected until the returned
    /// subscription is unsubscribed or [`clear`](Self::clear) is called.
    pub fn connect(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        let listener: Listener<T> = Rc::new(listener);
        let id = {
            let mut listeners = self.listeners.borrow_mut();
            let id = listeners.next_id;
            listeners.next_id += 1;
            listeners.entries.push((id, listener));
            id
        };

        let weak: Weak<RefCell<Listeners<T>>> = Rc::downgrade(&self.listeners);
        Subscription::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners.borrow_mut().entries.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Deliver `value` to every listener connected when the emission began.
    pub fn emit(&self, value: &T) {
        let snapshot: Vec<(u64, Listener<T>)> = self.listeners.borrow().entries.clone();

        for (id, listener) in snapshot {
            // Skip listeners disconnected by an earlier listener in this pass
            if !self.listeners.borrow().contains(id) {
                continue;
            }
            listener(value);
        }
    }

    /// Disconnect every listener.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut self.listeners.borrow_mut().entries);
        drop(removed);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().entries.len()
    }
}

// =============================================================================
// Subscription
// =============================================================================

/// Handle to one connected listener.
///
/// Dropping a subscription does not disconnect it; call
/// [`unsubscribe`](Self::unsubscribe) or hand it to a disposer list.
#[must_use = "a subscription stays connected until unsubscribe() is called"]
pub struct Subscription {
    disconnect: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wrap a disconnect action. Hosts use this to expose their own
    /// notification streams.
    pub fn new(disconnect: impl FnOnce() + 'static) -> Self {
        Self { disconnect: Some(Box::new(disconnect)) }
    }

    /// A subscription that is already disconnected.
    pub fn inert() -> Self {
        Self { disconnect: None }
    }

    /// Disconnect the listener. Idempotent.
    pub fn unsubscribe(&mut self) {
        if let Some(disconnect) = self.disconnect.take() {
            disconnect();
        }
    }

    pub fn is_active(&self) -> bool {
        self.disconnect.is_some()
    }
}

impl Disposable for Subscription {
    fn dispose(&mut self) -> DisposeResult {
        self.unsubscribe();
        Ok(())
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

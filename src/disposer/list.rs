//! DisposerList - Ordered, exactly-once cleanup.
//!
//! A list holds [`Disposer`]s and runs them in registration order when
//! released. Release pops one disposer at a time and never holds a borrow
//! while a disposer runs, so a disposer may add more cleanup to the same
//! list (through a [`DisposerHandle`]) and it still runs before `release`
//! returns.
//!
//! # Failure policy
//!
//! Continue and aggregate. A failing disposer does not stop the release:
//! every remaining disposer still runs, and `release` returns
//! [`LifecycleError::Release`] listing each failure with its position.
//! Panics are not caught. The disposers after the panicking one stay queued
//! and the next `release` drains them.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use crate::error::{DisposeFailure, DisposeResult, LifecycleError};

// =============================================================================
// Disposer
// =============================================================================

/// Something that can release itself.
pub trait Disposable {
    fn dispose(&mut self) -> DisposeResult;
}

/// One unit of cleanup.
pub enum Disposer {
    /// Infallible callback.
    Action(Box<dyn FnOnce()>),
    /// Callback that may report a failure.
    Fallible(Box<dyn FnOnce() -> DisposeResult>),
    /// Nested disposable (another list, a subscription, ...).
    Nested(Box<dyn Disposable>),
}

impl Disposer {
    pub fn action(f: impl FnOnce() + 'static) -> Self {
        Self::Action(Box::new(f))
    }

    pub fn fallible(f: impl FnOnce() -> DisposeResult + 'static) -> Self {
        Self::Fallible(Box::new(f))
    }

    pub fn nested(disposable: impl Disposable + 'static) -> Self {
        Self::Nested(Box::new(disposable))
    }

    /// Run this disposer, consuming it.
    pub fn run(self) -> DisposeResult {
        match self {
            Self::Action(f) => {
                f();
                Ok(())
            }
            Self::Fallible(f) => f(),
            Self::Nested(mut disposable) => disposable.dispose(),
        }
    }
}

impl std::fmt::Debug for Disposer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Action(_) => "Action",
            Self::Fallible(_) => "Fallible",
            Self::Nested(_) => "Nested",
        };
        f.debug_tuple("Disposer").field(&kind).finish()
    }
}

type Queue = RefCell<VecDeque<Disposer>>;

// =============================================================================
// DisposerList
// =============================================================================

/// Ordered collection of disposers, released exactly once each.
///
/// The list is reusable: after a release it is empty and accepts new
/// disposers. Dropping a non-empty list releases it and logs failures.
pub struct DisposerList {
    queue: Rc<Queue>,
}

impl Default for DisposerList {
    fn default() -> Self {
        Self::new()
    }
}

impl DisposerList {
    pub fn new() -> Self {
        Self { queue: Rc::new(RefCell::new(VecDeque::new())) }
    }

    /// Append a cleanup callback.
    pub fn add(&self, f: impl FnOnce() + 'static) {
        self.add_disposer(Disposer::action(f));
    }

    /// Append a cleanup callback that may fail.
    pub fn add_fallible(&self, f: impl FnOnce() -> DisposeResult + 'static) {
        self.add_disposer(Disposer::fallible(f));
    }

    /// Append a nested disposable.
    pub fn add_disposable(&self, disposable: impl Disposable + 'static) {
        self.add_disposer(Disposer::nested(disposable));
    }

    pub fn add_disposer(&self, disposer: Disposer) {
        self.queue.borrow_mut().push_back(disposer);
    }

    /// Run every held disposer in order, including ones added while the
    /// release is in progress. Releasing an empty list is a no-op.
    pub fn release(&self) -> Result<(), LifecycleError> {
        let mut failures = Vec::new();
        let mut position = 0;

        loop {
            // One at a time: the running disposer may push more onto the queue
            let next = self.queue.borrow_mut().pop_front();
            let Some(disposer) = next else { break };

            if let Err(source) = disposer.run() {
                tracing::warn!(position, error = %source, "disposer failed during release");
                failures.push(DisposeFailure { list: 0, position, source });
            }
            position += 1;
        }

        if position > 0 {
            tracing::trace!(released = position, failed = failures.len(), "disposer list released");
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::Release(failures))
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Weak handle for registering cleanup into this list from elsewhere,
    /// including from inside one of its own disposers.
    pub fn handle(&self) -> DisposerHandle {
        DisposerHandle { queue: Rc::downgrade(&self.queue) }
    }
}

impl Disposable for DisposerList {
    fn dispose(&mut self) -> DisposeResult {
        self.release().map_err(Into::into)
    }
}

impl Drop for DisposerList {
    fn drop(&mut self) {
        if self.is_empty() {
            return;
        }
        if let Err(error) = self.release() {
            tracing::error!(%error, "disposer list dropped with failing disposers");
        }
    }
}

impl std::fmt::Debug for DisposerList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposerList")
            .field("len", &self.len())
            .finish()
    }
}

// =============================================================================
// DisposerHandle
// =============================================================================

/// Weak reference to a [`DisposerList`].
///
/// Adding through a handle whose list no longer exists runs the disposer
/// immediately, so cleanup registered too late is never leaked.
#[derive(Clone)]
pub struct DisposerHandle {
    queue: Weak<Queue>,
}

impl DisposerHandle {
    pub fn add(&self, f: impl FnOnce() + 'static) {
        self.add_disposer(Disposer::action(f));
    }

    pub fn add_fallible(&self, f: impl FnOnce() -> DisposeResult + 'static) {
        self.add_disposer(Disposer::fallible(f));
    }

    pub fn add_disposable(&self, disposable: impl Disposable + 'static) {
        self.add_disposer(Disposer::nested(disposable));
    }

    pub fn add_disposer(&self, disposer: Disposer) {
        match self.queue.upgrade() {
            Some(queue) => queue.borrow_mut().push_back(disposer),
            None => {
                tracing::trace!("disposer list is gone, running disposer immediately");
                if let Err(error) = disposer.run() {
                    tracing::warn!(%error, "late disposer failed");
                }
            }
        }
    }

    /// Whether the list behind this handle still exists.
    pub fn is_live(&self) -> bool {
        self.queue.strong_count() > 0
    }
}

impl std::fmt::Debug for DisposerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisposerHandle")
            .field("live", &self.is_live())
            .finish()
    }
}

//! Error types.

use std::error::Error as StdError;

use thiserror::Error;

use crate::types::EntityId;

/// Result returned by a fallible disposer.
pub type DisposeResult = Result<(), Box<dyn StdError + 'static>>;

/// Errors raised by the lifecycle core.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// `watch()` (or re-targeting) was called on a destroyed watcher.
    #[error("watcher has been destroyed and cannot watch again")]
    WatcherDestroyed,

    /// One or more disposers failed while a list was being released.
    /// Every other disposer in the list still ran.
    #[error("{} disposer(s) failed during release: {}", .0.len(), join_failures(.0))]
    Release(Vec<DisposeFailure>),

    /// The tree host has no entity with this id.
    #[error("entity {0} does not exist")]
    UnknownEntity(EntityId),

    /// Reparenting would make an entity its own ancestor.
    #[error("cannot parent {child} under {parent}: it is {child} or one of its descendants")]
    CyclicParent { child: EntityId, parent: EntityId },

    /// The scene root cannot be reparented or destroyed.
    #[error("the scene root cannot be reparented or destroyed")]
    RootImmutable,
}

impl LifecycleError {
    /// Merge errors from several teardown steps into one. Each error counts
    /// as its own list, numbered in order.
    pub(crate) fn merge_releases(errors: Vec<LifecycleError>) -> Result<(), LifecycleError> {
        Self::merge_batch(errors.into_iter().map(Err))
    }

    /// Merge the outcomes of releasing several lists, in release order.
    ///
    /// A failure's `list` is the index of its outcome, successful lists
    /// included, and it keeps its position within that list. An error that
    /// is not a release failure is recorded as position 0 of its list.
    pub(crate) fn merge_batch(
        results: impl IntoIterator<Item = Result<(), LifecycleError>>,
    ) -> Result<(), LifecycleError> {
        let mut failures = Vec::new();
        for (list, result) in results.into_iter().enumerate() {
            match result {
                Ok(()) => {}
                Err(LifecycleError::Release(inner)) => {
                    failures.extend(inner.into_iter().map(|failure| DisposeFailure { list, ..failure }));
                }
                Err(other) => failures.push(DisposeFailure {
                    list,
                    position: 0,
                    source: Box::new(other),
                }),
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::Release(failures))
        }
    }
}

/// A single disposer failure.
#[derive(Debug, Error)]
#[error("disposer {position} of list {list} failed: {source}")]
pub struct DisposeFailure {
    /// Which released list the disposer belonged to. Always 0 for a single
    /// [`DisposerList::release`](crate::disposer::DisposerList::release);
    /// batch operations number their lists in release order.
    pub list: usize,
    /// Position of the disposer in its list's release order.
    pub position: usize,
    #[source]
    pub source: Box<dyn StdError + 'static>,
}

fn join_failures(failures: &[DisposeFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

//! # spark-lifecycle
//!
//! Entity-bound resource lifecycles for Rust.
//!
//! Built on [spark-signals](https://github.com/RLabs-Inc/spark-signals) for reactive
//! membership and "current child" state.
//!
//! ## Architecture
//!
//! Entities live in a tree owned by a host (anything implementing [`TreeHost`]).
//! This crate never owns them. It binds cleanup to their lifetimes instead:
//!
//! ```text
//! DisposerList ──> KeyedDisposerRegistry
//!      │
//!      ├──> EntityCollection ──> EntitySet / EntityMap
//!      │
//!      └──> ChildWatcher ──> SingleEntityWatcher ──> AggregateWatcher
//! ```
//!
//! Everything is single-threaded and synchronous. Host notifications arrive
//! as callbacks, and every release path tolerates being re-entered from the
//! callbacks it runs.
//!
//! ## Modules
//!
//! - [`disposer`] - Ordered cleanup lists and per-key registries
//! - [`events`] - Listener lists and subscriptions
//! - [`tree`] - The host boundary plus an in-memory [`SceneTree`]
//! - [`collection`] - Cleanup that ends when an entity leaves the tree
//! - [`watcher`] - Matching children appearing and disappearing
//! - [`error`] - [`LifecycleError`]
//! - [`types`] - Core types ([`EntityId`], [`AncestryChange`], [`WatchOptions`])

pub mod collection;
pub mod disposer;
pub mod error;
pub mod events;
pub mod tree;
pub mod types;
pub mod watcher;

// Re-export commonly used items
pub use types::*;

pub use error::{DisposeFailure, DisposeResult, LifecycleError};

pub use events::{Event, Subscription};

pub use disposer::{Disposable, Disposer, DisposerHandle, DisposerList, KeyedDisposerRegistry};

pub use tree::{ChildrenOf, HostRef, MemberSet, SceneTree, TreeHost};

pub use collection::{EntityCollection, EntityMap, EntitySet, TrackOutcome};

pub use watcher::{
    AggregateWatcher, ChildMatcher, ChildWatcher, ClassMatcher, MemberOccurrence, MemberRemoval,
    Occurrence, SingleEntityWatcher, SlotMatcher,
};

//! Disposers - Cleanup primitives the rest of the crate is built on.
//!
//! - [`DisposerList`] - Ordered, exactly-once, re-entrant cleanup list
//! - [`DisposerHandle`] - Weak registration handle into a list
//! - [`KeyedDisposerRegistry`] - Lazily-created list per key

mod keyed;
mod list;

pub use keyed::KeyedDisposerRegistry;
pub use list::{Disposable, Disposer, DisposerHandle, DisposerList};

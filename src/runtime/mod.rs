//! Runtime support for stores and bridges.
//!
//! This module provides the thread-local notification queue every store
//! flushes through, and the scoped form context used by context-based field
//! lookups.

mod context;
pub(crate) mod queue;

pub use context::FormContext;
pub use queue::is_flushing;

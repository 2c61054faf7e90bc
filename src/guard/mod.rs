//! Change guards.
//!
//! Small helpers that keep a side effect from running again for a value it
//! already saw.

mod change;

pub use change::{shallow_equal, strict_equal, WhenValueChanges};

//! Observable stores.
//!
//! A [`Store`] holds one value and pushes every change to its subscribers.
//! [`derived`] and friends compose stores into new read-only stores that only
//! compute while someone is listening.

mod derived;
mod equality;
mod store;

pub use derived::{
    derived, derived2, derived2_with, derived3, derived_all, derived_all_with, derived_with, Cleanup,
};
pub use equality::SafeEq;
pub use store::{Readable, Setter, StopFn, Store, Subscribable, Subscription};

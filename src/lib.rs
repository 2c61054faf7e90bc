//! # Tinform
//!
//! Reactive stores and field bindings for push-based form engines.
//!
//! Tinform sits between a form engine that pushes state changes to listeners
//! and UI code that wants to subscribe to values. It works at two levels:
//!
//! ## Stores (Low-level primitives)
//!
//! Single-threaded observable values:
//! - `Store<T>` - Writable value with lazy start/stop tied to its subscribers
//! - `Readable<T>` - Read-only handle driven by a start function
//! - `derived*` - Stores computed from one or more sources, glitch-free
//! - `WhenValueChanges` - Runs a side effect only for values it has not seen
//!
//! ## Bindings (Form engine adapters)
//!
//! Stores over an external form engine described by the `FormApi` trait:
//! - `use_field` - Input view, event handlers and meta for one field
//! - `use_field_array` - Lazily named array items with curried mutators
//! - `use_form_state`, `FormBinding`, `FormSpy` - Form-level state and option
//!   syncing
//!
//! An in-memory engine, `testing::MemoryForm`, implements `FormApi` for tests
//! and demos.

pub mod array;
pub mod error;
pub mod field;
pub mod form;
pub mod guard;
pub mod runtime;
pub mod store;
pub mod testing;

// Re-export main types for convenience
pub use array::{use_field_array, FieldArrayConfig, FieldArrayStore};
pub use error::{Error, Result};
pub use field::{use_field, FieldConfig, FieldStore};
pub use form::{use_form_state, FormApi, FormBinding, FormHandle, FormSpy};
pub use guard::WhenValueChanges;
pub use store::{derived, derived2, derived3, derived_all, Readable, Store, Subscribable, Subscription};

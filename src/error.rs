//! Configuration errors.
//!
//! These are raised while wiring fields to a form, never while values flow.
//! Validation results are data and live in [`crate::form::FieldError`].

use thiserror::Error;

/// Result type for tinform setup operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while binding fields to a form
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A field was resolved from the form context while no form was provided
    #[error("no form in context; wrap field creation in FormContext::provide or pass the form handle")]
    NoFormContext,

    /// A field array was created on a form without array mutators
    #[error("array mutators not found for {name:?}; the form engine must provide at least `push` and `pop`")]
    MissingArrayMutators {
        /// Name of the array field
        name: String,
    },

    /// A mutator was called that the form engine does not provide
    #[error("form engine has no mutator named {mutator:?}")]
    UnknownMutator {
        /// Name of the requested mutator
        mutator: String,
    },
}

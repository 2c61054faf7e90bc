//! The form engine contract and form-level bindings.
//!
//! The engine itself lives outside this crate. [`FormApi`] is the surface the
//! field and array bindings consume; [`crate::testing::MemoryForm`] is an
//! in-memory implementation of it.

mod api;
mod binding;
mod state;
mod subscription;
mod validation;

pub use api::{
    FieldListener, FieldRegistration, FormApi, FormHandle, FormListener, FormOption, Mutator,
    Mutators, Unsubscribe,
};
pub use binding::{
    use_form_state, FormBinding, FormConfig, FormObserver, FormSpy, FormStateConfig,
    InitialValuesEqual,
};
pub use state::{ChangeFn, FieldEventFn, FieldMeta, FieldState, FormState};
pub use subscription::{FieldSubscription, FormSubscription};
pub use validation::{ArrayErrors, FieldError, IsEqual, Validator, ARRAY_ERROR};

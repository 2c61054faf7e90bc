use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;

use super::state::{FieldState, FormState};
use super::subscription::{FieldSubscription, FormSubscription};
use super::validation::{IsEqual, Validator};

/// Teardown returned by the engine's subscribe calls.
pub type Unsubscribe = Box<dyn FnOnce()>;

/// Receives form snapshots.
pub type FormListener = Rc<dyn Fn(&FormState)>;

/// Receives field snapshots.
pub type FieldListener = Rc<dyn Fn(&FieldState)>;

/// A named engine mutator: `(field_name, args) -> result`.
pub type Mutator = Rc<dyn Fn(&str, &[Value]) -> Option<Value>>;

/// Mutators exposed by the engine, keyed by name.
pub type Mutators = BTreeMap<String, Mutator>;

/// Shared handle to a form engine.
pub type FormHandle = Rc<dyn FormApi>;

/// Per-field configuration passed through to the engine at registration.
#[derive(Clone, Default)]
pub struct FieldRegistration {
    pub validate: Option<Validator>,
    pub initial_value: Option<Value>,
    pub default_value: Option<Value>,
    pub is_equal: Option<IsEqual>,
}

impl fmt::Debug for FieldRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRegistration")
            .field("validate", &self.validate.is_some())
            .field("initial_value", &self.initial_value)
            .field("default_value", &self.default_value)
            .field("is_equal", &self.is_equal.is_some())
            .finish()
    }
}

/// Form options that can change after creation.
#[derive(Debug, Clone, PartialEq)]
pub enum FormOption {
    InitialValues(Option<Value>),
    KeepDirtyOnReinitialize(bool),
}

/// The form engine surface this crate consumes.
///
/// Implementations push snapshots to listeners synchronously, including once
/// right after registration, and only call a listener again when a key in its
/// mask changed.
pub trait FormApi {
    /// Listen to form-level state.
    fn subscribe(&self, listener: FormListener, subscription: FormSubscription) -> Unsubscribe;

    /// Register a field and listen to its state.
    fn register_field(
        &self,
        name: &str,
        listener: FieldListener,
        subscription: FieldSubscription,
        config: FieldRegistration,
    ) -> Unsubscribe;

    /// Mutators installed on the form.
    fn mutators(&self) -> Mutators;

    /// Change a form option.
    fn set_config(&self, option: FormOption);
}

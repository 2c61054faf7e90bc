use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use super::subscription::{FieldSubscription, FormSubscription};
use super::validation::FieldError;

/// Engine callback marking a field blurred or focused.
pub type FieldEventFn = Rc<dyn Fn()>;

/// Engine callback writing a field value.
pub type ChangeFn = Rc<dyn Fn(Option<Value>)>;

/// Everything the engine reports about a field besides its value and
/// callbacks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMeta {
    pub active: bool,
    pub data: Map<String, Value>,
    pub dirty: bool,
    pub dirty_since_last_submit: bool,
    pub error: Option<FieldError>,
    pub initial: Option<Value>,
    pub invalid: bool,
    /// Item count when the value is an array.
    pub length: Option<usize>,
    pub modified: bool,
    pub modified_since_last_submit: bool,
    pub pristine: bool,
    pub submit_error: Option<Value>,
    pub submit_failed: bool,
    pub submit_succeeded: bool,
    pub submitting: bool,
    pub touched: bool,
    pub valid: bool,
    pub validating: bool,
    pub visited: bool,
}

impl FieldMeta {
    /// Whether any key selected by `mask` differs between the two snapshots.
    pub fn differs(&self, other: &Self, mask: FieldSubscription) -> bool {
        let checks: [(FieldSubscription, bool); 19] = [
            (FieldSubscription::ACTIVE, self.active != other.active),
            (FieldSubscription::DATA, self.data != other.data),
            (FieldSubscription::DIRTY, self.dirty != other.dirty),
            (
                FieldSubscription::DIRTY_SINCE_LAST_SUBMIT,
                self.dirty_since_last_submit != other.dirty_since_last_submit,
            ),
            (FieldSubscription::ERROR, self.error != other.error),
            (FieldSubscription::INITIAL, self.initial != other.initial),
            (FieldSubscription::INVALID, self.invalid != other.invalid),
            (FieldSubscription::LENGTH, self.length != other.length),
            (FieldSubscription::MODIFIED, self.modified != other.modified),
            (
                FieldSubscription::MODIFIED_SINCE_LAST_SUBMIT,
                self.modified_since_last_submit != other.modified_since_last_submit,
            ),
            (FieldSubscription::PRISTINE, self.pristine != other.pristine),
            (FieldSubscription::SUBMIT_ERROR, self.submit_error != other.submit_error),
            (FieldSubscription::SUBMIT_FAILED, self.submit_failed != other.submit_failed),
            (
                FieldSubscription::SUBMIT_SUCCEEDED,
                self.submit_succeeded != other.submit_succeeded,
            ),
            (FieldSubscription::SUBMITTING, self.submitting != other.submitting),
            (FieldSubscription::TOUCHED, self.touched != other.touched),
            (FieldSubscription::VALID, self.valid != other.valid),
            (FieldSubscription::VALIDATING, self.validating != other.validating),
            (FieldSubscription::VISITED, self.visited != other.visited),
        ];
        checks
            .iter()
            .any(|(key, changed)| *changed && mask.contains(*key))
    }
}

/// A field snapshot pushed by the engine.
#[derive(Clone)]
pub struct FieldState {
    pub name: String,
    /// `None` while the field has no value at all.
    pub value: Option<Value>,
    pub meta: FieldMeta,
    pub blur: FieldEventFn,
    pub change: ChangeFn,
    pub focus: FieldEventFn,
}

impl FieldState {
    /// Whether any key selected by `mask` differs between the two snapshots.
    pub fn differs(&self, other: &Self, mask: FieldSubscription) -> bool {
        (mask.contains(FieldSubscription::VALUE) && self.value != other.value)
            || self.meta.differs(&other.meta, mask)
    }
}

impl fmt::Debug for FieldState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldState")
            .field("name", &self.name)
            .field("value", &self.value)
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

/// A form snapshot pushed by the engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormState {
    /// Name of the focused field.
    pub active: Option<String>,
    pub dirty: bool,
    pub dirty_fields: BTreeMap<String, bool>,
    pub errors: BTreeMap<String, FieldError>,
    pub has_validation_errors: bool,
    pub initial_values: Value,
    pub invalid: bool,
    pub modified: BTreeMap<String, bool>,
    pub pristine: bool,
    pub submit_errors: Option<Value>,
    pub submit_failed: bool,
    pub submit_succeeded: bool,
    pub submitting: bool,
    pub touched: BTreeMap<String, bool>,
    pub valid: bool,
    pub validating: bool,
    pub values: Value,
    pub visited: BTreeMap<String, bool>,
}

impl FormState {
    /// Whether any key selected by `mask` differs between the two snapshots.
    pub fn differs(&self, other: &Self, mask: FormSubscription) -> bool {
        let checks: [(FormSubscription, bool); 18] = [
            (FormSubscription::ACTIVE, self.active != other.active),
            (FormSubscription::DIRTY, self.dirty != other.dirty),
            (FormSubscription::DIRTY_FIELDS, self.dirty_fields != other.dirty_fields),
            (FormSubscription::ERRORS, self.errors != other.errors),
            (
                FormSubscription::HAS_VALIDATION_ERRORS,
                self.has_validation_errors != other.has_validation_errors,
            ),
            (FormSubscription::INITIAL_VALUES, self.initial_values != other.initial_values),
            (FormSubscription::INVALID, self.invalid != other.invalid),
            (FormSubscription::MODIFIED, self.modified != other.modified),
            (FormSubscription::PRISTINE, self.pristine != other.pristine),
            (FormSubscription::SUBMIT_ERRORS, self.submit_errors != other.submit_errors),
            (FormSubscription::SUBMIT_FAILED, self.submit_failed != other.submit_failed),
            (
                FormSubscription::SUBMIT_SUCCEEDED,
                self.submit_succeeded != other.submit_succeeded,
            ),
            (FormSubscription::SUBMITTING, self.submitting != other.submitting),
            (FormSubscription::TOUCHED, self.touched != other.touched),
            (FormSubscription::VALID, self.valid != other.valid),
            (FormSubscription::VALIDATING, self.validating != other.validating),
            (FormSubscription::VALUES, self.values != other.values),
            (FormSubscription::VISITED, self.visited != other.visited),
        ];
        checks
            .iter()
            .any(|(key, changed)| *changed && mask.contains(*key))
    }
}

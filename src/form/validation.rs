use std::rc::Rc;

use serde_json::Value;

/// Key the form engine reserves for an error about a whole array.
pub const ARRAY_ERROR: &str = "FINAL_FORM/array-error";

/// A validation result.
///
/// Errors are plain data produced by validators; nothing here is a Rust error.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldError {
    /// An error value for a single field, usually a message string.
    Value(Value),
    /// Errors for an array field: one slot per item plus an optional
    /// array-level error.
    Array(ArrayErrors),
}

impl FieldError {
    /// A string error.
    pub fn message(message: impl Into<String>) -> Self {
        Self::Value(Value::String(message.into()))
    }

    /// Whether this error is shaped like an array.
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_) | Self::Value(Value::Array(_)))
    }

    /// The message of a string error.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Value(Value::String(message)) => Some(message),
            _ => None,
        }
    }
}

impl From<&str> for FieldError {
    fn from(message: &str) -> Self {
        Self::message(message)
    }
}

impl From<String> for FieldError {
    fn from(message: String) -> Self {
        Self::message(message)
    }
}

/// Per-item errors of an array field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayErrors {
    /// Errors by item index; `None` for valid items.
    pub items: Vec<Option<Value>>,
    /// Error about the array as a whole, stored under [`ARRAY_ERROR`].
    pub array_error: Option<Value>,
}

impl ArrayErrors {
    /// Wrap an array-level error with no item errors.
    pub fn whole(error: Value) -> Self {
        Self {
            items: Vec::new(),
            array_error: Some(error),
        }
    }

    /// Look up a reserved key; only [`ARRAY_ERROR`] is defined.
    pub fn get(&self, key: &str) -> Option<&Value> {
        if key == ARRAY_ERROR {
            self.array_error.as_ref()
        } else {
            None
        }
    }

    /// Error for the item at `index`.
    pub fn item(&self, index: usize) -> Option<&Value> {
        self.items.get(index).and_then(Option::as_ref)
    }
}

/// Field-level validator: `(value, all_values) -> error`.
pub type Validator = Rc<dyn Fn(Option<&Value>, &Value) -> Option<FieldError>>;

/// Value equality used by the engine for pristine/dirty tracking.
pub type IsEqual = Rc<dyn Fn(Option<&Value>, Option<&Value>) -> bool>;

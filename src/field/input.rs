//! Input kinds and change-event extraction.

use serde_json::Value;

use crate::guard::strict_equal;

/// How a field renders, resolved once from `type`, `component` and
/// `multiple`.
#[derive(Debug, Clone, PartialEq)]
pub enum InputKind {
    /// A checkbox, optionally carrying a constant for checkbox groups.
    Checkbox(Option<Value>),
    /// A radio button and its constant.
    Radio(Option<Value>),
    /// A `<select multiple>`.
    MultiSelect,
    Plain,
}

impl InputKind {
    pub fn resolve(
        input_type: Option<&str>,
        component: Option<&str>,
        multiple: bool,
        value: Option<&Value>,
    ) -> Self {
        match input_type {
            Some("checkbox") => Self::Checkbox(value.cloned()),
            Some("radio") => Self::Radio(value.cloned()),
            _ if component == Some("select") && multiple => Self::MultiSelect,
            _ => Self::Plain,
        }
    }

    /// The value shown by the input, given the formatted stored value.
    pub fn exposed_value(&self, formatted: Option<Value>) -> Option<Value> {
        match self {
            Self::Checkbox(constant) | Self::Radio(constant) => constant.clone(),
            Self::MultiSelect if truthy(formatted.as_ref()) => formatted,
            Self::MultiSelect => Some(Value::Array(Vec::new())),
            Self::Plain => formatted,
        }
    }

    /// The checked flag, for checkboxes and radios only.
    pub fn checked(&self, formatted: Option<&Value>) -> Option<bool> {
        match self {
            Self::Checkbox(None) => Some(truthy(formatted)),
            Self::Checkbox(Some(constant)) => Some(match formatted {
                Some(Value::Array(items)) => items.iter().any(|item| strict_equal(item, constant)),
                _ => false,
            }),
            Self::Radio(constant) => Some(match (formatted, constant) {
                (Some(value), Some(constant)) => strict_equal(value, constant),
                (None, None) => true,
                _ => false,
            }),
            Self::MultiSelect | Self::Plain => None,
        }
    }
}

/// Truthiness of a dynamic value.
///
/// Missing values, `null`, `false`, zero, NaN and the empty string are falsy.
pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0 && !n.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// The kind of element that fired a change event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventTargetKind {
    Checkbox,
    SelectMultiple,
    Other(String),
}

impl From<&str> for EventTargetKind {
    fn from(kind: &str) -> Self {
        match kind {
            "checkbox" => Self::Checkbox,
            "select-multiple" => Self::SelectMultiple,
            other => Self::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub value: Value,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChangeTarget {
    pub kind: EventTargetKind,
    pub value: Option<Value>,
    pub checked: bool,
    pub options: Vec<SelectOption>,
}

/// A UI change event, reduced to what value extraction reads.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    pub target: ChangeTarget,
}

impl ChangeEvent {
    /// A checkbox toggle. `value` is the checkbox's own value attribute.
    pub fn checkbox(checked: bool, value: Option<Value>) -> Self {
        Self {
            target: ChangeTarget {
                kind: EventTargetKind::Checkbox,
                value,
                checked,
                options: Vec::new(),
            },
        }
    }

    pub fn select_multiple(options: Vec<SelectOption>) -> Self {
        Self {
            target: ChangeTarget {
                kind: EventTargetKind::SelectMultiple,
                value: None,
                checked: false,
                options,
            },
        }
    }

    /// An event from any other element, such as a text input or a radio.
    pub fn input(kind: &str, value: impl Into<Value>) -> Self {
        Self {
            target: ChangeTarget {
                kind: kind.into(),
                value: Some(value.into()),
                checked: false,
                options: Vec::new(),
            },
        }
    }
}

/// What a change handler accepts: an event, or a raw value.
#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    Event(ChangeEvent),
    Value(Option<Value>),
}

impl From<ChangeEvent> for Change {
    fn from(event: ChangeEvent) -> Self {
        Self::Event(event)
    }
}

impl From<Value> for Change {
    fn from(value: Value) -> Self {
        Self::Value(Some(value))
    }
}

impl From<Option<Value>> for Change {
    fn from(value: Option<Value>) -> Self {
        Self::Value(value)
    }
}

/// Extract the new field value from a change event.
///
/// `current` is the stored value and `value_prop` the field's configured
/// constant.
pub fn get_value(event: &ChangeEvent, current: Option<&Value>, value_prop: Option<&Value>) -> Option<Value> {
    let target = &event.target;
    match (&target.kind, value_prop) {
        (EventTargetKind::Checkbox, Some(constant)) => {
            if target.checked {
                let mut items = match current {
                    Some(Value::Array(items)) => items.clone(),
                    _ => Vec::new(),
                };
                items.push(constant.clone());
                return Some(Value::Array(items));
            }
            let Some(Value::Array(items)) = current else {
                return current.cloned();
            };
            let mut items = items.clone();
            if let Some(index) = items.iter().position(|item| strict_equal(item, constant)) {
                items.remove(index);
            }
            Some(Value::Array(items))
        }
        (EventTargetKind::Checkbox, None) => Some(Value::Bool(target.checked)),
        (EventTargetKind::SelectMultiple, _) => Some(Value::Array(
            target
                .options
                .iter()
                .filter(|option| option.selected)
                .map(|option| option.value.clone())
                .collect(),
        )),
        (EventTargetKind::Other(_), _) => target.value.clone(),
    }
}

use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::form::{FieldError, FieldState, FieldSubscription, IsEqual, Validator};

/// Turns a stored value into the value shown by the input.
pub type Formatter = Rc<dyn Fn(Option<&Value>, &str) -> Option<Value>>;

/// Turns an input value into the value handed to the engine.
pub type Parser = Rc<dyn Fn(Option<Value>, &str) -> Option<Value>>;

/// Computes an input id from the field state.
pub type IdResolver = Rc<dyn Fn(&FieldState) -> Option<String>>;

/// Shows a missing value as an empty string.
pub fn default_format(value: Option<&Value>, _name: &str) -> Option<Value> {
    Some(value.cloned().unwrap_or_else(|| Value::String(String::new())))
}

/// Treats an empty string as no value.
pub fn default_parse(value: Option<Value>, _name: &str) -> Option<Value> {
    match value {
        Some(Value::String(s)) if s.is_empty() => None,
        other => other,
    }
}

/// Options for [`use_field`](super::use_field).
///
/// Built with the `with_*` methods:
///
/// ```
/// use serde_json::json;
/// use tinform::field::FieldConfig;
///
/// let config = FieldConfig::default()
///     .with_type("checkbox")
///     .with_value(json!("red"));
/// assert_eq!(config.input_type.as_deref(), Some("checkbox"));
/// ```
#[derive(Clone, Default)]
pub struct FieldConfig {
    pub subscription: FieldSubscription,
    pub initial_value: Option<Value>,
    pub default_value: Option<Value>,
    pub is_equal: Option<IsEqual>,
    /// Defaults to [`default_format`].
    pub format: Option<Formatter>,
    /// Defaults to [`default_parse`].
    pub parse: Option<Parser>,
    pub format_on_blur: bool,
    pub allow_null: bool,
    pub multiple: bool,
    /// The input `type`, such as `"checkbox"` or `"radio"`.
    pub input_type: Option<String>,
    /// The constant carried by a checkbox or radio input.
    pub value: Option<Value>,
    pub validate: Option<Validator>,
    /// The rendering component, such as `"input"` or `"select"`.
    pub component: Option<String>,
    pub id: Option<String>,
    pub get_id: Option<IdResolver>,
    pub set_id_to_name: bool,
    /// Extra attributes copied onto the input view.
    pub attrs: Map<String, Value>,
}

impl FieldConfig {
    /// Set the state keys the field listens to.
    pub fn with_subscription(mut self, subscription: FieldSubscription) -> Self {
        self.subscription = subscription;
        self
    }

    /// Set the value the field starts from.
    pub fn with_initial_value(mut self, value: Value) -> Self {
        self.initial_value = Some(value);
        self
    }

    /// Set the value used while the field has none.
    pub fn with_default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Set the equality used for dirty tracking.
    pub fn with_is_equal(
        mut self,
        is_equal: impl Fn(Option<&Value>, Option<&Value>) -> bool + 'static,
    ) -> Self {
        self.is_equal = Some(Rc::new(is_equal));
        self
    }

    /// Set the formatter applied before rendering.
    pub fn with_format(
        mut self,
        format: impl Fn(Option<&Value>, &str) -> Option<Value> + 'static,
    ) -> Self {
        self.format = Some(Rc::new(format));
        self
    }

    /// Set the parser applied before writing.
    pub fn with_parse(mut self, parse: impl Fn(Option<Value>, &str) -> Option<Value> + 'static) -> Self {
        self.parse = Some(Rc::new(parse));
        self
    }

    /// Format on blur instead of on every render.
    pub fn format_on_blur(mut self, enabled: bool) -> Self {
        self.format_on_blur = enabled;
        self
    }

    /// Render `null` as is instead of `""`.
    pub fn allow_null(mut self, enabled: bool) -> Self {
        self.allow_null = enabled;
        self
    }

    /// Mark a select as multiple.
    pub fn multiple(mut self, enabled: bool) -> Self {
        self.multiple = enabled;
        self
    }

    /// Set the input `type`.
    pub fn with_type(mut self, input_type: impl Into<String>) -> Self {
        self.input_type = Some(input_type.into());
        self
    }

    /// Set the checkbox or radio constant.
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }

    /// Set the field-level validator.
    pub fn with_validate(
        mut self,
        validate: impl Fn(Option<&Value>, &Value) -> Option<FieldError> + 'static,
    ) -> Self {
        self.validate = Some(Rc::new(validate));
        self
    }

    /// Set the rendering component.
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    /// Set an explicit input id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Derive the input id from the field state.
    pub fn with_get_id(mut self, get_id: impl Fn(&FieldState) -> Option<String> + 'static) -> Self {
        self.get_id = Some(Rc::new(get_id));
        self
    }

    /// Fall back to the field name as the input id.
    pub fn set_id_to_name(mut self, enabled: bool) -> Self {
        self.set_id_to_name = enabled;
        self
    }

    /// Copy an extra attribute onto the input view.
    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    pub(crate) fn formatter(&self) -> Formatter {
        self.format.clone().unwrap_or_else(|| Rc::new(default_format))
    }

    pub(crate) fn parser(&self) -> Parser {
        self.parse.clone().unwrap_or_else(|| Rc::new(default_parse))
    }
}

impl fmt::Debug for FieldConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldConfig")
            .field("subscription", &self.subscription)
            .field("initial_value", &self.initial_value)
            .field("default_value", &self.default_value)
            .field("format_on_blur", &self.format_on_blur)
            .field("allow_null", &self.allow_null)
            .field("multiple", &self.multiple)
            .field("input_type", &self.input_type)
            .field("value", &self.value)
            .field("component", &self.component)
            .field("id", &self.id)
            .field("set_id_to_name", &self.set_id_to_name)
            .field("attrs", &self.attrs)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_format_fills_missing() {
        assert_eq!(default_format(None, "a"), Some(json!("")));
        assert_eq!(default_format(Some(&json!(3)), "a"), Some(json!(3)));
        assert_eq!(default_format(Some(&Value::Null), "a"), Some(Value::Null));
    }

    #[test]
    fn default_parse_drops_empty_string() {
        assert_eq!(default_parse(Some(json!("")), "a"), None);
        assert_eq!(default_parse(Some(json!("x")), "a"), Some(json!("x")));
        assert_eq!(default_parse(None, "a"), None);
    }

    #[test]
    fn builder_sets_fields() {
        let config = FieldConfig::default()
            .with_component("select")
            .multiple(true)
            .with_attr("placeholder", json!("Pick"));
        assert_eq!(config.component.as_deref(), Some("select"));
        assert!(config.multiple);
        assert_eq!(config.attrs.get("placeholder"), Some(&json!("Pick")));
        assert_eq!(config.subscription, FieldSubscription::all());
    }
}

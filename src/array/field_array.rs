use std::cell::RefCell;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use serde_json::Value;

use super::mutators::ArrayMutators;
use super::validation::{array_is_equal, wrap_array_validator};
use crate::error::Result;
use crate::field::{reuse, use_field, FieldConfig, FieldView};
use crate::form::{FieldError, FieldSubscription, FormHandle, IsEqual, Validator};
use crate::runtime::FormContext;
use crate::store::{derived, Readable, SafeEq, Subscribable, Subscription};

/// Options for [`use_field_array`].
#[derive(Clone, Default)]
pub struct FieldArrayConfig {
    /// `LENGTH` is always added.
    pub subscription: FieldSubscription,
    pub initial_value: Option<Value>,
    pub default_value: Option<Value>,
    /// Defaults to [`array_is_equal`](super::array_is_equal).
    pub is_equal: Option<IsEqual>,
    pub validate: Option<Validator>,
}

impl FieldArrayConfig {
    /// Set the state keys; `LENGTH` is always added.
    pub fn with_subscription(mut self, subscription: FieldSubscription) -> Self {
        self.subscription = subscription;
        self
    }

    /// Set the array the field starts from.
    pub fn with_initial_value(mut self, value: Value) -> Self {
        self.initial_value = Some(value);
        self
    }

    /// Set the array used while the field has none.
    pub fn with_default_value(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    /// Replace the element-wise array equality.
    pub fn with_is_equal(
        mut self,
        is_equal: impl Fn(Option<&Value>, Option<&Value>) -> bool + 'static,
    ) -> Self {
        self.is_equal = Some(Rc::new(is_equal));
        self
    }

    /// Set the array validator; scalar errors become array-level errors.
    pub fn with_validate(
        mut self,
        validate: impl Fn(Option<&Value>, &Value) -> Option<FieldError> + 'static,
    ) -> Self {
        self.validate = Some(Rc::new(validate));
        self
    }
}

impl fmt::Debug for FieldArrayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldArrayConfig")
            .field("subscription", &self.subscription)
            .field("initial_value", &self.initial_value)
            .field("default_value", &self.default_value)
            .field("is_equal", &self.is_equal.is_some())
            .field("validate", &self.validate.is_some())
            .finish()
    }
}

/// The meta that applies to an array as a whole.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArrayMeta {
    pub length: Option<usize>,
    pub error: Option<FieldError>,
    pub invalid: bool,
    pub valid: bool,
}

/// The items of an array field, addressed by name.
///
/// Item names are computed on demand from the current length; no per-item
/// store exists. Mutators are reachable through `Deref`:
///
/// ```
/// use serde_json::json;
/// use tinform::array::{use_field_array, FieldArrayConfig};
/// use tinform::form::FormHandle;
/// use tinform::testing::MemoryForm;
///
/// let form: FormHandle = MemoryForm::new(json!({ "todos": ["a"] }));
/// let todos = use_field_array(&form, "todos", FieldArrayConfig::default()).unwrap();
/// let _sub = todos.subscribe(|_| {});
///
/// todos.get().unwrap().fields.push(json!("b")).unwrap();
/// assert_eq!(todos.get().unwrap().fields.names(), vec!["todos[0]", "todos[1]"]);
/// ```
#[derive(Clone)]
pub struct ArrayFields {
    name: String,
    length: usize,
    value: Option<Value>,
    mutators: ArrayMutators,
}

impl ArrayFields {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    /// Name of the item at `index`, such as `"todos[2]"`.
    pub fn name_at(&self, index: usize) -> String {
        format!("{}[{}]", self.name, index)
    }

    pub fn for_each(&self, mut f: impl FnMut(&str, usize)) {
        for index in 0..self.length {
            f(&self.name_at(index), index);
        }
    }

    pub fn map<R>(&self, mut f: impl FnMut(&str, usize) -> R) -> Vec<R> {
        (0..self.length).map(|index| f(&self.name_at(index), index)).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.map(|name, _| name.to_string())
    }

    pub fn mutators(&self) -> &ArrayMutators {
        &self.mutators
    }
}

impl PartialEq for ArrayFields {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.length == other.length && self.value == other.value
    }
}

impl Deref for ArrayFields {
    type Target = ArrayMutators;

    fn deref(&self) -> &ArrayMutators {
        &self.mutators
    }
}

impl fmt::Debug for ArrayFields {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayFields")
            .field("name", &self.name)
            .field("length", &self.length)
            .field("value", &self.value)
            .finish_non_exhaustive()
    }
}

/// What a field array store delivers.
#[derive(Debug, Clone)]
pub struct FieldArrayView {
    pub fields: Rc<ArrayFields>,
    pub meta: Rc<ArrayMeta>,
}

impl SafeEq for FieldArrayView {
    fn safe_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.fields, &other.fields) && Rc::ptr_eq(&self.meta, &other.meta)
    }
}

struct ArrayViewBuilder {
    name: String,
    mutators: ArrayMutators,
    fields: Option<Rc<ArrayFields>>,
    meta: Option<Rc<ArrayMeta>>,
}

impl ArrayViewBuilder {
    fn build(&mut self, view: &FieldView) -> FieldArrayView {
        let meta = &view.meta;
        let fields = ArrayFields {
            name: self.name.clone(),
            length: meta.length.unwrap_or(0),
            value: view.input.value.clone(),
            mutators: self.mutators.clone(),
        };
        let meta = ArrayMeta {
            length: meta.length,
            error: meta.error.clone(),
            invalid: meta.invalid,
            valid: meta.valid,
        };
        FieldArrayView {
            fields: reuse(&mut self.fields, fields),
            meta: reuse(&mut self.meta, meta),
        }
    }
}

/// A store of one array field, with separate `fields` and `meta` stores.
#[derive(Clone)]
pub struct FieldArrayStore {
    name: String,
    view: Readable<FieldArrayView>,
    fields: Readable<Rc<ArrayFields>>,
    meta: Readable<Rc<ArrayMeta>>,
    mutators: ArrayMutators,
}

impl FieldArrayStore {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The latest view, if the store has been active.
    pub fn get(&self) -> Option<FieldArrayView> {
        self.view.get()
    }

    pub fn view(&self) -> &Readable<FieldArrayView> {
        &self.view
    }

    pub fn fields(&self) -> &Readable<Rc<ArrayFields>> {
        &self.fields
    }

    pub fn meta(&self) -> &Readable<Rc<ArrayMeta>> {
        &self.meta
    }

    /// The curried mutators, usable without subscribing.
    pub fn mutators(&self) -> &ArrayMutators {
        &self.mutators
    }

    pub fn subscribe<V>(&self, on_value: V) -> Subscription
    where
        V: Fn(&FieldArrayView) + 'static,
    {
        self.view.subscribe(on_value)
    }
}

impl fmt::Debug for FieldArrayStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldArrayStore")
            .field("name", &self.name)
            .field("subscribers", &self.view.subscriber_count())
            .finish()
    }
}

impl Subscribable for FieldArrayStore {
    type Output = FieldArrayView;

    fn subscribe_with<V, I>(&self, on_value: V, on_invalidate: I) -> Subscription
    where
        V: Fn(&FieldArrayView) + 'static,
        I: Fn() + 'static,
    {
        self.view.subscribe_with(on_value, on_invalidate)
    }
}

/// Bind an array field of `form` to a store.
///
/// Fails with [`Error::MissingArrayMutators`](crate::Error::MissingArrayMutators)
/// when the engine has no `push` or `pop` mutator.
pub fn use_field_array(form: &FormHandle, name: &str, config: FieldArrayConfig) -> Result<FieldArrayStore> {
    let mutators = ArrayMutators::new(name, form.mutators())?;

    let is_equal = config.is_equal.unwrap_or_else(|| Rc::new(array_is_equal));
    let field = use_field(
        form,
        name,
        FieldConfig {
            subscription: config.subscription | FieldSubscription::LENGTH,
            initial_value: config.initial_value,
            default_value: config.default_value,
            is_equal: Some(is_equal),
            validate: wrap_array_validator(config.validate),
            format: Some(Rc::new(|value: Option<&Value>, _: &str| value.cloned())),
            ..FieldConfig::default()
        },
    );

    let builder = RefCell::new(ArrayViewBuilder {
        name: name.to_string(),
        mutators: mutators.clone(),
        fields: None,
        meta: None,
    });
    let view = derived(&field, move |view: &FieldView| builder.borrow_mut().build(view));

    Ok(FieldArrayStore {
        name: name.to_string(),
        fields: derived(&view, |view: &FieldArrayView| Rc::clone(&view.fields)),
        meta: derived(&view, |view: &FieldArrayView| Rc::clone(&view.meta)),
        view,
        mutators,
    })
}

/// [`use_field_array`] on the context form.
pub fn use_field_array_in_context(name: &str, config: FieldArrayConfig) -> Result<FieldArrayStore> {
    let form = FormContext::current()?;
    use_field_array(&form, name, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::form::ARRAY_ERROR;
    use crate::testing::MemoryForm;
    use serde_json::json;
    use std::cell::Cell;

    fn form(values: Value) -> (Rc<MemoryForm>, FormHandle) {
        let engine = MemoryForm::new(values);
        let handle: FormHandle = engine.clone();
        (engine, handle)
    }

    #[test]
    fn names_follow_length() {
        let (_engine, handle) = form(json!({ "a": [1, 2, 3] }));
        let array = use_field_array(&handle, "a", FieldArrayConfig::default()).unwrap();
        let _sub = array.subscribe(|_| {});

        let fields = array.get().unwrap().fields;
        assert_eq!(fields.names(), vec!["a[0]", "a[1]", "a[2]"]);
        assert_eq!(fields.len(), 3);

        fields.push(json!(4)).unwrap();
        let fields = array.get().unwrap().fields;
        assert_eq!(fields.names(), vec!["a[0]", "a[1]", "a[2]", "a[3]"]);
        assert_eq!(fields.value(), Some(&json!([1, 2, 3, 4])));
    }

    #[test]
    fn missing_array_is_empty() {
        let (_engine, handle) = form(json!({}));
        let array = use_field_array(&handle, "items", FieldArrayConfig::default()).unwrap();
        let _sub = array.subscribe(|_| {});

        let view = array.get().unwrap();
        assert!(view.fields.is_empty());
        assert_eq!(view.meta.length, None);

        let mut seen = Vec::new();
        view.fields.for_each(|name, i| seen.push((name.to_string(), i)));
        assert!(seen.is_empty());
    }

    #[test]
    fn array_level_error_is_tagged() {
        let (_engine, handle) = form(json!({ "a": [] }));
        let array = use_field_array(
            &handle,
            "a",
            FieldArrayConfig::default().with_validate(|value, _| {
                match value.and_then(Value::as_array) {
                    Some(items) if !items.is_empty() => None,
                    _ => Some(FieldError::from("required")),
                }
            }),
        )
        .unwrap();
        let _sub = array.subscribe(|_| {});

        let meta = array.get().unwrap().meta;
        let Some(FieldError::Array(errors)) = &meta.error else {
            panic!("expected an array error, got {:?}", meta.error);
        };
        assert!(errors.items.is_empty());
        assert_eq!(errors.get(ARRAY_ERROR), Some(&json!("required")));
        assert!(meta.invalid);

        array.mutators().push(json!("x")).unwrap();
        assert!(array.get().unwrap().meta.valid);
    }

    #[test]
    fn mutators_are_curried() {
        let (engine, handle) = form(json!({ "a": ["x", "y", "z"] }));
        let array = use_field_array(&handle, "a", FieldArrayConfig::default()).unwrap();
        let _sub = array.subscribe(|_| {});
        let fields = array.get().unwrap().fields;

        fields.swap(0, 2).unwrap();
        assert_eq!(engine.value("a"), Some(json!(["z", "y", "x"])));
        fields.move_item(0, 1).unwrap();
        assert_eq!(engine.value("a"), Some(json!(["y", "z", "x"])));
        assert_eq!(fields.remove(1).unwrap(), Some(json!("z")));
        fields.insert(0, json!("w")).unwrap();
        fields.unshift(json!("v")).unwrap();
        assert_eq!(engine.value("a"), Some(json!(["v", "w", "y", "x"])));
        assert_eq!(fields.shift().unwrap(), Some(json!("v")));
        assert_eq!(fields.pop().unwrap(), Some(json!("x")));
        fields.concat(vec![json!(1), json!(2)]).unwrap();
        fields.update(0, json!("W")).unwrap();
        assert_eq!(engine.value("a"), Some(json!(["W", "y", 1, 2])));
        assert_eq!(fields.remove_batch(&[0, 2]).unwrap(), Some(json!(["W", 1])));
        assert_eq!(engine.value("a"), Some(json!(["y", 2])));
        assert_eq!(array.get().unwrap().fields.len(), 2);
    }

    #[test]
    fn meta_store_skips_value_only_changes() {
        let (_engine, handle) = form(json!({ "a": [1, 2] }));
        let array = use_field_array(&handle, "a", FieldArrayConfig::default()).unwrap();
        let runs = Rc::new(Cell::new(0));
        let _meta = array.meta().subscribe({
            let runs = Rc::clone(&runs);
            move |_| runs.set(runs.get() + 1)
        });

        array.mutators().update(0, json!(10)).unwrap();
        assert_eq!(runs.get(), 1);

        array.mutators().push(json!(3)).unwrap();
        assert_eq!(runs.get(), 2);
        assert_eq!(array.meta().get().unwrap().length, Some(3));
    }

    #[test]
    fn requires_array_mutators() {
        let engine = MemoryForm::bare(json!({}));
        let handle: FormHandle = engine;
        assert_eq!(
            use_field_array(&handle, "a", FieldArrayConfig::default()).err(),
            Some(Error::MissingArrayMutators { name: "a".into() })
        );
    }

    #[test]
    fn context_lookup() {
        assert_eq!(
            use_field_array_in_context("a", FieldArrayConfig::default()).err(),
            Some(Error::NoFormContext)
        );
    }
}

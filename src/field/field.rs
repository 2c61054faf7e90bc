use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::debug;

use super::config::{default_format, FieldConfig, Formatter, IdResolver, Parser};
use super::input::{get_value, Change, InputKind};
use crate::error::Result;
use crate::form::{FieldMeta, FieldRegistration, FieldState, FormHandle};
use crate::runtime::FormContext;
use crate::store::{derived, Readable, SafeEq, Subscribable, Subscription};

/// The props a rendered input binds to.
#[derive(Debug, Clone, PartialEq)]
pub struct InputView {
    pub name: String,
    pub id: Option<String>,
    pub value: Option<Value>,
    /// Set for checkboxes and radios only.
    pub checked: Option<bool>,
    pub multiple: bool,
    pub input_type: Option<String>,
    pub attrs: Map<String, Value>,
}

struct HandlerContext {
    name: String,
    value_prop: Option<Value>,
    format: Formatter,
    parse: Parser,
    format_on_blur: bool,
    latest: RefCell<Option<Rc<FieldState>>>,
}

/// Event handlers for one field.
///
/// A handle stays the same for as long as the field is subscribed and always
/// acts on the latest field state.
#[derive(Clone)]
pub struct FieldHandlers {
    ctx: Rc<HandlerContext>,
}

impl FieldHandlers {
    fn latest(&self) -> Option<Rc<FieldState>> {
        self.ctx.latest.borrow().clone()
    }

    /// Mark the field blurred, formatting its value first when
    /// `format_on_blur` is set.
    pub fn blur(&self) {
        let Some(state) = self.latest() else {
            return;
        };
        if self.ctx.format_on_blur {
            (state.change)((self.ctx.format)(state.value.as_ref(), &state.name));
        }
        (state.blur)();
    }

    /// Mark the field focused.
    pub fn focus(&self) {
        if let Some(state) = self.latest() {
            (state.focus)();
        }
    }

    /// Write a new value from an event or a raw value.
    pub fn change(&self, change: impl Into<Change>) {
        let Some(state) = self.latest() else {
            return;
        };
        let value = match change.into() {
            Change::Event(event) => get_value(&event, state.value.as_ref(), self.ctx.value_prop.as_ref()),
            Change::Value(value) => value,
        };
        (state.change)((self.ctx.parse)(value, &self.ctx.name));
    }
}

impl SafeEq for FieldHandlers {
    fn safe_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.ctx, &other.ctx)
    }
}

impl fmt::Debug for FieldHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldHandlers").field("name", &self.ctx.name).finish()
    }
}

/// Everything a field component needs, rebuilt on each engine notification.
///
/// Parts that did not change keep their previous `Rc`.
#[derive(Debug, Clone)]
pub struct FieldView {
    pub input: Rc<InputView>,
    pub handlers: FieldHandlers,
    pub meta: Rc<FieldMeta>,
    pub state: Rc<FieldState>,
}

impl SafeEq for FieldView {
    fn safe_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.input, &other.input)
            && self.handlers.safe_eq(&other.handlers)
            && Rc::ptr_eq(&self.meta, &other.meta)
            && Rc::ptr_eq(&self.state, &other.state)
    }
}

/// Static per-field settings captured at construction.
struct ViewSettings {
    name: String,
    kind: InputKind,
    format: Formatter,
    format_on_blur: bool,
    allow_null: bool,
    multiple: bool,
    input_type: Option<String>,
    component: Option<String>,
    id: Option<String>,
    get_id: Option<IdResolver>,
    set_id_to_name: bool,
    attrs: Map<String, Value>,
}

impl ViewSettings {
    fn from_config(name: &str, config: &FieldConfig) -> Self {
        Self {
            name: name.to_string(),
            kind: InputKind::resolve(
                config.input_type.as_deref(),
                config.component.as_deref(),
                config.multiple,
                config.value.as_ref(),
            ),
            format: config.formatter(),
            format_on_blur: config.format_on_blur,
            allow_null: config.allow_null,
            multiple: config.multiple,
            input_type: config.input_type.clone(),
            component: config.component.clone(),
            id: config.id.clone(),
            get_id: config.get_id.clone(),
            set_id_to_name: config.set_id_to_name,
            attrs: config.attrs.clone(),
        }
    }

    fn input_view(&self, state: &FieldState) -> InputView {
        let stored = state.value.as_ref();
        let mut formatted = if !self.format_on_blur {
            (self.format)(stored, &self.name)
        } else if self.component.as_deref() == Some("input") {
            default_format(stored, &self.name)
        } else {
            stored.cloned()
        };
        if formatted == Some(Value::Null) && !self.allow_null {
            formatted = Some(Value::String(String::new()));
        }

        // Checked state always reads the stored value, never the formatted one.
        let checked = self.kind.checked(stored);

        let id = self
            .id
            .clone()
            .or_else(|| self.get_id.as_ref().and_then(|get_id| get_id(state)))
            .or_else(|| self.set_id_to_name.then(|| self.name.clone()));

        InputView {
            name: self.name.clone(),
            id,
            value: self.kind.exposed_value(formatted),
            checked,
            multiple: self.multiple,
            input_type: self.input_type.clone(),
            attrs: self.attrs.clone(),
        }
    }
}

/// Builds views for one activation, reusing unchanged parts.
struct ViewBuilder {
    settings: Rc<ViewSettings>,
    handlers: FieldHandlers,
    input: Option<Rc<InputView>>,
    meta: Option<Rc<FieldMeta>>,
}

impl ViewBuilder {
    fn build(&mut self, state: &FieldState) -> FieldView {
        let state = Rc::new(state.clone());
        *self.handlers.ctx.latest.borrow_mut() = Some(Rc::clone(&state));

        let input = reuse(&mut self.input, self.settings.input_view(&state));
        let meta = reuse(&mut self.meta, state.meta.clone());
        FieldView {
            input,
            handlers: self.handlers.clone(),
            meta,
            state,
        }
    }
}

/// Keep the previous `Rc` when the rebuilt part is equal to it.
pub(crate) fn reuse<T: PartialEq>(slot: &mut Option<Rc<T>>, next: T) -> Rc<T> {
    if let Some(prev) = slot {
        if **prev == next {
            return Rc::clone(prev);
        }
    }
    let next = Rc::new(next);
    *slot = Some(Rc::clone(&next));
    next
}

/// A store of one field's view, with projections for each part.
///
/// The field is registered with the engine while the store has subscribers.
#[derive(Clone)]
pub struct FieldStore {
    name: String,
    view: Readable<FieldView>,
    input: Readable<Rc<InputView>>,
    handlers: Readable<FieldHandlers>,
    meta: Readable<Rc<FieldMeta>>,
    state: Readable<Rc<FieldState>>,
}

impl FieldStore {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The latest view, if the store has been active.
    pub fn get(&self) -> Option<FieldView> {
        self.view.get()
    }

    pub fn view(&self) -> &Readable<FieldView> {
        &self.view
    }

    pub fn input(&self) -> &Readable<Rc<InputView>> {
        &self.input
    }

    pub fn handlers(&self) -> &Readable<FieldHandlers> {
        &self.handlers
    }

    pub fn meta(&self) -> &Readable<Rc<FieldMeta>> {
        &self.meta
    }

    pub fn state(&self) -> &Readable<Rc<FieldState>> {
        &self.state
    }

    pub fn subscribe<V>(&self, on_value: V) -> Subscription
    where
        V: Fn(&FieldView) + 'static,
    {
        self.view.subscribe(on_value)
    }
}

impl fmt::Debug for FieldStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldStore")
            .field("name", &self.name)
            .field("subscribers", &self.view.subscriber_count())
            .finish()
    }
}

impl Subscribable for FieldStore {
    type Output = FieldView;

    fn subscribe_with<V, I>(&self, on_value: V, on_invalidate: I) -> Subscription
    where
        V: Fn(&FieldView) + 'static,
        I: Fn() + 'static,
    {
        self.view.subscribe_with(on_value, on_invalidate)
    }
}

/// Bind a field of `form` to a store.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use tinform::field::{use_field, FieldConfig};
/// use tinform::form::FormHandle;
/// use tinform::testing::MemoryForm;
///
/// let form: FormHandle = MemoryForm::new(json!({ "email": "a@b.c" }));
/// let field = use_field(&form, "email", FieldConfig::default());
///
/// let _sub = field.subscribe(|_| {});
/// let input = field.get().unwrap().input;
/// assert_eq!(input.value, Some(json!("a@b.c")));
///
/// field.get().unwrap().handlers.change(json!("x@y.z"));
/// assert_eq!(field.get().unwrap().input.value, Some(json!("x@y.z")));
/// ```
pub fn use_field(form: &FormHandle, name: &str, config: FieldConfig) -> FieldStore {
    let settings = Rc::new(ViewSettings::from_config(name, &config));
    let registration = FieldRegistration {
        validate: config.validate.clone(),
        initial_value: config.initial_value.clone(),
        default_value: config.default_value.clone(),
        is_equal: config.is_equal.clone(),
    };
    let subscription = config.subscription;
    let value_prop = config.value.clone();
    let parse = config.parser();

    let view = {
        let form = Rc::clone(form);
        let name = name.to_string();
        Readable::new(None, move |setter| {
            let handlers = FieldHandlers {
                ctx: Rc::new(HandlerContext {
                    name: name.clone(),
                    value_prop: value_prop.clone(),
                    format: Rc::clone(&settings.format),
                    parse: Rc::clone(&parse),
                    format_on_blur: settings.format_on_blur,
                    latest: RefCell::new(None),
                }),
            };
            let builder = RefCell::new(ViewBuilder {
                settings: Rc::clone(&settings),
                handlers,
                input: None,
                meta: None,
            });

            debug!(field = %name, "registering field");
            let unregister = form.register_field(
                &name,
                Rc::new(move |state: &FieldState| {
                    let view = builder.borrow_mut().build(state);
                    setter.set(view);
                }),
                subscription,
                registration.clone(),
            );
            let name = name.clone();
            Some(Box::new(move || {
                debug!(field = %name, "unregistering field");
                unregister();
            }) as Box<dyn FnOnce()>)
        })
    };

    FieldStore {
        name: name.to_string(),
        input: derived(&view, |view: &FieldView| Rc::clone(&view.input)),
        handlers: derived(&view, |view: &FieldView| view.handlers.clone()),
        meta: derived(&view, |view: &FieldView| Rc::clone(&view.meta)),
        state: derived(&view, |view: &FieldView| Rc::clone(&view.state)),
        view,
    }
}

/// [`use_field`] on the context form.
pub fn use_field_in_context(name: &str, config: FieldConfig) -> Result<FieldStore> {
    let form = FormContext::current()?;
    Ok(use_field(&form, name, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::field::{ChangeEvent, SelectOption};
    use crate::form::{FieldError, FieldSubscription};
    use crate::testing::MemoryForm;
    use serde_json::json;
    use std::cell::Cell;

    fn form(values: Value) -> (Rc<MemoryForm>, FormHandle) {
        let engine = MemoryForm::new(values);
        let handle: FormHandle = engine.clone();
        (engine, handle)
    }

    #[test]
    fn registers_lazily() {
        let (engine, handle) = form(json!({ "name": "Ada" }));
        let field = use_field(&handle, "name", FieldConfig::default());
        assert_eq!(engine.field_listener_count("name"), 0);

        let sub = field.subscribe(|_| {});
        assert_eq!(engine.field_listener_count("name"), 1);

        let input = field.input().subscribe(|_| {});
        assert_eq!(engine.field_listener_count("name"), 1);

        drop(sub);
        drop(input);
        assert_eq!(engine.field_listener_count("name"), 0);
    }

    #[test]
    fn missing_value_renders_empty_string() {
        let (_engine, handle) = form(json!({}));
        let field = use_field(&handle, "missing", FieldConfig::default());
        let _sub = field.subscribe(|_| {});
        assert_eq!(field.get().unwrap().input.value, Some(json!("")));
    }

    #[test]
    fn null_renders_empty_unless_allowed() {
        let (_engine, handle) = form(json!({ "a": null }));
        let plain = use_field(&handle, "a", FieldConfig::default());
        let nullable = use_field(&handle, "a", FieldConfig::default().allow_null(true));
        let _a = plain.subscribe(|_| {});
        let _b = nullable.subscribe(|_| {});

        assert_eq!(plain.get().unwrap().input.value, Some(json!("")));
        assert_eq!(nullable.get().unwrap().input.value, Some(Value::Null));
    }

    #[test]
    fn empty_string_is_parsed_to_missing() {
        let (engine, handle) = form(json!({ "name": "Ada" }));
        let field = use_field(&handle, "name", FieldConfig::default());
        let _sub = field.subscribe(|_| {});

        field.get().unwrap().handlers.change(ChangeEvent::input("text", ""));
        assert_eq!(engine.value("name"), None);
    }

    #[test]
    fn checkbox_group() {
        let (engine, handle) = form(json!({ "tags": ["x", "y"] }));
        let y = use_field(
            &handle,
            "tags",
            FieldConfig::default().with_type("checkbox").with_value(json!("y")),
        );
        let z = use_field(
            &handle,
            "tags",
            FieldConfig::default().with_type("checkbox").with_value(json!("z")),
        );
        let _y = y.subscribe(|_| {});
        let _z = z.subscribe(|_| {});

        let input = y.get().unwrap().input;
        assert_eq!(input.value, Some(json!("y")));
        assert_eq!(input.checked, Some(true));
        assert_eq!(z.get().unwrap().input.checked, Some(false));

        y.get().unwrap().handlers.change(ChangeEvent::checkbox(false, Some(json!("y"))));
        assert_eq!(engine.value("tags"), Some(json!(["x"])));
        assert_eq!(y.get().unwrap().input.checked, Some(false));

        z.get().unwrap().handlers.change(ChangeEvent::checkbox(true, Some(json!("z"))));
        assert_eq!(engine.value("tags"), Some(json!(["x", "z"])));
        assert_eq!(z.get().unwrap().input.checked, Some(true));
    }

    #[test]
    fn radio_group() {
        let (engine, handle) = form(json!({ "size": "m" }));
        let small = use_field(
            &handle,
            "size",
            FieldConfig::default().with_type("radio").with_value(json!("s")),
        );
        let _sub = small.subscribe(|_| {});
        assert_eq!(small.get().unwrap().input.checked, Some(false));

        small.get().unwrap().handlers.change(ChangeEvent::input("radio", "s"));
        assert_eq!(engine.value("size"), Some(json!("s")));
        assert_eq!(small.get().unwrap().input.checked, Some(true));
    }

    #[test]
    fn checked_ignores_format() {
        let (_engine, handle) = form(json!({ "size": "s", "agree": true }));
        let upper = |value: Option<&Value>, _: &str| {
            value.and_then(Value::as_str).map(|s| json!(s.to_uppercase()))
        };
        let small = use_field(
            &handle,
            "size",
            FieldConfig::default()
                .with_type("radio")
                .with_value(json!("s"))
                .with_format(upper),
        );
        let agree = use_field(
            &handle,
            "agree",
            FieldConfig::default()
                .with_type("checkbox")
                .with_format(|_, _| Some(json!(""))),
        );
        let _subs = (small.subscribe(|_| {}), agree.subscribe(|_| {}));

        assert_eq!(small.get().unwrap().input.checked, Some(true));
        assert_eq!(small.get().unwrap().input.value, Some(json!("s")));
        assert_eq!(agree.get().unwrap().input.checked, Some(true));
    }

    #[test]
    fn multi_select() {
        let (engine, handle) = form(json!({}));
        let field = use_field(
            &handle,
            "colors",
            FieldConfig::default().with_component("select").multiple(true),
        );
        let _sub = field.subscribe(|_| {});
        assert_eq!(field.get().unwrap().input.value, Some(json!([])));

        field.get().unwrap().handlers.change(ChangeEvent::select_multiple(vec![
            SelectOption { value: json!("red"), selected: true },
            SelectOption { value: json!("blue"), selected: true },
        ]));
        assert_eq!(engine.value("colors"), Some(json!(["red", "blue"])));
    }

    #[test]
    fn format_on_blur() {
        let (engine, handle) = form(json!({ "name": "  ada " }));
        let field = use_field(
            &handle,
            "name",
            FieldConfig::default()
                .with_component("input")
                .format_on_blur(true)
                .with_format(|value, _| value.and_then(Value::as_str).map(|s| json!(s.trim()))),
        );
        let _sub = field.subscribe(|_| {});
        assert_eq!(field.get().unwrap().input.value, Some(json!("  ada ")));

        let handlers = field.get().unwrap().handlers;
        handlers.focus();
        handlers.blur();
        assert_eq!(engine.value("name"), Some(json!("ada")));
        assert!(field.get().unwrap().meta.touched);
    }

    #[test]
    fn id_resolution() {
        let (_engine, handle) = form(json!({}));
        let explicit = use_field(&handle, "a", FieldConfig::default().with_id("custom").set_id_to_name(true));
        let computed = use_field(
            &handle,
            "b",
            FieldConfig::default().with_get_id(|state| Some(format!("field-{}", state.name))),
        );
        let by_name = use_field(&handle, "c", FieldConfig::default().set_id_to_name(true));
        let none = use_field(&handle, "d", FieldConfig::default().with_attr("placeholder", json!("D")));
        let subs = [
            explicit.subscribe(|_| {}),
            computed.subscribe(|_| {}),
            by_name.subscribe(|_| {}),
            none.subscribe(|_| {}),
        ];

        assert_eq!(explicit.get().unwrap().input.id.as_deref(), Some("custom"));
        assert_eq!(computed.get().unwrap().input.id.as_deref(), Some("field-b"));
        assert_eq!(by_name.get().unwrap().input.id.as_deref(), Some("c"));
        let input = none.get().unwrap().input;
        assert_eq!(input.id, None);
        assert_eq!(input.attrs.get("placeholder"), Some(&json!("D")));
        drop(subs);
    }

    #[test]
    fn projections_keep_identity_when_unchanged() {
        let (engine, handle) = form(json!({ "name": "Ada" }));
        let field = use_field(&handle, "name", FieldConfig::default());
        let input_runs = Rc::new(Cell::new(0));
        let meta_runs = Rc::new(Cell::new(0));
        let _input = field.input().subscribe({
            let input_runs = Rc::clone(&input_runs);
            move |_| input_runs.set(input_runs.get() + 1)
        });
        let _meta = field.meta().subscribe({
            let meta_runs = Rc::clone(&meta_runs);
            move |_| meta_runs.set(meta_runs.get() + 1)
        });
        let handlers_before = field.get().unwrap().handlers;

        engine.focus("name");
        assert_eq!(input_runs.get(), 1);
        assert_eq!(meta_runs.get(), 2);

        engine.change("name", Some(json!("Grace")));
        assert_eq!(input_runs.get(), 2);
        assert!(field.get().unwrap().handlers.safe_eq(&handlers_before));
    }

    #[test]
    fn masked_subscription_limits_notifications() {
        let (engine, handle) = form(json!({ "name": "Ada" }));
        let field = use_field(
            &handle,
            "name",
            FieldConfig::default().with_subscription(FieldSubscription::VALUE),
        );
        let runs = Rc::new(Cell::new(0));
        let _sub = field.subscribe({
            let runs = Rc::clone(&runs);
            move |_| runs.set(runs.get() + 1)
        });

        engine.focus("name");
        engine.blur("name");
        assert_eq!(runs.get(), 1);

        engine.change("name", Some(json!("Grace")));
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn validator_reaches_meta() {
        let (_engine, handle) = form(json!({ "age": 3 }));
        let field = use_field(
            &handle,
            "age",
            FieldConfig::default().with_validate(|value, _| match value.and_then(Value::as_i64) {
                Some(age) if age >= 18 => None,
                _ => Some(FieldError::from("too young")),
            }),
        );
        let _sub = field.subscribe(|_| {});
        let meta = field.get().unwrap().meta;
        assert_eq!(meta.error.as_ref().and_then(FieldError::as_str), Some("too young"));
        assert!(meta.invalid);

        field.get().unwrap().handlers.change(json!(21));
        assert!(field.get().unwrap().meta.valid);
    }

    #[test]
    fn context_lookup() {
        assert_eq!(
            use_field_in_context("a", FieldConfig::default()).err(),
            Some(Error::NoFormContext)
        );

        let (_engine, handle) = form(json!({ "a": 1 }));
        let field = FormContext::provide(Rc::clone(&handle), || {
            use_field_in_context("a", FieldConfig::default())
        });
        assert_eq!(field.map(|f| f.name().to_string()), Ok("a".to_string()));
    }
}

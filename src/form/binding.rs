use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::debug;

use super::api::{FormHandle, FormOption};
use super::state::FormState;
use super::subscription::FormSubscription;
use crate::error::Result;
use crate::guard::{shallow_equal, WhenValueChanges};
use crate::runtime::FormContext;
use crate::store::Readable;

/// Observer called with every form snapshot before it reaches the store.
pub type FormObserver = Rc<dyn Fn(&FormState)>;

/// Equality deciding whether new initial values should reinitialize the form.
pub type InitialValuesEqual = Rc<dyn Fn(Option<&Value>, Option<&Value>) -> bool>;

/// Options for [`use_form_state`].
#[derive(Clone, Default)]
pub struct FormStateConfig {
    pub subscription: FormSubscription,
    pub on_change: Option<FormObserver>,
}

impl FormStateConfig {
    pub fn with_subscription(mut self, subscription: FormSubscription) -> Self {
        self.subscription = subscription;
        self
    }

    pub fn on_change(mut self, observer: impl Fn(&FormState) + 'static) -> Self {
        self.on_change = Some(Rc::new(observer));
        self
    }
}

impl fmt::Debug for FormStateConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormStateConfig")
            .field("subscription", &self.subscription)
            .field("on_change", &self.on_change.is_some())
            .finish()
    }
}

/// A store of the form's masked snapshot.
///
/// The engine subscription is opened on the first store subscriber and closed
/// with the last one.
pub fn use_form_state(form: &FormHandle, config: FormStateConfig) -> Readable<Rc<FormState>> {
    let form = Rc::clone(form);
    let FormStateConfig {
        subscription,
        on_change,
    } = config;

    Readable::new(None, move |setter| {
        let on_change = on_change.clone();
        let unsubscribe = form.subscribe(
            Rc::new(move |state: &FormState| {
                if let Some(on_change) = &on_change {
                    on_change(state);
                }
                setter.set(Rc::new(state.clone()));
            }),
            subscription,
        );
        Some(unsubscribe)
    })
}

/// Options for [`FormBinding`] and [`FormSpy`].
#[derive(Clone, Default)]
pub struct FormConfig {
    pub subscription: FormSubscription,
    pub initial_values: Option<Value>,
    /// Defaults to [`shallow_equal`].
    pub initial_values_equal: Option<InitialValuesEqual>,
    pub keep_dirty_on_reinitialize: bool,
}

impl FormConfig {
    pub fn with_subscription(mut self, subscription: FormSubscription) -> Self {
        self.subscription = subscription;
        self
    }

    pub fn with_initial_values(mut self, values: Value) -> Self {
        self.initial_values = Some(values);
        self
    }

    pub fn with_initial_values_equal(
        mut self,
        is_equal: impl Fn(Option<&Value>, Option<&Value>) -> bool + 'static,
    ) -> Self {
        self.initial_values_equal = Some(Rc::new(is_equal));
        self
    }

    pub fn keep_dirty_on_reinitialize(mut self, keep: bool) -> Self {
        self.keep_dirty_on_reinitialize = keep;
        self
    }
}

impl fmt::Debug for FormConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormConfig")
            .field("subscription", &self.subscription)
            .field("initial_values", &self.initial_values)
            .field("initial_values_equal", &self.initial_values_equal.is_some())
            .field("keep_dirty_on_reinitialize", &self.keep_dirty_on_reinitialize)
            .finish()
    }
}

fn default_initial_values_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => shallow_equal(a, b),
        _ => false,
    }
}

/// Forwards changed form options to the engine.
struct ConfigSync {
    keep_dirty: WhenValueChanges<bool>,
    initial_values: WhenValueChanges<Option<Value>>,
}

impl ConfigSync {
    fn new(form: &FormHandle, config: &FormConfig) -> Self {
        let is_equal = config
            .initial_values_equal
            .clone()
            .unwrap_or_else(|| Rc::new(default_initial_values_equal));

        let keep_dirty = WhenValueChanges::new(config.keep_dirty_on_reinitialize, {
            let form = Rc::clone(form);
            move |keep: &bool| form.set_config(FormOption::KeepDirtyOnReinitialize(*keep))
        });
        let initial_values = WhenValueChanges::with_equality(
            config.initial_values.clone(),
            {
                let form = Rc::clone(form);
                move |values: &Option<Value>| {
                    debug!("reinitializing form with new initial values");
                    form.set_config(FormOption::InitialValues(values.clone()));
                }
            },
            move |a: &Option<Value>, b: &Option<Value>| is_equal(a.as_ref(), b.as_ref()),
        );

        Self {
            keep_dirty,
            initial_values,
        }
    }

    // The flag goes first so a reinitialization in the same call honours it.
    fn sync(&mut self, initial_values: Option<Value>, keep_dirty_on_reinitialize: bool) {
        self.keep_dirty.call(keep_dirty_on_reinitialize);
        self.initial_values.call(initial_values);
    }
}

/// A form handle paired with its state store.
///
/// Construction pushes the configured options to the engine. Later option
/// changes go through [`FormBinding::sync_config`], which only reaches the
/// engine when a value actually changed.
pub struct FormBinding {
    form: FormHandle,
    state: Readable<Rc<FormState>>,
    config: ConfigSync,
}

impl FormBinding {
    pub fn new(form: FormHandle, config: FormConfig) -> Self {
        if config.keep_dirty_on_reinitialize {
            form.set_config(FormOption::KeepDirtyOnReinitialize(true));
        }
        if let Some(values) = &config.initial_values {
            form.set_config(FormOption::InitialValues(Some(values.clone())));
        }
        let state = use_form_state(
            &form,
            FormStateConfig {
                subscription: config.subscription,
                on_change: None,
            },
        );
        let sync = ConfigSync::new(&form, &config);
        Self {
            form,
            state,
            config: sync,
        }
    }

    pub fn form(&self) -> &FormHandle {
        &self.form
    }

    pub fn state(&self) -> &Readable<Rc<FormState>> {
        &self.state
    }

    /// Push option changes to the engine.
    pub fn sync_config(&mut self, initial_values: Option<Value>, keep_dirty_on_reinitialize: bool) {
        self.config.sync(initial_values, keep_dirty_on_reinitialize);
    }

    /// Run `f` with this form as the context form.
    pub fn provide<R>(&self, f: impl FnOnce() -> R) -> R {
        FormContext::provide(Rc::clone(&self.form), f)
    }
}

/// Observes a form it does not own.
///
/// Same option syncing as [`FormBinding`], but nothing is pushed to the engine
/// at construction.
pub struct FormSpy {
    form: FormHandle,
    state: Readable<Rc<FormState>>,
    config: ConfigSync,
}

impl FormSpy {
    pub fn new(form: &FormHandle, config: FormConfig) -> Self {
        let state = use_form_state(
            form,
            FormStateConfig {
                subscription: config.subscription,
                on_change: None,
            },
        );
        Self {
            form: Rc::clone(form),
            state,
            config: ConfigSync::new(form, &config),
        }
    }

    /// Spy on the context form.
    pub fn from_context(config: FormConfig) -> Result<Self> {
        let form = FormContext::current()?;
        Ok(Self::new(&form, config))
    }

    pub fn form(&self) -> &FormHandle {
        &self.form
    }

    pub fn state(&self) -> &Readable<Rc<FormState>> {
        &self.state
    }

    /// Push option changes to the engine.
    pub fn sync_config(&mut self, initial_values: Option<Value>, keep_dirty_on_reinitialize: bool) {
        self.config.sync(initial_values, keep_dirty_on_reinitialize);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::testing::MemoryForm;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    #[test]
    fn form_state_follows_engine() {
        let engine = MemoryForm::new(json!({ "name": "Ada" }));
        let form: FormHandle = engine.clone();
        let observed = Rc::new(Cell::new(0));
        let state = use_form_state(
            &form,
            FormStateConfig::default().on_change({
                let observed = Rc::clone(&observed);
                move |_| observed.set(observed.get() + 1)
            }),
        );

        let sub = state.subscribe(|_| {});
        assert_eq!(state.get().unwrap().values, json!({ "name": "Ada" }));
        assert_eq!(engine.form_listener_count(), 1);

        engine.change("name", Some(json!("Grace")));
        assert_eq!(state.get().unwrap().values, json!({ "name": "Grace" }));
        assert!(state.get().unwrap().modified.get("name").copied().unwrap_or(false));
        assert_eq!(observed.get(), 2);

        drop(sub);
        assert_eq!(engine.form_listener_count(), 0);
    }

    #[test]
    fn masked_form_state_skips_unrelated_changes() {
        let engine = MemoryForm::new(json!({ "name": "Ada" }));
        let form: FormHandle = engine.clone();
        let state = use_form_state(
            &form,
            FormStateConfig::default().with_subscription(FormSubscription::VALUES),
        );
        let deliveries = Rc::new(RefCell::new(Vec::new()));
        let _sub = state.subscribe({
            let deliveries = Rc::clone(&deliveries);
            move |s: &Rc<FormState>| deliveries.borrow_mut().push(s.values.clone())
        });

        engine.focus("name");
        engine.blur("name");
        assert_eq!(deliveries.borrow().len(), 1);

        engine.change("name", Some(json!("Grace")));
        assert_eq!(deliveries.borrow().len(), 2);
    }

    #[test]
    fn binding_reinitializes_only_on_real_change() {
        let engine = MemoryForm::new(json!({}));
        let mut binding = FormBinding::new(
            engine.clone(),
            FormConfig::default().with_initial_values(json!({ "name": "A" })),
        );
        let _sub = binding.state().subscribe(|_| {});
        assert_eq!(engine.values(), json!({ "name": "A" }));

        binding.sync_config(Some(json!({ "name": "B" })), false);
        assert_eq!(engine.values(), json!({ "name": "B" }));

        engine.change("name", Some(json!("typed")));
        binding.sync_config(Some(json!({ "name": "B" })), false);
        assert_eq!(engine.values(), json!({ "name": "typed" }));
    }

    #[test]
    fn keep_dirty_on_reinitialize_is_forwarded() {
        let engine = MemoryForm::new(json!({ "a": 1, "b": 2 }));
        let form: FormHandle = engine.clone();
        let mut spy = FormSpy::new(
            &form,
            FormConfig::default().with_initial_values(json!({ "a": 1, "b": 2 })),
        );
        engine.change("a", Some(json!(10)));

        spy.sync_config(Some(json!({ "a": 5, "b": 6 })), true);
        assert_eq!(engine.values(), json!({ "a": 10, "b": 6 }));
    }

    #[test]
    fn spy_requires_context() {
        assert_eq!(
            FormSpy::from_context(FormConfig::default()).err().map(|e| e.to_string()),
            Some(Error::NoFormContext.to_string())
        );

        let engine = MemoryForm::new(json!({}));
        let binding = FormBinding::new(engine, FormConfig::default());
        let spy = binding.provide(|| FormSpy::from_context(FormConfig::default()));
        assert!(spy.is_ok());
    }
}

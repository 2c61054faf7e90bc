use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::{Map, Value};
use tracing::{debug, trace};

use super::path::{get_in, set_in};
use crate::form::{
    FieldListener, FieldMeta, FieldRegistration, FieldState, FieldSubscription, FormApi,
    FormListener, FormOption, FormState, FormSubscription, Mutator, Mutators, Unsubscribe,
};

#[derive(Debug, Default)]
struct FieldRecord {
    modified: bool,
    touched: bool,
    visited: bool,
    data: Map<String, Value>,
}

struct FormEntry {
    id: u64,
    listener: FormListener,
    mask: FormSubscription,
    last: Option<FormState>,
}

struct FieldEntry {
    id: u64,
    name: String,
    listener: FieldListener,
    mask: FieldSubscription,
    config: FieldRegistration,
    last: Option<FieldState>,
}

struct Engine {
    initial_values: Value,
    values: Value,
    keep_dirty_on_reinitialize: bool,
    active: Option<String>,
    records: BTreeMap<String, FieldRecord>,
    form_listeners: Vec<FormEntry>,
    field_listeners: Vec<FieldEntry>,
    next_id: u64,
}

impl Engine {
    fn record(&mut self, name: &str) -> &mut FieldRecord {
        self.records.entry(name.to_string()).or_default()
    }

    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn registrations<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FieldRegistration> + 'a {
        self.field_listeners
            .iter()
            .filter(move |entry| entry.name == name)
            .map(|entry| &entry.config)
    }

    fn pristine(&self, name: &str) -> bool {
        let value = get_in(&self.values, name);
        let initial = get_in(&self.initial_values, name);
        match self.registrations(name).find_map(|config| config.is_equal.as_ref()) {
            Some(is_equal) => is_equal(value, initial),
            None => value == initial,
        }
    }

    fn field_state(&self, name: &str, form: &Weak<MemoryForm>) -> FieldState {
        let value = get_in(&self.values, name).cloned();
        let pristine = self.pristine(name);
        let error = self.registrations(name).find_map(|config| {
            config
                .validate
                .as_ref()
                .and_then(|validate| validate(value.as_ref(), &self.values))
        });
        let record = self.records.get(name);
        let flag = |read: fn(&FieldRecord) -> bool| record.is_some_and(read);
        let modified = flag(|r| r.modified);

        let meta = FieldMeta {
            active: self.active.as_deref() == Some(name),
            data: record.map(|r| r.data.clone()).unwrap_or_default(),
            dirty: !pristine,
            dirty_since_last_submit: !pristine,
            invalid: error.is_some(),
            valid: error.is_none(),
            error,
            initial: get_in(&self.initial_values, name).cloned(),
            length: value.as_ref().and_then(Value::as_array).map(Vec::len),
            modified,
            modified_since_last_submit: modified,
            pristine,
            submit_error: None,
            submit_failed: false,
            submit_succeeded: false,
            submitting: false,
            touched: flag(|r| r.touched),
            validating: false,
            visited: flag(|r| r.visited),
        };

        FieldState {
            name: name.to_string(),
            value,
            meta,
            blur: field_callback(form, name, MemoryForm::blur),
            change: {
                let form = form.clone();
                let name = name.to_string();
                Rc::new(move |value| {
                    if let Some(form) = form.upgrade() {
                        form.change(&name, value);
                    }
                })
            },
            focus: field_callback(form, name, MemoryForm::focus),
        }
    }

    fn field_states(&self, form: &Weak<MemoryForm>) -> BTreeMap<String, FieldState> {
        self.records
            .keys()
            .map(|name| (name.clone(), self.field_state(name, form)))
            .collect()
    }

    fn form_state(&self, fields: &BTreeMap<String, FieldState>) -> FormState {
        let errors: BTreeMap<_, _> = fields
            .iter()
            .filter_map(|(name, state)| state.meta.error.clone().map(|error| (name.clone(), error)))
            .collect();
        let dirty_fields: BTreeMap<_, _> = fields
            .iter()
            .filter(|(_, state)| state.meta.dirty)
            .map(|(name, _)| (name.clone(), true))
            .collect();
        let flags = |read: fn(&FieldMeta) -> bool| -> BTreeMap<String, bool> {
            fields
                .iter()
                .map(|(name, state)| (name.clone(), read(&state.meta)))
                .collect()
        };

        FormState {
            active: self.active.clone(),
            dirty: !dirty_fields.is_empty(),
            pristine: dirty_fields.is_empty(),
            dirty_fields,
            has_validation_errors: !errors.is_empty(),
            invalid: !errors.is_empty(),
            valid: errors.is_empty(),
            errors,
            initial_values: self.initial_values.clone(),
            modified: flags(|meta| meta.modified),
            submit_errors: None,
            submit_failed: false,
            submit_succeeded: false,
            submitting: false,
            touched: flags(|meta| meta.touched),
            validating: false,
            values: self.values.clone(),
            visited: flags(|meta| meta.visited),
        }
    }
}

fn field_callback(form: &Weak<MemoryForm>, name: &str, event: fn(&MemoryForm, &str)) -> Rc<dyn Fn()> {
    let form = form.clone();
    let name = name.to_string();
    Rc::new(move || {
        if let Some(form) = form.upgrade() {
            event(&form, &name);
        }
    })
}

/// Resets the notifying flag even if a listener panics.
struct NotifyGuard<'a>(&'a Cell<bool>);

impl<'a> NotifyGuard<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self(flag)
    }
}

impl Drop for NotifyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

type Delivery = Box<dyn FnOnce()>;

/// A small in-memory form engine.
///
/// It keeps values and per-field flags, runs field-level validators, installs
/// the standard array mutators and notifies listeners only about the keys in
/// their masks. There is no submission pipeline.
///
/// Changes made while listeners are being notified are delivered in a
/// follow-up round once the current one finishes.
pub struct MemoryForm {
    this: Weak<MemoryForm>,
    engine: RefCell<Engine>,
    mutators: Mutators,
    notifying: Cell<bool>,
    pending: Cell<bool>,
}

impl MemoryForm {
    /// A form with the array mutators installed.
    pub fn new(initial_values: Value) -> Rc<Self> {
        Self::build(initial_values, true)
    }

    /// A form without any mutators.
    pub fn bare(initial_values: Value) -> Rc<Self> {
        Self::build(initial_values, false)
    }

    fn build(initial_values: Value, with_mutators: bool) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Self>| Self {
            this: this.clone(),
            engine: RefCell::new(Engine {
                values: initial_values.clone(),
                initial_values,
                keep_dirty_on_reinitialize: false,
                active: None,
                records: BTreeMap::new(),
                form_listeners: Vec::new(),
                field_listeners: Vec::new(),
                next_id: 0,
            }),
            mutators: if with_mutators {
                array_mutators(this)
            } else {
                Mutators::new()
            },
            notifying: Cell::new(false),
            pending: Cell::new(false),
        })
    }

    /// All current values.
    pub fn values(&self) -> Value {
        self.engine.borrow().values.clone()
    }

    /// The value at a field path.
    pub fn value(&self, name: &str) -> Option<Value> {
        get_in(&self.engine.borrow().values, name).cloned()
    }

    /// The current form snapshot, ignoring masks.
    pub fn state(&self) -> FormState {
        let engine = self.engine.borrow();
        let fields = engine.field_states(&self.this);
        engine.form_state(&fields)
    }

    /// The current snapshot of one field.
    pub fn field_state(&self, name: &str) -> FieldState {
        self.engine.borrow().field_state(name, &self.this)
    }

    pub fn change(&self, name: &str, value: Option<Value>) {
        {
            let mut engine = self.engine.borrow_mut();
            set_in(&mut engine.values, name, value);
            engine.record(name).modified = true;
        }
        trace!(field = name, "field changed");
        self.notify();
    }

    pub fn focus(&self, name: &str) {
        {
            let mut engine = self.engine.borrow_mut();
            engine.active = Some(name.to_string());
            engine.record(name).visited = true;
        }
        self.notify();
    }

    pub fn blur(&self, name: &str) {
        {
            let mut engine = self.engine.borrow_mut();
            if engine.active.as_deref() == Some(name) {
                engine.active = None;
            }
            engine.record(name).touched = true;
        }
        self.notify();
    }

    /// Attach arbitrary data to a field's meta.
    pub fn set_field_data(&self, name: &str, key: &str, value: Value) {
        self.engine
            .borrow_mut()
            .record(name)
            .data
            .insert(key.to_string(), value);
        self.notify();
    }

    /// Replace the initial values and reset the values to them.
    ///
    /// With `keep_dirty_on_reinitialize` set, fields that differ from their old
    /// initial value keep their current value.
    pub fn initialize(&self, initial_values: Value) {
        {
            let mut guard = self.engine.borrow_mut();
            let engine = &mut *guard;
            let kept: Vec<(String, Option<Value>)> = if engine.keep_dirty_on_reinitialize {
                engine
                    .records
                    .keys()
                    .filter(|name| !engine.pristine(name))
                    .map(|name| (name.clone(), get_in(&engine.values, name).cloned()))
                    .collect()
            } else {
                Vec::new()
            };
            engine.values = initial_values.clone();
            engine.initial_values = initial_values;
            for (name, value) in kept {
                set_in(&mut engine.values, &name, value);
            }
        }
        debug!("form initialized");
        self.notify();
    }

    pub fn form_listener_count(&self) -> usize {
        self.engine.borrow().form_listeners.len()
    }

    pub fn field_listener_count(&self, name: &str) -> usize {
        self.engine
            .borrow()
            .field_listeners
            .iter()
            .filter(|entry| entry.name == name)
            .count()
    }

    fn mutate_array(&self, name: &str, op: impl FnOnce(&mut Vec<Value>) -> Option<Value>) -> Option<Value> {
        let result = {
            let mut engine = self.engine.borrow_mut();
            let mut items = match get_in(&engine.values, name) {
                Some(Value::Array(items)) => items.clone(),
                _ => Vec::new(),
            };
            let result = op(&mut items);
            set_in(&mut engine.values, name, Some(Value::Array(items)));
            engine.record(name).modified = true;
            result
        };
        self.notify();
        result
    }

    fn notify(&self) {
        if self.notifying.get() {
            self.pending.set(true);
            return;
        }
        let _guard = NotifyGuard::enter(&self.notifying);
        loop {
            self.pending.set(false);
            for delivery in self.collect() {
                delivery();
            }
            if !self.pending.get() {
                break;
            }
        }
    }

    /// Snapshot everything and pick the listeners whose masked keys changed.
    fn collect(&self) -> Vec<Delivery> {
        let mut guard = self.engine.borrow_mut();
        let engine = &mut *guard;
        let fields = engine.field_states(&self.this);
        let form_state = engine.form_state(&fields);
        let mut deliveries: Vec<Delivery> = Vec::new();

        for entry in &mut engine.form_listeners {
            if entry.last.as_ref().map_or(true, |last| last.differs(&form_state, entry.mask)) {
                entry.last = Some(form_state.clone());
                let listener = Rc::clone(&entry.listener);
                let state = form_state.clone();
                deliveries.push(Box::new(move || listener(&state)));
            }
        }
        for entry in &mut engine.field_listeners {
            let Some(state) = fields.get(&entry.name) else {
                continue;
            };
            if entry.last.as_ref().map_or(true, |last| last.differs(state, entry.mask)) {
                entry.last = Some(state.clone());
                let listener = Rc::clone(&entry.listener);
                let state = state.clone();
                deliveries.push(Box::new(move || listener(&state)));
            }
        }
        deliveries
    }

    fn unsubscribe_form(&self, id: u64) {
        self.engine.borrow_mut().form_listeners.retain(|entry| entry.id != id);
    }

    fn unregister_field(&self, id: u64) {
        let removed = {
            let mut engine = self.engine.borrow_mut();
            let before = engine.field_listeners.len();
            engine.field_listeners.retain(|entry| entry.id != id);
            before != engine.field_listeners.len()
        };
        if removed {
            trace!(id, "field unregistered");
            self.notify();
        }
    }
}

impl FormApi for MemoryForm {
    fn subscribe(&self, listener: FormListener, subscription: FormSubscription) -> Unsubscribe {
        let (id, state) = {
            let mut engine = self.engine.borrow_mut();
            let fields = engine.field_states(&self.this);
            let state = engine.form_state(&fields);
            let id = engine.next_id();
            engine.form_listeners.push(FormEntry {
                id,
                listener: Rc::clone(&listener),
                mask: subscription,
                last: Some(state.clone()),
            });
            (id, state)
        };
        listener(&state);

        let form = self.this.clone();
        Box::new(move || {
            if let Some(form) = form.upgrade() {
                form.unsubscribe_form(id);
            }
        })
    }

    fn register_field(
        &self,
        name: &str,
        listener: FieldListener,
        subscription: FieldSubscription,
        config: FieldRegistration,
    ) -> Unsubscribe {
        let (id, state) = {
            let mut guard = self.engine.borrow_mut();
            let engine = &mut *guard;
            engine.record(name);
            if let Some(initial) = &config.initial_value {
                let was_pristine = get_in(&engine.values, name) == get_in(&engine.initial_values, name);
                set_in(&mut engine.initial_values, name, Some(initial.clone()));
                if was_pristine {
                    set_in(&mut engine.values, name, Some(initial.clone()));
                }
            }
            if let Some(default) = &config.default_value {
                if get_in(&engine.values, name).is_none() {
                    set_in(&mut engine.values, name, Some(default.clone()));
                }
            }
            let id = engine.next_id();
            engine.field_listeners.push(FieldEntry {
                id,
                name: name.to_string(),
                listener: Rc::clone(&listener),
                mask: subscription,
                config,
                last: None,
            });
            let state = engine.field_state(name, &self.this);
            if let Some(entry) = engine.field_listeners.last_mut() {
                entry.last = Some(state.clone());
            }
            (id, state)
        };
        trace!(field = name, id, "field registered");
        listener(&state);
        self.notify();

        let form = self.this.clone();
        Box::new(move || {
            if let Some(form) = form.upgrade() {
                form.unregister_field(id);
            }
        })
    }

    fn mutators(&self) -> Mutators {
        self.mutators.clone()
    }

    fn set_config(&self, option: FormOption) {
        match option {
            FormOption::KeepDirtyOnReinitialize(keep) => {
                self.engine.borrow_mut().keep_dirty_on_reinitialize = keep;
            }
            FormOption::InitialValues(values) => {
                self.initialize(values.unwrap_or_else(|| Value::Object(Map::new())));
            }
        }
    }
}

impl fmt::Debug for MemoryForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let engine = self.engine.borrow();
        f.debug_struct("MemoryForm")
            .field("values", &engine.values)
            .field("initial_values", &engine.initial_values)
            .field("form_listeners", &engine.form_listeners.len())
            .field("field_listeners", &engine.field_listeners.len())
            .finish()
    }
}

type ArrayOp = fn(&mut Vec<Value>, &[Value]) -> Option<Value>;

fn array_mutators(form: &Weak<MemoryForm>) -> Mutators {
    let ops: [(&str, ArrayOp); 11] = [
        ("concat", concat),
        ("insert", insert),
        ("move", move_item),
        ("pop", pop),
        ("push", push),
        ("remove", remove),
        ("removeBatch", remove_batch),
        ("shift", shift),
        ("swap", swap),
        ("unshift", unshift),
        ("update", update),
    ];
    ops.into_iter()
        .map(|(key, op)| {
            let form = form.clone();
            let mutator: Mutator = Rc::new(move |name: &str, args: &[Value]| {
                let form = form.upgrade()?;
                debug!(field = name, mutator = key, "array mutation");
                form.mutate_array(name, |items| op(items, args))
            });
            (key.to_string(), mutator)
        })
        .collect()
}

fn index_arg(args: &[Value], at: usize) -> Option<usize> {
    args.get(at)?.as_u64().and_then(|i| usize::try_from(i).ok())
}

fn value_arg(args: &[Value], at: usize) -> Value {
    args.get(at).cloned().unwrap_or(Value::Null)
}

fn push(items: &mut Vec<Value>, args: &[Value]) -> Option<Value> {
    items.push(value_arg(args, 0));
    None
}

fn pop(items: &mut Vec<Value>, _: &[Value]) -> Option<Value> {
    items.pop()
}

fn insert(items: &mut Vec<Value>, args: &[Value]) -> Option<Value> {
    let index = index_arg(args, 0)?.min(items.len());
    items.insert(index, value_arg(args, 1));
    None
}

fn remove(items: &mut Vec<Value>, args: &[Value]) -> Option<Value> {
    let index = index_arg(args, 0)?;
    (index < items.len()).then(|| items.remove(index))
}

fn swap(items: &mut Vec<Value>, args: &[Value]) -> Option<Value> {
    let (a, b) = (index_arg(args, 0)?, index_arg(args, 1)?);
    if a < items.len() && b < items.len() {
        items.swap(a, b);
    }
    None
}

fn move_item(items: &mut Vec<Value>, args: &[Value]) -> Option<Value> {
    let (from, to) = (index_arg(args, 0)?, index_arg(args, 1)?);
    if from < items.len() && to < items.len() {
        let item = items.remove(from);
        items.insert(to, item);
    }
    None
}

fn update(items: &mut Vec<Value>, args: &[Value]) -> Option<Value> {
    let index = index_arg(args, 0)?;
    if let Some(slot) = items.get_mut(index) {
        *slot = value_arg(args, 1);
    }
    None
}

fn shift(items: &mut Vec<Value>, _: &[Value]) -> Option<Value> {
    (!items.is_empty()).then(|| items.remove(0))
}

fn unshift(items: &mut Vec<Value>, args: &[Value]) -> Option<Value> {
    items.insert(0, value_arg(args, 0));
    None
}

fn concat(items: &mut Vec<Value>, args: &[Value]) -> Option<Value> {
    if let Some(Value::Array(more)) = args.first() {
        items.extend(more.iter().cloned());
    }
    None
}

fn remove_batch(items: &mut Vec<Value>, args: &[Value]) -> Option<Value> {
    let Some(Value::Array(indexes)) = args.first() else {
        return None;
    };
    let mut indexes: Vec<usize> = indexes
        .iter()
        .filter_map(Value::as_u64)
        .filter_map(|i| usize::try_from(i).ok())
        .filter(|i| *i < items.len())
        .collect();
    indexes.sort_unstable();
    indexes.dedup();

    let mut removed: Vec<Value> = indexes.iter().rev().map(|i| items.remove(*i)).collect();
    removed.reverse();
    Some(Value::Array(removed))
}

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::trace;

use super::equality::SafeEq;
use crate::runtime::queue;

/// Teardown returned by a store's start function.
pub type StopFn = Box<dyn FnOnce()>;

type StartFn<T> = Rc<dyn Fn(Setter<T>) -> Option<StopFn>>;

struct Subscriber<T> {
    id: u64,
    on_value: Rc<dyn Fn(&T)>,
    on_invalidate: Rc<dyn Fn()>,
    // Cleared on unsubscribe so deliveries already queued are skipped.
    live: Rc<Cell<bool>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            on_value: Rc::clone(&self.on_value),
            on_invalidate: Rc::clone(&self.on_invalidate),
            live: Rc::clone(&self.live),
        }
    }
}

/// Where a store is in its start/stop cycle.
enum Lifecycle {
    /// No subscribers.
    Idle,
    /// `start` is running; writes are stored but not delivered.
    Starting,
    /// At least one subscriber; holds the stop function returned by `start`.
    Active(Option<StopFn>),
}

struct StoreInner<T> {
    value: Option<T>,
    subscribers: Vec<Subscriber<T>>,
    next_id: u64,
    start: Option<StartFn<T>>,
    lifecycle: Lifecycle,
}

/// A single-threaded observable value with lazy start/stop.
///
/// Subscribers are notified in registration order. Every write goes through
/// the thread's notification queue, so a `set` issued from inside a
/// subscriber is delivered after the deliveries already in flight.
///
/// Cloning a `Store` creates a new handle to the **same** value.
///
/// # Examples
///
/// ```
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use tinform::Store;
///
/// let count = Store::new(1);
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let sub = count.subscribe({
///     let seen = Rc::clone(&seen);
///     move |v| seen.borrow_mut().push(*v)
/// });
/// count.set(2);
/// count.set(2);
/// drop(sub);
/// count.set(3);
///
/// assert_eq!(*seen.borrow(), vec![1, 2]);
/// ```
pub struct Store<T> {
    inner: Rc<RefCell<StoreInner<T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Store")
            .field("value", &inner.value)
            .field("subscribers", &inner.subscribers.len())
            .field("active", &matches!(inner.lifecycle, Lifecycle::Active(_)))
            .finish()
    }
}

impl<T: SafeEq + Clone + 'static> Store<T> {
    /// Create a store holding `initial`.
    pub fn new(initial: T) -> Self {
        Self::from_parts(Some(initial), None)
    }

    /// Create a store with no value yet.
    ///
    /// Subscribers receive nothing until the first `set`.
    pub fn empty() -> Self {
        Self::from_parts(None, None)
    }

    /// Create a store whose `start` runs on every 0 → 1 subscriber
    /// transition.
    ///
    /// `start` receives a [`Setter`] it may use immediately or keep for later.
    /// The stop function it returns runs on the matching 1 → 0 transition.
    pub fn with_start<F>(initial: Option<T>, start: F) -> Self
    where
        F: Fn(Setter<T>) -> Option<StopFn> + 'static,
    {
        Self::from_parts(initial, Some(Rc::new(start)))
    }

    fn from_parts(value: Option<T>, start: Option<StartFn<T>>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(StoreInner {
                value,
                subscribers: Vec::new(),
                next_id: 0,
                start,
                lifecycle: Lifecycle::Idle,
            })),
        }
    }

    /// Get a clone of the current value.
    pub fn get(&self) -> Option<T> {
        self.inner.borrow().value.clone()
    }

    /// Read the value with a function without cloning.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        let inner = self.inner.borrow();
        f(inner.value.as_ref())
    }

    /// Set a new value and notify subscribers if it changed.
    pub fn set(&self, new_value: T) {
        write(&self.inner, new_value);
    }

    /// Replace the value with `f(current)`.
    ///
    /// Does nothing while the store is empty.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        if let Some(current) = self.get() {
            self.set(f(&current));
        }
    }

    /// Subscribe to values.
    ///
    /// The current value, if any, is delivered before this returns.
    pub fn subscribe<V>(&self, on_value: V) -> Subscription
    where
        V: Fn(&T) + 'static,
    {
        self.subscribe_with(on_value, || {})
    }

    /// Subscribe to values and to invalidation.
    ///
    /// `on_invalidate` runs synchronously inside `set`, before any subscriber
    /// sees the new value.
    pub fn subscribe_with<V, I>(&self, on_value: V, on_invalidate: I) -> Subscription
    where
        V: Fn(&T) + 'static,
        I: Fn() + 'static,
    {
        let on_value: Rc<dyn Fn(&T)> = Rc::new(on_value);
        let live = Rc::new(Cell::new(true));

        let (id, start) = {
            let mut inner = self.inner.borrow_mut();
            let id = inner.next_id;
            inner.next_id += 1;
            inner.subscribers.push(Subscriber {
                id,
                on_value: Rc::clone(&on_value),
                on_invalidate: Rc::new(on_invalidate),
                live: Rc::clone(&live),
            });
            let start = if inner.subscribers.len() == 1 {
                inner.lifecycle = Lifecycle::Starting;
                Some(inner.start.clone())
            } else {
                None
            };
            (id, start)
        };

        if let Some(start) = start {
            self.activate(start);
        }

        let current = self.get();
        if let Some(value) = current {
            on_value(&value);
        }

        let weak = Rc::downgrade(&self.inner);
        Subscription::new(move || {
            live.set(false);
            if let Some(inner) = weak.upgrade() {
                remove_subscriber(&inner, id);
            }
        })
    }

    /// A weak write handle to this store.
    pub fn setter(&self) -> Setter<T> {
        Setter {
            inner: Rc::downgrade(&self.inner),
        }
    }

    /// A read-only handle to this store.
    pub fn readable(&self) -> Readable<T> {
        Readable {
            store: self.clone(),
        }
    }

    /// Number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().subscribers.len()
    }

    /// Whether the store has been started and not yet stopped.
    pub fn is_active(&self) -> bool {
        matches!(self.inner.borrow().lifecycle, Lifecycle::Active(_))
    }

    fn activate(&self, start: Option<StartFn<T>>) {
        trace!("store activated");
        let stop = match start {
            Some(start) => start(self.setter()),
            None => None,
        };
        let mut inner = self.inner.borrow_mut();
        if inner.subscribers.is_empty() {
            // Everyone left while `start` ran; tear down right away.
            inner.lifecycle = Lifecycle::Idle;
            drop(inner);
            if let Some(stop) = stop {
                stop();
            }
            return;
        }
        inner.lifecycle = Lifecycle::Active(stop);
    }
}

fn write<T: SafeEq + Clone + 'static>(inner: &Rc<RefCell<StoreInner<T>>>, new_value: T) {
    let subscribers = {
        let mut inner = inner.borrow_mut();
        if let Some(current) = &inner.value {
            if current.safe_eq(&new_value) {
                return;
            }
        }
        inner.value = Some(new_value.clone());
        if !matches!(inner.lifecycle, Lifecycle::Active(_)) {
            return;
        }
        inner.subscribers.clone()
    };

    let flush = queue::claim();
    for subscriber in subscribers {
        (subscriber.on_invalidate)();
        let value = new_value.clone();
        queue::enqueue(move || {
            if subscriber.live.get() {
                (subscriber.on_value)(&value);
            }
        });
    }
    if let Some(flush) = flush {
        flush.run();
    }
}

fn remove_subscriber<T>(inner: &Rc<RefCell<StoreInner<T>>>, id: u64) {
    let stop = {
        let mut inner = inner.borrow_mut();
        let Some(index) = inner.subscribers.iter().position(|s| s.id == id) else {
            return;
        };
        inner.subscribers.remove(index);
        if !inner.subscribers.is_empty() {
            return;
        }
        match std::mem::replace(&mut inner.lifecycle, Lifecycle::Idle) {
            Lifecycle::Active(stop) => stop,
            _ => None,
        }
    };
    trace!("store deactivated");
    if let Some(stop) = stop {
        stop();
    }
}

/// Weak write access handed to start functions and derived combiners.
///
/// Writing through a setter whose store was dropped does nothing.
pub struct Setter<T> {
    inner: Weak<RefCell<StoreInner<T>>>,
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

impl<T: SafeEq + Clone + 'static> Setter<T> {
    /// Set a new value on the underlying store.
    pub fn set(&self, value: T) {
        if let Some(inner) = self.inner.upgrade() {
            write(&inner, value);
        }
    }

    /// Replace the value with `f(current)` on the underlying store.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        if let Some(inner) = self.inner.upgrade() {
            Store { inner }.update(f);
        }
    }
}

/// RAII guard for a store subscription.
///
/// Dropping the guard unsubscribes. Use [`Subscription::detach`] to keep the
/// subscriber for the life of the store.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Wrap an arbitrary teardown in a guard.
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unsubscribe now.
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the subscriber registered forever.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Anything that delivers values to subscribers.
pub trait Subscribable: Clone + 'static {
    /// The delivered value type.
    type Output: SafeEq + Clone + 'static;

    /// Subscribe to values and invalidation.
    fn subscribe_with<V, I>(&self, on_value: V, on_invalidate: I) -> Subscription
    where
        V: Fn(&Self::Output) + 'static,
        I: Fn() + 'static;

    /// Subscribe to values only.
    fn subscribe<V>(&self, on_value: V) -> Subscription
    where
        V: Fn(&Self::Output) + 'static,
    {
        self.subscribe_with(on_value, || {})
    }
}

impl<T: SafeEq + Clone + 'static> Subscribable for Store<T> {
    type Output = T;

    fn subscribe_with<V, I>(&self, on_value: V, on_invalidate: I) -> Subscription
    where
        V: Fn(&T) + 'static,
        I: Fn() + 'static,
    {
        Store::subscribe_with(self, on_value, on_invalidate)
    }
}

/// A read-only store handle.
///
/// Derived stores and the field bridges hand these out: consumers subscribe,
/// only the producer writes.
pub struct Readable<T> {
    store: Store<T>,
}

impl<T> Clone for Readable<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Readable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.store.fmt(f)
    }
}

impl<T: SafeEq + Clone + 'static> Readable<T> {
    /// Create a read-only store driven entirely by `start`.
    pub fn new<F>(initial: Option<T>, start: F) -> Self
    where
        F: Fn(Setter<T>) -> Option<StopFn> + 'static,
    {
        Self {
            store: Store::with_start(initial, start),
        }
    }

    /// Get a clone of the current value.
    ///
    /// This does not start the store; an idle readable returns its last
    /// known value.
    pub fn get(&self) -> Option<T> {
        self.store.get()
    }

    /// Read the value with a function without cloning.
    pub fn with<R>(&self, f: impl FnOnce(Option<&T>) -> R) -> R {
        self.store.with(f)
    }

    /// Subscribe to values.
    pub fn subscribe<V>(&self, on_value: V) -> Subscription
    where
        V: Fn(&T) + 'static,
    {
        self.store.subscribe(on_value)
    }

    /// Subscribe to values and invalidation.
    pub fn subscribe_with<V, I>(&self, on_value: V, on_invalidate: I) -> Subscription
    where
        V: Fn(&T) + 'static,
        I: Fn() + 'static,
    {
        self.store.subscribe_with(on_value, on_invalidate)
    }

    /// Number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.store.subscriber_count()
    }

    /// Whether the store has been started and not yet stopped.
    pub fn is_active(&self) -> bool {
        self.store.is_active()
    }
}

impl<T: SafeEq + Clone + 'static> Subscribable for Readable<T> {
    type Output = T;

    fn subscribe_with<V, I>(&self, on_value: V, on_invalidate: I) -> Subscription
    where
        V: Fn(&T) + 'static,
        I: Fn() + 'static,
    {
        self.store.subscribe_with(on_value, on_invalidate)
    }
}

impl<T: SafeEq + Clone + 'static> From<Store<T>> for Readable<T> {
    fn from(store: Store<T>) -> Self {
        Self { store }
    }
}

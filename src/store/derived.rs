//! Stores computed from other stores.
//!
//! # Design
//!
//! A derived store is a [`Readable`] whose start function subscribes to every
//! source. While it has subscribers, an [`Activation`] tracks one readiness
//! flag per source:
//!
//! - a source's invalidation marks it pending;
//! - a source's value stores a copy and clears its flag;
//! - the combiner runs only when no flag is set.
//!
//! Several sources invalidated by one write therefore produce a single
//! recomputation once the last of them delivers, never a mix of old and new
//! values.
//!
//! # Invariants
//!
//! 1. The combiner never runs before every source delivered a value since
//!    activation.
//! 2. A manual combiner's cleanup runs before its next run and on deactivation.
//! 3. Deactivation drops every source subscription.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::equality::SafeEq;
use super::store::{Readable, Setter, StopFn, Subscribable, Subscription};

/// Cancels work scheduled by a manual combiner.
///
/// Must tolerate being called after the work already finished.
pub type Cleanup = Box<dyn FnOnce()>;

enum Combine<V, T> {
    /// The return value becomes the derived value.
    Auto(Box<dyn Fn(&V) -> T>),
    /// The combiner sets values itself, possibly later.
    Manual(Box<dyn Fn(&V, &Setter<T>) -> Option<Cleanup>>),
}

/// Shape of a source list: how to subscribe to it and how to read its values.
trait Sources: 'static {
    type Values: 'static;
    type Slots: 'static;

    fn count(&self) -> usize;
    fn empty_slots(&self) -> Self::Slots;
    fn connect<T: SafeEq + Clone + 'static>(&self, run: &Rc<Activation<Self, T>>) -> Vec<Subscription>
    where
        Self: Sized;
    fn snapshot(slots: &Self::Slots) -> Option<Self::Values>;
}

/// Live state of a derived store between activation and deactivation.
struct Activation<S: Sources, T> {
    slots: RefCell<S::Slots>,
    pending: RefCell<Vec<bool>>,
    inited: Cell<bool>,
    cleanup: RefCell<Option<Cleanup>>,
    combine: Rc<Combine<S::Values, T>>,
    setter: Setter<T>,
}

impl<S: Sources, T: SafeEq + Clone + 'static> Activation<S, T> {
    fn invalidate(&self, index: usize) {
        self.pending.borrow_mut()[index] = true;
    }

    fn deliver(&self, index: usize, store: impl FnOnce(&mut S::Slots)) {
        {
            let mut slots = self.slots.borrow_mut();
            store(&mut *slots);
        }
        self.pending.borrow_mut()[index] = false;
        if self.inited.get() {
            self.sync();
        }
    }

    fn sync(&self) {
        if self.pending.borrow().iter().any(|pending| *pending) {
            return;
        }
        let values = {
            let slots = self.slots.borrow();
            S::snapshot(&slots)
        };
        let Some(values) = values else {
            return;
        };

        self.run_cleanup();
        match &*self.combine {
            Combine::Auto(f) => self.setter.set(f(&values)),
            Combine::Manual(f) => {
                let cleanup = f(&values, &self.setter);
                *self.cleanup.borrow_mut() = cleanup;
            }
        }
    }

    fn run_cleanup(&self) {
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }
}

fn build<S, T>(sources: S, initial: Option<T>, combine: Combine<S::Values, T>) -> Readable<T>
where
    S: Sources,
    T: SafeEq + Clone + 'static,
{
    let sources = Rc::new(sources);
    let combine = Rc::new(combine);
    Readable::new(initial, move |setter| {
        let run = Rc::new(Activation::<S, T> {
            slots: RefCell::new(sources.empty_slots()),
            pending: RefCell::new(vec![true; sources.count()]),
            inited: Cell::new(false),
            cleanup: RefCell::new(None),
            combine: Rc::clone(&combine),
            setter,
        });
        let subscriptions = sources.connect(&run);
        run.inited.set(true);
        run.sync();

        let stop: StopFn = Box::new(move || {
            drop(subscriptions);
            run.run_cleanup();
        });
        Some(stop)
    })
}

struct One<A>(A);

impl<A: Subscribable> Sources for One<A> {
    type Values = A::Output;
    type Slots = Option<A::Output>;

    fn count(&self) -> usize {
        1
    }

    fn empty_slots(&self) -> Self::Slots {
        None
    }

    fn connect<T: SafeEq + Clone + 'static>(&self, run: &Rc<Activation<Self, T>>) -> Vec<Subscription> {
        let on_value = Rc::clone(run);
        let on_invalidate = Rc::clone(run);
        vec![self.0.subscribe_with(
            move |v: &A::Output| on_value.deliver(0, |slot| *slot = Some(v.clone())),
            move || on_invalidate.invalidate(0),
        )]
    }

    fn snapshot(slots: &Self::Slots) -> Option<Self::Values> {
        slots.clone()
    }
}

struct Two<A, B>(A, B);

impl<A: Subscribable, B: Subscribable> Sources for Two<A, B> {
    type Values = (A::Output, B::Output);
    type Slots = (Option<A::Output>, Option<B::Output>);

    fn count(&self) -> usize {
        2
    }

    fn empty_slots(&self) -> Self::Slots {
        (None, None)
    }

    fn connect<T: SafeEq + Clone + 'static>(&self, run: &Rc<Activation<Self, T>>) -> Vec<Subscription> {
        let (on_a, inv_a) = (Rc::clone(run), Rc::clone(run));
        let (on_b, inv_b) = (Rc::clone(run), Rc::clone(run));
        vec![
            self.0.subscribe_with(
                move |v: &A::Output| on_a.deliver(0, |slots| slots.0 = Some(v.clone())),
                move || inv_a.invalidate(0),
            ),
            self.1.subscribe_with(
                move |v: &B::Output| on_b.deliver(1, |slots| slots.1 = Some(v.clone())),
                move || inv_b.invalidate(1),
            ),
        ]
    }

    fn snapshot(slots: &Self::Slots) -> Option<Self::Values> {
        match slots {
            (Some(a), Some(b)) => Some((a.clone(), b.clone())),
            _ => None,
        }
    }
}

struct Three<A, B, C>(A, B, C);

impl<A: Subscribable, B: Subscribable, C: Subscribable> Sources for Three<A, B, C> {
    type Values = (A::Output, B::Output, C::Output);
    type Slots = (Option<A::Output>, Option<B::Output>, Option<C::Output>);

    fn count(&self) -> usize {
        3
    }

    fn empty_slots(&self) -> Self::Slots {
        (None, None, None)
    }

    fn connect<T: SafeEq + Clone + 'static>(&self, run: &Rc<Activation<Self, T>>) -> Vec<Subscription> {
        let (on_a, inv_a) = (Rc::clone(run), Rc::clone(run));
        let (on_b, inv_b) = (Rc::clone(run), Rc::clone(run));
        let (on_c, inv_c) = (Rc::clone(run), Rc::clone(run));
        vec![
            self.0.subscribe_with(
                move |v: &A::Output| on_a.deliver(0, |slots| slots.0 = Some(v.clone())),
                move || inv_a.invalidate(0),
            ),
            self.1.subscribe_with(
                move |v: &B::Output| on_b.deliver(1, |slots| slots.1 = Some(v.clone())),
                move || inv_b.invalidate(1),
            ),
            self.2.subscribe_with(
                move |v: &C::Output| on_c.deliver(2, |slots| slots.2 = Some(v.clone())),
                move || inv_c.invalidate(2),
            ),
        ]
    }

    fn snapshot(slots: &Self::Slots) -> Option<Self::Values> {
        match slots {
            (Some(a), Some(b), Some(c)) => Some((a.clone(), b.clone(), c.clone())),
            _ => None,
        }
    }
}

struct Many<A>(Vec<A>);

impl<A: Subscribable> Sources for Many<A> {
    type Values = Vec<A::Output>;
    type Slots = Vec<Option<A::Output>>;

    fn count(&self) -> usize {
        self.0.len()
    }

    fn empty_slots(&self) -> Self::Slots {
        vec![None; self.0.len()]
    }

    fn connect<T: SafeEq + Clone + 'static>(&self, run: &Rc<Activation<Self, T>>) -> Vec<Subscription> {
        self.0
            .iter()
            .enumerate()
            .map(|(index, source)| {
                let on_value = Rc::clone(run);
                let on_invalidate = Rc::clone(run);
                source.subscribe_with(
                    move |v: &A::Output| on_value.deliver(index, |slots| slots[index] = Some(v.clone())),
                    move || on_invalidate.invalidate(index),
                )
            })
            .collect()
    }

    fn snapshot(slots: &Self::Slots) -> Option<Self::Values> {
        slots.iter().cloned().collect()
    }
}

/// Derive a store from one source.
///
/// # Examples
///
/// ```
/// use tinform::{derived, Store};
///
/// let count = Store::new(2);
/// let doubled = derived(&count, |n| n * 2);
///
/// let _sub = doubled.subscribe(|_| {});
/// assert_eq!(doubled.get(), Some(4));
///
/// count.set(5);
/// assert_eq!(doubled.get(), Some(10));
/// ```
pub fn derived<A, T, F>(source: &A, f: F) -> Readable<T>
where
    A: Subscribable,
    T: SafeEq + Clone + 'static,
    F: Fn(&A::Output) -> T + 'static,
{
    build(One(source.clone()), None, Combine::Auto(Box::new(f)))
}

/// Derive a store from two sources.
pub fn derived2<A, B, T, F>(a: &A, b: &B, f: F) -> Readable<T>
where
    A: Subscribable,
    B: Subscribable,
    T: SafeEq + Clone + 'static,
    F: Fn(&A::Output, &B::Output) -> T + 'static,
{
    build(
        Two(a.clone(), b.clone()),
        None,
        Combine::Auto(Box::new(move |(a, b): &(A::Output, B::Output)| f(a, b))),
    )
}

/// Derive a store from three sources.
pub fn derived3<A, B, C, T, F>(a: &A, b: &B, c: &C, f: F) -> Readable<T>
where
    A: Subscribable,
    B: Subscribable,
    C: Subscribable,
    T: SafeEq + Clone + 'static,
    F: Fn(&A::Output, &B::Output, &C::Output) -> T + 'static,
{
    build(
        Three(a.clone(), b.clone(), c.clone()),
        None,
        Combine::Auto(Box::new(
            move |(a, b, c): &(A::Output, B::Output, C::Output)| f(a, b, c),
        )),
    )
}

/// Derive a store from any number of sources of one type.
pub fn derived_all<A, T, F>(sources: Vec<A>, f: F) -> Readable<T>
where
    A: Subscribable,
    T: SafeEq + Clone + 'static,
    F: Fn(&[A::Output]) -> T + 'static,
{
    build(
        Many(sources),
        None,
        Combine::Auto(Box::new(move |values: &Vec<A::Output>| f(values))),
    )
}

/// Derive a store from one source with a combiner that sets values itself.
///
/// The combiner may call the setter zero or more times, now or later. The
/// cleanup it returns runs before the next recomputation and when the store
/// loses its last subscriber.
pub fn derived_with<A, T, F>(source: &A, initial: Option<T>, f: F) -> Readable<T>
where
    A: Subscribable,
    T: SafeEq + Clone + 'static,
    F: Fn(&A::Output, &Setter<T>) -> Option<Cleanup> + 'static,
{
    build(One(source.clone()), initial, Combine::Manual(Box::new(f)))
}

/// Two-source form of [`derived_with`].
pub fn derived2_with<A, B, T, F>(a: &A, b: &B, initial: Option<T>, f: F) -> Readable<T>
where
    A: Subscribable,
    B: Subscribable,
    T: SafeEq + Clone + 'static,
    F: Fn(&A::Output, &B::Output, &Setter<T>) -> Option<Cleanup> + 'static,
{
    build(
        Two(a.clone(), b.clone()),
        initial,
        Combine::Manual(Box::new(
            move |(a, b): &(A::Output, B::Output), set: &Setter<T>| f(a, b, set),
        )),
    )
}

/// Many-source form of [`derived_with`].
pub fn derived_all_with<A, T, F>(sources: Vec<A>, initial: Option<T>, f: F) -> Readable<T>
where
    A: Subscribable,
    T: SafeEq + Clone + 'static,
    F: Fn(&[A::Output], &Setter<T>) -> Option<Cleanup> + 'static,
{
    build(
        Many(sources),
        initial,
        Combine::Manual(Box::new(move |values: &Vec<A::Output>, set: &Setter<T>| f(values, set))),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Store;

    #[test]
    fn single_source() {
        let source = Store::new(10);
        let doubled = derived(&source, |v| v * 2);

        let _sub = doubled.subscribe(|_| {});
        assert_eq!(doubled.get(), Some(20));

        source.set(5);
        assert_eq!(doubled.get(), Some(10));
    }

    #[test]
    fn lazy_until_subscribed() {
        let runs = Rc::new(Cell::new(0));
        let source = Store::new(1);
        let derived_store = derived(&source, {
            let runs = Rc::clone(&runs);
            move |v| {
                runs.set(runs.get() + 1);
                *v
            }
        });

        source.set(2);
        assert_eq!(runs.get(), 0);
        assert_eq!(source.subscriber_count(), 0);

        let sub = derived_store.subscribe(|_| {});
        assert_eq!(runs.get(), 1);
        assert_eq!(source.subscriber_count(), 1);

        drop(sub);
        assert_eq!(source.subscriber_count(), 0);
        source.set(3);
        assert_eq!(runs.get(), 1);
    }

    #[test]
    fn waits_for_every_source() {
        let runs = Rc::new(Cell::new(0));
        let a: Store<i32> = Store::empty();
        let b = Store::new(1);
        let sum = derived2(&a, &b, {
            let runs = Rc::clone(&runs);
            move |a, b| {
                runs.set(runs.get() + 1);
                a + b
            }
        });

        let _sub = sum.subscribe(|_| {});
        assert_eq!(runs.get(), 0);
        assert_eq!(sum.get(), None);

        a.set(2);
        assert_eq!(runs.get(), 1);
        assert_eq!(sum.get(), Some(3));
    }

    #[test]
    fn diamond_settles_once() {
        let root = Store::new(1);
        let left = derived(&root, |v| v + 1);
        let right = derived(&root, |v| v * 10);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let combined = derived2(&left, &right, {
            let seen = Rc::clone(&seen);
            move |l, r| {
                seen.borrow_mut().push((*l, *r));
                l + r
            }
        });

        let _sub = combined.subscribe(|_| {});
        root.set(2);

        assert_eq!(*seen.borrow(), vec![(2, 10), (3, 20)]);
        assert_eq!(combined.get(), Some(23));
    }

    #[test]
    fn three_sources() {
        let a = Store::new(1);
        let b = Store::new(2);
        let c = Store::new(3);
        let sum = derived3(&a, &b, &c, |x, y, z| x + y + z);

        let _sub = sum.subscribe(|_| {});
        assert_eq!(sum.get(), Some(6));

        c.set(100);
        assert_eq!(sum.get(), Some(103));
    }

    #[test]
    fn many_sources() {
        let stores: Vec<_> = (1..=4).map(Store::new).collect();
        let total = derived_all(stores.clone(), |values| values.iter().sum::<i32>());

        let _sub = total.subscribe(|_| {});
        assert_eq!(total.get(), Some(10));

        stores[2].set(30);
        assert_eq!(total.get(), Some(37));
    }

    #[test]
    fn manual_combiner_cleans_up() {
        let cleanups = Rc::new(Cell::new(0));
        let source = Store::new(1);
        let echoed = derived_with(&source, Some(0), {
            let cleanups = Rc::clone(&cleanups);
            move |v, set| {
                set.set(v * 100);
                let cleanups = Rc::clone(&cleanups);
                Some(Box::new(move || cleanups.set(cleanups.get() + 1)) as Cleanup)
            }
        });

        let sub = echoed.subscribe(|_| {});
        assert_eq!(echoed.get(), Some(100));
        assert_eq!(cleanups.get(), 0);

        source.set(2);
        assert_eq!(echoed.get(), Some(200));
        assert_eq!(cleanups.get(), 1);

        drop(sub);
        assert_eq!(cleanups.get(), 2);
    }

    #[test]
    fn manual_combiner_can_defer() {
        let pending: Rc<RefCell<Vec<(i32, Setter<i32>)>>> = Rc::new(RefCell::new(Vec::new()));
        let source = Store::new(1);
        let slow = derived_with(&source, None, {
            let pending = Rc::clone(&pending);
            move |v, set| {
                pending.borrow_mut().push((*v, set.clone()));
                None
            }
        });

        let _sub = slow.subscribe(|_| {});
        assert_eq!(slow.get(), None);

        let (v, set) = pending.borrow_mut().remove(0);
        set.set(v + 1);
        assert_eq!(slow.get(), Some(2));
    }
}

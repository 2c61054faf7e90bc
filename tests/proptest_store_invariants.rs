//! Property-based invariant tests for stores, derived stores, the change
//! guard and field arrays.
//!
//! 1. A subscriber sees the initial value plus one call per actual change.
//! 2. Start and stop run once per 0 → 1 and 1 → 0 subscriber transition.
//! 3. A derived store always equals its function of the latest sources.
//! 4. The change guard fires once per run of equal values.
//! 5. Field array names track the array length through push and pop.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use serde_json::json;
use tinform::array::{use_field_array, FieldArrayConfig};
use tinform::form::FormHandle;
use tinform::store::{derived2, Setter, StopFn, Store, Subscription};
use tinform::testing::MemoryForm;
use tinform::WhenValueChanges;

// ── Helpers ─────────────────────────────────────────────────────────────

fn changes(initial: i32, values: &[i32]) -> usize {
    let mut last = initial;
    values
        .iter()
        .filter(|v| {
            let changed = **v != last;
            last = **v;
            changed
        })
        .count()
}

#[derive(Debug, Clone)]
enum Op {
    Subscribe,
    Unsubscribe(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![Just(Op::Subscribe), any::<usize>().prop_map(Op::Unsubscribe)]
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Equal sets are silent
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn subscriber_sees_each_change_once(
        initial in -3i32..3,
        values in proptest::collection::vec(-3i32..3, 0..40),
    ) {
        let store = Store::new(initial);
        let calls = Rc::new(Cell::new(0usize));
        let _sub = store.subscribe({
            let calls = Rc::clone(&calls);
            move |_| calls.set(calls.get() + 1)
        });

        for value in &values {
            store.set(*value);
        }
        prop_assert_eq!(calls.get(), 1 + changes(initial, &values));
        prop_assert_eq!(store.get(), Some(values.last().copied().unwrap_or(initial)));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Start/stop balance
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn start_and_stop_balance(ops in proptest::collection::vec(op_strategy(), 0..60)) {
        let starts = Rc::new(Cell::new(0usize));
        let stops = Rc::new(Cell::new(0usize));
        let store = Store::with_start(Some(0), {
            let starts = Rc::clone(&starts);
            let stops = Rc::clone(&stops);
            move |_: Setter<i32>| {
                starts.set(starts.get() + 1);
                let stops = Rc::clone(&stops);
                Some(Box::new(move || stops.set(stops.get() + 1)) as StopFn)
            }
        });

        let mut subs: Vec<Subscription> = Vec::new();
        let mut transitions = 0usize;
        for op in ops {
            match op {
                Op::Subscribe => {
                    if subs.is_empty() {
                        transitions += 1;
                    }
                    subs.push(store.subscribe(|_| {}));
                }
                Op::Unsubscribe(index) => {
                    if !subs.is_empty() {
                        let index = index % subs.len();
                        subs.remove(index).unsubscribe();
                    }
                }
            }
            prop_assert_eq!(store.subscriber_count(), subs.len());
            prop_assert_eq!(starts.get() - stops.get(), usize::from(!subs.is_empty()));
        }
        prop_assert_eq!(starts.get(), transitions);

        drop(subs);
        prop_assert_eq!(starts.get(), stops.get());
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Derived stores follow their sources
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn derived_matches_latest_sources(
        writes in proptest::collection::vec((any::<bool>(), -100i64..100), 0..40),
    ) {
        let a = Store::new(0i64);
        let b = Store::new(0i64);
        let combined = derived2(&a, &b, |a, b| a * 3 + b);
        let _sub = combined.subscribe(|_| {});

        for (to_a, value) in writes {
            if to_a {
                a.set(value);
            } else {
                b.set(value);
            }
            let expected = a.get().unwrap_or_default() * 3 + b.get().unwrap_or_default();
            prop_assert_eq!(combined.get(), Some(expected));
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Change guard
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn guard_fires_once_per_change(
        initial in -3i32..3,
        values in proptest::collection::vec(-3i32..3, 0..40),
    ) {
        let fired = Rc::new(Cell::new(0usize));
        let mut guard = WhenValueChanges::new(initial, {
            let fired = Rc::clone(&fired);
            move |_: &i32| fired.set(fired.get() + 1)
        });
        for value in &values {
            guard.call(*value);
        }
        prop_assert_eq!(fired.get(), changes(initial, &values));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Field array names
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn array_names_track_length(pushes in proptest::collection::vec(any::<bool>(), 0..30)) {
        let form: FormHandle = MemoryForm::new(json!({ "items": [] }));
        let array = use_field_array(&form, "items", FieldArrayConfig::default())
            .expect("memory form provides array mutators");
        let _sub = array.subscribe(|_| {});

        let mut expected = 0usize;
        for push in pushes {
            if push {
                array.mutators().push(json!(expected)).expect("push");
                expected += 1;
            } else {
                array.mutators().pop().expect("pop");
                expected = expected.saturating_sub(1);
            }
            let fields = array.get().expect("subscribed").fields;
            let names: Vec<String> = (0..expected).map(|i| format!("items[{i}]")).collect();
            prop_assert_eq!(fields.len(), expected);
            prop_assert_eq!(fields.names(), names);
        }
    }
}

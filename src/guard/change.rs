use serde_json::Value;

/// Runs an effect only when a watched value changes.
///
/// The last value that fired is remembered; calling again with a value equal
/// to it does nothing.
///
/// # Examples
///
/// ```
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use tinform::guard::WhenValueChanges;
///
/// let fired = Rc::new(Cell::new(0));
/// let mut guard = WhenValueChanges::new(1, {
///     let fired = Rc::clone(&fired);
///     move |_: &i32| fired.set(fired.get() + 1)
/// });
///
/// guard.call(1);
/// guard.call(2);
/// guard.call(2);
/// assert_eq!(fired.get(), 1);
/// ```
pub struct WhenValueChanges<T> {
    prev: T,
    effect: Box<dyn FnMut(&T)>,
    is_equal: Box<dyn Fn(&T, &T) -> bool>,
}

impl<T: PartialEq + 'static> WhenValueChanges<T> {
    /// Guard `effect` with `==`.
    pub fn new(initial: T, effect: impl FnMut(&T) + 'static) -> Self {
        Self::with_equality(initial, effect, |a: &T, b: &T| a == b)
    }
}

impl<T> WhenValueChanges<T> {
    /// Guard `effect` with a custom equality.
    pub fn with_equality(
        initial: T,
        effect: impl FnMut(&T) + 'static,
        is_equal: impl Fn(&T, &T) -> bool + 'static,
    ) -> Self {
        Self {
            prev: initial,
            effect: Box::new(effect),
            is_equal: Box::new(is_equal),
        }
    }

    /// Offer a value; returns whether the effect ran.
    pub fn call(&mut self, value: T) -> bool {
        if (self.is_equal)(&self.prev, &value) {
            return false;
        }
        (self.effect)(&value);
        self.prev = value;
        true
    }

    /// The last value the effect ran with (or the initial value).
    pub fn current(&self) -> &T {
        &self.prev
    }
}

/// Identity-like comparison of two JSON values.
///
/// Scalars compare by value; arrays and objects have no identity and never
/// compare equal.
pub fn strict_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Null, Value::Null) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        _ => false,
    }
}

/// One-level comparison of two JSON values.
///
/// Objects are equal when they have the same keys and [`strict_equal`] values
/// under each key; arrays likewise by index. Scalars fall back to
/// [`strict_equal`].
pub fn shallow_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, value)| b.get(key).is_some_and(|other| strict_equal(value, other)))
        }
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| strict_equal(x, y))
        }
        _ => strict_equal(a, b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn fires_only_on_change() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut guard = WhenValueChanges::new("a".to_string(), {
            let log = Rc::clone(&log);
            move |v: &String| log.borrow_mut().push(v.clone())
        });

        assert!(!guard.call("a".to_string()));
        assert!(guard.call("b".to_string()));
        assert!(!guard.call("b".to_string()));
        assert!(guard.call("a".to_string()));

        assert_eq!(*log.borrow(), vec!["b", "a"]);
        assert_eq!(guard.current(), "a");
    }

    #[test]
    fn custom_equality() {
        let count = Rc::new(RefCell::new(0));
        let mut guard = WhenValueChanges::with_equality(
            json!({ "a": 1 }),
            {
                let count = Rc::clone(&count);
                move |_: &Value| *count.borrow_mut() += 1
            },
            shallow_equal,
        );

        guard.call(json!({ "a": 1 }));
        assert_eq!(*count.borrow(), 0);
        guard.call(json!({ "a": 2 }));
        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn shallow_equal_one_level() {
        assert!(shallow_equal(&json!({ "a": 1, "b": "x" }), &json!({ "b": "x", "a": 1 })));
        assert!(!shallow_equal(&json!({ "a": 1 }), &json!({ "a": 1, "b": 2 })));
        assert!(!shallow_equal(&json!({ "a": { "n": 1 } }), &json!({ "a": { "n": 1 } })));
        assert!(shallow_equal(&json!([1, 2]), &json!([1, 2])));
        assert!(shallow_equal(&json!(null), &json!(null)));
        assert!(!shallow_equal(&json!([]), &json!({})));
    }
}

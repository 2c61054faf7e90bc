//! Change detection for store values.
//!
//! A store only notifies when a new value is observably different from the
//! current one. The rule is shallow on purpose:
//!
//! - scalars compare by value, and a NaN float equals another NaN;
//! - reference-counted values compare by pointer identity;
//! - compound values without identity (`Vec`, JSON arrays and objects) always
//!   count as changed.
//!
//! Deep comparison is never performed. Producers that want a projection to
//! stay quiet keep the same `Rc` for an unchanged part.

use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

/// Equality used by [`Store::set`](crate::store::Store::set) to drop no-op
/// writes.
pub trait SafeEq {
    /// `true` when replacing `self` with `other` is not observable.
    fn safe_eq(&self, other: &Self) -> bool;
}

/// Implement [`SafeEq`] through `PartialEq` for plain value types.
///
/// ```
/// use tinform::safe_eq_by_value;
///
/// #[derive(Clone, PartialEq)]
/// enum Phase { Idle, Busy }
///
/// safe_eq_by_value!(Phase);
/// ```
#[macro_export]
macro_rules! safe_eq_by_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl $crate::store::SafeEq for $t {
                #[inline]
                fn safe_eq(&self, other: &Self) -> bool {
                    self == other
                }
            }
        )*
    };
}

safe_eq_by_value!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    String,
    &'static str,
);

impl SafeEq for f32 {
    fn safe_eq(&self, other: &Self) -> bool {
        if self.is_nan() {
            other.is_nan()
        } else {
            self == other
        }
    }
}

impl SafeEq for f64 {
    fn safe_eq(&self, other: &Self) -> bool {
        if self.is_nan() {
            other.is_nan()
        } else {
            self == other
        }
    }
}

impl<T: SafeEq> SafeEq for Option<T> {
    fn safe_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => true,
            (Some(a), Some(b)) => a.safe_eq(b),
            _ => false,
        }
    }
}

impl<T: ?Sized> SafeEq for Rc<T> {
    fn safe_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(self, other)
    }
}

impl<T: ?Sized> SafeEq for Arc<T> {
    fn safe_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T> SafeEq for Vec<T> {
    fn safe_eq(&self, _other: &Self) -> bool {
        false
    }
}

impl SafeEq for Value {
    fn safe_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn nan_equals_nan() {
        assert!(f64::NAN.safe_eq(&f64::NAN));
        assert!(!f64::NAN.safe_eq(&1.0));
        assert!(!1.0f64.safe_eq(&f64::NAN));
    }

    #[test]
    fn rc_uses_identity() {
        let a = Rc::new(vec![1, 2]);
        let b = Rc::new(vec![1, 2]);
        assert!(a.safe_eq(&Rc::clone(&a)));
        assert!(!a.safe_eq(&b));
    }

    #[test]
    fn json_compound_values_always_change() {
        assert!(json!("x").safe_eq(&json!("x")));
        assert!(json!(1).safe_eq(&json!(1)));
        assert!(!json!([1]).safe_eq(&json!([1])));
        assert!(!json!({ "a": 1 }).safe_eq(&json!({ "a": 1 })));
    }

    #[test]
    fn option_compares_inner() {
        assert!(None::<i32>.safe_eq(&None));
        assert!(Some(3).safe_eq(&Some(3)));
        assert!(!Some(3).safe_eq(&None));
    }
}

use std::rc::Rc;

use serde_json::Value;

use crate::field::truthy;
use crate::form::{ArrayErrors, FieldError, Validator};
use crate::guard::strict_equal;

/// Wrap an array validator so that a non-array error becomes an array-level
/// error under [`ARRAY_ERROR`](crate::form::ARRAY_ERROR).
///
/// A falsy result (`null`, `false`, `0`, `""`) means no error.
pub fn wrap_array_validator(validate: Option<Validator>) -> Option<Validator> {
    let validate = validate?;
    Some(Rc::new(move |value: Option<&Value>, all_values: &Value| {
        match validate(value, all_values)? {
            FieldError::Value(error) if !truthy(Some(&error)) => None,
            error if error.is_array() => Some(error),
            FieldError::Value(error) => Some(FieldError::Array(ArrayErrors::whole(error))),
            error => Some(error),
        }
    }))
}

/// Default equality for array values: same length and equal items.
pub fn array_is_equal(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Array(a)), Some(Value::Array(b))) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x == y),
        (Some(a), Some(b)) => strict_equal(a, b),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::ARRAY_ERROR;
    use serde_json::json;

    #[test]
    fn scalar_error_is_tagged() {
        let validate = wrap_array_validator(Some(Rc::new(|_: Option<&Value>, _: &Value| {
            Some(FieldError::from("required"))
        })))
        .unwrap();

        let Some(FieldError::Array(errors)) = validate(Some(&json!([])), &json!({})) else {
            panic!("expected an array error");
        };
        assert!(errors.items.is_empty());
        assert_eq!(errors.get(ARRAY_ERROR), Some(&json!("required")));
    }

    #[test]
    fn array_errors_pass_through() {
        let per_item = FieldError::Value(json!([null, "bad"]));
        let validate = wrap_array_validator(Some(Rc::new({
            let per_item = per_item.clone();
            move |_: Option<&Value>, _: &Value| Some(per_item.clone())
        })))
        .unwrap();
        assert_eq!(validate(None, &json!({})), Some(per_item));
    }

    #[test]
    fn falsy_results_mean_no_error() {
        for falsy in [json!(null), json!(false), json!(""), json!(0)] {
            let validate = wrap_array_validator(Some(Rc::new({
                let falsy = falsy.clone();
                move |_: Option<&Value>, _: &Value| Some(FieldError::Value(falsy.clone()))
            })))
            .unwrap();
            assert_eq!(validate(Some(&json!([])), &json!({})), None, "{falsy}");
        }
    }

    #[test]
    fn no_validator_stays_none() {
        assert!(wrap_array_validator(None).is_none());
    }

    #[test]
    fn element_wise_equality() {
        assert!(array_is_equal(Some(&json!([1, "a"])), Some(&json!([1, "a"]))));
        assert!(!array_is_equal(Some(&json!([1])), Some(&json!([1, 2]))));
        assert!(array_is_equal(None, None));
        assert!(!array_is_equal(Some(&json!([])), None));
    }
}

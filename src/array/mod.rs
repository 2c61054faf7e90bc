//! Array field bindings.
//!
//! [`use_field_array`] binds a field whose value is a list. Items are
//! addressed by computed names (`"todos[0]"`, `"todos[1]"`, ...) and are bound
//! with [`use_field`](crate::field::use_field) like any other field.

mod field_array;
mod mutators;
mod validation;

pub use field_array::{
    use_field_array, use_field_array_in_context, ArrayFields, ArrayMeta, FieldArrayConfig,
    FieldArrayStore, FieldArrayView,
};
pub use mutators::ArrayMutators;
pub use validation::{array_is_equal, wrap_array_validator};

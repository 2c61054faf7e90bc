//! Field bindings.
//!
//! [`use_field`] turns the engine's per-field notifications into a
//! [`FieldStore`]: an input view, stable event handlers, and meta, each
//! available as its own store.

mod config;
mod field;
mod input;

pub use config::{default_format, default_parse, FieldConfig, Formatter, IdResolver, Parser};
pub(crate) use field::reuse;
pub use field::{use_field, use_field_in_context, FieldHandlers, FieldStore, FieldView, InputView};
pub use input::{
    get_value, truthy, Change, ChangeEvent, ChangeTarget, EventTargetKind, InputKind, SelectOption,
};

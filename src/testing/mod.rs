//! An in-memory form engine for tests, benches and demos.

mod memory;
mod path;

pub use memory::MemoryForm;

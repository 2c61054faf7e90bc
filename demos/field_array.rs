//! Field array example: a todo list backed by the in-memory form

use serde_json::json;
use tinform::array::FieldArrayView;
use tinform::form::FormHandle;
use tinform::testing::MemoryForm;
use tinform::{use_field, use_field_array, FieldArrayConfig, FieldConfig};

fn print_todos(engine: &MemoryForm, view: &FieldArrayView) {
    println!("   {} item(s), valid = {}", view.fields.len(), view.meta.valid);
    view.fields.for_each(|name, index| {
        let text = engine.value(name).unwrap_or_default();
        println!("   [{}] {} = {}", index, name, text);
    });
}

fn main() -> tinform::Result<()> {
    println!("=== Field Array Example ===\n");

    let engine = MemoryForm::new(json!({ "todos": ["write docs"] }));
    let form: FormHandle = engine.clone();

    println!("1. Binding the `todos` array (it must not be empty)");
    let todos = use_field_array(
        &form,
        "todos",
        FieldArrayConfig::default().with_validate(|value, _| {
            let empty = value.and_then(|v| v.as_array()).map_or(true, Vec::is_empty);
            empty.then(|| "add at least one todo".into())
        }),
    )?;

    let _watch = todos.subscribe({
        let engine = engine.clone();
        move |view| {
            println!("   -> todos changed");
            print_todos(&engine, view);
        }
    });

    println!("\n2. Pushing two more todos");
    todos.mutators().push(json!("ship release"))?;
    todos.mutators().push(json!("celebrate"))?;

    println!("\n3. Binding the first item as a regular field and editing it");
    let first = use_field(&form, "todos[0]", FieldConfig::default());
    let _first_sub = first.subscribe(|view| {
        println!("   -> todos[0] input value = {:?}", view.input.value);
    });
    if let Some(view) = first.get() {
        view.handlers.change(json!("write better docs"));
    }

    println!("\n4. Swapping the last two todos");
    todos.mutators().swap(1, 2)?;

    println!("\n5. Removing every todo");
    todos.mutators().remove_batch(&[0, 1, 2])?;
    if let Some(view) = todos.get() {
        println!("   array error = {:?}", view.meta.error);
    }

    println!("\n✓ Example complete!");
    Ok(())
}

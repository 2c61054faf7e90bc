//! Checkbox group example: several checkboxes sharing one array value

use serde_json::json;
use tinform::field::{ChangeEvent, FieldStore};
use tinform::form::{FormHandle, FormStateConfig, FormSubscription};
use tinform::testing::MemoryForm;
use tinform::{derived, use_field, use_form_state, FieldConfig};

const TOPPINGS: [&str; 3] = ["cheese", "olives", "basil"];

fn print_boxes(boxes: &[FieldStore]) {
    for field in boxes {
        if let Some(view) = field.get() {
            let mark = if view.input.checked == Some(true) { "x" } else { " " };
            println!("   [{}] {:?}", mark, view.input.value);
        }
    }
}

fn toggle(field: &FieldStore) {
    if let Some(view) = field.get() {
        let checked = view.input.checked != Some(true);
        view.handlers.change(ChangeEvent::checkbox(checked, view.input.value.clone()));
    }
}

fn main() {
    println!("=== Checkbox Group Example ===\n");

    let engine = MemoryForm::new(json!({ "toppings": ["cheese"] }));
    let form: FormHandle = engine.clone();

    println!("1. Binding one checkbox per topping");
    let boxes: Vec<FieldStore> = TOPPINGS
        .iter()
        .map(|topping| {
            use_field(
                &form,
                "toppings",
                FieldConfig::default().with_type("checkbox").with_value(json!(topping)),
            )
        })
        .collect();
    let _subs: Vec<_> = boxes.iter().map(|field| field.subscribe(|_| {})).collect();
    print_boxes(&boxes);

    println!("\n2. Watching the form values");
    let form_state = use_form_state(
        &form,
        FormStateConfig::default().with_subscription(FormSubscription::VALUES),
    );
    let toppings = derived(&form_state, |state| state.values["toppings"].to_string());
    let _watch = toppings.subscribe(|toppings| {
        println!("   -> toppings = {}", toppings);
    });

    println!("\n3. Checking olives and basil");
    toggle(&boxes[1]);
    toggle(&boxes[2]);
    print_boxes(&boxes);

    println!("\n4. Unchecking cheese");
    toggle(&boxes[0]);
    print_boxes(&boxes);

    println!("\nFinal value: {}", engine.values());
    println!("\n✓ Example complete!");
}

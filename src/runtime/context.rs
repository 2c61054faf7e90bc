use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::form::FormHandle;

// Thread-local stack of provided forms; the innermost provider wins.
thread_local! {
    static FORM_STACK: RefCell<Vec<FormHandle>> = RefCell::new(vec![]);
}

/// Scoped form context.
///
/// Field and array constructors take the form handle explicitly. This context
/// exists for call sites that cannot thread the handle through, typically
/// deeply nested view code that only knows a field name.
///
/// # Examples
///
/// ```
/// use std::rc::Rc;
/// use serde_json::json;
/// use tinform::form::FormHandle;
/// use tinform::runtime::FormContext;
/// use tinform::testing::MemoryForm;
///
/// let form: FormHandle = MemoryForm::new(json!({ "name": "Ada" }));
/// FormContext::provide(Rc::clone(&form), || {
///     assert!(FormContext::current().is_ok());
/// });
/// assert!(FormContext::current().is_err());
/// ```
pub struct FormContext;

impl FormContext {
    /// Run a function with `form` as the current form.
    ///
    /// The form is popped again when the function returns or panics.
    pub fn provide<F, R>(form: FormHandle, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        FORM_STACK.with(|stack| {
            stack.borrow_mut().push(form);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        FORM_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// The innermost provided form.
    pub fn current() -> Result<FormHandle> {
        FORM_STACK.with(|stack| stack.borrow().last().map(Rc::clone).ok_or(Error::NoFormContext))
    }

    /// Number of nested providers on this thread.
    pub fn depth() -> usize {
        FORM_STACK.with(|stack| stack.borrow().len())
    }
}

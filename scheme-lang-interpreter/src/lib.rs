pub mod builtins;
pub mod evaluator;

use std::thread;

use scheme_lang_core::environment::Environment;
use scheme_lang_core::object::{Object, FALSE, TRUE};

/// Native stack given to a thread that evaluates programs. Non-tail calls
/// recurse on it, and so does the collector while marking a long list.
pub const EVALUATION_STACK_SIZE: usize = 256 * 1024 * 1024;

/// A fresh top-level frame holding the boolean constants and every builtin.
pub fn global_environment() -> Environment {
    let environment = Environment::new();
    environment.define(TRUE.into(), Object::boolean(true));
    environment.define(FALSE.into(), Object::boolean(false));
    environment.define_primitives(builtins::primitives());
    environment
}

/// Runs `f` to completion on a thread with `EVALUATION_STACK_SIZE` of stack.
/// Values and environments are thread-local, so `f` has to build its own. A
/// panic inside `f` is resumed on the calling thread.
pub fn run_with_large_stack<F, T>(f: F) -> std::io::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    let handle = thread::Builder::new()
        .name("evaluator".into())
        .stack_size(EVALUATION_STACK_SIZE)
        .spawn(f)?;
    Ok(handle
        .join()
        .unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
}

use scheme_lang_core::environment::Environment;
use scheme_lang_core::object::{EvaluationError, Object};
use scheme_lang_interpreter::evaluator;

/// Keeps one top-level environment alive across REPL entries.
pub struct Evaluator {
    environment: Environment,
}

impl Evaluator {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    pub fn evaluate(&mut self, expression: &Object) -> Result<Object, EvaluationError> {
        evaluator::eval(expression, &self.environment)
    }
}

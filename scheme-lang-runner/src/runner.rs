use std::path::Path;
use thiserror::Error;

use scheme_lang_core::environment::Environment;
use scheme_lang_core::object::EvaluationError;
use scheme_lang_core::reader::{ReadError, Reader};
use scheme_lang_interpreter::evaluator;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("syntax error: {0}")]
    Read(#[from] ReadError),
}

pub fn execute_file(path: &Path, environment: &Environment) -> Result<(), RunError> {
    let source = std::fs::read_to_string(path)?;
    execute(&source, environment, |error| {
        eprintln!("Error evaluating:\n{}", error)
    })
}

/// Evaluates `source` one expression at a time. Evaluation errors go to
/// `report` and the next expression runs; a syntax error ends the run.
pub fn execute(
    source: &str,
    environment: &Environment,
    mut report: impl FnMut(&EvaluationError),
) -> Result<(), RunError> {
    for expression in Reader::new(source.chars()) {
        let expression = expression?;
        if let Err(error) = evaluator::eval(&expression, environment) {
            report(&error);
        }
    }
    Ok(())
}

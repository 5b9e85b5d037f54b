use scheme_lang_core::object::{EvaluationError, Object};

pub struct Printer {}

impl Printer {
    pub fn print(&mut self, object: Result<Object, EvaluationError>) {
        match object {
            Ok(obj) => println!("{}", obj),
            Err(err) => println!("Error evaluating:\n{}", err),
        }
    }
}

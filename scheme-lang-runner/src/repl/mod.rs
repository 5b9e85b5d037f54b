mod evaluator;
mod printer;
mod reader;

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use scheme_lang_core::environment::Environment;

use evaluator::Evaluator;
use printer::Printer;
use reader::{ReadOutput, Reader};

struct Repl {
    reader: Reader,
    evaluator: Evaluator,
    printer: Printer,
}

impl Repl {
    fn run(mut self) {
        loop {
            match self.reader.read() {
                ReadOutput::Exit => break,
                ReadOutput::Clear => continue,
                ReadOutput::Value(expressions) => {
                    for expression in expressions {
                        let result = self.evaluator.evaluate(&expression);
                        self.printer.print(result);
                    }
                }
            }
        }
    }
}

pub fn start(environment: Environment) -> Result<(), ReadlineError> {
    let rl = DefaultEditor::new()?;

    Repl {
        reader: Reader::new(rl),
        evaluator: Evaluator::new(environment),
        printer: Printer {},
    }
    .run();
    Ok(())
}

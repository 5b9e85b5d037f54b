use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::Editor;

use scheme_lang_core::object::Object;
use scheme_lang_core::reader::{read_all, ReadError};

const PROMPT: &str = "> ";
const CONTINUATION_PROMPT: &str = ". ";

pub enum ReadOutput {
    Exit,
    Clear,
    Value(Vec<Object>),
}

/// What a buffered entry amounts to so far.
#[derive(Debug, PartialEq)]
enum Entry {
    Complete(Vec<Object>),
    Incomplete,
    Invalid(ReadError),
}

fn parse_entry(buffer: &str) -> Entry {
    match read_all(buffer) {
        Ok(expressions) => Entry::Complete(expressions),
        Err(error) if error.is_incomplete() => Entry::Incomplete,
        Err(error) => Entry::Invalid(error),
    }
}

pub struct Reader {
    rl: Editor<(), DefaultHistory>,
}

impl Reader {
    pub fn new(rl: Editor<(), DefaultHistory>) -> Self {
        Self { rl }
    }

    /// Keeps prompting until the lines typed so far hold only complete
    /// expressions.
    pub fn read(&mut self) -> ReadOutput {
        let mut buffer = String::new();
        loop {
            let prompt = if buffer.is_empty() {
                PROMPT
            } else {
                CONTINUATION_PROMPT
            };

            let line = match self.rl.readline(prompt) {
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    return ReadOutput::Clear;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    return ReadOutput::Exit;
                }
                Err(err) => {
                    println!("Error: {:?}", err);
                    return ReadOutput::Exit;
                }
                Ok(line) => line,
            };

            if let Err(error) = self.rl.add_history_entry(&line) {
                tracing::warn!(%error, "could not record history entry");
            }
            buffer.push_str(&line);
            buffer.push('\n');

            match parse_entry(&buffer) {
                Entry::Incomplete => continue,
                Entry::Complete(expressions) if expressions.is_empty() => {
                    return ReadOutput::Clear
                }
                Entry::Complete(expressions) => return ReadOutput::Value(expressions),
                Entry::Invalid(error) => {
                    println!("Parsing error: {}", error);
                    return ReadOutput::Clear;
                }
            }
        }
    }
}

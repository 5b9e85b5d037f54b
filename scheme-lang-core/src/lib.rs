pub mod environment;
pub mod lexer;
pub mod object;
pub mod reader;

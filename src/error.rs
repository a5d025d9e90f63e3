use thiserror::Error;

use crate::value::Value;

/// The crate's unified error type. `Return` is not a user-visible error; it
/// rides the same `Result` plumbing as a control-flow signal so it can use
/// `?` through `execute`/`evaluate`, and is always intercepted inside
/// `Callable::call` before it could reach a driver.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("[line {line}] Error{at}: {message}")]
    Lex {
        line: usize,
        at: String,
        message: String,
    },

    #[error("[line {line}] Error{at}: {message}")]
    Parse {
        line: usize,
        at: String,
        message: String,
    },

    #[error("[line {line}] Error{at}: {message}")]
    Resolve {
        line: usize,
        at: String,
        message: String,
    },

    #[error("{message}\n[line {line}]")]
    Runtime { line: usize, message: String },

    #[error("non-local return")]
    Return { value: Value },

    #[error("io error: {0}")]
    Io(String),
}

impl Error {
    pub fn lex(line: usize, message: impl Into<String>) -> Self {
        Error::Lex {
            line,
            at: String::new(),
            message: message.into(),
        }
    }

    pub fn parse_at_end(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            at: " at end".to_string(),
            message: message.into(),
        }
    }

    pub fn parse_at(line: usize, lexeme: &str, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            at: format!(" at '{lexeme}'"),
            message: message.into(),
        }
    }

    pub fn resolve(line: usize, lexeme: &str, message: impl Into<String>) -> Self {
        Error::Resolve {
            line,
            at: format!(" at '{lexeme}'"),
            message: message.into(),
        }
    }

    pub fn runtime(line: usize, message: impl Into<String>) -> Self {
        Error::Runtime {
            line,
            message: message.into(),
        }
    }
}

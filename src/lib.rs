pub mod class;
pub mod environment;
pub mod error;
pub mod function;
pub mod interpreter;
pub mod number;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod syntax;
pub mod token;
pub mod value;

use error::Error;
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

/// Lexes, parses, resolves, and (if no static error occurred) evaluates
/// `source` against `interpreter`. The interpreter's own expression-id
/// counter is reused across calls so that closures created by one call
/// (e.g. one REPL line) remain resolvable when invoked from a later call.
pub fn run(source: &str, interpreter: &mut Interpreter) -> Result<(), Error> {
    let tokens = Scanner::new(source).scan_tokens()?;

    let mut next_id = interpreter.next_expr_id();
    let statements = Parser::new(tokens, &mut next_id).parse();
    interpreter.set_next_expr_id(next_id);
    let statements = statements?;

    let locals = Resolver::new().resolve(&statements)?;
    interpreter.load_resolution(locals);

    log::debug!("executing {} top-level statements", statements.len());
    interpreter.interpret(&statements)
}

use std::fs;
use std::process::ExitCode;

use clap::Parser as ClapParser;
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};

use treewalk_lang::error::Error;
use treewalk_lang::interpreter::Interpreter;

#[derive(ClapParser, Debug)]
#[command(name = "treewalk", about = "A tree-walking interpreter")]
struct CliArgs {
    /// Script to run; omit to start an interactive REPL
    script: Option<String>,

    /// Path to the REPL history file
    #[arg(long, default_value = ".treewalk_history")]
    history: String,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = CliArgs::parse();

    let mut interpreter = Interpreter::new();

    match &args.script {
        Some(path) => run_file(path, &mut interpreter),
        None => run_prompt(&args.history, &mut interpreter),
    }
}

fn run_file(path: &str, interpreter: &mut Interpreter) -> ExitCode {
    let source = match fs::read_to_string(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read '{path}': {err}");
            return ExitCode::from(74);
        }
    };

    match treewalk_lang::run(&source, interpreter) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => exit_code_for(&err),
    }
}

fn run_prompt(history_path: &str, interpreter: &mut Interpreter) -> ExitCode {
    let config = Config::builder().auto_add_history(true).build();
    let mut editor: Editor<(), rustyline::history::DefaultHistory> =
        Editor::with_config(config).expect("failed to initialize line editor");
    let _ = editor.load_history(history_path);

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if let Err(err) = treewalk_lang::run(&line, interpreter) {
                    eprintln!("{err}");
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Readline error: {err}");
                break;
            }
        }
    }

    let _ = editor.save_history(history_path);
    ExitCode::SUCCESS
}

fn exit_code_for(err: &Error) -> ExitCode {
    match err {
        Error::Lex { .. } | Error::Parse { .. } => ExitCode::from(65),
        Error::Resolve { .. } => {
            eprintln!("{err}");
            ExitCode::from(65)
        }
        Error::Runtime { .. } => {
            eprintln!("{err}");
            ExitCode::from(70)
        }
        Error::Return { .. } => unreachable!("a non-local return never escapes a call"),
        Error::Io(message) => {
            eprintln!("{message}");
            ExitCode::from(74)
        }
    }
}

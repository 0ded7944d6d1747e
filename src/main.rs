use rusty_scheme::env::Env;
use rusty_scheme::error::SchemeError;
use rusty_scheme::parser::{self, Reader};
use rusty_scheme::printer;
use rusty_scheme::value::Value;
use rusty_scheme::{builtins, eval};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::env as std_env;
use std::fs;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std_env::args().skip(1).collect();
    let global = builtins::global_env();

    match args.first() {
        None => {
            repl(global);
            ExitCode::SUCCESS
        }
        Some(path) => {
            let enter_repl_after = args.get(1).map(|s| s.as_str()) == Some("-");
            match load_file(path, global.clone()) {
                Ok(()) => {
                    if enter_repl_after {
                        repl(global);
                    }
                    ExitCode::SUCCESS
                }
                Err(err) => {
                    eprintln!("{}", err);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Loads `path`, reads every top-level expression and evaluates each in
/// `env` in turn (spec §6: "load the file ... and exit 0"). The first
/// error aborts the load.
fn load_file(path: &str, env: Env) -> Result<(), SchemeError> {
    let source = fs::read_to_string(path)
        .map_err(|err| SchemeError::ReadError(format!("{}: {}", path, err)))?;
    for expr in parser::parse_all(&source)? {
        eval::eval(expr, env.clone())?;
    }
    Ok(())
}

/// The interactive loop: `"> "` for a fresh expression, `"| "` while a
/// multi-line expression is incomplete, `Goodbye` on end-of-input (spec
/// §6). Errors are printed and the loop resumes at a fresh prompt, first
/// discarding whatever half-read tokens triggered them (spec §7).
fn repl(env: Env) {
    let mut rl = DefaultEditor::new().expect("failed to initialize the line editor");
    let mut reader = Reader::new();

    loop {
        let prompt = if reader.is_empty() { "> " } else { "| " };
        match rl.readline(prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str()).ok();
                if let Err(err) = feed_and_run(&mut reader, &line, &env) {
                    eprintln!("{}", err);
                    reader.clear();
                }
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye");
                return;
            }
            Err(ReadlineError::Interrupted) => {
                reader.clear();
                continue;
            }
            Err(err) => {
                eprintln!("{}", err);
                return;
            }
        }
    }
}

fn feed_and_run(reader: &mut Reader, line: &str, env: &Env) -> Result<(), SchemeError> {
    reader.feed_line(line)?;
    while let Some(expr) = reader.try_parse()? {
        let value = eval::eval(expr, env.clone())?;
        // Void carries no meaningful result (spec §6/§8 scenario 5: a
        // side-effecting form like (display ...) or (newline) is not echoed).
        if !matches!(value, Value::Void) {
            println!("{}", printer::write_string(&value));
        }
    }
    Ok(())
}

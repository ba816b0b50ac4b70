use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use clap::Parser as ArgParser;

use pankti::evaluator::{self, EvalContext, FsLoader};
use pankti::lexer::Lexer;
use pankti::object::builtins::BuiltinRegistry;
use pankti::parser::Parser;
use pankti::repl;

/// Interpreter for the pankti scripting language.
#[derive(ArgParser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Script to run; starts the REPL when omitted.
    script: Option<PathBuf>,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    match args.script {
        Some(path) => run_file(&path),
        None => repl::run(),
    }
}

fn run_file(path: &Path) {
    let source = fs::read_to_string(path).unwrap_or_else(|err| {
        eprintln!("Failed to read {}: {}", path.display(), err);
        process::exit(1);
    });

    let lexer = Lexer::new(&source);
    let mut parser = Parser::new(lexer);
    let program = parser.parse_program();

    if !parser.errors().is_empty() {
        for error in parser.errors() {
            eprintln!("{}", error);
        }
        process::exit(1);
    }

    let builtins = BuiltinRegistry::standard();
    let ctx = EvalContext::new(&source, &FsLoader, &builtins);
    let env = evaluator::new_env();
    let mut out = String::new();

    let result = evaluator::eval(&program, &env, &ctx, &mut out);
    print!("{}", out);

    if let Err(err) = result {
        eprintln!("{}", err);
        process::exit(1);
    }
}

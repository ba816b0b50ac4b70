use std::io;
use std::io::BufRead;
use std::io::Write;

use crate::evaluator::{self, EvalContext, FsLoader};
use crate::lexer::Lexer;
use crate::object::builtins::BuiltinRegistry;
use crate::parser::Parser;

/// Line-at-a-time loop. Bindings and builtins persist across lines; every
/// line's `dekhao` output is flushed before the result object is echoed.
pub fn run() {
    let stdin = io::stdin();
    let builtins = BuiltinRegistry::standard();
    let env = evaluator::new_env();

    loop {
        print!(">> ");
        io::stdout().flush().expect("Error flushing stdout");

        let mut line = String::new();
        let read = stdin
            .lock()
            .read_line(&mut line)
            .expect("Error reading from stdin");
        if read == 0 {
            return;
        }

        let lexer = Lexer::new(&line);

        let mut parser = Parser::new(lexer);

        let program = parser.parse_program();

        if !parser.errors().is_empty() {
            print_parser_errors(&parser);
            continue;
        }

        let ctx = EvalContext::new(&line, &FsLoader, &builtins);
        let mut out = String::new();

        match evaluator::eval(&program, &env, &ctx, &mut out) {
            Ok(evaluated) => {
                print!("{}", out);
                println!("{}", evaluated);
            }
            Err(err) => {
                print!("{}", out);
                println!("ERROR: {}", err);
            }
        }
    }
}

fn print_parser_errors(parser: &Parser) {
    println!("Woops! The parser hit a snag:");
    for error in parser.errors() {
        println!("\t{}", error);
    }
}

//! `long-interp prog.long` — runs a Long program directly with the
//! tree-walking interpreter.

use std::env;
use std::fs;

use longtool::interp::{self, Environment};
use longtool::lexer::tokenize;
use longtool::loader;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: long-interp <file.long>");
        std::process::exit(1);
    }

    let source = fs::read_to_string(&args[1]).unwrap_or_else(|err| {
        eprintln!("Failed to read '{}': {err}", args[1]);
        std::process::exit(1);
    });

    let lines = tokenize(&source).lines;
    let program = loader::load(lines).unwrap_or_else(|err| {
        eprintln!("{err}");
        std::process::exit(1);
    });

    let mut env = Environment::new().unwrap_or_else(|err| {
        eprintln!("{err}");
        std::process::exit(1);
    });

    if let Err(err) = interp::run(&program, &mut env) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

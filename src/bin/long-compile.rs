//! `long-compile prog.long [out.{bin,img}]` — lowers a Long program to
//! bytecode and links it into a bootable floppy image. Default output is
//! `build/boot.img`; a real-mode bootloader assembled by an external `nasm`.

use std::env;
use std::fs;

use longtool::compiler;
use longtool::config;
use longtool::emitter::{self, assembler::Nasm};
use longtool::lexer::tokenize;
use longtool::loader;

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 && args.len() != 3 {
        eprintln!("Usage: long-compile <file.long> [out.{{bin,img}}]");
        std::process::exit(1);
    }

    let source = fs::read_to_string(&args[1]).unwrap_or_else(|err| {
        eprintln!("Failed to read '{}': {err}", args[1]);
        std::process::exit(1);
    });

    let output_path = args
        .get(2)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(config::default_boot_image_path);

    let lines = tokenize(&source).lines;
    let program = loader::load(lines).unwrap_or_else(|err| {
        eprintln!("{err}");
        std::process::exit(1);
    });

    let compiled = compiler::compile(&program).unwrap_or_else(|err| {
        eprintln!("{err}");
        std::process::exit(1);
    });

    let build_dir = config::build_dir();
    if let Err(err) = emitter::build_boot_image(&compiled, &Nasm, &build_dir, &output_path) {
        eprintln!("{err}");
        eprintln!("note: long-compile shells out to `nasm`; make sure it is installed and on PATH");
        std::process::exit(1);
    }

    println!("wrote {}", output_path.display());
}

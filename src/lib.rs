//! # Long toolchain
//!
//! Lexes and loads the Long scripting language, then either walks it
//! directly (the interpreter) or lowers it to a dense bytecode image and
//! wraps it in a two-stage real-mode bootloader (the compiler).
//!
//! ## Pipeline
//!
//! 1. **Lexer** - strips comments/no-ops, produces raw statement lines
//! 2. **Loader** - fences function bodies, indexes labels
//! 3. **Interpreter Runtime** *or* **Bytecode Compiler** - run the program
//!    directly, or lower it to `Op`s, a string pool and a variable table
//! 4. **Assembly Emitter & Linker** (compile path only) - renders the
//!    opcode stream as NASM text and links a bootable floppy image
//!
//! ## Example
//!
//! ```rust,no_run
//! use longtool::{lexer::tokenize, loader, interp};
//!
//! let source = std::fs::read_to_string("program.long").unwrap();
//! let lines = tokenize(&source).lines;
//! let program = loader::load(lines).unwrap();
//! let mut env = interp::Environment::new().unwrap();
//! interp::run(&program, &mut env).unwrap();
//! ```

pub mod compiler;
pub mod config;
pub mod emitter;
pub mod error;
pub mod fsstore;
pub mod interp;
pub mod lexer;
pub mod loader;
pub mod opcode;
pub mod stmt;
pub mod value;

//! Crate-wide error type.
//!
//! Mirrors the error-kind taxonomy of the Long toolchain: lexical, load,
//! parse, runtime, IO, FS-store, and compile errors. Every variant prints in
//! the `[ERROR] ...` / `ERROR (line L:C): ...` wire format the CLI binaries
//! rely on; callers that have a `Span` attach one, callers that don't (most
//! runtime/FS errors are inherently positionless) omit it.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub col: usize,
}

impl Span {
    pub const fn at(line: usize, col: usize) -> Self {
        Self {
            start: 0,
            end: 0,
            line,
            col,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum LongError {
    #[error("ERROR (line {span}): {message}")]
    Lex { message: String, span: Span },

    #[error("ERROR (line {span}): {message}")]
    Load { message: String, span: Span },

    #[error("ERROR (line {span}): {message}")]
    Parse { message: String, span: Span },

    #[error("[ERROR] {message}")]
    Runtime { message: String },

    #[error("[ERROR] {message}")]
    Io { message: String },

    #[error("[ERROR] {message}")]
    Fs { message: String },

    #[error("ERROR (line {span}): {message}")]
    Compile { message: String, span: Span },
}

impl LongError {
    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        LongError::Lex {
            message: message.into(),
            span,
        }
    }

    pub fn load(message: impl Into<String>, span: Span) -> Self {
        LongError::Load {
            message: message.into(),
            span,
        }
    }

    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        LongError::Parse {
            message: message.into(),
            span,
        }
    }

    pub fn runtime(message: impl Into<String>) -> Self {
        LongError::Runtime {
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        LongError::Io {
            message: message.into(),
        }
    }

    pub fn fs(message: impl Into<String>) -> Self {
        LongError::Fs {
            message: message.into(),
        }
    }

    pub fn compile(message: impl Into<String>, span: Span) -> Self {
        LongError::Compile {
            message: message.into(),
            span,
        }
    }

    /// True for error classes the compiler treats as fatal to the build
    /// (everything except a recoverable IO hiccup).
    pub fn is_fatal_to_compile(&self) -> bool {
        !matches!(self, LongError::Io { .. })
    }
}

impl From<std::io::Error> for LongError {
    fn from(err: std::io::Error) -> Self {
        LongError::io(err.to_string())
    }
}

impl From<serde_json::Error> for LongError {
    fn from(err: serde_json::Error) -> Self {
        LongError::fs(format!("FS state (de)serialization failed: {err}"))
    }
}

//! Per-line statement splitter.
//!
//! Strips quote-aware inline comments (`//`, `#`), drops empty lines and
//! `//`-prefixed lines, and drops bare structural no-op keywords
//! (`[16BIT]`, `startprogram`, `endprogram`, `startsection`, `endsection`).
//! What remains is handed to the loader as an ordered sequence of
//! `RawLine`s, each still raw statement text — lexing does not build an AST;
//! that happens per-statement in `crate::stmt`, where the interpreter and
//! compiler each decide how (or whether) to handle a given statement.

#[cfg(test)]
mod tests;

/// A single surviving source line after comment-stripping and no-op removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLine {
    pub text: String,
    pub line_number: usize,
}

pub struct LexResult {
    pub lines: Vec<RawLine>,
}

const STRUCTURAL_NOOPS: &[&str] = &[
    "[16BIT]",
    "startprogram",
    "endprogram",
    "startsection",
    "endsection",
];

#[must_use]
pub fn tokenize(source: &str) -> LexResult {
    let mut lines = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line_number = idx + 1;
        let trimmed = raw.trim_end();
        let stripped = strip_inline_comment(trimmed).trim();
        if stripped.is_empty() || stripped.starts_with("//") {
            continue;
        }
        let without_spaces: String = stripped.chars().filter(|c| !c.is_whitespace()).collect();
        if STRUCTURAL_NOOPS.contains(&without_spaces.as_str()) {
            continue;
        }
        lines.push(RawLine {
            text: stripped.to_string(),
            line_number,
        });
    }
    LexResult { lines }
}

/// Scan `line` tracking single/double quote state; the first `//` or `#`
/// seen outside any quoted span ends the line. Inside quotes, both markers
/// are ordinary characters.
#[must_use]
pub fn strip_inline_comment(line: &str) -> &str {
    let bytes = line.as_bytes();
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if ch == b'"' && !in_single {
            in_double = !in_double;
            i += 1;
            continue;
        }
        if ch == b'\'' && !in_double {
            in_single = !in_single;
            i += 1;
            continue;
        }
        if !in_single && !in_double {
            if ch == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'/' {
                return line[..i].trim_end();
            }
            if ch == b'#' {
                return line[..i].trim_end();
            }
        }
        i += 1;
    }
    line.trim_end()
}

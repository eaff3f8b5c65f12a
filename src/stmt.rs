//! Shared statement-shape parsing helpers.
//!
//! Long statements are recognized by textual prefix, not parsed into one
//! shared AST: the interpreter and the compiler each decide, line by line,
//! whether and how to handle a given shape — the compiler rejects several
//! shapes (`ReadFile`, `Every[MS]`, FS/Block ops, ...) the interpreter
//! accepts. What *is* shared is the low-level bracket/paren/quote slicing
//! every statement shape is built from; this module is that shared slicing
//! layer, implemented as manual string slicing rather than a regex
//! dependency.

/// If `line` starts with `prefix` immediately followed by `[`, return the
/// bracket contents and whatever follows the matching `]`.
pub fn split_bracket<'a>(line: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    leading_bracket(line.strip_prefix(prefix)?)
}

/// Like `split_bracket` but assumes the `[` is already at the front of `s`.
pub fn leading_bracket(s: &str) -> Option<(&str, &str)> {
    let s = s.strip_prefix('[')?;
    let close = s.find(']')?;
    Some((&s[..close], &s[close + 1..]))
}

/// If `line` starts with `prefix` immediately followed by `(`, return the
/// paren contents and whatever follows the matching `)`.
pub fn split_paren<'a>(line: &'a str, prefix: &str) -> Option<(&'a str, &'a str)> {
    let s = line.strip_prefix(prefix)?.strip_prefix('(')?;
    let close = s.find(')')?;
    Some((&s[..close], &s[close + 1..]))
}

/// Strip a leading `=` (with surrounding whitespace) from `rest`.
pub fn strip_eq(rest: &str) -> Option<&str> {
    rest.trim_start().strip_prefix('=').map(|s| s.trim_start())
}

/// `Set[VAR]=RHS` → `(VAR, RHS)`, RHS untrimmed of internal content but with
/// surrounding whitespace removed.
pub fn match_set(line: &str) -> Option<(&str, &str)> {
    let (var, rest) = split_bracket(line, "Set")?;
    let rhs = strip_eq(rest)?;
    Some((var, rhs.trim_end()))
}

/// `If[VAR] OP RHS` → `(VAR, OP, RHS)`. `OP` is matched longest-first so
/// `>=`/`<=` aren't mis-split as `>`/`<` followed by a stray `=`.
pub fn match_if(line: &str) -> Option<(&str, &str, &str)> {
    let (var, rest) = split_bracket(line, "If")?;
    let rest = rest.trim_start();
    for op in [">=", "<=", "=", ">", "<"] {
        if let Some(rhs) = rest.strip_prefix(op) {
            return Some((var, op, rhs.trim_start()));
        }
    }
    None
}

/// `DisplayText(TAG)="text"` / `DisplayTextRaw(TAG)="text"` →
/// `(raw, tag, text)`. The quoted content must run to the end of the line
/// using one matching quote character.
pub fn match_display(line: &str) -> Option<(bool, &str, &str)> {
    if let Some((tag, rest)) = split_paren(line, "DisplayTextRaw") {
        let rest = strip_eq(rest)?;
        let text = strip_full_quotes(rest)?;
        return Some((true, tag, text));
    }
    if let Some((tag, rest)) = split_paren(line, "DisplayText") {
        let rest = strip_eq(rest)?;
        let text = strip_full_quotes(rest)?;
        return Some((false, tag, text));
    }
    None
}

/// Require `s` to be exactly a quoted string (matching quote characters,
/// nothing after the closing quote).
pub fn strip_full_quotes(s: &str) -> Option<&str> {
    let s = s.trim_end();
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let q = bytes[0];
        if (q == b'"' || q == b'\'') && bytes[bytes.len() - 1] == q {
            return Some(&s[1..s.len() - 1]);
        }
    }
    None
}

/// `CallFunction[NAME]` with an optional `-> CAPTURE`.
pub fn match_call_function(line: &str) -> Option<(&str, Option<&str>)> {
    let (name, rest) = split_bracket(line, "CallFunction")?;
    let rest = rest.trim();
    if rest.is_empty() {
        return Some((name, None));
    }
    let capture = rest.strip_prefix("->")?.trim();
    Some((name, Some(capture)))
}

/// `SetColor[FG|BG]=NAME` → `(which, name)`.
pub fn match_set_color(line: &str) -> Option<(&str, &str)> {
    let (which, rest) = split_bracket(line, "SetColor")?;
    let name = strip_eq(rest)?;
    Some((which, name.trim()))
}

/// `DrawBox[w,h]=ch`.
pub fn match_draw_box(line: &str) -> Option<(&str, &str, &str)> {
    let (dims, rest) = split_bracket(line, "DrawBox")?;
    let (w, h) = dims.split_once(',')?;
    let ch = strip_eq(rest)?;
    Some((w.trim(), h.trim(), ch.trim()))
}

/// `SetCursor[r,c]`.
pub fn match_set_cursor(line: &str) -> Option<(&str, &str)> {
    let (dims, _rest) = split_bracket(line, "SetCursor")?;
    dims.split_once(',').map(|(r, c)| (r.trim(), c.trim()))
}

/// `FillLines[n]`.
pub fn match_fill_lines(line: &str) -> Option<&str> {
    split_bracket(line, "FillLines").map(|(n, _)| n.trim())
}

/// `TickTimer[n]`.
pub fn match_tick_timer(line: &str) -> Option<&str> {
    split_bracket(line, "TickTimer").map(|(n, _)| n.trim())
}

/// `Time[SEC]=n` / `Time[MIN]=n` → `(unit, n)`.
pub fn match_time(line: &str) -> Option<(&str, &str)> {
    let (unit, rest) = split_bracket(line, "Time")?;
    let n = strip_eq(rest)?;
    Some((unit, n.trim()))
}

/// `Every[MS]=n`.
pub fn match_every_ms(line: &str) -> Option<&str> {
    let (unit, rest) = split_bracket(line, "Every")?;
    if unit != "MS" {
        return None;
    }
    strip_eq(rest).map(|n| n.trim())
}

/// `Goto[LABEL]`.
pub fn match_goto(line: &str) -> Option<&str> {
    split_bracket(line, "Goto").map(|(l, _)| l)
}

/// `Return[expr]`.
pub fn match_return(line: &str) -> Option<&str> {
    split_bracket(line, "Return").map(|(e, _)| e.trim())
}

/// `StartFunction[NAME]`.
pub fn match_start_function(line: &str) -> Option<&str> {
    split_bracket(line, "StartFunction").map(|(n, _)| n)
}

/// `Label[NAME]` or legacy `Label:NAME`.
pub fn match_label(line: &str) -> Option<(&str, bool)> {
    if let Some((name, _)) = split_bracket(line, "Label") {
        return Some((name, false));
    }
    line.strip_prefix("Label:").map(|name| (name, true))
}

/// `TrackInput[KEYBOARD]` with an optional `=INSTANT`/`=NOBLOCK` mode.
pub fn match_track_input(line: &str) -> Option<Option<&str>> {
    let (kind, rest) = split_bracket(line, "TrackInput")?;
    if kind != "KEYBOARD" {
        return None;
    }
    let rest = rest.trim();
    if rest.is_empty() {
        return Some(None);
    }
    strip_eq(rest).map(Some)
}

/// `WriteFile[path]=content` / `AppendFile[path]=content`.
pub fn match_file_write(line: &str, prefix: &str) -> Option<(&str, &str)> {
    let (path, rest) = split_bracket(line, prefix)?;
    let content = strip_eq(rest)?;
    Some((path, content))
}

/// `ReadFile["path"]` appearing as a bare expression (e.g. inside `Set[V]=`).
pub fn match_read_file(expr: &str) -> Option<&str> {
    split_bracket(expr, "ReadFile").map(|(p, _)| p)
}

/// `FS[Sub][...]`-shaped statements → `(sub, bracket_contents, rest)`.
pub fn match_fs(line: &str) -> Option<(&str, &str, &str)> {
    let (sub, rest) = split_bracket(line, "FS")?;
    if rest.starts_with('[') {
        let (arg, rest2) = leading_bracket(rest)?;
        Some((sub, arg, rest2))
    } else if rest.starts_with('(') {
        // FS[List](path) legacy paren form
        let close = rest.find(')')?;
        Some((sub, &rest[1..close], &rest[close + 1..]))
    } else {
        Some((sub, "", rest))
    }
}

/// `Block[Sub]` / `Block[Sub][id]`-shaped statements.
pub fn match_block(line: &str) -> Option<(&str, &str, &str)> {
    let (sub, rest) = split_bracket(line, "Block")?;
    if rest.starts_with('[') {
        let (arg, rest2) = leading_bracket(rest)?;
        Some((sub, arg, rest2))
    } else {
        Some((sub, "", rest))
    }
}

pub fn is_halt(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case("halt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_splits_var_and_rhs() {
        assert_eq!(match_set("Set[X]=\"Hi\""), Some(("X", "\"Hi\"")));
    }

    #[test]
    fn if_matches_ordering_operators_longest_first() {
        assert_eq!(match_if("If[X]>=5"), Some(("X", ">=", "5")));
        assert_eq!(match_if("If[X]<5"), Some(("X", "<", "5")));
        assert_eq!(match_if("If[X]=\"y\""), Some(("X", "=", "\"y\"")));
    }

    #[test]
    fn display_text_requires_full_quoted_match() {
        assert_eq!(
            match_display("DisplayText(SHELL)=\"hi\""),
            Some((false, "SHELL", "hi"))
        );
        assert_eq!(
            match_display("DisplayTextRaw(DIRECT)=\"hi\""),
            Some((true, "DIRECT", "hi"))
        );
        assert_eq!(match_display("DisplayText(SHELL)=hi"), None);
    }

    #[test]
    fn call_function_capture_is_optional() {
        assert_eq!(match_call_function("CallFunction[F]"), Some(("F", None)));
        assert_eq!(
            match_call_function("CallFunction[F] -> RESULT"),
            Some(("F", Some("RESULT")))
        );
    }

    #[test]
    fn fs_matches_bracketed_subcommand_and_argument() {
        assert_eq!(match_fs("FS[Read][/a/b]"), Some(("Read", "/a/b", "")));
        assert_eq!(match_fs("FS[List]"), Some(("List", "", "")));
    }

    #[test]
    fn block_matches_subcommand_and_argument() {
        assert_eq!(match_block("Block[Alloc]"), Some(("Alloc", "", "")));
        assert_eq!(match_block("Block[Read][1]"), Some(("Read", "1", "")));
    }

    #[test]
    fn label_accepts_legacy_colon_form() {
        assert_eq!(match_label("Label[DONE]"), Some(("DONE", false)));
        assert_eq!(match_label("Label:DONE"), Some(("DONE", true)));
    }
}

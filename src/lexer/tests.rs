use crate::lexer::{strip_inline_comment, tokenize};

#[test]
fn drops_blank_and_slash_comment_lines() {
    let out = tokenize("\nSet[X]=\"1\"\n// a whole comment\n\nHALT\n");
    let texts: Vec<_> = out.lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["Set[X]=\"1\"", "HALT"]);
}

#[test]
fn strips_trailing_slash_slash_comment() {
    assert_eq!(strip_inline_comment("Set[X]=\"1\" // note"), "Set[X]=\"1\"");
}

#[test]
fn strips_trailing_hash_comment() {
    assert_eq!(strip_inline_comment("HALT # stop here"), "HALT");
}

#[test]
fn comment_markers_inside_double_quotes_are_literal() {
    assert_eq!(
        strip_inline_comment("Set[X]=\"a // b # c\""),
        "Set[X]=\"a // b # c\""
    );
}

#[test]
fn comment_markers_inside_single_quotes_are_literal() {
    assert_eq!(strip_inline_comment("If[X]='a # b' "), "If[X]='a # b'");
}

#[test]
fn drops_structural_noop_keywords_regardless_of_spacing() {
    let out = tokenize("[ 1 6 B I T ]\nstart program\nHALT");
    let texts: Vec<_> = out.lines.iter().map(|l| l.text.as_str()).collect();
    assert_eq!(texts, vec!["HALT"]);
}

#[test]
fn keeps_line_numbers_of_surviving_lines() {
    let out = tokenize("\n\nSet[X]=\"1\"\n// skipped\nHALT");
    let numbers: Vec<_> = out.lines.iter().map(|l| l.line_number).collect();
    assert_eq!(numbers, vec![3, 5]);
}

#[test]
fn legacy_label_colon_syntax_survives_lexing() {
    let out = tokenize("Label:DONE\nHALT");
    assert_eq!(out.lines[0].text, "Label:DONE");
}

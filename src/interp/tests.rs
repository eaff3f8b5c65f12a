use super::*;
use crate::fsstore::Store;
use crate::lexer::tokenize;
use crate::loader;

fn test_env() -> (Environment, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let env = Environment {
        vars: Variables::new(),
        color: ColorState::default(),
        fs: Store::default(),
        fs_path: dir.path().join("fs.json"),
        hardware_log_path: dir.path().join("hardware_output.log"),
        last_nonempty_input: String::new(),
    };
    (env, dir)
}

fn run_source(src: &str, env: &mut Environment) {
    let lines = tokenize(src).lines;
    let program = loader::load(lines).expect("program should load");
    run(&program, env).expect("program should run");
}

#[test]
fn set_then_display_substitutes_the_variable() {
    let (mut env, _dir) = test_env();
    run_source("Set[X]=\"Hi\"\nDisplayText(SHELL)=\"<`X`>!\"\nHALT", &mut env);
    assert_eq!(env.get("X"), "Hi");
}

#[test]
fn math_assignment_evaluates_operator_precedence() {
    let (mut env, _dir) = test_env();
    run_source("Set[A]=Math(2+3*4)\nHALT", &mut env);
    assert_eq!(env.get("A"), "14");
}

#[test]
fn if_else_picks_the_matching_branch() {
    let (mut env, _dir) = test_env();
    run_source(
        "Set[X]=\"no\"\nIf[X]=\"yes\"\nSet[R]=\"yes-branch\"\nElse\nSet[R]=\"else-branch\"\nEndIf\nHALT",
        &mut env,
    );
    assert_eq!(env.get("R"), "else-branch");
}

#[test]
fn if_true_branch_skips_the_else_body() {
    let (mut env, _dir) = test_env();
    run_source(
        "Set[X]=\"yes\"\nIf[X]=\"yes\"\nSet[R]=\"yes-branch\"\nElse\nSet[R]=\"else-branch\"\nEndIf\nHALT",
        &mut env,
    );
    assert_eq!(env.get("R"), "yes-branch");
}

#[test]
fn if_eq_compares_a_quoted_rhs_literally_with_no_template_substitution() {
    let (mut env, _dir) = test_env();
    run_source(
        concat!(
            "Set[Y]=\"Hi\"\n",
            "Set[X]=\"<`Y`>\"\n", // X becomes "Hi": Set substitutes at assignment time.
            "If[X]=\"<`Y`>\"\nSet[R]=\"matched\"\nElse\nSet[R]=\"no-match\"\nEndIf\nHALT",
        ),
        &mut env,
    );
    // The If's quoted RHS "<`Y`>" must be compared as that literal text, not
    // substituted into "Hi" before the comparison: X ("Hi") != "<`Y`>".
    assert_eq!(env.get("R"), "no-match");
}

#[test]
fn nested_if_blocks_resolve_to_the_correct_depth() {
    let (mut env, _dir) = test_env();
    run_source(
        concat!(
            "Set[A]=\"1\"\nSet[B]=\"0\"\n",
            "If[A]=\"1\"\n",
            "  If[B]=\"1\"\nSet[R]=\"inner-true\"\nElse\nSet[R]=\"inner-false\"\nEndIf\n",
            "Else\nSet[R]=\"outer-false\"\nEndIf\nHALT",
        ),
        &mut env,
    );
    assert_eq!(env.get("R"), "inner-false");
}

#[test]
fn ordering_operators_compare_numeric_prefixes() {
    let (mut env, _dir) = test_env();
    run_source(
        "Set[N]=\"7\"\nIf[N]>=5\nSet[R]=\"big\"\nElse\nSet[R]=\"small\"\nEndIf\nHALT",
        &mut env,
    );
    assert_eq!(env.get("R"), "big");
}

#[test]
fn goto_jumps_to_the_labeled_line() {
    let (mut env, _dir) = test_env();
    run_source(
        "Goto[SKIP]\nSet[R]=\"should-not-run\"\nLabel[SKIP]\nSet[R]=\"jumped\"\nHALT",
        &mut env,
    );
    assert_eq!(env.get("R"), "jumped");
}

#[test]
fn goto_to_a_missing_label_is_fatal() {
    let (mut env, _dir) = test_env();
    let lines = tokenize("Goto[NOPE]\nHALT").lines;
    let program = loader::load(lines).unwrap();
    assert!(run(&program, &mut env).is_err());
}

#[test]
fn call_function_return_sets_retval_and_supports_capture() {
    let (mut env, _dir) = test_env();
    run_source(
        concat!(
            "CallFunction[Greet] -> RESULT\nHALT\n",
            "StartFunction[Greet]\nReturn[\"hello\"]\nEndFunction",
        ),
        &mut env,
    );
    assert_eq!(env.get("RESULT"), "hello");
}

#[test]
fn loop_forever_reenters_its_body_until_a_goto_breaks_out() {
    let (mut env, _dir) = test_env();
    run_source(
        concat!(
            "Set[N]=\"0\"\n",
            "Loop[FOREVER]\n",
            "Set[N]=Math(<`N`> + 1)\n",
            "If[N]>=3\nGoto[DONE]\nEndIf\n",
            "EndLoop\n",
            "Label[DONE]\nHALT",
        ),
        &mut env,
    );
    assert_eq!(env.get("N"), "3");
}

#[test]
fn block_alloc_write_read_round_trips_through_lastblock() {
    let (mut env, _dir) = test_env();
    run_source(
        "Block[Alloc]\nBlock[Write][1]=\"abc\"\nSet[Y]=Block[Read][1]\nHALT",
        &mut env,
    );
    assert_eq!(env.get("Y"), "abc");
    assert_eq!(env.get("LASTBLOCK"), "1");
}

#[test]
fn set_color_updates_foreground_and_reset_restores_default() {
    let (mut env, _dir) = test_env();
    run_source("SetColor[FG]=RED\nResetColor\nHALT", &mut env);
    assert_eq!(env.color.fg, 7);
}

#[test]
fn write_file_then_read_file_round_trips_through_the_host_filesystem() {
    let (mut env, dir) = test_env();
    let path = dir.path().join("out.txt");
    let src = format!(
        "WriteFile[\"{}\"]=\"payload\"\nSet[Y]=ReadFile[\"{}\"]\nHALT",
        path.display(),
        path.display()
    );
    run_source(&src, &mut env);
    assert_eq!(env.get("Y"), "payload");
}

use longtool::compiler;
use longtool::emitter::{self, assembler::FakeAssembler};
use longtool::error::LongError;
use longtool::fsstore::Store;
use longtool::interp::{self, ColorState, Environment};
use longtool::lexer::tokenize;
use longtool::loader;
use longtool::opcode::Op;
use longtool::value::Variables;
use longtool::{config, loader::Program};

/// Run the interpreter pipeline (lexer → loader → runtime) over `src` using
/// a scratch environment rooted in a temp directory, asserting it runs to
/// completion without a fatal error.
fn run_interpreted(src: &str) -> (Environment, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut env = Environment {
        vars: Variables::new(),
        color: ColorState::default(),
        fs: Store::default(),
        fs_path: dir.path().join("fs.json"),
        hardware_log_path: dir.path().join("hardware_output.log"),
        last_nonempty_input: String::new(),
    };
    let lines = tokenize(src).lines;
    let program = loader::load(lines).expect("program should load");
    interp::run(&program, &mut env).expect("program should run");
    (env, dir)
}

fn load_program(src: &str) -> Program {
    loader::load(tokenize(src).lines).expect("program should load")
}

fn var(env: &Environment, name: &str) -> String {
    env.vars.get(name).cloned().unwrap_or_default()
}

fn compile_errors(src: &str) -> Result<compiler::CompiledProgram, LongError> {
    compiler::compile(&load_program(src))
}

#[test]
fn interpreter_pipeline_runs_the_math_scenario() {
    let (env, _dir) = run_interpreted("Set[A]=Math(2+3*4)\nHALT");
    assert_eq!(var(&env, "A"), "14");
}

#[test]
fn interpreter_pipeline_runs_the_block_store_scenario() {
    let (env, _dir) = run_interpreted(
        "Block[Alloc]\nBlock[Write][1]=\"payload\"\nSet[Y]=Block[Read][1]\nHALT",
    );
    assert_eq!(var(&env, "Y"), "payload");
}

#[test]
fn interpreter_pipeline_treats_goto_to_a_missing_label_as_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut env = Environment {
        vars: Variables::new(),
        color: ColorState::default(),
        fs: Store::default(),
        fs_path: dir.path().join("fs.json"),
        hardware_log_path: dir.path().join("hardware_output.log"),
        last_nonempty_input: String::new(),
    };
    let program = load_program("Goto[NOWHERE]\nHALT");
    assert!(interp::run(&program, &mut env).is_err());
}

#[test]
fn interpreter_pipeline_recovers_from_a_non_goto_runtime_error() {
    // CallFunction to an undefined function is a recoverable runtime error
    // (printed and skipped), unlike a missing Goto label.
    let (env, _dir) = run_interpreted("CallFunction[Nope]\nSet[DONE]=\"yes\"\nHALT");
    assert_eq!(var(&env, "DONE"), "yes");
}

#[test]
fn compiler_pipeline_matches_the_display_then_halt_scenario() {
    let compiled = compile_errors("DisplayText(DIRECT)=\"hi\"\nHALT").unwrap();
    assert_eq!(
        compiled.ops,
        vec![Op::PrintStr { pool: 0 }, Op::Nl, Op::Halt, Op::ProgramEnd]
    );
    assert_eq!(compiled.strings, vec!["hi".to_string()]);
}

#[test]
fn compiler_pipeline_matches_the_loop_forever_scenario() {
    let compiled =
        compile_errors("Loop[FOREVER]\nDisplayText(SHELL)=\".\"\nEndLoop").unwrap();
    assert_eq!(
        compiled.ops[..3],
        [Op::PrintStr { pool: 0 }, Op::Nl, Op::Goto { target: 0 }]
    );
}

#[test]
fn compiler_pipeline_rejects_interpreter_only_constructs() {
    assert!(compile_errors("Block[Alloc]\nHALT").is_err());
    assert!(compile_errors("Every[MS]=100\nHALT").is_err());
    assert!(compile_errors("Set[X]=ReadFile[\"/a\"]\nHALT").is_err());
}

#[test]
fn full_compile_and_link_pipeline_produces_a_floppy_sized_image() {
    let compiled = compile_errors(
        "Set[N]=\"0\"\nLoop[FOREVER]\nSet[N]=Math(<`N`> + 1)\nIf[N]>=3\nGoto[DONE]\nEndIf\nEndLoop\nLabel[DONE]\nHALT",
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let fake = FakeAssembler::new(vec![0x90; config::SECTOR_SIZE]);
    let out_path = dir.path().join("boot.img");
    emitter::build_boot_image(&compiled, &fake, dir.path(), &out_path).unwrap();

    let image = std::fs::read(&out_path).unwrap();
    assert_eq!(image.len(), config::FLOPPY_SIZE);
    // Stage-1 sector is the first 512 bytes of whatever the (fake) assembler
    // produced for boot_stage1.bin.
    assert_eq!(&image[..config::SECTOR_SIZE], &vec![0x90u8; config::SECTOR_SIZE][..]);
}

#[test]
fn compiling_the_same_program_twice_is_byte_identical() {
    let src = "Set[A]=\"x\"\nIf[A]=\"x\"\nDisplayText(SHELL)=\"match\"\nEndIf\nHALT";
    let first = compile_errors(src).unwrap();
    let second = compile_errors(src).unwrap();
    assert_eq!(first.ops, second.ops);
    assert_eq!(first.strings, second.strings);
    assert_eq!(first.var_names, second.var_names);
}

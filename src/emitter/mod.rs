//! Assembly emitter and boot-image linker.
//!
//! Turns a `compiler::CompiledProgram` into NASM `db`/`dw` text, splices it
//! into the stage-2 template between its marker comments, assembles both
//! boot stages, and concatenates them into a zero-padded floppy image.

pub mod assembler;


use crate::compiler::CompiledProgram;
use crate::config;
use crate::error::{LongError, Span};
use assembler::Assembler;
use std::collections::HashMap;
use std::path::Path;

const CALL_STACK_DEPTH: usize = 16;
const INPUT_BUFFER_SIZE: usize = 80;
const VAR_SLOT_SIZE: usize = 64;

/// Render the full data block the emitter splices between the stage-2
/// template markers: opcode stream, fixed data area, string table, pool.
pub fn render_program(compiled: &CompiledProgram) -> String {
    let mut out = String::new();
    out.push_str(&render_opcode_stream(compiled));
    out.push('\n');
    out.push_str(&render_fixed_data(compiled.var_names.len()));
    out.push('\n');
    out.push_str(&render_string_pool(&compiled.strings));
    out
}

fn labels_by_index(labels: &HashMap<String, usize>) -> HashMap<usize, Vec<String>> {
    let mut by_index: HashMap<usize, Vec<String>> = HashMap::new();
    for (name, &ix) in labels {
        by_index.entry(ix).or_default().push(name.clone());
    }
    for names in by_index.values_mut() {
        names.sort();
    }
    by_index
}

fn render_opcode_stream(compiled: &CompiledProgram) -> String {
    let by_index = labels_by_index(&compiled.labels);
    let mut out = String::new();
    for (i, op) in compiled.ops.iter().enumerate() {
        if let Some(names) = by_index.get(&i) {
            for name in names {
                out.push_str(name);
                out.push_str(":\n");
            }
        }
        out.push_str(&format!("L{i}:\n"));
        let bytes = op.encode();
        let joined = bytes
            .iter()
            .map(|b| format!("0x{b:02X}"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("    db {joined}\n"));
    }
    // A sentinel local label one past the last instruction, so a `Goto`
    // targeting end-of-stream (falling off into PROGRAM_END) still has an
    // address to resolve to.
    out.push_str(&format!("L{}:\n", compiled.ops.len()));
    out
}

fn render_fixed_data(var_count: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "input_buffer: times {INPUT_BUFFER_SIZE} db 0\n"
    ));
    out.push_str(&format!("call_stack: times {CALL_STACK_DEPTH} dw 0\n"));
    out.push_str("call_sp: db 0\n");

    for i in 0..var_count {
        out.push_str(&format!("var_{i}: times {VAR_SLOT_SIZE} db 0\n"));
    }
    out.push_str("var_table:");
    if var_count == 0 {
        out.push('\n');
    } else {
        let entries = (0..var_count)
            .map(|i| format!("var_{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(" dw {entries}\n"));
    }

    out.push_str("attr_byte: db 0x07\n");
    out.push_str("cursor_pos: dw 0\n");
    out.push_str("num_scratch: times 8 db 0\n");
    out.push_str("word_idx: times 4 db 0\n");
    out
}

fn render_string_pool(strings: &[String]) -> String {
    let mut out = String::new();
    out.push_str("str_table:");
    if strings.is_empty() {
        out.push('\n');
    } else {
        let entries = (0..strings.len())
            .map(|i| format!("str_{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(" dw {entries}\n"));
    }
    for (i, s) in strings.iter().enumerate() {
        out.push_str(&format!("str_{i}: db {}\n", nasm_string_literal(s)));
    }
    out
}

fn flush_run(out: &mut String, run: &mut String) {
    if !run.is_empty() {
        out.push('"');
        out.push_str(run);
        out.push_str("\", ");
        run.clear();
    }
}

/// Render `s` as a comma-separated NASM `db` operand list, splitting
/// newlines, quotes and other non-printable bytes into literal numeric
/// constants so NASM never chokes on an embedded quote or control byte.
fn nasm_string_literal(s: &str) -> String {
    let mut out = String::new();
    let mut run = String::new();
    for ch in s.chars() {
        let code = ch as u32;
        if ch == '\n' {
            flush_run(&mut out, &mut run);
            out.push_str("13, 10, ");
        } else if ch == '"' {
            flush_run(&mut out, &mut run);
            out.push_str("34, ");
        } else if !(0x20..=0x7e).contains(&code) {
            flush_run(&mut out, &mut run);
            out.push_str(&format!("{code}, "));
        } else {
            run.push(ch);
        }
    }
    flush_run(&mut out, &mut run);
    out.push('0');
    out
}

fn splice_template(template: &str, start: &str, end: &str, body: &str) -> Result<String, LongError> {
    let start_ix = template
        .find(start)
        .ok_or_else(|| LongError::compile(format!("stage-2 template is missing the '{start}' marker"), Span::default()))?;
    let after_start = start_ix + start.len();
    let rel_end = template[after_start..]
        .find(end)
        .ok_or_else(|| LongError::compile(format!("stage-2 template is missing the '{end}' marker"), Span::default()))?;
    let end_ix = after_start + rel_end;
    Ok(format!(
        "{}\n{}\n{}",
        &template[..after_start],
        body,
        &template[end_ix..]
    ))
}

fn patch_stage2_sectors(template: &str, sectors: usize) -> Result<String, LongError> {
    const MARKER: &str = "STAGE2_SECTORS equ";
    let ix = template.find(MARKER).ok_or_else(|| {
        LongError::compile(
            "stage-1 template is missing 'STAGE2_SECTORS equ'".to_string(),
            Span::default(),
        )
    })?;
    let line_end = template[ix..]
        .find('\n')
        .map(|r| ix + r)
        .unwrap_or(template.len());
    Ok(format!(
        "{}{MARKER} {sectors}{}",
        &template[..ix],
        &template[line_end..]
    ))
}

/// Assemble a compiled program into a floppy boot image at `output_path`,
/// using `build_dir` for intermediate `.asm`/`.bin` artifacts.
pub fn build_boot_image(
    compiled: &CompiledProgram,
    assembler: &dyn Assembler,
    build_dir: &Path,
    output_path: &Path,
) -> Result<(), LongError> {
    config::ensure_dir(build_dir)?;

    let stage2_template = std::fs::read_to_string(config::stage2_template_path())?;
    let body = render_program(compiled);
    let stage2_source = splice_template(
        &stage2_template,
        config::STAGE2_START_MARKER,
        config::STAGE2_END_MARKER,
        &body,
    )?;
    let stage2_asm_path = build_dir.join("boot_stage2.asm");
    std::fs::write(&stage2_asm_path, stage2_source)?;
    let stage2_bin_path = build_dir.join("boot_stage2.bin");
    assembler.assemble(&stage2_asm_path, &stage2_bin_path)?;
    let stage2_bytes = std::fs::read(&stage2_bin_path)?;
    let stage2_sectors =
        ((stage2_bytes.len() + config::SECTOR_SIZE - 1) / config::SECTOR_SIZE).max(1);

    let stage1_template = std::fs::read_to_string(config::stage1_template_path())?;
    let stage1_source = patch_stage2_sectors(&stage1_template, stage2_sectors)?;
    let stage1_asm_path = build_dir.join("boot_stage1.asm");
    std::fs::write(&stage1_asm_path, stage1_source)?;
    let stage1_bin_path = build_dir.join("boot_stage1.bin");
    assembler.assemble(&stage1_asm_path, &stage1_bin_path)?;
    let stage1_bytes = std::fs::read(&stage1_bin_path)?;
    if stage1_bytes.len() != config::STAGE1_SIZE {
        return Err(LongError::compile(
            format!(
                "stage-1 assembled to {} bytes, expected exactly {}",
                stage1_bytes.len(),
                config::STAGE1_SIZE
            ),
            Span::default(),
        ));
    }

    let mut image = Vec::with_capacity(config::FLOPPY_SIZE);
    image.extend_from_slice(&stage1_bytes);
    image.extend_from_slice(&stage2_bytes);
    image.resize(config::STAGE1_SIZE + stage2_sectors * config::SECTOR_SIZE, 0);
    image.resize(config::FLOPPY_SIZE, 0);

    std::fs::write(output_path, image)?;
    Ok(())
}

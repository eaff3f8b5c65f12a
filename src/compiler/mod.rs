//! Bytecode compiler.
//!
//! Lowers the loader's filtered main stream and every function body to a
//! flat `Op` stream, an insertion-ordered deduplicated string pool, and a
//! dense 0-based variable-slot table.


use crate::error::{LongError, Span};
use crate::loader::Program;
use crate::opcode::{check_slot, check_u16, Op};
use crate::stmt;
use crate::value::{self, CompilerMathRhs};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct StringPool {
    pub strings: Vec<String>,
    index: HashMap<String, u16>,
}

impl StringPool {
    fn intern(&mut self, s: &str) -> Result<u16, LongError> {
        if let Some(&ix) = self.index.get(s) {
            return Ok(ix);
        }
        let ix = check_u16(self.strings.len(), "string pool offset")?;
        self.strings.push(s.to_string());
        self.index.insert(s.to_string(), ix);
        Ok(ix)
    }
}

#[derive(Debug, Default)]
pub struct VarTable {
    pub names: Vec<String>,
    index: HashMap<String, u8>,
}

impl VarTable {
    fn slot(&mut self, name: &str) -> Result<u8, LongError> {
        if let Some(&s) = self.index.get(name) {
            return Ok(s);
        }
        let s = check_slot(self.names.len())?;
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), s);
        Ok(s)
    }
}

#[derive(Debug, Clone)]
struct IfFrame {
    false_label: String,
    end_label: String,
    has_else: bool,
}

pub struct CompiledProgram {
    pub ops: Vec<Op>,
    pub strings: Vec<String>,
    pub var_names: Vec<String>,
    pub labels: HashMap<String, usize>,
}

struct Compiler {
    ops: Vec<Op>,
    strings: StringPool,
    vars: VarTable,
    if_counter: u32,
    loop_counter: u32,
    if_stack: Vec<IfFrame>,
    loop_stack: Vec<String>,
    labels: HashMap<String, usize>,
    pending: Vec<(usize, String)>,
}

impl Compiler {
    fn new() -> Self {
        Compiler {
            ops: Vec::new(),
            strings: StringPool::default(),
            vars: VarTable::default(),
            if_counter: 0,
            loop_counter: 0,
            if_stack: Vec::new(),
            loop_stack: Vec::new(),
            labels: HashMap::new(),
            pending: Vec::new(),
        }
    }

    fn define_label(&mut self, name: String) {
        self.labels.insert(name, self.ops.len());
    }

    fn push_op(&mut self, op: Op) {
        self.ops.push(op);
    }

    fn emit_jump(&mut self, op_ctor: impl Fn(u16) -> Op, label: String) -> Result<(), LongError> {
        let ix = self.ops.len();
        match self.labels.get(&label) {
            Some(&target) => {
                let target = check_u16(target, "jump target")?;
                self.ops.push(op_ctor(target));
            }
            None => {
                self.ops.push(op_ctor(0));
                self.pending.push((ix, label));
            }
        }
        Ok(())
    }

    fn resolve_pending(&mut self) -> Result<(), LongError> {
        for (ix, label) in std::mem::take(&mut self.pending) {
            let target = *self.labels.get(&label).ok_or_else(|| {
                LongError::compile(format!("undefined label '{label}'"), Span::default())
            })?;
            let target = check_u16(target, "jump target")?;
            patch_target(&mut self.ops[ix], target);
        }
        Ok(())
    }

    fn lower_body(&mut self, lines: &[crate::lexer::RawLine]) -> Result<(), LongError> {
        for line in lines {
            self.lower_statement(&line.text, line.line_number)?;
        }
        Ok(())
    }

    fn lower_statement(&mut self, text: &str, line_number: usize) -> Result<(), LongError> {
        let span = Span::at(line_number, 0);

        if stmt::is_halt(text) {
            self.push_op(Op::Halt);
            return Ok(());
        }
        if let Some((name, _legacy)) = stmt::match_label(text) {
            self.define_label(format!("LBL_{name}"));
            return Ok(());
        }
        if let Some((raw, tag, content)) = stmt::match_display(text) {
            let _ = tag;
            self.lower_display(content, raw)?;
            return Ok(());
        }
        if let Some((which, name)) = stmt::match_set_color(text) {
            let index = crate::interp::color::color_index(name)
                .ok_or_else(|| LongError::compile(format!("unknown color '{name}'"), span))?;
            let which = match which {
                "FG" => 0,
                "BG" => 1,
                other => {
                    return Err(LongError::compile(
                        format!("unknown SetColor target '{other}'"),
                        span,
                    ))
                }
            };
            self.push_op(Op::SetColor { which, index });
            return Ok(());
        }
        if text == "ResetColor" {
            self.push_op(Op::ResetColor);
            return Ok(());
        }
        if text == "ClearScreen" {
            self.push_op(Op::Clear);
            return Ok(());
        }
        if text == "FillLine" {
            self.push_op(Op::FillLine);
            return Ok(());
        }
        if let Some(n) = stmt::match_fill_lines(text) {
            let count = parse_u8(n, span)?;
            self.push_op(Op::FillLines { count });
            return Ok(());
        }
        if let Some((w, h, ch)) = stmt::match_draw_box(text) {
            let w = parse_u8(w, span)?;
            let h = parse_u8(h, span)?;
            let ch = ch
                .chars()
                .next()
                .ok_or_else(|| LongError::compile("DrawBox fill character is empty", span))?
                as u8;
            self.push_op(Op::DrawBox { w, h, ch });
            return Ok(());
        }
        if let Some((r, c)) = stmt::match_set_cursor(text) {
            if let (Ok(row), Ok(col)) = (r.parse::<u8>(), c.parse::<u8>()) {
                self.push_op(Op::SetCursorIi { row, col });
            } else {
                let row_slot = self.vars.slot(r)?;
                let col_slot = self.vars.slot(c)?;
                self.push_op(Op::SetCursorVv { row_slot, col_slot });
            }
            return Ok(());
        }
        if stmt::match_track_input(text).is_some() {
            let input = self.vars.slot("INPUT")?;
            let w1 = self.vars.slot("WORD1")?;
            let w2 = self.vars.slot("WORD2")?;
            let w3 = self.vars.slot("WORD3")?;
            let wc = self.vars.slot("WORDCOUNT")?;
            let wrest = self.vars.slot("WORDREST")?;
            self.push_op(Op::InputWords {
                input,
                w1,
                w2,
                w3,
                wc,
                wrest,
            });
            return Ok(());
        }
        if let Some((var, rhs)) = stmt::match_set(text) {
            self.lower_set(var, rhs, span)?;
            return Ok(());
        }
        if let Some((var, op, rhs)) = stmt::match_if(text) {
            self.lower_if(var, op, rhs, span)?;
            return Ok(());
        }
        if text == "Else" {
            let ix = self
                .if_stack
                .len()
                .checked_sub(1)
                .ok_or_else(|| LongError::compile("'Else' with no matching 'If'", span))?;
            let end_label = self.if_stack[ix].end_label.clone();
            let false_label = self.if_stack[ix].false_label.clone();
            self.emit_jump(|t| Op::Goto { target: t }, end_label)?;
            self.define_label(false_label);
            self.if_stack[ix].has_else = true;
            return Ok(());
        }
        if text == "EndIf" {
            let frame = self
                .if_stack
                .pop()
                .ok_or_else(|| LongError::compile("'EndIf' with no matching 'If'", span))?;
            if frame.has_else {
                self.define_label(frame.end_label);
            } else {
                self.define_label(frame.false_label);
            }
            return Ok(());
        }
        if text == "Loop[FOREVER]" {
            self.loop_counter += 1;
            let label = format!("LOOP_{}", self.loop_counter);
            self.define_label(label.clone());
            self.loop_stack.push(label);
            return Ok(());
        }
        if text == "EndLoop" {
            let label = self
                .loop_stack
                .pop()
                .ok_or_else(|| LongError::compile("'EndLoop' with no matching 'Loop[FOREVER]'", span))?;
            self.emit_jump(|t| Op::Goto { target: t }, label)?;
            return Ok(());
        }
        if let Some(label) = stmt::match_goto(text) {
            self.emit_jump(|t| Op::Goto { target: t }, format!("LBL_{label}"))?;
            return Ok(());
        }
        if let Some((name, capture)) = stmt::match_call_function(text) {
            let retval_slot = self.vars.slot("__RETVAL")?;
            let empty_pool = self.strings.intern("")?;
            self.push_op(Op::SetStr {
                dst: retval_slot,
                pool: empty_pool,
            });
            self.emit_jump(|t| Op::Call { target: t }, format!("FUNC_{name}"))?;
            if let Some(capture) = capture {
                let dst = self.vars.slot(capture)?;
                self.push_op(Op::SetVar {
                    dst,
                    src: retval_slot,
                });
            }
            return Ok(());
        }
        if let Some(expr) = stmt::match_return(text) {
            let retval_slot = self.vars.slot("__RETVAL")?;
            self.lower_value_into(retval_slot, expr)?;
            self.push_op(Op::Ret);
            return Ok(());
        }

        Err(LongError::compile(
            format!("unsupported statement in compile mode: '{text}'"),
            span,
        ))
    }

    fn lower_display(&mut self, content: &str, raw: bool) -> Result<(), LongError> {
        for segment in split_template(content) {
            match segment {
                Segment::Literal(text) => {
                    let pool = self.strings.intern(&text)?;
                    self.push_op(Op::PrintStr { pool });
                }
                Segment::Var(name) => {
                    let slot = self.vars.slot(&name)?;
                    self.push_op(Op::PrintVar { slot });
                }
            }
        }
        if !raw {
            self.push_op(Op::Nl);
        }
        Ok(())
    }

    fn lower_set(&mut self, var: &str, rhs: &str, span: Span) -> Result<(), LongError> {
        let rhs = rhs.trim();
        let dst = self.vars.slot(var)?;
        if let Some(inner) = rhs.strip_prefix("Math(").and_then(|s| s.strip_suffix(')')) {
            let expr = value::parse_compiler_math(inner).ok_or_else(|| {
                LongError::compile(
                    format!("unsupported Math shape in compile mode: 'Math({inner})'"),
                    span,
                )
            })?;
            let src = self.vars.slot(&expr.left)?;
            match expr.rhs {
                CompilerMathRhs::Immediate(imm) => {
                    self.push_op(Op::MathVi {
                        dst,
                        src,
                        op: expr.op,
                        imm,
                    });
                }
                CompilerMathRhs::Var(name) => {
                    let b = self.vars.slot(&name)?;
                    self.push_op(Op::MathVv {
                        dst,
                        a: src,
                        op: expr.op,
                        b,
                    });
                }
            }
            return Ok(());
        }
        if rhs.starts_with("ReadFile[")
            || rhs.starts_with("FS[")
            || rhs.starts_with("Block[")
            || rhs.starts_with("DisplayText(")
            || rhs.starts_with("DisplayTextRaw(")
        {
            return Err(LongError::compile(
                format!("unsupported statement in compile mode: 'Set[{var}]={rhs}'"),
                span,
            ));
        }
        self.lower_value_into(dst, rhs)
    }

    fn lower_value_into(&mut self, dst: u8, raw: &str) -> Result<(), LongError> {
        let raw = raw.trim();
        if let Some(unquoted) = strip_quotes(raw) {
            let pool = self.strings.intern(unquoted)?;
            self.push_op(Op::SetStr { dst, pool });
        } else if raw.chars().all(|c| c.is_ascii_digit()) && !raw.is_empty() {
            let pool = self.strings.intern(raw)?;
            self.push_op(Op::SetStr { dst, pool });
        } else {
            let src = self.vars.slot(raw)?;
            self.push_op(Op::SetVar { dst, src });
        }
        Ok(())
    }

    fn lower_if(&mut self, var: &str, op: &str, rhs: &str, span: Span) -> Result<(), LongError> {
        self.if_counter += 1;
        let false_label = format!("IF_FALSE_{}", self.if_counter);
        let end_label = format!("IF_END_{}", self.if_counter);
        self.if_stack.push(IfFrame {
            false_label: false_label.clone(),
            end_label,
            has_else: false,
        });
        let slot = self.vars.slot(var)?;
        if op == "=" {
            let rhs_trim = rhs.trim();
            let pool = if let Some(unquoted) = strip_quotes(rhs_trim) {
                self.strings.intern(unquoted)?
            } else {
                self.strings.intern(rhs_trim)?
            };
            self.emit_jump(
                move |target| Op::IfNeStr { slot, pool, target },
                false_label,
            )?;
            return Ok(());
        }
        let op_code = match op {
            "<" => 0u8,
            "<=" => 1,
            ">" => 2,
            ">=" => 3,
            other => return Err(LongError::compile(format!("unsupported If operator '{other}'"), span)),
        };
        let rhs_trim = rhs.trim();
        if let Ok(imm) = rhs_trim.parse::<u16>() {
            self.emit_jump(
                move |target| Op::IfNumVi {
                    slot,
                    op_code,
                    imm,
                    target,
                },
                false_label,
            )?;
        } else {
            let slot2 = self.vars.slot(rhs_trim)?;
            self.emit_jump(
                move |target| Op::IfNumVv {
                    slot,
                    op_code,
                    slot2,
                    target,
                },
                false_label,
            )?;
        }
        Ok(())
    }
}

enum Segment {
    Literal(String),
    Var(String),
}

fn split_template(text: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut literal = String::new();
    let mut i = 0;
    while i < text.len() {
        if text[i..].starts_with("<`") {
            if let Some(rel) = text[i + 2..].find("`>") {
                if !literal.is_empty() {
                    out.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                let name = &text[i + 2..i + 2 + rel];
                out.push(Segment::Var(name.to_string()));
                i = i + 2 + rel + 2;
                continue;
            }
        }
        let ch = text[i..].chars().next().unwrap();
        literal.push(ch);
        i += ch.len_utf8();
    }
    if !literal.is_empty() {
        out.push(Segment::Literal(literal));
    }
    out
}

fn strip_quotes(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let (first, last) = (bytes[0], bytes[bytes.len() - 1]);
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return Some(&s[1..s.len() - 1]);
        }
    }
    None
}

fn parse_u8(s: &str, span: Span) -> Result<u8, LongError> {
    s.trim()
        .parse()
        .map_err(|_| LongError::compile(format!("expected an 8-bit integer, got '{s}'"), span))
}

fn patch_target(op: &mut Op, target: u16) {
    *op = match *op {
        Op::Goto { .. } => Op::Goto { target },
        Op::Call { .. } => Op::Call { target },
        Op::IfNeStr { slot, pool, .. } => Op::IfNeStr { slot, pool, target },
        Op::IfNumVi {
            slot, op_code, imm, ..
        } => Op::IfNumVi {
            slot,
            op_code,
            imm,
            target,
        },
        Op::IfNumVv {
            slot, op_code, slot2, ..
        } => Op::IfNumVv {
            slot,
            op_code,
            slot2,
            target,
        },
        other => other,
    };
}

/// Compile a loaded program to bytecode. Functions are emitted in sorted
/// name order after main (and after main's sentinel `PROGRAM_END`) so
/// compiling the same source twice is byte-identical.
pub fn compile(program: &Program) -> Result<CompiledProgram, LongError> {
    let mut c = Compiler::new();
    c.lower_body(&program.main)?;
    if let Some(frame) = c.if_stack.last() {
        return Err(LongError::compile(
            format!("unclosed 'If' (missing 'EndIf' for '{}')", frame.false_label),
            Span::default(),
        ));
    }
    if let Some(label) = c.loop_stack.last() {
        return Err(LongError::compile(
            format!("unclosed 'Loop[FOREVER]' (missing 'EndLoop' for '{label}')"),
            Span::default(),
        ));
    }
    c.push_op(Op::ProgramEnd);

    let mut names: Vec<&String> = program.functions.keys().collect();
    names.sort();
    for name in names {
        let body = &program.functions[name];
        c.define_label(format!("FUNC_{name}"));
        c.lower_body(&body.lines)?;
        if c.if_stack.pop().is_some() {
            return Err(LongError::compile(
                format!("function '{name}' has an unclosed 'If'"),
                Span::default(),
            ));
        }
        if c.loop_stack.pop().is_some() {
            return Err(LongError::compile(
                format!("function '{name}' has an unclosed 'Loop[FOREVER]'"),
                Span::default(),
            ));
        }
        c.push_op(Op::Ret);
    }

    c.resolve_pending()?;

    Ok(CompiledProgram {
        ops: c.ops,
        strings: c.strings.strings,
        var_names: c.vars.names,
        labels: c.labels,
    })
}

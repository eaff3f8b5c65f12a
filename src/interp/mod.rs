//! Tree-walking interpreter runtime.
//!
//! Runs a loaded program directly against an explicit `Environment` (shared
//! mutable state: variables, color, the FS store) and a per-call `Frame`
//! (`lines`/`labels`/`pc`) rather than module-level globals.

pub mod color;
#[cfg(test)]
mod tests;

use crate::config;
use crate::error::LongError;
use crate::fsstore::Store;
use crate::lexer::RawLine;
use crate::loader::Program;
use crate::stmt;
use crate::value::{self, Scalar, Variables};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct ColorState {
    pub fg: u8,
    pub bg: u8,
}

impl Default for ColorState {
    fn default() -> Self {
        ColorState { fg: 7, bg: 0 }
    }
}

pub struct Environment {
    pub vars: Variables,
    pub color: ColorState,
    pub fs: Store,
    pub fs_path: PathBuf,
    pub hardware_log_path: PathBuf,
    pub last_nonempty_input: String,
}

impl Environment {
    pub fn new() -> Result<Self, LongError> {
        let fs_path = config::fs_db_path();
        let fs = Store::load(&fs_path)?;
        Ok(Environment {
            vars: Variables::new(),
            color: ColorState::default(),
            fs,
            fs_path,
            hardware_log_path: config::hardware_log_path(),
            last_nonempty_input: String::new(),
        })
    }

    fn save_fs(&self) -> Result<(), LongError> {
        self.fs.save(&self.fs_path)
    }

    fn get(&self, name: &str) -> String {
        self.vars.get(name).cloned().unwrap_or_default()
    }

    fn set(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(name.to_string(), value.into());
    }
}

enum Flow {
    Next,
    Halt,
    Return,
}

enum StepOutcome {
    Continue,
    Jump(usize),
    Halt,
    Return,
}

/// Run the loaded program's main stream to completion.
pub fn run(program: &Program, env: &mut Environment) -> Result<(), LongError> {
    exec_body(&program.main, &program.main_labels, program, env)?;
    Ok(())
}

fn exec_body(
    lines: &[RawLine],
    labels: &HashMap<String, usize>,
    program: &Program,
    env: &mut Environment,
) -> Result<Flow, LongError> {
    let mut pc = 0usize;
    while pc < lines.len() {
        let text = lines[pc].text.trim();
        let line_number = lines[pc].line_number;

        if let Some(label) = stmt::match_goto(text) {
            let target = *labels.get(label).ok_or_else(|| {
                LongError::runtime(format!("goto: undefined label '{label}'"))
            })?;
            pc = target;
            continue;
        }

        match exec_statement(text, line_number, lines, pc, program, env) {
            Ok(StepOutcome::Continue) => pc += 1,
            Ok(StepOutcome::Jump(target)) => pc = target,
            Ok(StepOutcome::Halt) => return Ok(Flow::Halt),
            Ok(StepOutcome::Return) => return Ok(Flow::Return),
            Err(e) => {
                eprintln!("{e}");
                pc += 1;
            }
        }
    }
    Ok(Flow::Next)
}

fn exec_statement(
    text: &str,
    line_number: usize,
    lines: &[RawLine],
    pc: usize,
    program: &Program,
    env: &mut Environment,
) -> Result<StepOutcome, LongError> {
    if stmt::is_halt(text) {
        return Ok(StepOutcome::Halt);
    }
    if text == "EndIf" || text == "EndFunction" {
        return Ok(StepOutcome::Continue);
    }
    if text == "Else" {
        return Ok(StepOutcome::Jump(matching_endif(lines, pc) + 1));
    }
    if text == "Loop[FOREVER]" {
        return Ok(StepOutcome::Continue);
    }
    if text == "EndLoop" {
        return Ok(StepOutcome::Jump(matching_loop_start(lines, pc) + 1));
    }
    if let Some((name, false)) = stmt::match_label(text) {
        let _ = name;
        return Ok(StepOutcome::Continue);
    }
    if let Some((name, true)) = stmt::match_label(text) {
        eprintln!("[WARN] line {line_number}: 'Label:{name}' is deprecated, use 'Label[{name}]'");
        return Ok(StepOutcome::Continue);
    }

    if let Some((var, op, rhs)) = stmt::match_if(text) {
        return exec_if(lines, pc, var, op, rhs, env);
    }
    if let Some((name, capture)) = stmt::match_call_function(text) {
        return exec_call(name, capture, program, env);
    }
    if let Some(expr) = stmt::match_return(text) {
        let resolved = value::parse_value(&env.vars, expr);
        env.set("__RETVAL", resolved);
        return Ok(StepOutcome::Return);
    }
    if let Some((var, rhs)) = stmt::match_set(text) {
        exec_set(var, rhs, env)?;
        return Ok(StepOutcome::Continue);
    }
    if let Some((raw, tag, content)) = stmt::match_display(text) {
        display(env, tag, content, raw)?;
        return Ok(StepOutcome::Continue);
    }
    if let Some((which, name)) = stmt::match_set_color(text) {
        set_color(env, which, name)?;
        return Ok(StepOutcome::Continue);
    }
    if text == "ResetColor" {
        env.color = ColorState::default();
        return Ok(StepOutcome::Continue);
    }
    if text == "ClearScreen" {
        print!("{}", color::CLEAR);
        std::io::stdout().flush().ok();
        return Ok(StepOutcome::Continue);
    }
    if text == "FillLine" {
        fill_lines(env, 1)?;
        return Ok(StepOutcome::Continue);
    }
    if let Some(n) = stmt::match_fill_lines(text) {
        let count: usize = n.parse().unwrap_or(0);
        fill_lines(env, count)?;
        return Ok(StepOutcome::Continue);
    }
    if let Some((w, h, ch)) = stmt::match_draw_box(text) {
        draw_box(w, h, ch)?;
        return Ok(StepOutcome::Continue);
    }
    if let Some((r, c)) = stmt::match_set_cursor(text) {
        let row: u32 = r.parse().unwrap_or(1);
        let col: u32 = c.parse().unwrap_or(1);
        print!("{}", color::cursor_seq(row, col));
        std::io::stdout().flush().ok();
        return Ok(StepOutcome::Continue);
    }
    if let Some(n) = stmt::match_tick_timer(text) {
        sleep_ms(n)?;
        return Ok(StepOutcome::Continue);
    }
    if let Some((unit, n)) = stmt::match_time(text) {
        let ms: i64 = n.trim().parse().unwrap_or(0);
        let ms = match unit {
            "SEC" => ms.saturating_mul(1000),
            "MIN" => ms.saturating_mul(60_000),
            other => {
                return Err(LongError::runtime(format!("unknown Time unit '{other}'")));
            }
        };
        if ms > 0 {
            std::thread::sleep(Duration::from_millis(ms as u64));
        }
        return Ok(StepOutcome::Continue);
    }
    if let Some(mode) = stmt::match_track_input(text) {
        track_input(env, mode)?;
        return Ok(StepOutcome::Continue);
    }
    if let Some(n) = stmt::match_every_ms(text) {
        let ms: u64 = n.trim().parse().unwrap_or(0);
        std::thread::sleep(Duration::from_millis(ms));
        if env.get("INPUT").is_empty() && !env.last_nonempty_input.is_empty() {
            let replay = env.last_nonempty_input.clone();
            apply_input(env, &replay);
        }
        return Ok(StepOutcome::Continue);
    }
    if let Some((path, content)) = stmt::match_file_write(text, "WriteFile") {
        let path = value::parse_path_token(&env.vars, path);
        let content = value::parse_value(&env.vars, content);
        std::fs::write(&path, content)?;
        return Ok(StepOutcome::Continue);
    }
    if let Some((path, content)) = stmt::match_file_write(text, "AppendFile") {
        let path = value::parse_path_token(&env.vars, path);
        let content = value::parse_value(&env.vars, content);
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        file.write_all(content.as_bytes())?;
        return Ok(StepOutcome::Continue);
    }
    if let Some((sub, arg, rest)) = stmt::match_fs(text) {
        exec_fs(env, sub, arg, rest)?;
        return Ok(StepOutcome::Continue);
    }
    if let Some((sub, arg, rest)) = stmt::match_block(text) {
        exec_block(env, sub, arg, rest)?;
        return Ok(StepOutcome::Continue);
    }

    Err(LongError::runtime(format!(
        "line {line_number}: unrecognized statement '{text}'"
    )))
}

/// Resolve an If `=` comparison's RHS literally: a quoted literal is
/// unquoted with no `<`VAR`>` substitution; a bare token is looked up as a
/// variable name, falling back to its own literal text. Unlike
/// `value::parse_value`, a quoted RHS is never template-substituted.
fn resolve_if_eq_rhs(vars: &Variables, raw: &str) -> String {
    let raw = raw.trim();
    if let Some(unquoted) = value::strip_matching_quotes(raw) {
        return unquoted.to_string();
    }
    vars.get(raw).cloned().unwrap_or_else(|| raw.to_string())
}

fn exec_if(
    lines: &[RawLine],
    pc: usize,
    var: &str,
    op: &str,
    rhs: &str,
    env: &mut Environment,
) -> Result<StepOutcome, LongError> {
    let lhs = env.get(var);
    let truthy = match op {
        "=" => lhs == resolve_if_eq_rhs(&env.vars, rhs),
        "<" | "<=" | ">" | ">=" => {
            let rhs_resolved = value::parse_value(&env.vars, rhs);
            let l = value::parse_uint_like(&lhs);
            let r = value::parse_uint_like(&rhs_resolved);
            match op {
                "<" => l < r,
                "<=" => l <= r,
                ">" => l > r,
                ">=" => l >= r,
                _ => unreachable!(),
            }
        }
        _ => return Err(LongError::runtime(format!("unsupported If operator '{op}'"))),
    };
    if truthy {
        Ok(StepOutcome::Continue)
    } else {
        Ok(StepOutcome::Jump(skip_if_block(lines, pc)))
    }
}

/// False-branch target: the line index right after the matching `Else`
/// (enter its body) or right after the matching `EndIf` (no else, skip the
/// whole block).
fn skip_if_block(lines: &[RawLine], if_ix: usize) -> usize {
    let mut depth = 0i32;
    let mut i = if_ix + 1;
    while i < lines.len() {
        let t = lines[i].text.trim();
        if t.starts_with("If[") {
            depth += 1;
        } else if t == "EndIf" {
            if depth == 0 {
                return i + 1;
            }
            depth -= 1;
        } else if t == "Else" && depth == 0 {
            return i + 1;
        }
        i += 1;
    }
    lines.len()
}

/// Matching `EndIf` index for a line at `start_ix` (an `If[` or `Else`).
fn matching_endif(lines: &[RawLine], start_ix: usize) -> usize {
    let mut depth = 0i32;
    let mut i = start_ix + 1;
    while i < lines.len() {
        let t = lines[i].text.trim();
        if t.starts_with("If[") {
            depth += 1;
        } else if t == "EndIf" {
            if depth == 0 {
                return i;
            }
            depth -= 1;
        }
        i += 1;
    }
    lines.len().saturating_sub(1)
}

fn matching_loop_start(lines: &[RawLine], end_ix: usize) -> usize {
    let mut depth = 0i32;
    let mut i = end_ix;
    while i > 0 {
        i -= 1;
        let t = lines[i].text.trim();
        if t == "EndLoop" {
            depth += 1;
        } else if t == "Loop[FOREVER]" {
            if depth == 0 {
                return i;
            }
            depth -= 1;
        }
    }
    0
}

fn exec_call(
    name: &str,
    capture: Option<&str>,
    program: &Program,
    env: &mut Environment,
) -> Result<StepOutcome, LongError> {
    let body = program
        .functions
        .get(name)
        .ok_or_else(|| LongError::runtime(format!("call: undefined function '{name}'")))?;
    env.set("__RETVAL", "");
    exec_body(&body.lines, &body.labels, program, env)?;
    if let Some(capture) = capture {
        let retval = env.get("__RETVAL");
        env.set(capture, retval);
    }
    Ok(StepOutcome::Continue)
}

fn exec_set(var: &str, rhs: &str, env: &mut Environment) -> Result<(), LongError> {
    let rhs = rhs.trim();
    if let Some(inner) = math_shape(rhs) {
        let result = value::eval_math(&env.vars, inner)?;
        env.set(var, scalar_wire(result));
        return Ok(());
    }
    if let Some(path) = stmt::match_read_file(rhs) {
        let path = value::parse_path_token(&env.vars, path);
        let content = std::fs::read_to_string(&path)?;
        env.set(var, content);
        return Ok(());
    }
    if let Some((raw, tag, content)) = stmt::match_display(rhs) {
        display(env, tag, content, raw)?;
        let text = value::substitute_variables(&env.vars, content);
        env.set(var, text);
        return Ok(());
    }
    if let Some((sub, arg, _rest)) = stmt::match_fs(rhs) {
        match sub {
            "Read" => {
                let content = env.fs.fs_read_file(arg)?;
                env.set(var, content);
            }
            "List" => {
                let listing = env.fs.fs_list_dir(arg).join(",");
                env.set(var, listing);
            }
            other => {
                return Err(LongError::runtime(format!(
                    "Set[...]=FS[{other}][...] is not a readable expression"
                )));
            }
        }
        return Ok(());
    }
    if let Some((sub, arg, _rest)) = stmt::match_block(rhs) {
        match sub {
            "Alloc" => {
                let id = env.fs.fs_alloc_block();
                env.set("LASTBLOCK", id.clone());
                env.save_fs()?;
                env.set(var, id);
            }
            "Read" => {
                let content = env.fs.fs_read_block(arg)?.to_string();
                env.set("LASTBLOCKDATA", content.clone());
                env.set(var, content);
            }
            other => {
                return Err(LongError::runtime(format!(
                    "Set[...]=Block[{other}][...] is not a readable expression"
                )));
            }
        }
        return Ok(());
    }
    let resolved = value::parse_value(&env.vars, rhs);
    env.set(var, resolved);
    Ok(())
}

fn math_shape(rhs: &str) -> Option<&str> {
    let inner = rhs.strip_prefix("Math(")?;
    inner.strip_suffix(')')
}

fn scalar_wire(s: Scalar) -> String {
    s.to_string()
}

fn display(env: &mut Environment, tag: &str, content: &str, raw: bool) -> Result<(), LongError> {
    let text = value::substitute_variables(&env.vars, content);
    match tag {
        "SHELL" => {
            let fg = color::fg_code(env.color.fg);
            let bg = color::bg_code(env.color.bg);
            print!("\x1b[{fg};{bg}m{text}{}", color::RESET);
            if !raw {
                println!();
            }
            std::io::stdout().flush().ok();
        }
        "DIRECT" => {
            if let Some(dir) = env.hardware_log_path.parent() {
                config::ensure_dir(dir)?;
            }
            let mut file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&env.hardware_log_path)?;
            if raw {
                file.write_all(text.as_bytes())?;
            } else {
                writeln!(file, "{text}")?;
            }
        }
        other => {
            eprintln!("[WARN] unknown display tag '{other}', treating as SHELL");
            return display(env, "SHELL", content, raw);
        }
    }
    Ok(())
}

/// Width to paint: the real terminal width if one can be queried, else an
/// 80-column fallback.
fn terminal_columns() -> usize {
    crossterm::terminal::size()
        .map(|(cols, _)| cols.max(1) as usize)
        .unwrap_or(80)
}

/// Paint `count` terminal-width lines under the current fg/bg color and
/// leave the cursor at the start of the last one (`\r`, no trailing `\n`)
/// so a following `DisplayText` can overwrite it in place.
fn fill_lines(env: &Environment, count: usize) -> Result<(), LongError> {
    if count == 0 {
        return Ok(());
    }
    let text = " ".repeat(terminal_columns());
    let fg = color::fg_code(env.color.fg);
    let bg = color::bg_code(env.color.bg);
    for i in 0..count {
        print!("\x1b[{fg};{bg}m{text}{}", color::RESET);
        if i + 1 < count {
            println!();
        }
    }
    print!("\r");
    std::io::stdout().flush().ok();
    Ok(())
}

fn set_color(env: &mut Environment, which: &str, name: &str) -> Result<(), LongError> {
    let idx = color::color_index(name)
        .ok_or_else(|| LongError::runtime(format!("unknown color '{name}'")))?;
    match which {
        "FG" => env.color.fg = idx,
        "BG" => env.color.bg = idx,
        other => return Err(LongError::runtime(format!("unknown SetColor target '{other}'"))),
    }
    Ok(())
}

fn draw_box(w: &str, h: &str, ch: &str) -> Result<(), LongError> {
    let w: usize = w
        .parse()
        .map_err(|_| LongError::runtime(format!("DrawBox width '{w}' is not numeric")))?;
    let h: usize = h
        .parse()
        .map_err(|_| LongError::runtime(format!("DrawBox height '{h}' is not numeric")))?;
    let ch = ch.chars().next().unwrap_or('*');
    for _ in 0..h {
        println!("{}", ch.to_string().repeat(w));
    }
    Ok(())
}

fn sleep_ms(n: &str) -> Result<(), LongError> {
    let ms: i64 = n
        .trim()
        .parse()
        .map_err(|_| LongError::runtime(format!("TickTimer argument '{n}' is not numeric")))?;
    if ms > 0 {
        std::thread::sleep(Duration::from_millis(ms as u64));
    }
    Ok(())
}

fn apply_input(env: &mut Environment, normalized: &str) {
    env.set("INPUT", normalized.to_string());
    let words: Vec<&str> = normalized.split_whitespace().collect();
    env.set("WORDCOUNT", words.len().to_string());
    env.set("WORD1", words.first().copied().unwrap_or(""));
    env.set("WORD2", words.get(1).copied().unwrap_or(""));
    env.set("WORD3", words.get(2).copied().unwrap_or(""));
}

fn track_input(env: &mut Environment, mode: Option<&str>) -> Result<(), LongError> {
    let raw = match mode {
        None => {
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            line.trim_end_matches(['\n', '\r']).to_string()
        }
        Some("INSTANT") => read_one_char(true)?,
        Some("NOBLOCK") => read_one_char(false)?,
        Some(other) => {
            return Err(LongError::runtime(format!(
                "unknown TrackInput mode '{other}'"
            )));
        }
    };
    env.set("RAWINPUT", raw.clone());
    let normalized = raw.trim().to_ascii_lowercase();
    let normalized: String = normalized.split_whitespace().collect::<Vec<_>>().join(" ");
    if !normalized.is_empty() {
        env.last_nonempty_input = normalized.clone();
    }
    apply_input(env, &normalized);
    Ok(())
}

fn read_one_char(blocking: bool) -> Result<String, LongError> {
    use crossterm::event::{self, Event, KeyCode};
    use crossterm::terminal;

    terminal::enable_raw_mode()?;
    let result = (|| -> Result<String, LongError> {
        let available = blocking || event::poll(Duration::from_millis(0))?;
        if !available {
            return Ok(String::new());
        }
        if let Event::Key(key) = event::read()? {
            return Ok(match key.code {
                KeyCode::Char(c) => c.to_string(),
                KeyCode::Enter => "\n".to_string(),
                _ => String::new(),
            });
        }
        Ok(String::new())
    })();
    terminal::disable_raw_mode()?;
    result
}

fn exec_fs(env: &mut Environment, sub: &str, arg: &str, rest: &str) -> Result<(), LongError> {
    let path = value::parse_path_token(&env.vars, arg);
    match sub {
        "Create" => {
            let meta_raw = stmt::strip_eq(rest)
                .map(|m| value::parse_value(&env.vars, m))
                .unwrap_or_default();
            env.fs.fs_create(&path, &meta_raw)?;
            env.set("LASTCREATEPATH", path);
        }
        "Read" => {
            let content = env.fs.fs_read_file(&path)?;
            env.set("LASTREADPATH", path.clone());
            env.set("LASTREADSIZE", content.len().to_string());
            env.set("LASTREAD", content);
        }
        "Write" => {
            let content = stmt::strip_eq(rest)
                .map(|m| value::parse_value(&env.vars, m))
                .unwrap_or_default();
            env.fs.fs_write_file(&path, &content)?;
            env.set("LASTWRITEPATH", path);
            env.set("LASTWRITESIZE", content.len().to_string());
        }
        "List" => {
            let listing = env.fs.fs_list_dir(&path);
            env.set("LASTLISTPATH", path);
            env.set("LASTLISTCOUNT", listing.len().to_string());
            env.set("LASTLIST", listing.join(","));
        }
        "SetRole" => {
            let role = stmt::strip_eq(rest)
                .map(|m| value::parse_value(&env.vars, m))
                .unwrap_or_default();
            env.fs.fs_set_role(&path, &role)?;
            env.set("LASTROLEPATH", path);
            env.set("LASTROLE", role);
        }
        "Tran" => {
            env.fs.fs_tran(&path)?;
        }
        other => return Err(LongError::runtime(format!("unknown FS subcommand '{other}'"))),
    }
    env.save_fs()
}

fn exec_block(env: &mut Environment, sub: &str, arg: &str, rest: &str) -> Result<(), LongError> {
    match sub {
        "Alloc" => {
            let id = env.fs.fs_alloc_block();
            env.set("LASTBLOCK", id);
        }
        "Read" => {
            let content = env.fs.fs_read_block(arg)?.to_string();
            env.set("LASTBLOCK", arg.to_string());
            env.set("LASTBLOCKDATA", content);
        }
        "Write" => {
            let content = stmt::strip_eq(rest)
                .map(|m| value::parse_value(&env.vars, m))
                .unwrap_or_default();
            env.fs.fs_write_block(arg, &content)?;
            env.set("LASTBLOCK", arg.to_string());
        }
        other => return Err(LongError::runtime(format!("unknown Block subcommand '{other}'"))),
    }
    env.save_fs()
}

//! Expression/Value Parser.
//!
//! Four resolvers share one substitution rule (`substitute_variables`):
//! any `` <`NAME`> `` inside a string yields the current value of `NAME`, or
//! the literal token `<UNDEFINED:NAME>` if `NAME` is not set. `parse_value`
//! and `parse_token_value` accept either a quoted literal (unquoted and
//! substituted) or a bare identifier (the variable's value, or the literal
//! identifier text if no such variable exists). `eval_math` evaluates the
//! restricted numeric expression grammar used by `Math(...)`.
//!
//! `eval_math` is a small recursive-descent parser over that grammar rather
//! than a general expression evaluator.

use std::collections::HashMap;

use crate::error::LongError;

pub type Variables = HashMap<String, String>;

/// Dynamic view over a variable's wire-format (string) value, used wherever
/// a consumer needs a number but the storage itself stays `String`.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
}

impl Value {
    pub fn from_wire(s: &str) -> Self {
        match leading_unsigned_digits(s) {
            Some(n) if s.trim() == n.to_string() => Value::Int(n),
            _ => Value::Str(s.to_string()),
        }
    }

    pub fn as_wire_string(&self) -> String {
        match self {
            Value::Str(s) => s.clone(),
            Value::Int(n) => n.to_string(),
        }
    }

    /// Unsigned-decimal leading-digit-prefix parse, used by the ordering
    /// operators in `If[...] OP ...` (ordering semantics compare these, not
    /// the full signed/float numeric tower `Math` uses).
    pub fn numeric_prefix(&self) -> i64 {
        leading_unsigned_digits(&self.as_wire_string()).unwrap_or(0)
    }
}

/// Consume leading ASCII digits; a non-digit or end of input terminates the
/// scan. Returns `None` only when the string is empty of digits *and* the
/// caller should treat that as zero (spec: "empty ⇒ 0").
fn leading_unsigned_digits(s: &str) -> Option<i64> {
    let mut acc: i64 = 0;
    let mut seen = false;
    for ch in s.trim().chars() {
        if ch.is_ascii_digit() {
            seen = true;
            acc = acc.saturating_mul(10).saturating_add((ch as u8 - b'0') as i64);
        } else {
            break;
        }
    }
    if seen {
        Some(acc)
    } else {
        Some(0)
    }
}

/// Unsigned leading-digit parse used directly by `If[...] OP ...` ordering
/// comparisons (always defined, defaulting to 0 — mirrors
/// `parse_uint_like_vm` in the original).
pub fn parse_uint_like(s: &str) -> i64 {
    leading_unsigned_digits(s).unwrap_or(0)
}

/// Replace every `` <`NAME`> `` occurrence in `text` with the current value
/// of `NAME`, or `<UNDEFINED:NAME>` if absent.
pub fn substitute_variables(vars: &Variables, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if text[i..].starts_with("<`") {
            if let Some(rel_end) = text[i + 2..].find("`>") {
                let name = &text[i + 2..i + 2 + rel_end];
                match vars.get(name) {
                    Some(v) => out.push_str(v),
                    None => out.push_str(&format!("<UNDEFINED:{name}>")),
                }
                i = i + 2 + rel_end + 2;
                continue;
            }
        }
        let ch = text[i..].chars().next().unwrap();
        out.push(ch);
        i += ch.len_utf8();
    }
    out
}

/// Accepts a quoted literal (returns it unquoted and substituted) or a bare
/// identifier (returns the variable's value, else the literal text).
pub fn parse_value(vars: &Variables, raw: &str) -> String {
    let raw = raw.trim();
    if let Some(unquoted) = strip_matching_quotes(raw) {
        return substitute_variables(vars, unquoted);
    }
    vars.get(raw).cloned().unwrap_or_else(|| raw.to_string())
}

/// Equivalent to `parse_value`, but first substitutes variables into the raw
/// token before treating it as quoted/bare — used for tokens that may
/// themselves embed `` <`VAR`> `` markers outside of quotes.
pub fn parse_token_value(vars: &Variables, raw: &str) -> String {
    let raw = raw.trim();
    if let Some(unquoted) = strip_matching_quotes(raw) {
        return substitute_variables(vars, unquoted);
    }
    let substituted = substitute_variables(vars, raw);
    vars.get(&substituted)
        .cloned()
        .unwrap_or(substituted)
}

/// Path tokens resolve identically to value tokens.
pub fn parse_path_token(vars: &Variables, raw: &str) -> String {
    parse_token_value(vars, raw)
}

pub(crate) fn strip_matching_quotes(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return Some(&s[1..s.len() - 1]);
        }
    }
    None
}

/// The restricted numeric tower `Math(...)` evaluates over.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
}

impl Scalar {
    fn as_f64(self) -> f64 {
        match self {
            Scalar::Int(n) => n as f64,
            Scalar::Float(f) => f,
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(n) => write!(f, "{n}"),
            Scalar::Float(x) => write!(f, "{x}"),
        }
    }
}

/// Evaluate `Math(expr)`'s body: variables are substituted first, then the
/// restricted grammar (`+ - * / // % **`, unary `+`/`-`, int/float
/// constants) is parsed and evaluated.
pub fn eval_math(vars: &Variables, expr: &str) -> Result<Scalar, LongError> {
    let substituted = substitute_variables(vars, expr.trim());
    let substituted = strip_matching_quotes(&substituted).unwrap_or(&substituted);
    let mut parser = MathParser::new(substituted);
    let value = parser.parse_expr()?;
    parser.expect_end()?;
    Ok(value)
}

struct MathParser<'a> {
    chars: Vec<char>,
    pos: usize,
    source: &'a str,
}

impl<'a> MathParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            source,
        }
    }

    fn err(&self) -> LongError {
        LongError::runtime(format!("Invalid math expression: '{}'", self.source))
    }

    fn skip_ws(&mut self) {
        while matches!(self.chars.get(self.pos), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.chars.get(self.pos).copied()
    }

    fn peek_str(&mut self, s: &str) -> bool {
        self.skip_ws();
        let rest: String = self.chars[self.pos..].iter().collect();
        rest.starts_with(s)
    }

    fn bump_str(&mut self, s: &str) {
        self.pos += s.chars().count();
    }

    fn expect_end(&mut self) -> Result<(), LongError> {
        self.skip_ws();
        if self.pos == self.chars.len() {
            Ok(())
        } else {
            Err(self.err())
        }
    }

    // expr := term (('+' | '-') term)*
    fn parse_expr(&mut self) -> Result<Scalar, LongError> {
        let mut left = self.parse_term()?;
        loop {
            self.skip_ws();
            match self.peek() {
                Some('+') => {
                    self.pos += 1;
                    let right = self.parse_term()?;
                    left = apply_numeric(left, right, |a, b| a + b, |a, b| a + b);
                }
                Some('-') => {
                    self.pos += 1;
                    let right = self.parse_term()?;
                    left = apply_numeric(left, right, |a, b| a - b, |a, b| a - b);
                }
                _ => break,
            }
        }
        Ok(left)
    }

    // term := power (('//' | '*' | '/' | '%') power)*
    fn parse_term(&mut self) -> Result<Scalar, LongError> {
        let mut left = self.parse_power()?;
        loop {
            self.skip_ws();
            if self.peek_str("//") {
                self.bump_str("//");
                let right = self.parse_power()?;
                left = floor_div(left, right)?;
            } else if self.peek() == Some('*') {
                self.pos += 1;
                let right = self.parse_power()?;
                left = apply_numeric(left, right, |a, b| a * b, |a, b| a * b);
            } else if self.peek() == Some('/') {
                self.pos += 1;
                let right = self.parse_power()?;
                if right.as_f64() == 0.0 {
                    return Err(self.err());
                }
                left = Scalar::Float(left.as_f64() / right.as_f64());
            } else if self.peek() == Some('%') {
                self.pos += 1;
                let right = self.parse_power()?;
                left = modulo(left, right)?;
            } else {
                break;
            }
        }
        Ok(left)
    }

    // power := unary ('**' power)?     (right-associative)
    fn parse_power(&mut self) -> Result<Scalar, LongError> {
        let base = self.parse_unary()?;
        self.skip_ws();
        if self.peek_str("**") {
            self.bump_str("**");
            let exp = self.parse_power()?;
            return Ok(power(base, exp));
        }
        Ok(base)
    }

    fn parse_unary(&mut self) -> Result<Scalar, LongError> {
        self.skip_ws();
        match self.peek() {
            Some('+') => {
                self.pos += 1;
                self.parse_unary()
            }
            Some('-') => {
                self.pos += 1;
                let v = self.parse_unary()?;
                Ok(match v {
                    Scalar::Int(n) => Scalar::Int(-n),
                    Scalar::Float(f) => Scalar::Float(-f),
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Scalar, LongError> {
        self.skip_ws();
        if self.peek() == Some('(') {
            self.pos += 1;
            let v = self.parse_expr()?;
            self.skip_ws();
            if self.peek() != Some(')') {
                return Err(self.err());
            }
            self.pos += 1;
            return Ok(v);
        }
        let start = self.pos;
        let mut saw_dot = false;
        while let Some(c) = self.chars.get(self.pos) {
            if c.is_ascii_digit() {
                self.pos += 1;
            } else if *c == '.' && !saw_dot {
                saw_dot = true;
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(self.err());
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if saw_dot {
            text.parse::<f64>().map(Scalar::Float).map_err(|_| self.err())
        } else {
            text.parse::<i64>().map(Scalar::Int).map_err(|_| self.err())
        }
    }
}

fn apply_numeric(
    a: Scalar,
    b: Scalar,
    int_op: impl Fn(i64, i64) -> i64,
    float_op: impl Fn(f64, f64) -> f64,
) -> Scalar {
    match (a, b) {
        (Scalar::Int(x), Scalar::Int(y)) => Scalar::Int(int_op(x, y)),
        _ => Scalar::Float(float_op(a.as_f64(), b.as_f64())),
    }
}

/// Floor-divide two ints: the quotient rounds toward negative infinity
/// (Python `//` semantics), not toward zero.
fn floor_div_int(x: i64, y: i64) -> i64 {
    let q = x / y;
    let r = x % y;
    if r != 0 && (r < 0) != (y < 0) {
        q - 1
    } else {
        q
    }
}

/// Modulo two ints with the result taking the divisor's sign (Python `%`
/// semantics), not the dividend's.
fn modulo_int(x: i64, y: i64) -> i64 {
    let r = x % y;
    if r != 0 && (r < 0) != (y < 0) {
        r + y
    } else {
        r
    }
}

/// Modulo two floats with the result taking the divisor's sign (Python `%`
/// semantics); `f64::rem_euclid` is always non-negative and so doesn't match.
fn modulo_float(x: f64, y: f64) -> f64 {
    let r = x % y;
    if r != 0.0 && (r < 0.0) != (y < 0.0) {
        r + y
    } else {
        r
    }
}

fn floor_div(a: Scalar, b: Scalar) -> Result<Scalar, LongError> {
    match (a, b) {
        (Scalar::Int(x), Scalar::Int(y)) => {
            if y == 0 {
                return Err(LongError::runtime("division by zero in Math()"));
            }
            Ok(Scalar::Int(floor_div_int(x, y)))
        }
        _ => {
            let y = b.as_f64();
            if y == 0.0 {
                return Err(LongError::runtime("division by zero in Math()"));
            }
            Ok(Scalar::Float((a.as_f64() / y).floor()))
        }
    }
}

fn modulo(a: Scalar, b: Scalar) -> Result<Scalar, LongError> {
    match (a, b) {
        (Scalar::Int(x), Scalar::Int(y)) => {
            if y == 0 {
                return Err(LongError::runtime("modulo by zero in Math()"));
            }
            Ok(Scalar::Int(modulo_int(x, y)))
        }
        _ => {
            let y = b.as_f64();
            if y == 0.0 {
                return Err(LongError::runtime("modulo by zero in Math()"));
            }
            Ok(Scalar::Float(modulo_float(a.as_f64(), y)))
        }
    }
}

fn power(base: Scalar, exp: Scalar) -> Scalar {
    match (base, exp) {
        (Scalar::Int(b), Scalar::Int(e)) if e >= 0 => Scalar::Int(b.pow(e as u32)),
        _ => Scalar::Float(base.as_f64().powf(exp.as_f64())),
    }
}

/// The compiler's further-restricted `Math(<`V`> OP <`V`|NUMBER>)` shape,
/// `OP ∈ {+, -}`, since the bytecode VM only implements 8-bit add/sub.
#[derive(Debug, Clone, PartialEq)]
pub enum CompilerMathRhs {
    Var(String),
    Immediate(u16),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompilerMathExpr {
    pub left: String,
    pub op: u8, // b'+' or b'-'
    pub rhs: CompilerMathRhs,
}

/// Parse the compiler's restricted `Math` shape; returns `None` (not an
/// error) if the expression doesn't match — the caller turns that into a
/// `CompileError` with context.
pub fn parse_compiler_math(expr: &str) -> Option<CompilerMathExpr> {
    let expr = expr.trim();
    let rest = expr.strip_prefix("<`")?;
    let (left, rest) = rest.split_once("`>")?;
    let rest = rest.trim_start();
    let mut chars = rest.chars();
    let op = chars.next()?;
    if op != '+' && op != '-' {
        return None;
    }
    let rhs_text = chars.as_str().trim();
    let rhs = if let Some(inner) = rhs_text.strip_prefix("<`") {
        let (name, _) = inner.split_once("`>")?;
        CompilerMathRhs::Var(name.to_string())
    } else {
        let n: u16 = rhs_text.parse().ok()?;
        CompilerMathRhs::Immediate(n)
    };
    Some(CompilerMathExpr {
        left: left.to_string(),
        op: op as u8,
        rhs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Variables {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn substitution_round_trip_on_plain_text() {
        let v = Variables::new();
        assert_eq!(substitute_variables(&v, "hello world"), "hello world");
    }

    #[test]
    fn substitution_replaces_defined_variable() {
        let v = vars(&[("X", "V")]);
        assert_eq!(substitute_variables(&v, "A<`X`>B"), "AVB");
    }

    #[test]
    fn substitution_marks_undefined_variable() {
        let v = Variables::new();
        assert_eq!(substitute_variables(&v, "<`MISSING`>"), "<UNDEFINED:MISSING>");
    }

    #[test]
    fn parse_value_unquotes_and_substitutes() {
        let v = vars(&[("NAME", "Logan")]);
        assert_eq!(parse_value(&v, "\"Hi <`NAME`>\""), "Hi Logan");
    }

    #[test]
    fn parse_value_bare_identifier_looks_up_variable() {
        let v = vars(&[("X", "42")]);
        assert_eq!(parse_value(&v, "X"), "42");
    }

    #[test]
    fn parse_value_bare_identifier_falls_back_to_literal() {
        let v = Variables::new();
        assert_eq!(parse_value(&v, "UNSET"), "UNSET");
    }

    #[test]
    fn numeric_prefix_parses_leading_digits() {
        assert_eq!(parse_uint_like("42abc"), 42);
        assert_eq!(parse_uint_like("abc"), 0);
        assert_eq!(parse_uint_like(""), 0);
    }

    #[test]
    fn eval_math_operator_precedence() {
        let v = Variables::new();
        assert_eq!(eval_math(&v, "2+3*4").unwrap(), Scalar::Int(14));
    }

    #[test]
    fn eval_math_substitutes_variables_first() {
        let v = vars(&[("X", "10"), ("Y", "3")]);
        assert_eq!(eval_math(&v, "<`X`> - <`Y`>").unwrap(), Scalar::Int(7));
    }

    #[test]
    fn eval_math_division_is_float() {
        let v = Variables::new();
        assert_eq!(eval_math(&v, "10/4").unwrap(), Scalar::Float(2.5));
    }

    #[test]
    fn eval_math_floor_division_is_int() {
        let v = Variables::new();
        assert_eq!(eval_math(&v, "10//4").unwrap(), Scalar::Int(2));
    }

    #[test]
    fn eval_math_floor_division_rounds_toward_negative_infinity() {
        let v = Variables::new();
        assert_eq!(eval_math(&v, "7//-2").unwrap(), Scalar::Int(-4));
    }

    #[test]
    fn eval_math_modulo_takes_the_divisors_sign() {
        let v = Variables::new();
        assert_eq!(eval_math(&v, "7%-2").unwrap(), Scalar::Int(-1));
    }

    #[test]
    fn eval_math_power_right_associative() {
        let v = Variables::new();
        // 2 ** (3 ** 2) == 2 ** 9 == 512, not (2**3)**2 == 64
        assert_eq!(eval_math(&v, "2**3**2").unwrap(), Scalar::Int(512));
    }

    #[test]
    fn eval_math_rejects_garbage() {
        let v = Variables::new();
        assert!(eval_math(&v, "2 + ").is_err());
    }

    #[test]
    fn compiler_math_accepts_var_plus_immediate() {
        let parsed = parse_compiler_math("<`X`> + 5").unwrap();
        assert_eq!(parsed.left, "X");
        assert_eq!(parsed.op, b'+');
        assert_eq!(parsed.rhs, CompilerMathRhs::Immediate(5));
    }

    #[test]
    fn compiler_math_accepts_var_minus_var() {
        let parsed = parse_compiler_math("<`X`> - <`Y`>").unwrap();
        assert_eq!(parsed.rhs, CompilerMathRhs::Var("Y".to_string()));
    }

    #[test]
    fn compiler_math_rejects_unsupported_shape() {
        assert!(parse_compiler_math("<`X`> * 2").is_none());
        assert!(parse_compiler_math("2 + 2").is_none());
    }
}

//! Pass 1: program loading.
//!
//! Fences off `StartFunction[NAME]` … `EndFunction` bodies from the main
//! line stream and indexes `Label[...]`/legacy `Label:NAME` positions within
//! each stream before either runtime starts walking statements. Functions
//! cannot nest and every opened function must close; both are load-time
//! errors, not execution-time ones.


use crate::error::{LongError, Span};
use crate::lexer::RawLine;
use crate::stmt;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionBody {
    pub name: String,
    pub lines: Vec<RawLine>,
    pub labels: HashMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub main: Vec<RawLine>,
    pub main_labels: HashMap<String, usize>,
    pub functions: HashMap<String, FunctionBody>,
}

pub fn load(lines: Vec<RawLine>) -> Result<Program, LongError> {
    let mut main = Vec::new();
    let mut functions: HashMap<String, FunctionBody> = HashMap::new();
    let mut current: Option<FunctionBody> = None;
    let mut last_line = 0usize;

    for line in lines {
        last_line = line.line_number;

        if let Some(name) = stmt::match_start_function(&line.text) {
            if let Some(open) = &current {
                return Err(LongError::load(
                    format!(
                        "function '{name}' cannot start inside function '{}'",
                        open.name
                    ),
                    Span::at(line.line_number, 0),
                ));
            }
            if functions.contains_key(name) {
                return Err(LongError::load(
                    format!("function '{name}' is already defined"),
                    Span::at(line.line_number, 0),
                ));
            }
            current = Some(FunctionBody {
                name: name.to_string(),
                lines: Vec::new(),
                labels: HashMap::new(),
            });
            continue;
        }

        if line.text.trim() == "EndFunction" {
            let Some(mut body) = current.take() else {
                return Err(LongError::load(
                    "EndFunction with no matching StartFunction".to_string(),
                    Span::at(line.line_number, 0),
                ));
            };
            index_labels(&mut body.labels, &body.lines);
            functions.insert(body.name.clone(), body);
            continue;
        }

        match &mut current {
            Some(body) => body.lines.push(line),
            None => main.push(line),
        }
    }

    if let Some(body) = current {
        return Err(LongError::load(
            format!("function '{}' is missing a closing EndFunction", body.name),
            Span::at(last_line, 0),
        ));
    }

    let mut main_labels = HashMap::new();
    index_labels(&mut main_labels, &main);

    Ok(Program {
        main,
        main_labels,
        functions,
    })
}

fn index_labels(labels: &mut HashMap<String, usize>, lines: &[RawLine]) {
    for (idx, line) in lines.iter().enumerate() {
        if let Some((name, _legacy)) = stmt::match_label(&line.text) {
            labels.insert(name.to_string(), idx);
        }
    }
}

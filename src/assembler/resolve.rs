//! Two-pass symbol resolution
//!
//! Pass 1 assigns each emitted cell an address (temporaries get fresh
//! addresses appended after the user cells) and records label bindings.
//! Pass 2 rewrites every `OperandExpr` cell into its final integer value.

use super::ast::{Cell, OperandExpr};
use super::lexer::Span;
use super::lower::LoweredProgram;
use std::collections::HashMap;
use std::fmt;

pub type SymbolTable = HashMap<String, usize>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    DuplicateLabel { name: String, span: Span },
    UnknownLabel { name: String, span: Span },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolveError::DuplicateLabel { name, span } => {
                writeln!(
                    f,
                    "label \"{}\" redefined at line {}",
                    name, span.line_number
                )?;
                write!(f, "{}", span)
            }
            ResolveError::UnknownLabel { name, span } => {
                writeln!(
                    f,
                    "reference to unknown label \"{}\" at line {}",
                    name, span.line_number
                )?;
                write!(f, "{}", span)
            }
        }
    }
}

impl std::error::Error for ResolveError {}

/// A cell stream with every cell reduced to its final signed integer value.
pub struct ResolvedProgram {
    pub values: Vec<(i64, Span)>,
    pub symbols: SymbolTable,
}

pub fn resolve(program: &LoweredProgram) -> Result<ResolvedProgram, ResolveError> {
    let mut symbols = SymbolTable::new();
    for (name, address, span) in &program.labels {
        if symbols.insert(name.clone(), *address).is_some() {
            return Err(ResolveError::DuplicateLabel { name: name.clone(), span: span.clone() });
        }
    }

    let base_len = program.cells.len();
    let expansion_starts: HashMap<u32, usize> =
        program.expansion_starts.iter().cloned().collect();

    let mut values = Vec::with_capacity(base_len + program.temp_count as usize);
    for cell in &program.cells {
        let span = cell.span().clone();
        let value = match cell {
            Cell::Int(n, _) => *n,
            Cell::Byte(b, _) => *b as i64,
            Cell::Expr(e, _) => resolve_expr(e, &symbols, base_len, &expansion_starts, &span)?,
        };
        values.push((value, span));
    }

    for _ in 0..program.temp_count {
        let span = values
            .last()
            .map(|(_, s)| s.clone())
            .unwrap_or_else(|| Span::new(0, 0, 0, ""));
        values.push((0, span));
    }

    Ok(ResolvedProgram { values, symbols })
}

fn resolve_expr(
    expr: &OperandExpr,
    symbols: &SymbolTable,
    base_len: usize,
    expansion_starts: &HashMap<u32, usize>,
    span: &Span,
) -> Result<i64, ResolveError> {
    match expr {
        OperandExpr::Literal(n) => Ok(*n),
        OperandExpr::LabelRef(name, k) => symbols
            .get(name)
            .map(|addr| *addr as i64 + k)
            .ok_or_else(|| ResolveError::UnknownLabel { name: name.clone(), span: span.clone() }),
        OperandExpr::LabelAddr(name) => symbols
            .get(name)
            .map(|addr| *addr as i64)
            .ok_or_else(|| ResolveError::UnknownLabel { name: name.clone(), span: span.clone() }),
        OperandExpr::Temp(id) => Ok(base_len as i64 + *id as i64),
        OperandExpr::Rel(eid, offset) => {
            let start = expansion_starts
                .get(eid)
                .expect("every expansion id is recorded by the lowerer");
            Ok(*start as i64 + offset)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::lexer::lex;
    use crate::assembler::lower::lower_program;
    use crate::assembler::parser::parse;

    fn resolve_source(src: &str) -> ResolvedProgram {
        let lines = lex(src).unwrap();
        let stmts = parse(&lines).unwrap();
        let lowered = lower_program(&stmts);
        resolve(&lowered).unwrap()
    }

    #[test]
    fn address_conservation_for_label_ref() {
        let resolved = resolve_source("start: halt\nout start\n");
        // start resolves to 0, the out-macro's first cell carries it
        assert_eq!(resolved.symbols["start"], 0);
    }

    #[test]
    fn temps_resolve_after_user_cells() {
        let resolved = resolve_source("add a b\nhalt\na: int 0\nb: int 0\n");
        // add -> 9 cells, halt -> 3 cells, a -> 1 cell, b -> 1 cell = 12 user cells
        // the single temp used by `add` must resolve to address 12
        let temp_cell_value = resolved.values[12].0;
        assert_eq!(temp_cell_value, 0);
        assert_eq!(resolved.values.len(), 13);
    }

    #[test]
    fn unknown_label_is_an_error() {
        let lines = lex("out missing\n").unwrap();
        let stmts = parse(&lines).unwrap();
        let lowered = lower_program(&stmts);
        assert!(matches!(resolve(&lowered), Err(ResolveError::UnknownLabel { .. })));
    }

    #[test]
    fn duplicate_label_is_an_error() {
        let lines = lex("a:\nhalt\na:\nhalt\n").unwrap();
        let stmts = parse(&lines).unwrap();
        let lowered = lower_program(&stmts);
        assert!(matches!(resolve(&lowered), Err(ResolveError::DuplicateLabel { .. })));
    }
}

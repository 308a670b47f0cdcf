//! Expands each high-level instruction into primitive SUBLEQ triples
//!
//! Every row's third operand is a forward branch past the row itself, so
//! that every step of a multi-row macro falls through regardless of
//! whether its subtraction was `<= 0`. `$X`/`$Y` temporaries are written
//! back to zero after use to keep them clean for the next instruction that
//! might observe memory before its own re-zeroing; they are allocated from
//! a single monotonically increasing counter so no two expansions can ever
//! collide on the same temporary, by construction.
//!
//! Internal forward branches (`ip+3`, `ip+6`, ...) are represented as
//! `OperandExpr::Rel(expansion_id, offset)` rather than baked-in absolute
//! addresses, because whether a `jmp`-prologue gets prepended at address 0
//! is only known after a first lowering pass (see `assembler::assemble`);
//! every expansion records the address its first cell actually ended up
//! at, in `LoweredProgram::expansion_starts`, so the resolver can turn
//! `Rel` into a concrete address regardless of where the expansion landed.

use super::ast::{Cell, OperandExpr, RawPayload, Statement};
use super::lexer::Span;

/// Allocates the ids that make internal forward-branches and temporaries
/// unique across an entire lowering pass.
pub struct LowerContext {
    next_expansion: u32,
    next_temp: u32,
}

impl LowerContext {
    pub fn new() -> LowerContext {
        LowerContext { next_expansion: 0, next_temp: 0 }
    }

    fn fresh_expansion(&mut self) -> u32 {
        let id = self.next_expansion;
        self.next_expansion += 1;
        id
    }

    fn fresh_temp(&mut self) -> OperandExpr {
        let id = self.next_temp;
        self.next_temp += 1;
        OperandExpr::Temp(id)
    }
}

impl Default for LowerContext {
    fn default() -> Self {
        LowerContext::new()
    }
}

pub struct LoweredProgram {
    pub cells: Vec<Cell>,
    /// Label name -> tentative address (index into `cells`, before any
    /// temporary-storage cells are appended at the tail) -> defining span.
    pub labels: Vec<(String, usize, Span)>,
    pub temp_count: u32,
    /// Expansion id -> address of that expansion's first cell.
    pub expansion_starts: Vec<(u32, usize)>,
}

/// Lower an ordered statement sequence (as produced by the parser) into
/// cells, recording each label's tentative address. Directives carry no
/// cells and are skipped here; the caller is responsible for acting on
/// them before or after calling this function.
pub fn lower_program(statements: &[Statement]) -> LoweredProgram {
    let mut ctx = LowerContext::new();
    let mut cells = Vec::new();
    let mut labels = Vec::new();
    let mut expansion_starts = Vec::new();

    for stmt in statements {
        match stmt {
            Statement::Label { name, span } => labels.push((name.clone(), cells.len(), span.clone())),
            Statement::Directive { .. } => {}
            Statement::Instr { mnemonic, operands, span } => {
                let ip = cells.len();
                let (new_cells, starts) = lower_instr(ip, mnemonic, operands, span, &mut ctx);
                cells.extend(new_cells);
                expansion_starts.extend(starts);
            }
            Statement::Raw { payload, span, .. } => match payload {
                RawPayload::Int(n) => cells.push(Cell::Int(*n, span.clone())),
                RawPayload::Bytes(bytes) => {
                    cells.extend(bytes.iter().map(|b| Cell::Byte(*b, span.clone())));
                }
            },
        }
    }

    LoweredProgram { cells, labels, temp_count: ctx.next_temp, expansion_starts }
}

/// Build the synthetic `jmp <label>` statement used as the address-0
/// prologue when `#set ENTRY=<label>` names a non-zero address.
pub fn entry_prologue_statement(label: &str, span: Span) -> Statement {
    Statement::Instr {
        mnemonic: "jmp".to_string(),
        operands: vec![OperandExpr::LabelRef(label.to_string(), 0)],
        span,
    }
}

fn expr(e: OperandExpr, span: &Span) -> Cell {
    Cell::Expr(e, span.clone())
}

fn rel(eid: u32, offset: i64) -> OperandExpr {
    OperandExpr::Rel(eid, offset)
}

type Lowered = (Vec<Cell>, Vec<(u32, usize)>);

fn lower_instr(
    ip: usize,
    mnemonic: &str,
    operands: &[OperandExpr],
    span: &Span,
    ctx: &mut LowerContext,
) -> Lowered {
    match mnemonic {
        "noop" => (vec![], vec![]),
        "subleq" => (
            vec![
                expr(operands[0].clone(), span),
                expr(operands[1].clone(), span),
                expr(operands[2].clone(), span),
            ],
            vec![],
        ),
        "add" => lower_add(ip, operands[0].clone(), operands[1].clone(), span, ctx),
        "sub" => lower_sub(ip, operands[0].clone(), operands[1].clone(), span, ctx),
        "zer" => lower_zer(ip, operands[0].clone(), span, ctx),
        "mov" => lower_mov(ip, operands[0].clone(), operands[1].clone(), span, ctx),
        "jmp" => {
            let x = ctx.fresh_temp();
            (
                vec![expr(x.clone(), span), expr(x, span), expr(operands[0].clone(), span)],
                vec![],
            )
        }
        "beq" => lower_beq(ip, operands[0].clone(), operands[1].clone(), span, ctx),
        "cmp" => lower_cmp(
            ip,
            operands[0].clone(),
            operands[1].clone(),
            operands[2].clone(),
            span,
            ctx,
        ),
        "in" => {
            let eid = ctx.fresh_expansion();
            (
                vec![
                    expr(OperandExpr::Literal(-1), span),
                    expr(operands[0].clone(), span),
                    expr(rel(eid, 3), span),
                ],
                vec![(eid, ip)],
            )
        }
        "out" => {
            let eid = ctx.fresh_expansion();
            (
                vec![
                    expr(operands[0].clone(), span),
                    expr(OperandExpr::Literal(-1), span),
                    expr(rel(eid, 3), span),
                ],
                vec![(eid, ip)],
            )
        }
        "halt" => (
            vec![
                expr(OperandExpr::Literal(-1), span),
                expr(OperandExpr::Literal(-1), span),
                expr(OperandExpr::Literal(0), span),
            ],
            vec![],
        ),
        other => unreachable!("parser validated mnemonic \"{}\" before lowering", other),
    }
}

fn lower_add(ip: usize, o1: OperandExpr, o2: OperandExpr, span: &Span, ctx: &mut LowerContext) -> Lowered {
    let eid = ctx.fresh_expansion();
    let x = ctx.fresh_temp();
    let cells = vec![
        expr(o1, span),
        expr(x.clone(), span),
        expr(rel(eid, 3), span),
        expr(x.clone(), span),
        expr(o2, span),
        expr(rel(eid, 6), span),
        expr(x.clone(), span),
        expr(x, span),
        expr(rel(eid, 9), span),
    ];
    (cells, vec![(eid, ip)])
}

fn lower_sub(ip: usize, o1: OperandExpr, o2: OperandExpr, span: &Span, ctx: &mut LowerContext) -> Lowered {
    let eid = ctx.fresh_expansion();
    let cells = vec![expr(o1, span), expr(o2, span), expr(rel(eid, 3), span)];
    (cells, vec![(eid, ip)])
}

fn lower_zer(ip: usize, a: OperandExpr, span: &Span, ctx: &mut LowerContext) -> Lowered {
    let eid = ctx.fresh_expansion();
    let cells = vec![expr(a.clone(), span), expr(a, span), expr(rel(eid, 3), span)];
    (cells, vec![(eid, ip)])
}

fn lower_mov(ip: usize, s: OperandExpr, d: OperandExpr, span: &Span, ctx: &mut LowerContext) -> Lowered {
    let eid = ctx.fresh_expansion();
    let x = ctx.fresh_temp();
    let cells = vec![
        expr(d.clone(), span),
        expr(d.clone(), span),
        expr(rel(eid, 3), span),
        expr(s, span),
        expr(x.clone(), span),
        expr(rel(eid, 6), span),
        expr(x.clone(), span),
        expr(d, span),
        expr(rel(eid, 9), span),
        expr(x.clone(), span),
        expr(x, span),
        expr(rel(eid, 12), span),
    ];
    (cells, vec![(eid, ip)])
}

fn lower_beq(ip: usize, o: OperandExpr, a: OperandExpr, span: &Span, ctx: &mut LowerContext) -> Lowered {
    let eid = ctx.fresh_expansion();
    let x = ctx.fresh_temp();
    let cells = vec![
        expr(o.clone(), span),
        expr(x.clone(), span),
        expr(rel(eid, 6), span),
        expr(x.clone(), span),
        expr(x.clone(), span),
        expr(rel(eid, 9), span),
        expr(x.clone(), span),
        expr(x.clone(), span),
        expr(rel(eid, 3), span),
        expr(x.clone(), span),
        expr(o, span),
        expr(a, span),
    ];
    (cells, vec![(eid, ip)])
}

fn lower_cmp(
    ip: usize,
    o1: OperandExpr,
    o2: OperandExpr,
    d: OperandExpr,
    span: &Span,
    ctx: &mut LowerContext,
) -> Lowered {
    let y = ctx.fresh_temp();
    let (mut cells, mut starts) = lower_mov(ip, o1, y.clone(), span, ctx);
    let (sub_cells, sub_starts) = lower_sub(ip + 12, o2, y.clone(), span, ctx);
    cells.extend(sub_cells);
    starts.extend(sub_starts);
    let (beq_cells, beq_starts) = lower_beq(ip + 15, y, d, span, ctx);
    cells.extend(beq_cells);
    starts.extend(beq_starts);
    (cells, starts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::lexer::lex;
    use crate::assembler::parser::parse;

    fn lower_source(src: &str) -> LoweredProgram {
        let lines = lex(src).unwrap();
        let stmts = parse(&lines).unwrap();
        lower_program(&stmts)
    }

    #[test]
    fn noop_emits_nothing() {
        let p = lower_source("noop\n");
        assert_eq!(p.cells.len(), 0);
    }

    #[test]
    fn subleq_passes_operands_through() {
        let p = lower_source("subleq a b c\n");
        assert_eq!(p.cells.len(), 3);
        assert_eq!(
            p.cells[0],
            Cell::Expr(OperandExpr::LabelRef("a".into(), 0), p.cells[0].span().clone())
        );
    }

    #[test]
    fn add_emits_nine_cells_one_temp() {
        let p = lower_source("add a b\n");
        assert_eq!(p.cells.len(), 9);
        assert_eq!(p.temp_count, 1);
    }

    #[test]
    fn mov_emits_twelve_cells() {
        let p = lower_source("mov a b\n");
        assert_eq!(p.cells.len(), 12);
    }

    #[test]
    fn cmp_emits_twenty_seven_cells_three_temps() {
        let p = lower_source("cmp a b d\n");
        assert_eq!(p.cells.len(), 27);
        assert_eq!(p.temp_count, 3);
        // every internal branch operand stays within [ip, ip + len]
        for (eid, start) in &p.expansion_starts {
            for cell in &p.cells {
                if let Cell::Expr(OperandExpr::Rel(id, offset), _) = cell {
                    if id == eid {
                        assert!(*offset >= 0 && (*start as i64 + offset) <= 27);
                    }
                }
            }
        }
    }

    #[test]
    fn halt_is_three_literal_cells() {
        let p = lower_source("halt\n");
        assert_eq!(p.cells.len(), 3);
        assert!(matches!(p.cells[2], Cell::Expr(OperandExpr::Literal(0), _)));
    }

    #[test]
    fn temps_are_never_shared_across_instructions() {
        let p = lower_source("add a b\nadd c d\n");
        let temp_ids: Vec<u32> = p
            .cells
            .iter()
            .filter_map(|c| match c {
                Cell::Expr(OperandExpr::Temp(id), _) => Some(*id),
                _ => None,
            })
            .collect();
        // add uses the same temp 3 times within its own expansion, but the
        // second add's temp id must differ from the first's.
        let first_add_temp = temp_ids[0];
        let second_add_temp = *temp_ids.iter().find(|id| **id != first_add_temp).unwrap();
        assert_ne!(first_add_temp, second_add_temp);
        assert_eq!(p.temp_count, 2);
    }

    #[test]
    fn labels_bind_to_next_cell_address() {
        let p = lower_source("a: out 1\nb:\nhalt\n");
        let addrs: Vec<(String, usize)> =
            p.labels.into_iter().map(|(n, a, _)| (n, a)).collect();
        assert_eq!(addrs, vec![("a".to_string(), 0), ("b".to_string(), 3)]);
    }
}

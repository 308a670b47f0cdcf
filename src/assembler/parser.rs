//! Reads a token stream into the ordered `Statement` sequence
//!
//! Grammar (one statement per line, blank lines ignored):
//!
//! ```text
//! LABEL:                  -> Label(name)
//! mnemonic operand*       -> Instr
//! int N | bytes "S"       -> Raw
//! #set K=V                -> Directive
//! ```
//!
//! Operand grammar: `operand := '[' atom ']' | atom ('+' integer)?`,
//! `atom := identifier | integer`.

use super::ast::{OperandExpr, RawKind, RawPayload, Statement};
use super::lexer::{Span, SpannedToken, Token};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    UnknownMnemonic { mnemonic: String, span: Span },
    BadOperandCount { mnemonic: String, expected: usize, found: usize, span: Span },
    Syntax { message: String, span: Span },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnknownMnemonic { mnemonic, span } => {
                writeln!(
                    f,
                    "unknown mnemonic \"{}\" at line {}",
                    mnemonic, span.line_number
                )?;
                write!(f, "{}", span)
            }
            ParseError::BadOperandCount { mnemonic, expected, found, span } => {
                writeln!(
                    f,
                    "\"{}\" at line {} expects {} operand(s), found {}",
                    mnemonic, span.line_number, expected, found
                )?;
                write!(f, "{}", span)
            }
            ParseError::Syntax { message, span } => {
                writeln!(f, "syntax error at line {}: {}", span.line_number, message)?;
                write!(f, "{}", span)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Mnemonics that lower directly to SUBLEQ triples or literal cells, and the
/// number of operands each one takes. `int` and `bytes` are handled by the
/// parser as `Raw` statements and are not listed here.
pub fn mnemonic_arity(mnemonic: &str) -> Option<usize> {
    match mnemonic {
        "noop" | "halt" => Some(0),
        "subleq" => Some(3),
        "add" | "sub" | "mov" | "beq" => Some(2),
        "zer" | "jmp" | "in" | "out" => Some(1),
        "cmp" => Some(3),
        _ => None,
    }
}

struct Cursor<'a> {
    tokens: &'a [SpannedToken],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn peek_span(&self) -> &Span {
        &self.tokens[self.pos].span
    }

    fn advance(&mut self) -> &SpannedToken {
        let t = &self.tokens[self.pos];
        self.pos += 1;
        t
    }

    fn at_end(&self) -> bool {
        matches!(self.peek(), Token::Newline | Token::Eof)
    }
}

pub fn parse(lines: &[Vec<SpannedToken>]) -> Result<Vec<Statement>, ParseError> {
    let mut statements = Vec::new();
    for line in lines {
        parse_line(line, &mut statements)?;
    }
    Ok(statements)
}

fn parse_line(line: &[SpannedToken], out: &mut Vec<Statement>) -> Result<(), ParseError> {
    let mut cur = Cursor { tokens: line, pos: 0 };

    if cur.at_end() {
        return Ok(());
    }

    if let Token::Directive(key, value) = cur.peek().clone() {
        let span = cur.peek_span().clone();
        cur.advance();
        out.push(Statement::Directive { key, value, span });
        return Ok(());
    }

    // Zero or more `LABEL:` prefixes on the same line.
    loop {
        if let Token::Identifier(name) = cur.peek().clone() {
            if matches!(cur.tokens.get(cur.pos + 1).map(|t| &t.token), Some(Token::Punct(':'))) {
                let span = cur.peek_span().clone();
                cur.advance();
                cur.advance();
                out.push(Statement::Label { name, span });
                if cur.at_end() {
                    return Ok(());
                }
                continue;
            }
        }
        break;
    }

    let (mnemonic, mnemonic_span) = match cur.peek().clone() {
        Token::Identifier(name) => {
            let span = cur.peek_span().clone();
            cur.advance();
            (name, span)
        }
        other => {
            return Err(ParseError::Syntax {
                message: format!("expected a mnemonic, found {:?}", other),
                span: cur.peek_span().clone(),
            });
        }
    };

    let lower = mnemonic.to_ascii_lowercase();

    match lower.as_str() {
        "int" => {
            let (value, span) = expect_integer(&mut cur)?;
            expect_end(&cur)?;
            out.push(Statement::Raw {
                kind: RawKind::Int,
                payload: RawPayload::Int(value),
                span,
            });
        }
        "bytes" => {
            let (bytes, span) = expect_string(&mut cur)?;
            expect_end(&cur)?;
            out.push(Statement::Raw {
                kind: RawKind::Bytes,
                payload: RawPayload::Bytes(bytes),
                span,
            });
        }
        _ => {
            let expected = mnemonic_arity(&lower).ok_or_else(|| ParseError::UnknownMnemonic {
                mnemonic: mnemonic.clone(),
                span: mnemonic_span.clone(),
            })?;

            let mut operands = Vec::new();
            while !cur.at_end() {
                operands.push(parse_operand(&mut cur)?);
            }

            if operands.len() != expected {
                return Err(ParseError::BadOperandCount {
                    mnemonic,
                    expected,
                    found: operands.len(),
                    span: mnemonic_span,
                });
            }

            out.push(Statement::Instr {
                mnemonic: lower,
                operands,
                span: mnemonic_span,
            });
        }
    }

    Ok(())
}

fn expect_integer(cur: &mut Cursor) -> Result<(i64, Span), ParseError> {
    match cur.peek().clone() {
        Token::Integer(n) => {
            let span = cur.peek_span().clone();
            cur.advance();
            Ok((n, span))
        }
        other => Err(ParseError::Syntax {
            message: format!("expected an integer literal, found {:?}", other),
            span: cur.peek_span().clone(),
        }),
    }
}

fn expect_string(cur: &mut Cursor) -> Result<(Vec<u8>, Span), ParseError> {
    match cur.peek().clone() {
        Token::String(bytes) => {
            let span = cur.peek_span().clone();
            cur.advance();
            Ok((bytes, span))
        }
        other => Err(ParseError::Syntax {
            message: format!("expected a string literal, found {:?}", other),
            span: cur.peek_span().clone(),
        }),
    }
}

fn expect_end(cur: &Cursor) -> Result<(), ParseError> {
    if cur.at_end() {
        Ok(())
    } else {
        Err(ParseError::Syntax {
            message: "unexpected trailing tokens".to_string(),
            span: cur.peek_span().clone(),
        })
    }
}

fn parse_operand(cur: &mut Cursor) -> Result<OperandExpr, ParseError> {
    if matches!(cur.peek(), Token::Punct('[')) {
        cur.advance();
        let atom = parse_atom(cur)?;
        match cur.peek().clone() {
            Token::Punct(']') => {
                cur.advance();
            }
            other => {
                return Err(ParseError::Syntax {
                    message: format!("expected ']', found {:?}", other),
                    span: cur.peek_span().clone(),
                });
            }
        }
        return Ok(match atom {
            OperandExpr::Literal(n) => OperandExpr::Literal(n),
            OperandExpr::LabelRef(name, 0) => OperandExpr::LabelAddr(name),
            _ => unreachable!("atom only ever yields Literal or LabelRef(_, 0)"),
        });
    }

    let atom = parse_atom(cur)?;
    if let OperandExpr::LabelRef(name, 0) = atom {
        if matches!(cur.peek(), Token::Punct('+')) {
            cur.advance();
            let (k, _) = expect_integer(cur)?;
            return Ok(OperandExpr::LabelRef(name, k));
        }
        return Ok(OperandExpr::LabelRef(name, 0));
    }
    Ok(atom)
}

fn parse_atom(cur: &mut Cursor) -> Result<OperandExpr, ParseError> {
    match cur.peek().clone() {
        Token::Integer(n) => {
            cur.advance();
            Ok(OperandExpr::Literal(n))
        }
        Token::Identifier(name) => {
            cur.advance();
            Ok(OperandExpr::LabelRef(name, 0))
        }
        other => Err(ParseError::Syntax {
            message: format!("expected an identifier or integer, found {:?}", other),
            span: cur.peek_span().clone(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::lexer::lex;

    fn parse_source(src: &str) -> Vec<Statement> {
        let lines = lex(src).unwrap();
        parse(&lines).unwrap()
    }

    #[test]
    fn parses_label_on_own_line() {
        let stmts = parse_source("loop:\n");
        assert!(matches!(&stmts[0], Statement::Label { name, .. } if name == "loop"));
    }

    #[test]
    fn parses_label_and_instruction_on_same_line() {
        let stmts = parse_source("loop: out m\n");
        assert_eq!(stmts.len(), 2);
        assert!(matches!(&stmts[0], Statement::Label { name, .. } if name == "loop"));
        assert!(matches!(&stmts[1], Statement::Instr { mnemonic, .. } if mnemonic == "out"));
    }

    #[test]
    fn parses_operand_addressing_modes() {
        let stmts = parse_source("out 12\nout m\nout m+1\nout [m]\nout [0x22]\n");
        let ops: Vec<OperandExpr> = stmts
            .into_iter()
            .map(|s| match s {
                Statement::Instr { mut operands, .. } => operands.remove(0),
                _ => panic!("expected instr"),
            })
            .collect();
        assert_eq!(ops[0], OperandExpr::Literal(12));
        assert_eq!(ops[1], OperandExpr::LabelRef("m".into(), 0));
        assert_eq!(ops[2], OperandExpr::LabelRef("m".into(), 1));
        assert_eq!(ops[3], OperandExpr::LabelAddr("m".into()));
        assert_eq!(ops[4], OperandExpr::Literal(0x22));
    }

    #[test]
    fn parses_raw_int_and_bytes() {
        let stmts = parse_source("int 17\nbytes \"Hi\"\n");
        assert!(matches!(
            &stmts[0],
            Statement::Raw { kind: RawKind::Int, payload: RawPayload::Int(17), .. }
        ));
        assert!(matches!(
            &stmts[1],
            Statement::Raw { kind: RawKind::Bytes, .. }
        ));
    }

    #[test]
    fn rejects_unknown_mnemonic() {
        let lines = lex("frobnicate a b\n").unwrap();
        assert!(matches!(
            parse(&lines),
            Err(ParseError::UnknownMnemonic { .. })
        ));
    }

    #[test]
    fn rejects_wrong_operand_count() {
        let lines = lex("add a\n").unwrap();
        assert!(matches!(
            parse(&lines),
            Err(ParseError::BadOperandCount { .. })
        ));
    }

    #[test]
    fn parses_set_directive() {
        let stmts = parse_source("#set ENTRY=start\n");
        assert!(matches!(
            &stmts[0],
            Statement::Directive { key, value, .. } if key == "ENTRY" && value == "start"
        ));
    }
}

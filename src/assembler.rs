//! Compiles SUBLEQ assembly source into a flat binary memory image
//!
//! The pipeline is lex -> parse -> lower -> resolve -> emit, exactly the
//! five components spec'd out as separate modules. `assemble` wires them
//! together and handles the one piece of cross-stage logic: whether
//! `#set ENTRY=<label>` needs a `jmp`-prologue prepended at address 0.

pub mod ast;
pub mod emit;
pub mod lexer;
pub mod lower;
pub mod parser;
pub mod resolve;

use lexer::{lex, LexError, Span};
use lower::{entry_prologue_statement, lower_program};
use parser::{parse, ParseError};
use resolve::{resolve, ResolveError};
use std::fmt;
use std::fs;
use std::path::Path;

pub const DEFAULT_WIDTH: u8 = 4;

#[derive(Debug)]
pub enum Error {
    Lex(LexError),
    Parse(ParseError),
    Resolve(ResolveError),
    Range(emit::RangeError),
    Directive { message: String, span: Span },
    Io { path: String, source: std::io::Error },
}

impl Error {
    /// Exit code per spec.md §6: `1` for any assembly-stage user error, `2`
    /// for a failure reading or writing a file.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Io { .. } => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Lex(e) => write!(f, "{}", e),
            Error::Parse(e) => write!(f, "{}", e),
            Error::Resolve(e) => write!(f, "{}", e),
            Error::Range(e) => write!(f, "{}", e),
            Error::Directive { message, span } => {
                writeln!(f, "invalid directive at line {}: {}", span.line_number, message)?;
                write!(f, "{}", span)
            }
            Error::Io { path, source } => write!(f, "failed to access \"{}\": {}", path, source),
        }
    }
}

impl std::error::Error for Error {}

impl From<LexError> for Error {
    fn from(e: LexError) -> Error {
        Error::Lex(e)
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Error {
        Error::Parse(e)
    }
}

impl From<ResolveError> for Error {
    fn from(e: ResolveError) -> Error {
        Error::Resolve(e)
    }
}

impl From<emit::RangeError> for Error {
    fn from(e: emit::RangeError) -> Error {
        Error::Range(e)
    }
}

/// Assemble a file into a binary image. `cli_width`, if given, overrides
/// both the default width and any `#set WIDTH=` directive in the source.
pub fn assemble_from_file<P: AsRef<Path>>(path: P, cli_width: Option<u8>) -> Result<Vec<u8>, Error> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.display().to_string(),
        source,
    })?;
    assemble(&source, cli_width)
}

/// Assemble source text into a binary image.
pub fn assemble(source: &str, cli_width: Option<u8>) -> Result<Vec<u8>, Error> {
    let lines = lex(source)?;
    let statements = parse(&lines)?;

    let entry = find_directive(&statements, "ENTRY");
    let directive_width = match find_directive(&statements, "WIDTH") {
        Some((value, span)) => Some(parse_width(&value, &span)?),
        None => None,
    };
    let width = cli_width.or(directive_width).unwrap_or(DEFAULT_WIDTH);
    if !matches!(width, 1 | 2 | 4 | 8) {
        return Err(Error::Directive {
            message: format!("cell width must be 1, 2, 4, or 8, got {}", width),
            span: Span::new(0, 0, 0, ""),
        });
    }

    let base = lower_program(&statements);

    let final_program = match &entry {
        None => base,
        Some((label, span)) => {
            let tentative_address = base
                .labels
                .iter()
                .find(|(name, _, _)| name == label)
                .map(|(_, addr, _)| *addr)
                .ok_or_else(|| ResolveError::UnknownLabel { name: label.clone(), span: span.clone() })?;

            if tentative_address == 0 {
                base
            } else {
                let mut statements_with_prologue = Vec::with_capacity(statements.len() + 1);
                statements_with_prologue.push(entry_prologue_statement(label, span.clone()));
                statements_with_prologue.extend(statements.iter().cloned());
                lower_program(&statements_with_prologue)
            }
        }
    };

    let resolved = resolve(&final_program)?;
    let bytes = emit::emit(&resolved, width)?;
    Ok(bytes)
}

fn find_directive(statements: &[ast::Statement], key: &str) -> Option<(String, Span)> {
    statements.iter().find_map(|stmt| match stmt {
        ast::Statement::Directive { key: k, value, span } if k == key => {
            Some((value.clone(), span.clone()))
        }
        _ => None,
    })
}

fn parse_width(value: &str, span: &Span) -> Result<u8, Error> {
    value.parse::<u8>().map_err(|_| Error::Directive {
        message: format!("\"{}\" is not a valid cell width", value),
        span: span.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assembles_halt_only_program() {
        let bytes = assemble("halt\n", None).unwrap();
        assert_eq!(bytes.len(), 12); // 3 cells * width 4
    }

    #[test]
    fn entry_directive_prepends_prologue_when_nonzero() {
        let source = "#set ENTRY=start\nint 0\nstart: halt\n";
        let bytes = assemble(source, None).unwrap();
        // prologue (3 cells) + int 0 (1 cell) + halt (3 cells) = 7 cells * 4 bytes
        assert_eq!(bytes.len(), 28);
    }

    #[test]
    fn entry_directive_skips_prologue_when_already_zero() {
        let source = "#set ENTRY=start\nstart: halt\n";
        let bytes = assemble(source, None).unwrap();
        assert_eq!(bytes.len(), 12);
    }

    #[test]
    fn width_directive_is_honored_without_cli_override() {
        let bytes = assemble("#set WIDTH=1\nint 5\n", None).unwrap();
        assert_eq!(bytes, vec![5]);
    }

    #[test]
    fn cli_width_overrides_width_directive() {
        let bytes = assemble("#set WIDTH=1\nint 5\n", Some(2)).unwrap();
        assert_eq!(bytes, vec![5, 0]);
    }

    #[test]
    fn unknown_entry_label_is_an_error() {
        let err = assemble("#set ENTRY=missing\nhalt\n", None).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn io_error_on_missing_file_is_exit_code_two() {
        let err = assemble_from_file("/no/such/file.asm", None).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}

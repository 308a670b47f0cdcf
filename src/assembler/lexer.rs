//! Tokenises SUBLEQ assembly source text
//!
//! Recognises identifiers, decimal/hexadecimal/binary integer literals,
//! string literals, the punctuation `: + [ ]`, `#set KEY=VALUE` directive
//! lines, and `;` line comments. Whitespace within a line is insignificant.
//! Lexemes are split out with `regex`, the same crate the CHIP-8 tool this
//! codebase grew out of reaches for in its own tokenizer
//! (`Regex::new(r#""[^"]*"|[^,\s]+"#)`); classification of each lexeme then
//! follows the `starts_with("0x")` / `from_str_radix` idiom its
//! `Statement::parse_number` uses for numeric literals.

use regex::Regex;
use std::fmt;

/// A location in the source, kept alongside tokens and later cells so that
/// errors can point back at the exact text that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub line_number: usize,
    pub start: usize,
    pub end: usize,
    pub line: String,
}

impl Span {
    pub fn new(line_number: usize, start: usize, end: usize, line: &str) -> Span {
        Span {
            line_number,
            start,
            end,
            line: line.to_string(),
        }
    }

    /// A caret-underline of this span beneath its source line, for diagnostics.
    pub fn underline(&self) -> String {
        let mut underline = vec![' '; self.line.len().max(self.end)];
        for slot in underline.iter_mut().take(self.end).skip(self.start) {
            *slot = '^';
        }
        underline.into_iter().collect()
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}\t{}", self.line_number, self.line)?;
        write!(f, "\t{}", self.underline())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Identifier(String),
    Integer(i64),
    String(Vec<u8>),
    Punct(char),
    Directive(String, String),
    Newline,
    Eof,
}

#[derive(Debug, Clone)]
pub struct SpannedToken {
    pub token: Token,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    UnterminatedString { span: Span },
    MalformedNumber { text: String, span: Span },
    UnexpectedChar { ch: char, span: Span },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::UnterminatedString { span } => {
                writeln!(f, "unterminated string literal at line {}", span.line_number)?;
                write!(f, "{}", span)
            }
            LexError::MalformedNumber { text, span } => {
                writeln!(
                    f,
                    "malformed number \"{}\" at line {}",
                    text, span.line_number
                )?;
                write!(f, "{}", span)
            }
            LexError::UnexpectedChar { ch, span } => {
                writeln!(
                    f,
                    "unexpected character '{}' at line {}",
                    ch, span.line_number
                )?;
                write!(f, "{}", span)
            }
        }
    }
}

impl std::error::Error for LexError {}

/// Tokenise a whole source file, returning one token stream per (1-based) line.
pub fn lex(source: &str) -> Result<Vec<Vec<SpannedToken>>, LexError> {
    let mut lines_out = Vec::new();
    for (idx, line) in source.lines().enumerate() {
        let line_number = idx + 1;
        lines_out.push(lex_line(line_number, line)?);
    }
    Ok(lines_out)
}

fn lex_line(line_number: usize, line: &str) -> Result<Vec<SpannedToken>, LexError> {
    if line.trim_start().starts_with('#') {
        let directive = lex_directive_line(line_number, line)?;
        return Ok(vec![
            directive,
            SpannedToken {
                token: Token::Newline,
                span: Span::new(line_number, line.len(), line.len(), line),
            },
        ]);
    }

    let code = strip_comment(line);
    let token_re = Regex::new(
        r#""(?:[^"\\]|\\.)*"|-?0x[0-9A-Fa-f_]*|-?0b[01_]*|-?[0-9][0-9_]*|[A-Za-z_][A-Za-z0-9_]*|[:+\[\]]"#,
    )
    .unwrap();

    let mut tokens = Vec::new();
    let mut cursor = 0usize;
    for mat in token_re.find_iter(code) {
        check_gap(line_number, line, code, cursor, mat.start())?;
        cursor = mat.end();
        let span = Span::new(line_number, mat.start(), mat.end(), line);
        let token = classify(mat.as_str(), &span)?;
        tokens.push(SpannedToken { token, span });
    }
    check_gap(line_number, line, code, cursor, code.len())?;

    tokens.push(SpannedToken {
        token: Token::Newline,
        span: Span::new(line_number, code.len(), code.len(), line),
    });
    Ok(tokens)
}

/// Find the end of the code portion of a line, honoring `;` comments but
/// never treating a `;` inside a (possibly unterminated) string literal as
/// a comment marker.
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut chars = line.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        match c {
            '"' => in_string = !in_string,
            '\\' if in_string => {
                chars.next();
            }
            ';' if !in_string => return &line[..idx],
            _ => {}
        }
    }
    line
}

/// Everything between two adjacent regex matches must be whitespace; a
/// stray character there is either an unterminated string (it starts with
/// `"`) or an unexpected character.
fn check_gap(line_number: usize, line: &str, code: &str, from: usize, to: usize) -> Result<(), LexError> {
    let gap = &code[from..to];
    if let Some(offset) = gap.find(|c: char| !c.is_whitespace()) {
        let pos = from + offset;
        let bad_char = gap[offset..].chars().next().unwrap();
        if bad_char == '"' {
            return Err(LexError::UnterminatedString {
                span: Span::new(line_number, pos, code.len(), line),
            });
        }
        return Err(LexError::UnexpectedChar {
            ch: bad_char,
            span: Span::new(line_number, pos, pos + 1, line),
        });
    }
    Ok(())
}

/// Turn one already-split lexeme into a `Token`.
fn classify(text: &str, span: &Span) -> Result<Token, LexError> {
    if let Some(inner) = text.strip_prefix('"').and_then(|t| t.strip_suffix('"')) {
        return Ok(Token::String(unescape(inner, span)?));
    }

    if text.len() == 1 && matches!(text, ":" | "+" | "[" | "]") {
        return Ok(Token::Punct(text.chars().next().unwrap()));
    }

    let negative = text.starts_with('-');
    let unsigned = if negative { &text[1..] } else { text };

    let (digits, radix) = if let Some(rest) = unsigned.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = unsigned.strip_prefix("0b") {
        (rest, 2)
    } else if unsigned.starts_with(|c: char| c.is_ascii_digit()) {
        (unsigned, 10)
    } else {
        return Ok(Token::Identifier(text.to_string()));
    };

    let cleaned: String = digits.chars().filter(|c| *c != '_').collect();
    if cleaned.is_empty() {
        return Err(LexError::MalformedNumber { text: text.to_string(), span: span.clone() });
    }
    let magnitude = i64::from_str_radix(&cleaned, radix).map_err(|_| LexError::MalformedNumber {
        text: text.to_string(),
        span: span.clone(),
    })?;
    Ok(Token::Integer(if negative { -magnitude } else { magnitude }))
}

/// Unescape the inner content of a string lexeme (quotes already stripped).
/// Only `\"` and `\\` are recognised escapes; anything else after a
/// backslash is treated the same as a string that never closed.
fn unescape(content: &str, span: &Span) -> Result<Vec<u8>, LexError> {
    let mut bytes = Vec::new();
    let mut chars = content.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('"') => bytes.push(b'"'),
                Some('\\') => bytes.push(b'\\'),
                _ => return Err(LexError::UnterminatedString { span: span.clone() }),
            }
        } else {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
    Ok(bytes)
}

/// Lex a `#set KEY=VALUE` directive line. Anything under a different
/// keyword than `set`, or missing the `KEY=VALUE` shape, is rejected.
fn lex_directive_line(line_number: usize, raw_line: &str) -> Result<SpannedToken, LexError> {
    let code = strip_comment(raw_line);
    let trimmed = code.trim_start();
    let start_offset = code.len() - trimmed.len();
    let span = || Span::new(line_number, start_offset, code.len(), raw_line);

    let keyword_re = Regex::new(r"^#\s*([A-Za-z_][A-Za-z0-9_]*)\s*(.*)$").unwrap();
    let caps = keyword_re.captures(trimmed).ok_or_else(|| LexError::UnexpectedChar {
        ch: trimmed.chars().nth(1).unwrap_or('#'),
        span: span(),
    })?;

    if &caps[1] != "set" {
        return Err(LexError::UnexpectedChar {
            ch: caps[1].chars().next().unwrap_or('#'),
            span: span(),
        });
    }

    let assignment_re = Regex::new(r"^([A-Za-z_][A-Za-z0-9_]*)\s*=\s*(.*)$").unwrap();
    let rest = caps[2].trim();
    let assignment = assignment_re.captures(rest).ok_or_else(|| LexError::UnexpectedChar {
        ch: rest.chars().next().unwrap_or('='),
        span: span(),
    })?;

    let key = assignment[1].to_string();
    let value = assignment[2].trim().to_string();
    Ok(SpannedToken { token: Token::Directive(key, value), span: span() })
}

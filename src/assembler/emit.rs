//! Serialises resolved cells to a fixed-width little-endian byte stream

use super::lexer::Span;
use super::resolve::ResolvedProgram;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeError {
    pub value: i64,
    pub width: u8,
    pub span: Span,
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lo, hi) = bounds(self.width);
        writeln!(
            f,
            "value {} at line {} does not fit in {} bytes (allowed range [{}, {}])",
            self.value, self.span.line_number, self.width, lo, hi
        )?;
        write!(f, "{}", self.span)
    }
}

impl std::error::Error for RangeError {}

fn bounds(width: u8) -> (i64, i64) {
    if width == 8 {
        (i64::MIN, i64::MAX)
    } else {
        let bits = width as u32 * 8;
        (-(1i64 << (bits - 1)), (1i64 << (bits - 1)) - 1)
    }
}

/// Emit the resolved cell values as a `width`-byte little-endian
/// two's-complement binary. `width` must be one of 1, 2, 4, 8.
pub fn emit(resolved: &ResolvedProgram, width: u8) -> Result<Vec<u8>, RangeError> {
    debug_assert!(matches!(width, 1 | 2 | 4 | 8));
    let (lo, hi) = bounds(width);
    let mut bytes = Vec::with_capacity(resolved.values.len() * width as usize);

    for (value, span) in &resolved.values {
        if *value < lo || *value > hi {
            return Err(RangeError { value: *value, width, span: span.clone() });
        }
        let raw = (*value as u64).to_le_bytes();
        bytes.extend_from_slice(&raw[..width as usize]);
    }

    Ok(bytes)
}

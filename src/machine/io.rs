//! The abstract byte-in / integer-out channel consumed by the execution loop
//!
//! This is a thin seam, not a protocol: terminal byte I/O plumbing is an
//! external collaborator per spec.md, so the only job here is to give the
//! execution loop two traits to call through, plus the minimal concrete
//! adapters the CLI binaries need to actually run a program.

use std::io::{Read, Write};

/// A source of input bytes for the `in` trap. `None` signals exhaustion.
pub trait InputSource {
    fn read_byte(&mut self) -> Option<u8>;
}

/// A sink for output values produced by the `out` trap.
pub trait OutputSink {
    fn write_cell(&mut self, value: i64);
}

/// An in-memory input source, primarily for tests.
pub struct VecInput {
    bytes: Vec<u8>,
    pos: usize,
}

impl VecInput {
    pub fn new(bytes: Vec<u8>) -> VecInput {
        VecInput { bytes, pos: 0 }
    }
}

impl InputSource for VecInput {
    fn read_byte(&mut self) -> Option<u8> {
        let byte = self.bytes.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }
}

/// An in-memory output sink, primarily for tests.
#[derive(Default)]
pub struct VecOutput {
    pub values: Vec<i64>,
}

impl OutputSink for VecOutput {
    fn write_cell(&mut self, value: i64) {
        self.values.push(value);
    }
}

/// Reads input bytes from any `Read`, implementing the
/// `--null-terminate-input` policy: once the underlying reader is
/// exhausted, emit a single `\0` byte if null-termination is enabled and
/// it has not yet been emitted, then report exhaustion on every
/// subsequent call.
pub struct ReaderInput<R: Read> {
    reader: R,
    null_terminate: bool,
    null_emitted: bool,
}

impl<R: Read> ReaderInput<R> {
    pub fn new(reader: R, null_terminate: bool) -> ReaderInput<R> {
        ReaderInput { reader, null_terminate, null_emitted: false }
    }
}

impl<R: Read> InputSource for ReaderInput<R> {
    fn read_byte(&mut self) -> Option<u8> {
        let mut buf = [0u8; 1];
        match self.reader.read(&mut buf) {
            Ok(1) => Some(buf[0]),
            _ => {
                if self.null_terminate && !self.null_emitted {
                    self.null_emitted = true;
                    Some(0)
                } else {
                    None
                }
            }
        }
    }
}

/// How a `WriterOutput` renders each emitted cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Decimal text, one value per line (`value`, then `\n`).
    Decimal,
    /// One raw ASCII byte per cell (`value` truncated to its low 8 bits).
    Ascii,
}

/// Writes output cells to any `Write`, per `--ascii`.
pub struct WriterOutput<W: Write> {
    writer: W,
    mode: RenderMode,
}

impl<W: Write> WriterOutput<W> {
    pub fn new(writer: W, mode: RenderMode) -> WriterOutput<W> {
        WriterOutput { writer, mode }
    }
}

impl<W: Write> OutputSink for WriterOutput<W> {
    fn write_cell(&mut self, value: i64) {
        match self.mode {
            RenderMode::Decimal => {
                let _ = writeln!(self.writer, "{}", value);
            }
            RenderMode::Ascii => {
                let _ = self.writer.write_all(&[value as u8]);
            }
        }
    }
}

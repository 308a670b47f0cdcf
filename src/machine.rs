//! The SUBLEQ execution engine: memory image, fetch-decode-execute loop,
//! and the I/O adapter traits the CLI binaries plug stdio into.

pub mod core;
pub mod io;

pub use core::{wrap_to_width, Fault, Machine, StepResult};
pub use io::{InputSource, OutputSink, ReaderInput, RenderMode, VecInput, VecOutput, WriterOutput};

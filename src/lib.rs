//! A SUBLEQ one-instruction-set-computer toolchain, featuring:
//! - an assembler that lowers a small macro-assembly language to a flat binary
//! - an emulator that executes the resulting binary via the SUBLEQ fetch-decode-execute cycle

pub mod assembler;
pub mod logging;
pub mod machine;

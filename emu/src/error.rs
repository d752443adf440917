use std::io;

use arch::image::ImageError;
use thiserror::Error;

/// Condition that halts the machine. There is no recoverable tier.
#[derive(Error, Debug)]
pub enum Fault {
    #[error("Unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),

    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Stack overflow ({0} cells)")]
    StackOverflow(usize),

    #[error("Program counter 0x{0:08X} is outside memory")]
    PcOutOfBounds(u32),

    #[error("Access of {len} byte(s) at 0x{addr:08X} is outside memory")]
    OutOfBounds { addr: u32, len: usize },

    #[error("Division by zero")]
    DivideByZero,

    #[error("Input buffer of {0} byte(s) is too small")]
    BufferTooSmall(i32),

    #[error("Console I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("Step limit of {0} exceeded")]
    TimeLimit(u64),
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to open file: {0}")]
    Open(String, #[source] io::Error),

    #[error("Invalid image: {0}")]
    Image(#[from] ImageError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to open file: {0}")]
    Open(String, #[source] io::Error),

    #[error("Failed to parse {0}: {1}")]
    Parse(String, #[source] serde_yaml::Error),
}

//! Error taxonomy.
//!
//! Runtime errors terminate the run loop; loader errors abort before the VM
//! starts; driver errors are logged and never fatal.

use thiserror::Error;

/// A single failed instruction, carrying everything needed to render
/// "executing NAME op0 op1 op2 at FFFFFFFF".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedInstruction {
    pub name: &'static str,
    pub operands: Vec<u32>,
    pub finger: u32,
}

impl std::fmt::Display for FailedInstruction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ops = self
            .operands
            .iter()
            .map(u32::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        write!(f, "executing {} {} at {:08x}", self.name, ops, self.finger)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VmError {
    #[error("divide by zero ({0})")]
    DivideByZero(FailedInstruction),

    #[error("output byte out of range ({0})")]
    OutOfRange(FailedInstruction),

    #[error("failed to write output ({0}): {1}")]
    OutputFailed(FailedInstruction, String),

    #[error("unknown array ({0})")]
    UnknownArray(FailedInstruction),

    #[error("cannot free array 0 ({0})")]
    FreeArrayZero(FailedInstruction),

    #[error("array index out of bounds ({0})")]
    IndexOutOfBounds(FailedInstruction),

    #[error("invalid opcode {op} at {finger:08x}")]
    InvalidOpcode { op: u32, finger: u32 },

    #[error("invalid finger position {0:08x}")]
    InvalidFinger(u32),
}

#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("program size {0} is not a multiple of 4")]
    SizeNotMultipleOfFour(usize),

    #[error("invalid magic marker in state file")]
    BadMagic,

    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u8),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A driver failure. Never fatal: the caller logs it via [`log::warn!`] and
/// falls back to interactive input.
#[derive(Error, Debug)]
#[error("driver error: {0}")]
pub struct DriverError(pub String);

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        DriverError(message.into())
    }
}

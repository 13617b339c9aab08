//! Core of a Universal Machine: a 14-opcode register machine over
//! dynamically allocated 32-bit word arrays, with a pre-decoded
//! instruction cache, a multiplexed character I/O channel, a versioned
//! snapshot codec, and an embeddable driver channel for automated input.

#[macro_use]
extern crate log;

pub mod array;
pub mod bitops;
pub mod cache;
pub mod command;
pub mod decode;
pub mod driver;
pub mod error;
pub mod io;
pub mod loader;
pub mod machine;
pub mod snapshot;

pub use array::{Array, ArrayStore};
pub use command::CommandOutcome;
pub use decode::{Instruction, Reg};
pub use driver::{Driver, DriverFactory, DriverRegistry, Logger};
pub use error::{DriverError, FailedInstruction, LoaderError, VmError};
pub use io::{IoChannel, OutputSink, Terminal};
pub use loader::{load_program_file, words_from_bytes};
pub use machine::{Machine, StepOutcome};
pub use snapshot::Snapshot;

//! Compile flat I2C token sequences into multi-segment bus transactions
//!
//! A sequence such as `0x38 0x16 restart 0x39 read*3` describes a write of
//! register `0x16` to device `0x1c` followed by a repeated start and a
//! three-byte read. [`compiler`] turns it into transfer descriptors and
//! [`bus`] transports execute them as one atomic transaction.

pub mod bus;
pub mod compiler;
pub mod config;
pub mod notation;
pub mod orchestrator;
pub mod sequence;
pub mod token;

pub use compiler::{
    CompileError, CompileOptions, EmptySegmentPolicy, MAX_SEGMENTS, MIN_SEQUENCE_LENGTH,
    SequenceCompiler, Transaction, TransferDescriptor, compile,
};
pub use orchestrator::{SendError, send_sequence};
pub use token::{Address, Direction, Token};

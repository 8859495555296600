//! Bus transports that execute compiled transactions
//!
//! A transport receives the ordered message list of one
//! [`Transaction`](crate::compiler::Transaction) and must issue it as a single
//! atomic transfer: one START, one STOP, and repeated starts between segments
//! so the bus is never released mid-transaction.

use std::{io, path::PathBuf};

use thiserror::Error;

use crate::token::{Address, Direction};

#[cfg(target_os = "linux")]
pub mod linux;
pub mod memory;

#[cfg(target_os = "linux")]
pub use linux::{DeviceError, I2cDevice};
pub use memory::{MemoryBus, RegisterDevice};

/// Path of the `i2c-dev` node for a bus number
pub fn device_path(bus: u8) -> PathBuf {
    PathBuf::from(format!("/dev/i2c-{bus}"))
}

/// One segment handed to a transport
#[derive(Debug)]
pub struct Message<'a> {
    pub address: Address,
    pub op: Operation<'a>,
}

/// Payload of a message
#[derive(Debug)]
pub enum Operation<'a> {
    /// Bytes to transmit
    Write(&'a [u8]),
    /// Buffer to fill with received bytes
    Read(&'a mut [u8]),
}

impl Message<'_> {
    pub fn direction(&self) -> Direction {
        match self.op {
            Operation::Write(_) => Direction::Write,
            Operation::Read(_) => Direction::Read,
        }
    }

    pub fn len(&self) -> usize {
        match &self.op {
            Operation::Write(bytes) => bytes.len(),
            Operation::Read(buffer) => buffer.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Failures reported by a transport
#[derive(Debug, Error)]
pub enum BusError {
    #[error("bus I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("no acknowledge from device at address {address}")]
    NoAcknowledge { address: Address },

    #[error("message #{index} is {len} bytes, longer than the driver accepts")]
    MessageTooLong { index: usize, len: usize },

    #[error("transaction has {count} messages, the driver accepts at most {max}")]
    TooManyMessages { count: usize, max: usize },
}

/// Executes an ordered message list as one bus transaction
pub trait BusTransport {
    /// Transfer every message in order, returning how many were transferred
    fn transfer(&mut self, messages: &mut [Message<'_>]) -> Result<usize, BusError>;
}

impl<T: BusTransport + ?Sized> BusTransport for &mut T {
    fn transfer(&mut self, messages: &mut [Message<'_>]) -> Result<usize, BusError> {
        (**self).transfer(messages)
    }
}

impl<T: BusTransport + ?Sized> BusTransport for Box<T> {
    fn transfer(&mut self, messages: &mut [Message<'_>]) -> Result<usize, BusError> {
        (**self).transfer(messages)
    }
}

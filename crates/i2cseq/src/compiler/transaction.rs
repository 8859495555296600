//! Compiled transactions and their transfer descriptors

use std::{fmt::Write as _, ops::Range};

use crate::{
    bus::{Message, Operation},
    token::{Address, Direction},
};

/// Where a descriptor's bytes live
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataRef {
    /// Range into the transaction's scratch write buffer
    Write(Range<usize>),
    /// Range into the caller's receive buffer
    Read(Range<usize>),
}

impl DataRef {
    pub fn range(&self) -> Range<usize> {
        match self {
            Self::Write(range) | Self::Read(range) => range.clone(),
        }
    }
}

/// One segment of a transaction, as the bus driver sees it
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransferDescriptor {
    pub address: Address,
    pub direction: Direction,
    pub len: usize,
    pub data: DataRef,
}

/// The output of [`SequenceCompiler::compile`](super::SequenceCompiler::compile)
///
/// Owns the scratch write buffer and the descriptor list for exactly one
/// transfer, and borrows the caller's receive buffer until it is dropped.
#[derive(Debug)]
pub struct Transaction<'buf> {
    descriptors: Vec<TransferDescriptor>,
    write_buffer: Vec<u8>,
    receive_buffer: &'buf mut [u8],
}

impl<'buf> Transaction<'buf> {
    pub(crate) fn new(
        descriptors: Vec<TransferDescriptor>,
        write_buffer: Vec<u8>,
        receive_buffer: &'buf mut [u8],
    ) -> Self {
        Self {
            descriptors,
            write_buffer,
            receive_buffer,
        }
    }

    /// Descriptors in execution order
    pub fn descriptors(&self) -> &[TransferDescriptor] {
        &self.descriptors
    }

    /// Number of segments
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// All bytes written by the transaction, in order
    pub fn write_buffer(&self) -> &[u8] {
        &self.write_buffer
    }

    /// Total bytes the transaction reads
    pub fn read_len(&self) -> usize {
        self.descriptors
            .iter()
            .filter_map(|descriptor| match &descriptor.data {
                DataRef::Read(range) => Some(range.end),
                DataRef::Write(_) => None,
            })
            .max()
            .unwrap_or(0)
    }

    /// Bytes a write descriptor transmits; `None` for reads
    pub fn write_data(&self, descriptor: &TransferDescriptor) -> Option<&[u8]> {
        match &descriptor.data {
            DataRef::Write(range) => self.write_buffer.get(range.clone()),
            DataRef::Read(_) => None,
        }
    }

    /// The portion of the receive buffer covered by read segments
    pub fn received(&self) -> &[u8] {
        &self.receive_buffer[..self.read_len()]
    }

    /// Split the buffers into one message per descriptor, in order
    ///
    /// Read messages borrow disjoint, consecutive slices of the receive buffer.
    pub fn messages(&mut self) -> Vec<Message<'_>> {
        let Self {
            descriptors,
            write_buffer,
            receive_buffer,
        } = self;

        let write_buffer: &[u8] = write_buffer;
        let mut unclaimed: &mut [u8] = &mut receive_buffer[..];
        let mut messages = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors.iter() {
            let op = match &descriptor.data {
                DataRef::Write(range) => Operation::Write(&write_buffer[range.clone()]),
                DataRef::Read(range) => {
                    let (claimed, rest) = std::mem::take(&mut unclaimed).split_at_mut(range.len());
                    unclaimed = rest;
                    Operation::Read(claimed)
                }
            };
            messages.push(Message {
                address: descriptor.address,
                op,
            });
        }

        messages
    }

    /// Human-readable listing, one descriptor per line
    pub fn describe(&self) -> String {
        let mut out = String::new();
        for (ordinal, descriptor) in self.descriptors.iter().enumerate() {
            let _ = write!(
                out,
                "#{ordinal} {} {} len={} ",
                descriptor.direction.tag(),
                descriptor.address,
                descriptor.len
            );
            match &descriptor.data {
                DataRef::Write(range) => {
                    out.push('[');
                    out.push_str(&hex_bytes(&self.write_buffer[range.clone()]));
                    out.push(']');
                }
                DataRef::Read(range) => {
                    let _ = write!(out, "rx[{}..{}]", range.start, range.end);
                }
            }
            out.push('\n');
        }
        out
    }
}

/// Space-separated lowercase hex
pub fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{byte:02x}");
    }
    out
}

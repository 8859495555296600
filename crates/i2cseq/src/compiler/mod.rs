//! Sequence compiler that turns a flat token stream into transfer descriptors
//!
//! The compiler is a pure function of its inputs. It walks the tokens once,
//! splitting them into segments at every RESTART, appending written bytes to a
//! scratch buffer and assigning each read segment the next slice of the caller's
//! receive buffer. The result is a [`Transaction`] that a
//! [`BusTransport`](crate::bus::BusTransport) can execute as one atomic
//! multi-segment transfer.

use log::{debug, trace, warn};
use thiserror::Error;

use crate::token::{Address, Direction, Token, TokenError, decode_wire};

pub mod transaction;


pub use transaction::{DataRef, Transaction, TransferDescriptor};

/// Driver-imposed ceiling on the number of segments in one transaction
pub const MAX_SEGMENTS: usize = 42;

/// An address byte plus at least one more token
pub const MIN_SEQUENCE_LENGTH: usize = 2;

/// What to do with a segment that carries no data bytes and no reads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EmptySegmentPolicy {
    /// Emit a zero-length descriptor and log a warning
    #[default]
    Allow,
    /// Fail with [`CompileError::EmptySegment`]
    Reject,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    pub empty_segments: EmptySegmentPolicy,
}

/// Errors detected while compiling a sequence
///
/// Every variant is raised before a [`Transaction`] exists, so a failed
/// compile never exposes partial work.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("sequence has {len} token(s), at least {MIN_SEQUENCE_LENGTH} are required")]
    SequenceTooShort { len: usize },

    #[error("sequence has {segments} segments, the bus driver accepts at most {max}")]
    TooManySegments { segments: usize, max: usize },

    #[error("expected an address byte at index {index}")]
    MissingAddress { index: usize },

    #[error("token {token} at index {index} does not belong in {direction} segment #{segment}")]
    MixedDirection {
        index: usize,
        segment: usize,
        direction: Direction,
        token: Token,
    },

    #[error("segment #{segment} transfers no data")]
    EmptySegment { segment: usize },

    #[error("receive buffer holds {available} byte(s) but the sequence reads {required}")]
    ReceiveBufferTooSmall { required: usize, available: usize },

    #[error(transparent)]
    Token(#[from] TokenError),
}

/// Stateless compiler from token sequences to transactions
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceCompiler {
    options: CompileOptions,
}

/// The segment currently being accumulated
#[derive(Debug)]
struct OpenSegment {
    address: Address,
    direction: Direction,
    /// Offset into the write buffer or the receive buffer, depending on direction
    start: usize,
    len: usize,
}

impl SequenceCompiler {
    pub fn new(options: CompileOptions) -> Self {
        Self { options }
    }

    /// Compile `tokens` into a transaction whose reads land in `receive_buffer`
    ///
    /// Read segments claim consecutive slices of `receive_buffer` starting at
    /// offset 0, so it must hold at least as many bytes as there are READ
    /// tokens in the sequence.
    pub fn compile<'buf>(
        &self,
        tokens: &[Token],
        receive_buffer: &'buf mut [u8],
    ) -> Result<Transaction<'buf>, CompileError> {
        if tokens.len() < MIN_SEQUENCE_LENGTH {
            return Err(CompileError::SequenceTooShort { len: tokens.len() });
        }

        let segments = count_segments(tokens);
        if segments > MAX_SEGMENTS {
            return Err(CompileError::TooManySegments {
                segments,
                max: MAX_SEGMENTS,
            });
        }

        // Upper bound: every token after the first could be a written byte
        let mut write_buffer = Vec::with_capacity(tokens.len());
        let mut descriptors = Vec::with_capacity(segments);
        let mut read_cursor = 0;

        let mut segment = open_segment(tokens, 0, 0, 0)?;
        let mut index = 1;

        while index < tokens.len() {
            match (tokens[index], segment.direction) {
                (Token::Restart, _) => {
                    descriptors.push(self.close_segment(
                        segment,
                        descriptors.len(),
                        &mut read_cursor,
                    )?);

                    // The token after a restart always addresses the next segment
                    index += 1;
                    segment = open_segment(tokens, index, write_buffer.len(), read_cursor)?;
                }
                (Token::Byte(byte), Direction::Write) => {
                    write_buffer.push(byte);
                    segment.len += 1;
                }
                (Token::Read, Direction::Read) => {
                    segment.len += 1;
                }
                (token, direction) => {
                    return Err(CompileError::MixedDirection {
                        index,
                        segment: descriptors.len(),
                        direction,
                        token,
                    });
                }
            }
            index += 1;
        }

        descriptors.push(self.close_segment(segment, descriptors.len(), &mut read_cursor)?);

        if read_cursor > receive_buffer.len() {
            return Err(CompileError::ReceiveBufferTooSmall {
                required: read_cursor,
                available: receive_buffer.len(),
            });
        }

        debug!(
            "Compiled {} tokens into {} segment(s): {} byte(s) written, {} byte(s) read",
            tokens.len(),
            descriptors.len(),
            write_buffer.len(),
            read_cursor
        );

        Ok(Transaction::new(descriptors, write_buffer, receive_buffer))
    }

    /// Decode a `u16` wire sequence and compile it
    pub fn compile_wire<'buf>(
        &self,
        values: &[u16],
        receive_buffer: &'buf mut [u8],
    ) -> Result<Transaction<'buf>, CompileError> {
        let tokens = decode_wire(values)?;
        self.compile(&tokens, receive_buffer)
    }

    fn close_segment(
        &self,
        segment: OpenSegment,
        ordinal: usize,
        read_cursor: &mut usize,
    ) -> Result<TransferDescriptor, CompileError> {
        if segment.len == 0 {
            match self.options.empty_segments {
                EmptySegmentPolicy::Reject => {
                    return Err(CompileError::EmptySegment { segment: ordinal });
                }
                EmptySegmentPolicy::Allow => {
                    warn!(
                        "Segment #{ordinal} to {} has no data, emitting a zero-length {} descriptor",
                        segment.address, segment.direction
                    );
                }
            }
        }

        let range = segment.start..segment.start + segment.len;
        let data = match segment.direction {
            Direction::Write => DataRef::Write(range),
            Direction::Read => {
                *read_cursor = range.end;
                DataRef::Read(range)
            }
        };

        let descriptor = TransferDescriptor {
            address: segment.address,
            direction: segment.direction,
            len: segment.len,
            data,
        };
        trace!("Segment #{ordinal}: {descriptor:?}");
        Ok(descriptor)
    }
}

/// Compile with the default options
pub fn compile<'buf>(
    tokens: &[Token],
    receive_buffer: &'buf mut [u8],
) -> Result<Transaction<'buf>, CompileError> {
    SequenceCompiler::default().compile(tokens, receive_buffer)
}

/// Number of segments a sequence splits into
pub fn count_segments(tokens: &[Token]) -> usize {
    1 + tokens.iter().filter(|token| token.is_restart()).count()
}

/// Total number of READ tokens, i.e. the receive buffer size a sequence needs
pub fn read_len(tokens: &[Token]) -> usize {
    tokens.iter().filter(|token| token.is_read()).count()
}

fn open_segment(
    tokens: &[Token],
    index: usize,
    write_offset: usize,
    read_offset: usize,
) -> Result<OpenSegment, CompileError> {
    let Some(byte) = tokens.get(index).and_then(|token| token.as_byte()) else {
        return Err(CompileError::MissingAddress { index });
    };
    let (address, direction) = Address::from_address_byte(byte);
    let start = match direction {
        Direction::Write => write_offset,
        Direction::Read => read_offset,
    };
    Ok(OpenSegment {
        address,
        direction,
        start,
        len: 0,
    })
}

//! Compile-then-transfer round trip
//!
//! This is the only place the compiler and a transport meet. Transport errors
//! pass through untouched and nothing is retried.

use log::{debug, info};
use thiserror::Error;

use crate::{
    bus::{BusError, BusTransport},
    compiler::{CompileError, CompileOptions, SequenceCompiler, Transaction},
    token::{Token, decode_wire},
};

#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Bus(#[from] BusError),
}

/// Compile `tokens` and execute them on `transport` as one transaction
///
/// Reads land in `receive_buffer` in sequence order. Returns the number of
/// segments the transport reports as transferred.
pub fn send_sequence<T>(
    transport: &mut T,
    tokens: &[Token],
    receive_buffer: &mut [u8],
    options: CompileOptions,
) -> Result<usize, SendError>
where
    T: BusTransport + ?Sized,
{
    let mut transaction = SequenceCompiler::new(options).compile(tokens, receive_buffer)?;
    execute(transport, &mut transaction)
}

/// Same as [`send_sequence`] for a `u16` wire-encoded sequence
pub fn send_wire<T>(
    transport: &mut T,
    values: &[u16],
    receive_buffer: &mut [u8],
    options: CompileOptions,
) -> Result<usize, SendError>
where
    T: BusTransport + ?Sized,
{
    let tokens = decode_wire(values).map_err(CompileError::from)?;
    send_sequence(transport, &tokens, receive_buffer, options)
}

/// Hand an already compiled transaction to a transport
pub fn execute<T>(transport: &mut T, transaction: &mut Transaction<'_>) -> Result<usize, SendError>
where
    T: BusTransport + ?Sized,
{
    let mut messages = transaction.messages();
    debug!("Executing transaction with {} segment(s)", messages.len());

    let transferred = transport.transfer(&mut messages)?;
    info!("Transferred {transferred} segment(s)");
    Ok(transferred)
}

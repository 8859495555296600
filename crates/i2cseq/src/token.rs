//! Token model for flat I2C sequences
//!
//! A sequence is a flat list of tokens: literal bytes plus two sentinels marking
//! a repeated start and a single-byte read. On the wire every token is a `u16`,
//! which keeps the sentinels out of the 0-255 data range so they can never be
//! mistaken for a byte.

use std::fmt;

use thiserror::Error;

/// Wire value of the RESTART sentinel
pub const WIRE_RESTART: u16 = 1 << 8;

/// Wire value of the READ sentinel
pub const WIRE_READ: u16 = 2 << 8;

/// One element of a token sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Token {
    /// A literal byte. When it opens a segment it is the address byte.
    Byte(u8),
    /// Repeated start: closes the current segment without releasing the bus
    Restart,
    /// Read one byte from the currently addressed device
    Read,
}

/// Errors raised while decoding tokens or addresses
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("wire value 0x{value:04x} is neither a byte nor a known sentinel")]
    UnknownWireValue { value: u16 },

    #[error("wire value 0x{value:04x} at index {index} is neither a byte nor a known sentinel")]
    InvalidToken { index: usize, value: u16 },

    #[error("0x{0:02x} is not a 7-bit I2C address")]
    AddressOutOfRange(u8),
}

impl Token {
    /// Decode a single wire value
    pub fn from_wire(value: u16) -> Result<Self, TokenError> {
        match value {
            0..=0xff => Ok(Self::Byte(value as u8)),
            WIRE_RESTART => Ok(Self::Restart),
            WIRE_READ => Ok(Self::Read),
            _ => Err(TokenError::UnknownWireValue { value }),
        }
    }

    /// Encode this token in the `u16` wire representation
    pub const fn to_wire(self) -> u16 {
        match self {
            Self::Byte(byte) => byte as u16,
            Self::Restart => WIRE_RESTART,
            Self::Read => WIRE_READ,
        }
    }

    /// The literal byte carried by this token, if any
    pub const fn as_byte(self) -> Option<u8> {
        match self {
            Self::Byte(byte) => Some(byte),
            Self::Restart | Self::Read => None,
        }
    }

    pub const fn is_restart(self) -> bool {
        matches!(self, Self::Restart)
    }

    pub const fn is_read(self) -> bool {
        matches!(self, Self::Read)
    }
}

impl From<u8> for Token {
    fn from(byte: u8) -> Self {
        Self::Byte(byte)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Byte(byte) => write!(f, "0x{byte:02x}"),
            Self::Restart => f.write_str("restart"),
            Self::Read => f.write_str("read"),
        }
    }
}

/// Decode a whole wire-encoded sequence, reporting the first bad index
pub fn decode_wire(values: &[u16]) -> Result<Vec<Token>, TokenError> {
    values
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            Token::from_wire(value).map_err(|_| TokenError::InvalidToken { index, value })
        })
        .collect()
}

/// Encode tokens back into their wire representation
pub fn encode_wire(tokens: &[Token]) -> Vec<u16> {
    tokens.iter().map(|token| token.to_wire()).collect()
}

/// Transfer direction, carried in bit 0 of an address byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Write,
    Read,
}

impl Direction {
    /// Direction encoded in the low bit of an address byte
    pub const fn from_address_byte(byte: u8) -> Self {
        if byte & 1 == 0 { Self::Write } else { Self::Read }
    }

    pub const fn bit(self) -> u8 {
        match self {
            Self::Write => 0,
            Self::Read => 1,
        }
    }

    /// Single-letter tag used in transaction listings
    pub const fn tag(self) -> char {
        match self {
            Self::Write => 'W',
            Self::Read => 'R',
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Write => f.write_str("write"),
            Self::Read => f.write_str("read"),
        }
    }
}

/// A 7-bit I2C target address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(u8);

impl Address {
    /// Highest valid 7-bit address
    pub const MAX: u8 = 0x7f;

    pub const fn new(raw: u8) -> Result<Self, TokenError> {
        if raw > Self::MAX {
            return Err(TokenError::AddressOutOfRange(raw));
        }
        Ok(Self(raw))
    }

    /// Split an address byte into the 7-bit address and its direction flag
    pub const fn from_address_byte(byte: u8) -> (Self, Direction) {
        (Self(byte >> 1), Direction::from_address_byte(byte))
    }

    /// Pack this address and a direction into an address byte
    pub const fn address_byte(self, direction: Direction) -> u8 {
        (self.0 << 1) | direction.bit()
    }

    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Address {
    type Error = TokenError;

    fn try_from(raw: u8) -> Result<Self, Self::Error> {
        Self::new(raw)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

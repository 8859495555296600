//! Builder pattern for constructing token sequences
//!
//! Packing address bytes and placing restarts by hand is error-prone; the
//! builder takes 7-bit addresses and inserts a RESTART between segments.

use crate::token::{Address, Direction, Token};

/// Builder for incrementally constructing a token sequence
#[derive(Debug, Clone, Default)]
pub struct SequenceBuilder {
    tokens: Vec<Token>,
}

impl SequenceBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a write segment transmitting `bytes` to `address`
    pub fn write(&mut self, address: Address, bytes: &[u8]) -> &mut Self {
        self.begin_segment(address, Direction::Write);
        self.tokens.extend(bytes.iter().copied().map(Token::Byte));
        self
    }

    /// Add a read segment receiving `count` bytes from `address`
    pub fn read(&mut self, address: Address, count: usize) -> &mut Self {
        self.begin_segment(address, Direction::Read);
        self.tokens.extend(std::iter::repeat_n(Token::Read, count));
        self
    }

    /// Register read: write `register`, restart, read `count` bytes
    pub fn read_register(&mut self, address: Address, register: u8, count: usize) -> &mut Self {
        self.write(address, &[register]).read(address, count)
    }

    /// Tokens added so far
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Build the final sequence
    pub fn build(self) -> Vec<Token> {
        self.tokens
    }

    fn begin_segment(&mut self, address: Address, direction: Direction) {
        if !self.tokens.is_empty() {
            self.tokens.push(Token::Restart);
        }
        self.tokens.push(Token::Byte(address.address_byte(direction)));
    }
}

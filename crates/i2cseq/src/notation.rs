//! Text notation for token sequences
//!
//! Sequences are written as words separated by whitespace or commas:
//!
//! ```text
//! 0x38 0x16 restart 0x39 read*3   # query three registers
//! ```
//!
//! Numbers may be hex (`0x38`), binary (`0b0011_1000`) or decimal (`56`).
//! `restart`/`rs` and `read`/`rd` are the sentinels, and `WORD*N` repeats a
//! word N times. `#` starts a comment running to the end of the line.

use std::iter;

use thiserror::Error;

use crate::token::Token;

/// Largest `WORD*N` repeat count, the longest message an `i2c_msg` can carry
pub const MAX_REPEAT: usize = u16::MAX as usize;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NotationError {
    #[error("word {position} `{text}` is not a number, `restart` or `read`")]
    UnknownWord { position: usize, text: String },

    #[error("word {position} `{text}` is out of byte range (0-255)")]
    ByteOutOfRange { position: usize, text: String },

    #[error("word {position} `{text}` has an invalid repeat count")]
    InvalidRepeat { position: usize, text: String },
}

/// Parse a sequence written in text notation
pub fn parse_sequence(text: &str) -> Result<Vec<Token>, NotationError> {
    let mut tokens = Vec::new();

    let words = text
        .lines()
        .map(|line| line.split_once('#').map_or(line, |(code, _)| code))
        .flat_map(|line| line.split(|c: char| c.is_whitespace() || c == ','))
        .filter(|word| !word.is_empty());

    for (i, word) in words.enumerate() {
        let position = i + 1;
        let (head, repeat) = match word.split_once('*') {
            Some((head, repeat)) => (head, Some(repeat)),
            None => (word, None),
        };

        let token = parse_word(head).map_err(|kind| kind.into_error(position, word))?;
        let count = match repeat {
            None => 1,
            Some(repeat) => parse_number(repeat)
                .and_then(|count| usize::try_from(count).ok())
                .filter(|&count| (1..=MAX_REPEAT).contains(&count))
                .ok_or_else(|| NotationError::InvalidRepeat {
                    position,
                    text: word.to_owned(),
                })?,
        };
        tokens.extend(iter::repeat_n(token, count));
    }

    Ok(tokens)
}

/// Render tokens in canonical notation, folding runs of reads into `read*N`
pub fn format_sequence(tokens: &[Token]) -> String {
    let mut words = Vec::new();
    let mut index = 0;

    while index < tokens.len() {
        let token = tokens[index];
        if token.is_read() {
            let run = tokens[index..].iter().take_while(|t| t.is_read()).count();
            if run > 1 {
                words.push(format!("read*{run}"));
            } else {
                words.push(token.to_string());
            }
            index += run;
        } else {
            words.push(token.to_string());
            index += 1;
        }
    }

    words.join(" ")
}

#[derive(Debug)]
enum WordError {
    Unknown,
    OutOfRange,
}

impl WordError {
    fn into_error(self, position: usize, text: &str) -> NotationError {
        let text = text.to_owned();
        match self {
            Self::Unknown => NotationError::UnknownWord { position, text },
            Self::OutOfRange => NotationError::ByteOutOfRange { position, text },
        }
    }
}

fn parse_word(word: &str) -> Result<Token, WordError> {
    match word.to_ascii_lowercase().as_str() {
        "restart" | "rs" => return Ok(Token::Restart),
        "read" | "rd" => return Ok(Token::Read),
        _ => {}
    }

    let value = parse_number(word).ok_or(WordError::Unknown)?;
    u8::try_from(value)
        .map(Token::Byte)
        .map_err(|_| WordError::OutOfRange)
}

fn parse_number(word: &str) -> Option<u64> {
    let word = word.replace('_', "");
    let lower = word.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        u64::from_str_radix(hex, 16).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u64::from_str_radix(bin, 2).ok()
    } else {
        lower.parse().ok()
    }
}

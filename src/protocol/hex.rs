//! Hex payload helpers.
//!
//! The gateway accepts `tx_hex` with optional space, comma or colon
//! separators between byte pairs, and reports `rx_hex` as upper-case
//! pairs separated by single spaces (`"0A 1B FF"`).

use core::fmt;

/// Why a hex string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HexError {
    /// A character that is neither a hex digit nor a separator.
    InvalidDigit(char),
    /// An odd number of hex digits (dangling nibble).
    OddLength,
}

impl fmt::Display for HexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDigit(c) => write!(f, "invalid hex digit {c:?}"),
            Self::OddLength => write!(f, "odd number of hex digits"),
        }
    }
}

fn is_separator(c: char) -> bool {
    c == ',' || c == ':' || c.is_ascii_whitespace()
}

/// Decode a separated hex string into bytes.
pub fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, HexError> {
    let mut out = Vec::with_capacity(s.len() / 2);
    let mut high: Option<u8> = None;

    for c in s.chars() {
        if is_separator(c) {
            continue;
        }
        let nibble = c.to_digit(16).ok_or(HexError::InvalidDigit(c))? as u8;
        match high.take() {
            None => high = Some(nibble),
            Some(h) => out.push((h << 4) | nibble),
        }
    }

    if high.is_some() {
        return Err(HexError::OddLength);
    }
    Ok(out)
}

/// Format bytes the way the gateway reports them.
pub fn to_hex_line(data: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut s = String::with_capacity(data.len() * 3);
    for (i, b) in data.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        s.push(DIGITS[(b >> 4) as usize] as char);
        s.push(DIGITS[(b & 0x0F) as usize] as char);
    }
    s
}

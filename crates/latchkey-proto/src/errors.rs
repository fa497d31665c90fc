//! Protocol decoding errors.

use thiserror::Error;

/// Errors produced while decoding wire bytes or building codes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtoError {
    /// Byte is neither a digit nor a known opcode.
    #[error("unknown link byte 0x{0:02x}")]
    UnknownByte(u8),

    /// Digit value outside `0..=9`.
    #[error("digit out of range: {0}")]
    DigitOutOfRange(u8),

    /// Code did not contain exactly five digits.
    #[error("invalid code length: expected {expected}, got {actual}")]
    InvalidCodeLength {
        /// Required number of digits.
        expected: usize,
        /// Number of digits supplied.
        actual: usize,
    },

    /// Character in a textual code is not an ASCII digit.
    #[error("invalid code character {0:?}")]
    InvalidCharacter(char),
}

//! Single-byte link messages.

use std::fmt;

use crate::{
    code::{CODE_LENGTH, Code, Digit},
    errors::ProtoError,
    opcode::Opcode,
};

/// One byte on the link: an opcode or a payload digit.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkMessage {
    /// Control-plane opcode.
    Op(Opcode),
    /// Data-plane digit; only legal inside an `EnterDigits` payload.
    Digit(Digit),
}

impl LinkMessage {
    /// Decode a wire byte. Digits and opcodes never overlap, so no context is
    /// needed.
    pub fn decode(byte: u8) -> Result<Self, ProtoError> {
        if let Some(digit) = Digit::new(byte) {
            return Ok(Self::Digit(digit));
        }
        Opcode::from_u8(byte).map(Self::Op).ok_or(ProtoError::UnknownByte(byte))
    }

    /// Wire byte for this message.
    pub const fn to_byte(self) -> u8 {
        match self {
            Self::Op(op) => op.to_u8(),
            Self::Digit(digit) => digit.value(),
        }
    }

    /// The messages that carry a code: the `EnterDigits` marker followed by
    /// five digits.
    pub fn payload(code: &Code) -> [Self; CODE_LENGTH + 1] {
        let mut messages = [Self::Op(Opcode::EnterDigits); CODE_LENGTH + 1];
        for (slot, digit) in messages[1..].iter_mut().zip(code.digits()) {
            *slot = Self::Digit(*digit);
        }
        messages
    }

    /// Whether this message is the given opcode.
    pub fn is_op(self, op: Opcode) -> bool {
        self == Self::Op(op)
    }
}

impl From<Opcode> for LinkMessage {
    fn from(op: Opcode) -> Self {
        Self::Op(op)
    }
}

impl fmt::Debug for LinkMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Payload digits are credential material.
        match self {
            Self::Op(op) => write!(f, "{op:?}"),
            Self::Digit(_) => f.write_str("Digit(*)"),
        }
    }
}

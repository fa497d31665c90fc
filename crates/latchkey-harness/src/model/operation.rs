//! Operator operations for model-based testing.
//!
//! Generated by proptest (or `arbitrary` in the fuzzer) and applied to both
//! the model and a [`crate::LockstepPair`].

use arbitrary::Arbitrary;
use latchkey_panel::Key;
use latchkey_proto::{Code, Digit};

/// Codes the operator picks from.
///
/// A handful of values, two of them one digit apart, so that random
/// sequences hit both matches and near misses often.
const CODES: [[u8; 5]; 4] = [[1, 2, 3, 4, 5], [1, 2, 3, 4, 6], [0, 0, 0, 0, 0], [9, 8, 7, 6, 5]];

/// Index into a small fixed code book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub struct ModelCode(pub u8);

impl ModelCode {
    /// The code this index selects.
    pub fn code(self) -> Code {
        let values = CODES[usize::from(self.0) % CODES.len()];
        Code::new(values.map(|v| Digit::new(v).unwrap_or(Digit::ZERO)))
    }
}

/// What the operator can do at the keypad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Arbitrary)]
pub enum Operation {
    /// Type a full code and confirm it.
    EnterCode {
        /// Code typed.
        code: ModelCode,
    },

    /// Press `+`.
    SelectDoor,

    /// Press `-`.
    SelectChange,

    /// Press the confirm key on an empty entry.
    Confirm,

    /// Press a key that means nothing anywhere.
    Stray,
}

impl Operation {
    /// Keys this operation presses, in order.
    pub fn keys(self) -> Vec<Key> {
        match self {
            Self::EnterCode { code } => {
                let mut keys: Vec<Key> = code.code().digits().iter().copied().map(Key::Digit).collect();
                keys.push(Key::Enter);
                keys
            },
            Self::SelectDoor => vec![Key::Plus],
            Self::SelectChange => vec![Key::Minus],
            Self::Confirm => vec![Key::Enter],
            Self::Stray => vec![Key::Other(b'*')],
        }
    }
}

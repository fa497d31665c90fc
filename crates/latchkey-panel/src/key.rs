//! Keypad keys.

use latchkey_proto::Digit;

/// Keypad code of the confirm key.
pub const ENTER_CODE: u8 = 13;

/// One key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Digit key.
    Digit(Digit),
    /// Confirm key.
    Enter,
    /// `+`: open the door.
    Plus,
    /// `-`: change the password.
    Minus,
    /// Any other key; ignored.
    Other(u8),
}

impl Key {
    /// Decode a keypad scan code: `0..=9` for digits, 13 for confirm, ASCII
    /// `+` and `-` for the menu.
    pub fn from_keypad(code: u8) -> Self {
        if let Some(digit) = Digit::new(code) {
            return Self::Digit(digit);
        }
        match code {
            ENTER_CODE => Self::Enter,
            b'+' => Self::Plus,
            b'-' => Self::Minus,
            other => Self::Other(other),
        }
    }

    /// Decode a character from a host keyboard. `\n`, `\r` and `#` confirm.
    pub fn from_char(c: char) -> Self {
        if let Ok(digit) = Digit::try_from(c) {
            return Self::Digit(digit);
        }
        match c {
            '\n' | '\r' | '#' => Self::Enter,
            '+' => Self::Plus,
            '-' => Self::Minus,
            other => Self::Other(u8::try_from(other).unwrap_or(u8::MAX)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypad_codes() {
        assert_eq!(Key::from_keypad(7), Key::Digit(Digit::new(7).expect("7")));
        assert_eq!(Key::from_keypad(13), Key::Enter);
        assert_eq!(Key::from_keypad(b'+'), Key::Plus);
        assert_eq!(Key::from_keypad(b'-'), Key::Minus);
        assert_eq!(Key::from_keypad(b'*'), Key::Other(b'*'));
    }

    #[test]
    fn host_characters() {
        assert_eq!(Key::from_char('0'), Key::Digit(Digit::ZERO));
        assert_eq!(Key::from_char('\n'), Key::Enter);
        assert_eq!(Key::from_char('#'), Key::Enter);
        assert_eq!(Key::from_char('x'), Key::Other(b'x'));
    }
}

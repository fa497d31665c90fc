//! What the two-row display shows.

use std::fmt;

use latchkey_core::Gate;

/// A full display frame. Rendering replaces both rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Enrollment entry `entry` (1 or 2) with `filled` digits typed.
    EnrollPrompt {
        /// Entry number.
        entry: u8,
        /// Digits typed so far.
        filled: usize,
    },
    /// The two enrollment entries differed.
    EnrollMismatch,
    /// Main menu.
    Menu,
    /// Verification at a gate.
    GatePrompt {
        /// Gate being verified.
        gate: Gate,
        /// Attempt number.
        attempt: u8,
        /// Digits typed so far.
        filled: usize,
    },
    /// Waiting for the control node to answer.
    Checking,
    /// Motor opening the door.
    DoorOpening,
    /// Door open, waiting for the passage to clear.
    DoorOpen,
    /// Motor closing the door.
    DoorClosing,
    /// Attempts exhausted; alarm sounding.
    Lockdown,
}

impl Screen {
    /// Both display rows.
    pub fn rows(&self) -> (String, String) {
        match *self {
            Self::EnrollPrompt { entry: 1, filled } => ("Plz enter pass:".into(), mask(filled)),
            Self::EnrollPrompt { filled, .. } => ("Plz re-enter the".into(), format!("same pass: {}", mask(filled))),
            Self::EnrollMismatch => ("Passwords don't".into(), "match, try again".into()),
            Self::Menu => ("+ : Open Door".into(), "- : Change Pass".into()),
            Self::GatePrompt { gate, attempt, filled } => {
                let title = match gate {
                    Gate::Entry => "Enter pass:",
                    Gate::Door => "Confirm pass:",
                    Gate::Change => "Enter old pass:",
                };
                let row = if attempt > 1 { format!("{} try {attempt}", mask(filled)) } else { mask(filled) };
                (title.into(), row)
            },
            Self::Checking => ("Please wait".into(), String::new()),
            Self::DoorOpening => ("Door is".into(), "Unlocking".into()),
            Self::DoorOpen => ("Door is open".into(), "Come in".into()),
            Self::DoorClosing => ("Door is".into(), "Locking".into()),
            Self::Lockdown => ("ERROR".into(), "System locked".into()),
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (top, bottom) = self.rows();
        write!(f, "{top} | {bottom}")
    }
}

fn mask(filled: usize) -> String {
    "*".repeat(filled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_mask_digits() {
        let (_, row) = Screen::EnrollPrompt { entry: 1, filled: 3 }.rows();
        assert_eq!(row, "***");
        let (_, row) = Screen::GatePrompt { gate: Gate::Door, attempt: 2, filled: 5 }.rows();
        assert_eq!(row, "***** try 2");
    }
}

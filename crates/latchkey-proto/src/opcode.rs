//! Control-plane opcodes.
//!
//! The byte values are a wire-compatibility contract with deployed nodes and
//! must not be renumbered.

/// Control-plane opcode carried as a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Marks the start of a five-digit payload (panel → control).
    EnterDigits = 0x5A,
    /// Verification or enrollment succeeded (control → panel).
    VerifyOk = 0x5B,
    /// Verification or enrollment failed (control → panel).
    VerifyFail = 0x5C,
    /// Operator wants to change the password (panel → control).
    RequestChangeFlow = 0x4A,
    /// Operator wants to open the door (panel → control).
    RequestDoorFlow = 0x4B,
    /// Flow-scoped verification passed; run the door cycle (panel → control).
    BeginMotor = 0x3A,
    /// A physical step finished: door passage clear or alarm silenced
    /// (control → panel).
    Cleared = 0x3B,
    /// Attempts exhausted; raise the alarm (panel → control).
    Lockdown = 0x3C,
    /// Flow-scoped verification passed; accept a new enrollment
    /// (panel → control).
    ResetCredential = 0x4C,
    /// Verification failed but attempts remain (panel → control).
    Retry = 0x4D,
}

impl Opcode {
    /// All opcodes in wire order.
    pub const ALL: [Self; 10] = [
        Self::BeginMotor,
        Self::Cleared,
        Self::Lockdown,
        Self::RequestChangeFlow,
        Self::RequestDoorFlow,
        Self::ResetCredential,
        Self::Retry,
        Self::EnterDigits,
        Self::VerifyOk,
        Self::VerifyFail,
    ];

    /// Wire byte for this opcode.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Decode an opcode from its wire byte.
    pub const fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0x5A => Some(Self::EnterDigits),
            0x5B => Some(Self::VerifyOk),
            0x5C => Some(Self::VerifyFail),
            0x4A => Some(Self::RequestChangeFlow),
            0x4B => Some(Self::RequestDoorFlow),
            0x3A => Some(Self::BeginMotor),
            0x3B => Some(Self::Cleared),
            0x3C => Some(Self::Lockdown),
            0x4C => Some(Self::ResetCredential),
            0x4D => Some(Self::Retry),
            _ => None,
        }
    }

    /// Verdict opcode for a comparison result.
    pub const fn verdict(matched: bool) -> Self {
        if matched { Self::VerifyOk } else { Self::VerifyFail }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Digit;

    #[test]
    fn wire_values_are_stable() {
        assert_eq!(Opcode::EnterDigits.to_u8(), 0x5A);
        assert_eq!(Opcode::VerifyOk.to_u8(), 0x5B);
        assert_eq!(Opcode::VerifyFail.to_u8(), 0x5C);
        assert_eq!(Opcode::RequestChangeFlow.to_u8(), 0x4A);
        assert_eq!(Opcode::RequestDoorFlow.to_u8(), 0x4B);
        assert_eq!(Opcode::BeginMotor.to_u8(), 0x3A);
        assert_eq!(Opcode::Cleared.to_u8(), 0x3B);
        assert_eq!(Opcode::Lockdown.to_u8(), 0x3C);
        assert_eq!(Opcode::ResetCredential.to_u8(), 0x4C);
        assert_eq!(Opcode::Retry.to_u8(), 0x4D);
    }

    #[test]
    fn every_opcode_decodes_to_itself() {
        for op in Opcode::ALL {
            assert_eq!(Opcode::from_u8(op.to_u8()), Some(op));
        }
    }

    #[test]
    fn opcode_space_is_disjoint_from_digits() {
        for op in Opcode::ALL {
            assert_eq!(Digit::new(op.to_u8()), None, "{op:?} collides with a digit");
        }
    }

    #[test]
    fn reserved_bytes_are_not_opcodes() {
        // Reserved, never sent.
        assert_eq!(Opcode::from_u8(0x33), None);
        assert_eq!(Opcode::from_u8(0x34), None);
    }
}

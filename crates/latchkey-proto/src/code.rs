//! Digits and five-digit codes.

use std::{fmt, str::FromStr};

use crate::errors::ProtoError;

/// Number of digits in every code.
pub const CODE_LENGTH: usize = 5;

/// One decimal digit, `0..=9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digit(u8);

impl Digit {
    /// Largest digit value.
    pub const MAX: u8 = 9;

    /// The digit zero.
    pub const ZERO: Self = Self(0);

    /// Create a digit, returning `None` outside `0..=9`.
    pub const fn new(value: u8) -> Option<Self> {
        if value <= Self::MAX { Some(Self(value)) } else { None }
    }

    /// Numeric value of the digit. This is also its wire byte.
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Digit {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(ProtoError::DigitOutOfRange(value))
    }
}

impl TryFrom<char> for Digit {
    type Error = ProtoError;

    fn try_from(c: char) -> Result<Self, Self::Error> {
        c.to_digit(10)
            .and_then(|v| Self::new(v as u8))
            .ok_or(ProtoError::InvalidCharacter(c))
    }
}

/// An ordered five-digit code.
///
/// Positions are significant and digits may repeat; `00000` is a valid code.
/// Comparison is digit-wise.
///
/// # Security
///
/// - **Debug Redaction**: `Debug` never prints the digits, so a code can be
///   carried through `tracing` fields without leaking it.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Code([Digit; CODE_LENGTH]);

impl Code {
    /// Create a code from validated digits.
    pub const fn new(digits: [Digit; CODE_LENGTH]) -> Self {
        Self(digits)
    }

    /// Create a code from raw values, validating each one.
    pub fn from_values(values: [u8; CODE_LENGTH]) -> Result<Self, ProtoError> {
        Self::from_slice(&values)
    }

    /// Create a code from a slice that must hold exactly five valid digits.
    pub fn from_slice(values: &[u8]) -> Result<Self, ProtoError> {
        if values.len() != CODE_LENGTH {
            return Err(ProtoError::InvalidCodeLength {
                expected: CODE_LENGTH,
                actual: values.len(),
            });
        }

        let mut digits = [Digit(0); CODE_LENGTH];
        for (slot, &value) in digits.iter_mut().zip(values) {
            *slot = Digit::try_from(value)?;
        }
        Ok(Self(digits))
    }

    /// Digits in entry order.
    pub fn digits(&self) -> &[Digit; CODE_LENGTH] {
        &self.0
    }

    /// Raw digit values in entry order.
    pub fn values(&self) -> [u8; CODE_LENGTH] {
        self.0.map(Digit::value)
    }
}

impl fmt::Debug for Code {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Code(<redacted>)")
    }
}

impl FromStr for Code {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.chars().map(Digit::try_from).collect::<Result<Vec<_>, _>>()?;
        let values: Vec<u8> = digits.into_iter().map(Digit::value).collect();
        Self::from_slice(&values)
    }
}

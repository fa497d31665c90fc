//! Password session shared by both nodes.
//!
//! One [`PasswordSession`] handles enrollment (double entry) and verification
//! for either side of the link. The role decides what happens when an entry is
//! complete:
//!
//! - [`SessionRole::Collector`] (panel): five keypad digits, then a confirm
//!   key, then the entry is handed back for transmission.
//! - [`SessionRole::Comparator`] (control): five received digits; in
//!   enrollment the two entries are compared, in verification the entry is
//!   handed back as a candidate to compare against the stored record.
//!
//! The attempt budget lives in [`AttemptCounter`], owned by whichever node
//! decides on lockdown.

use latchkey_proto::{CODE_LENGTH, Code, Digit};
use thiserror::Error;

use crate::config::MAX_ATTEMPTS;

/// Which side of the link runs the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// Collects digits from the keypad and sends them.
    Collector,
    /// Receives digits from the link and compares them.
    Comparator,
}

/// What the current entries are for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    /// Two entries that must match; the result becomes the credential.
    Enroll,
    /// One entry compared against the stored credential.
    Verify,
}

/// Result of feeding the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    /// Entry in progress; `slot` is the next position to fill.
    NeedDigit {
        /// Next position, `0..CODE_LENGTH`.
        slot: usize,
    },
    /// Collector has five digits and waits for the confirm key.
    AwaitConfirmation,
    /// Collector entry confirmed; send it.
    Transmit(Code),
    /// Comparator received the first enrollment entry; the second follows.
    NextEntry,
    /// Both enrollment entries matched.
    Confirmed(Code),
    /// Enrollment entries differed; enrollment restarts from the first entry.
    Mismatch,
    /// Comparator received a verification candidate.
    Candidate(Code),
}

/// Misuse of the session API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    /// Operation is not available to this role.
    #[error("{operation} is not available to a {role:?}")]
    WrongRole {
        /// Operation attempted.
        operation: &'static str,
        /// Role of the session.
        role: SessionRole,
    },
}

/// Verification outcome. A verdict, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Candidate equals the stored code.
    Match,
    /// Candidate differs.
    NoMatch,
}

impl Verdict {
    /// Whether the candidate matched.
    pub const fn is_match(self) -> bool {
        matches!(self, Self::Match)
    }
}

/// Compare a candidate against the stored code, digit by digit.
pub fn verify(candidate: &Code, stored: &Code) -> Verdict {
    if candidate.digits() == stored.digits() { Verdict::Match } else { Verdict::NoMatch }
}

/// Enrollment and verification state for one node.
#[derive(Debug, Clone)]
pub struct PasswordSession {
    role: SessionRole,
    mode: SessionMode,
    buffer: [Option<Digit>; CODE_LENGTH],
    filled: usize,
    first_entry: Option<Code>,
}

impl PasswordSession {
    /// Create a session in enrollment mode.
    pub fn new(role: SessionRole) -> Self {
        Self { role, mode: SessionMode::Enroll, buffer: [None; CODE_LENGTH], filled: 0, first_entry: None }
    }

    /// Session role.
    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Current mode.
    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    /// Restart enrollment from the first entry.
    pub fn start_enrollment(&mut self) {
        self.mode = SessionMode::Enroll;
        self.first_entry = None;
        self.clear_entry();
    }

    /// Start a single verification entry.
    pub fn start_verification(&mut self) {
        self.mode = SessionMode::Verify;
        self.first_entry = None;
        self.clear_entry();
    }

    /// Which enrollment entry is being collected: 1 or 2. Always 1 in
    /// verification.
    pub fn entry_number(&self) -> u8 {
        if self.first_entry.is_some() { 2 } else { 1 }
    }

    /// Digits collected in the current entry.
    pub fn filled(&self) -> usize {
        self.filled
    }

    /// Discard the current entry without leaving the mode.
    pub fn clear_entry(&mut self) {
        self.buffer = [None; CODE_LENGTH];
        self.filled = 0;
    }

    /// Feed one digit.
    ///
    /// A collector ignores digits once its entry is full. A comparator
    /// finishes the entry on the fifth digit.
    pub fn push_digit(&mut self, digit: Digit) -> SessionStep {
        if self.filled == CODE_LENGTH {
            return SessionStep::AwaitConfirmation;
        }
        self.buffer[self.filled] = Some(digit);
        self.filled += 1;

        if self.filled < CODE_LENGTH {
            return SessionStep::NeedDigit { slot: self.filled };
        }
        match self.role {
            SessionRole::Collector => SessionStep::AwaitConfirmation,
            SessionRole::Comparator => self.complete_entry(),
        }
    }

    /// Confirm a full collector entry.
    ///
    /// Before the fifth digit the confirm key is ignored.
    ///
    /// # Errors
    ///
    /// `SessionError::WrongRole` on a comparator.
    pub fn confirm(&mut self) -> Result<SessionStep, SessionError> {
        if self.role != SessionRole::Collector {
            return Err(SessionError::WrongRole { operation: "confirm", role: self.role });
        }
        if self.filled < CODE_LENGTH {
            return Ok(SessionStep::NeedDigit { slot: self.filled });
        }
        let code = self.take_entry();
        if self.mode == SessionMode::Enroll && self.first_entry.is_none() {
            self.first_entry = Some(code);
        } else {
            self.first_entry = None;
        }
        Ok(SessionStep::Transmit(code))
    }

    fn complete_entry(&mut self) -> SessionStep {
        let code = self.take_entry();
        match self.mode {
            SessionMode::Verify => SessionStep::Candidate(code),
            SessionMode::Enroll => match self.first_entry.take() {
                None => {
                    self.first_entry = Some(code);
                    SessionStep::NextEntry
                },
                Some(first) if verify(&code, &first).is_match() => SessionStep::Confirmed(code),
                Some(_) => SessionStep::Mismatch,
            },
        }
    }

    fn take_entry(&mut self) -> Code {
        let mut digits = [Digit::ZERO; CODE_LENGTH];
        for (slot, value) in digits.iter_mut().zip(self.buffer) {
            if let Some(digit) = value {
                *slot = digit;
            }
        }
        self.clear_entry();
        Code::new(digits)
    }
}

/// What a failed verification leads to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Attempts remain; `attempt` is the number of the next try.
    Retry {
        /// Next attempt number, `2..=max`.
        attempt: u8,
    },
    /// Budget spent; lockdown. The counter has been reset to 1.
    Exhausted,
}

/// Per-operation attempt budget in `[1, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptCounter {
    current: u8,
    max: u8,
}

impl AttemptCounter {
    /// Counter with the default budget.
    pub const fn new() -> Self {
        Self::with_max(MAX_ATTEMPTS)
    }

    /// Counter allowing `max` attempts (at least one).
    pub const fn with_max(max: u8) -> Self {
        Self { current: 1, max: if max == 0 { 1 } else { max } }
    }

    /// Current attempt number.
    pub const fn current(&self) -> u8 {
        self.current
    }

    /// Budget.
    pub const fn max(&self) -> u8 {
        self.max
    }

    /// Record a failed verification.
    pub fn record_failure(&mut self) -> FailureOutcome {
        if self.current < self.max {
            self.current += 1;
            FailureOutcome::Retry { attempt: self.current }
        } else {
            self.current = 1;
            FailureOutcome::Exhausted
        }
    }

    /// Back to the first attempt, after a success or a lockdown.
    pub fn reset(&mut self) {
        self.current = 1;
    }
}

impl Default for AttemptCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn code(values: [u8; CODE_LENGTH]) -> Code {
        Code::from_values(values).expect("valid code")
    }

    fn feed(session: &mut PasswordSession, code: &Code) -> SessionStep {
        let mut last = SessionStep::NeedDigit { slot: 0 };
        for digit in code.digits() {
            last = session.push_digit(*digit);
        }
        last
    }

    #[test]
    fn comparator_enrolls_matching_entries() {
        let mut session = PasswordSession::new(SessionRole::Comparator);
        let c = code([1, 2, 3, 4, 5]);

        assert_eq!(feed(&mut session, &c), SessionStep::NextEntry);
        assert_eq!(session.entry_number(), 2);
        assert_eq!(feed(&mut session, &c), SessionStep::Confirmed(c));
    }

    #[test]
    fn comparator_mismatch_restarts_from_first_entry() {
        let mut session = PasswordSession::new(SessionRole::Comparator);
        feed(&mut session, &code([1, 2, 3, 4, 5]));
        assert_eq!(feed(&mut session, &code([1, 2, 3, 4, 6])), SessionStep::Mismatch);
        assert_eq!(session.entry_number(), 1);

        // A fresh pair now enrolls normally.
        let c = code([7, 7, 7, 7, 7]);
        assert_eq!(feed(&mut session, &c), SessionStep::NextEntry);
        assert_eq!(feed(&mut session, &c), SessionStep::Confirmed(c));
    }

    #[test]
    fn comparator_verify_yields_candidate() {
        let mut session = PasswordSession::new(SessionRole::Comparator);
        session.start_verification();
        let c = code([0, 0, 0, 0, 0]);
        assert_eq!(feed(&mut session, &c), SessionStep::Candidate(c));
    }

    #[test]
    fn collector_waits_for_confirm_and_ignores_extra_digits() {
        let mut session = PasswordSession::new(SessionRole::Collector);
        let c = code([9, 8, 7, 6, 5]);

        assert_eq!(session.confirm(), Ok(SessionStep::NeedDigit { slot: 0 }));
        assert_eq!(feed(&mut session, &c), SessionStep::AwaitConfirmation);
        assert_eq!(session.push_digit(Digit::ZERO), SessionStep::AwaitConfirmation);
        assert_eq!(session.confirm(), Ok(SessionStep::Transmit(c)));
        assert_eq!(session.entry_number(), 2);

        assert_eq!(feed(&mut session, &c), SessionStep::AwaitConfirmation);
        assert_eq!(session.confirm(), Ok(SessionStep::Transmit(c)));
        assert_eq!(session.entry_number(), 1);
    }

    #[test]
    fn comparator_cannot_confirm() {
        let mut session = PasswordSession::new(SessionRole::Comparator);
        assert!(matches!(session.confirm(), Err(SessionError::WrongRole { .. })));
    }

    #[test]
    fn all_zero_code_compares_digitwise() {
        let zeros = code([0, 0, 0, 0, 0]);
        assert_eq!(verify(&zeros, &zeros), Verdict::Match);
        assert_eq!(verify(&code([0, 0, 0, 0, 1]), &zeros), Verdict::NoMatch);
    }

    #[test]
    fn third_failure_exhausts_budget() {
        let mut counter = AttemptCounter::new();
        assert_eq!(counter.record_failure(), FailureOutcome::Retry { attempt: 2 });
        assert_eq!(counter.record_failure(), FailureOutcome::Retry { attempt: 3 });
        assert_eq!(counter.record_failure(), FailureOutcome::Exhausted);
        assert_eq!(counter.current(), 1);
    }

    proptest! {
        #[test]
        fn lockdown_iff_three_consecutive_failures(failures in 0usize..10) {
            let mut counter = AttemptCounter::new();
            let exhausted = (0..failures)
                .map(|_| counter.record_failure())
                .any(|outcome| outcome == FailureOutcome::Exhausted);
            prop_assert_eq!(exhausted, failures >= usize::from(MAX_ATTEMPTS));
            prop_assert!((1..=MAX_ATTEMPTS).contains(&counter.current()));
        }

        #[test]
        fn verifying_true_code_is_idempotent(
            values in prop::array::uniform5(0u8..=9),
            repeats in 1usize..20,
        ) {
            let stored = code(values);
            let mut counter = AttemptCounter::new();
            let mut session = PasswordSession::new(SessionRole::Comparator);
            for _ in 0..repeats {
                session.start_verification();
                let SessionStep::Candidate(candidate) = feed(&mut session, &stored) else {
                    return Err(TestCaseError::fail("verification must yield a candidate"));
                };
                match verify(&candidate, &stored) {
                    Verdict::Match => {},
                    Verdict::NoMatch => {
                        counter.record_failure();
                    },
                }
            }
            prop_assert_eq!(counter.current(), 1);
        }

        #[test]
        fn enrollment_confirms_iff_entries_equal(
            first in prop::array::uniform5(0u8..=9),
            second in prop::array::uniform5(0u8..=9),
        ) {
            let mut session = PasswordSession::new(SessionRole::Comparator);
            feed(&mut session, &code(first));
            let step = feed(&mut session, &code(second));
            if first == second {
                prop_assert_eq!(step, SessionStep::Confirmed(code(first)));
            } else {
                prop_assert_eq!(step, SessionStep::Mismatch);
            }
        }
    }
}

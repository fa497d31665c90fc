//! Turn-taking grammar of the session protocol.
//!
//! The link carries single unframed bytes with no checksum or timeout. The
//! only thing keeping the two nodes in lock-step is that both of them run
//! every byte they send and every byte they receive through the same
//! [`LinkProtocol`]. Anything outside the expected set, or sent by the node
//! whose turn it is not, is a desync.
//!
//! ```text
//! Entry        := P:EnterDigits P:digit×5
//! Enrollment   := Entry Entry C:VerifyOk   → Ready
//!               | Entry Entry C:VerifyFail → Enrollment
//! Ready        := Gate(entry) → Intent
//! Intent       := P:RequestDoorFlow   Gate(door)   P:BeginMotor C:Cleared → Ready
//!               | P:RequestChangeFlow Gate(change) P:ResetCredential      → Enrollment
//! Gate(g)      := Entry C:VerifyOk
//!               | Entry C:VerifyFail P:Retry               → Gate(g)
//!               | Entry C:VerifyFail P:Lockdown C:Cleared  → Enrollment
//! ```
//!
//! # Invariants
//!
//! - Exactly one sender may speak in any state.
//! - A rejected message leaves the state unchanged.
//! - `Lockdown` is left only through `Cleared`, and only to enrollment.

use latchkey_proto::{CODE_LENGTH, LinkMessage, Opcode, ProtoError};
use thiserror::Error;

use crate::phase::SessionPhase;

/// Which node sent a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sender {
    /// Front-end with keypad and display.
    Panel,
    /// Back-end with motor, sensor, alarm and credential store.
    Control,
}

impl Sender {
    /// The other node.
    pub const fn peer(self) -> Self {
        match self {
            Self::Panel => Self::Control,
            Self::Control => Self::Panel,
        }
    }
}

/// A verification gate. Each has its own attempt budget on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    /// Ready-state gate every operation passes first.
    Entry,
    /// Door-flow gate, followed by `BeginMotor`.
    Door,
    /// Change-flow gate, followed by `ResetCredential`.
    Change,
}

/// What a code entry is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryContext {
    /// First enrollment entry.
    EnrollFirst,
    /// Second enrollment entry.
    EnrollSecond,
    /// Verification at a gate.
    Gate(Gate),
}

/// Position in the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    /// Panel must send `EnterDigits`.
    AwaitMarker(EntryContext),
    /// Panel is sending payload digits.
    Payload {
        /// What the entry is for.
        context: EntryContext,
        /// Digits received so far.
        received: usize,
    },
    /// Control must answer the enrollment pair.
    AwaitEnrollVerdict,
    /// Control must answer a gate entry.
    AwaitVerdict(Gate),
    /// Panel must choose door or change.
    AwaitIntent,
    /// Panel must authorize the flow that passed its gate.
    AwaitAuthorization(Gate),
    /// Panel must choose `Retry` or `Lockdown` after a failed gate.
    AwaitFailureDecision(Gate),
    /// Door cycle running; control sends `Cleared` once passage is clear.
    DoorCycle,
    /// Alarm sounding; control sends `Cleared` when it stops.
    Lockdown,
}

impl LinkState {
    /// Start of a fresh session: first enrollment entry.
    pub const INITIAL: Self = Self::AwaitMarker(EntryContext::EnrollFirst);

    /// Ready: waiting for the entry gate.
    pub const READY: Self = Self::AwaitMarker(EntryContext::Gate(Gate::Entry));

    /// Node allowed to send next.
    pub const fn expected_sender(self) -> Sender {
        match self {
            Self::AwaitEnrollVerdict | Self::AwaitVerdict(_) | Self::DoorCycle | Self::Lockdown => {
                Sender::Control
            },
            Self::AwaitMarker(_)
            | Self::Payload { .. }
            | Self::AwaitIntent
            | Self::AwaitAuthorization(_)
            | Self::AwaitFailureDecision(_) => Sender::Panel,
        }
    }

    /// Session phase implied by this state.
    pub const fn phase(self) -> SessionPhase {
        match self {
            Self::AwaitMarker(context) | Self::Payload { context, .. } => match context {
                EntryContext::EnrollFirst | EntryContext::EnrollSecond => SessionPhase::Enrolling,
                EntryContext::Gate(gate) => gate_phase(gate),
            },
            Self::AwaitEnrollVerdict => SessionPhase::Enrolling,
            Self::AwaitVerdict(gate)
            | Self::AwaitAuthorization(gate)
            | Self::AwaitFailureDecision(gate) => gate_phase(gate),
            Self::AwaitIntent => SessionPhase::Idle,
            Self::DoorCycle => SessionPhase::DoorRequest,
            Self::Lockdown => SessionPhase::Lockdown,
        }
    }

    fn next(self, message: LinkMessage) -> Option<Self> {
        use LinkMessage::{Digit, Op};

        let next = match (self, message) {
            (Self::AwaitMarker(context), Op(Opcode::EnterDigits)) => Self::Payload { context, received: 0 },
            (Self::Payload { context, received }, Digit(_)) if received + 1 < CODE_LENGTH => {
                Self::Payload { context, received: received + 1 }
            },
            (Self::Payload { context, .. }, Digit(_)) => match context {
                EntryContext::EnrollFirst => Self::AwaitMarker(EntryContext::EnrollSecond),
                EntryContext::EnrollSecond => Self::AwaitEnrollVerdict,
                EntryContext::Gate(gate) => Self::AwaitVerdict(gate),
            },
            (Self::AwaitEnrollVerdict, Op(Opcode::VerifyOk)) => Self::READY,
            (Self::AwaitEnrollVerdict, Op(Opcode::VerifyFail)) => Self::INITIAL,
            (Self::AwaitVerdict(Gate::Entry), Op(Opcode::VerifyOk)) => Self::AwaitIntent,
            (Self::AwaitVerdict(gate), Op(Opcode::VerifyOk)) => Self::AwaitAuthorization(gate),
            (Self::AwaitVerdict(gate), Op(Opcode::VerifyFail)) => Self::AwaitFailureDecision(gate),
            (Self::AwaitIntent, Op(Opcode::RequestDoorFlow)) => {
                Self::AwaitMarker(EntryContext::Gate(Gate::Door))
            },
            (Self::AwaitIntent, Op(Opcode::RequestChangeFlow)) => {
                Self::AwaitMarker(EntryContext::Gate(Gate::Change))
            },
            (Self::AwaitAuthorization(Gate::Door), Op(Opcode::BeginMotor)) => Self::DoorCycle,
            (Self::AwaitAuthorization(Gate::Change), Op(Opcode::ResetCredential)) => Self::INITIAL,
            (Self::AwaitFailureDecision(gate), Op(Opcode::Retry)) => {
                Self::AwaitMarker(EntryContext::Gate(gate))
            },
            (Self::AwaitFailureDecision(_), Op(Opcode::Lockdown)) => Self::Lockdown,
            (Self::DoorCycle, Op(Opcode::Cleared)) => Self::READY,
            (Self::Lockdown, Op(Opcode::Cleared)) => Self::INITIAL,
            _ => return None,
        };
        Some(next)
    }
}

const fn gate_phase(gate: Gate) -> SessionPhase {
    match gate {
        Gate::Entry => SessionPhase::Idle,
        Gate::Door => SessionPhase::DoorRequest,
        Gate::Change => SessionPhase::ChangeRequest,
    }
}

/// Grammar violations. All of them are fatal desyncs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LinkError {
    /// A node spoke when it was the other node's turn.
    #[error("{sender:?} sent {message:?} out of turn in {state:?}")]
    OutOfTurn {
        /// Grammar state at the time.
        state: LinkState,
        /// Node that spoke.
        sender: Sender,
        /// What it sent.
        message: LinkMessage,
    },

    /// The right node spoke, but the message is not legal here.
    #[error("unexpected {message:?} from {sender:?} in {state:?}")]
    Unexpected {
        /// Grammar state at the time.
        state: LinkState,
        /// Node that spoke.
        sender: Sender,
        /// What it sent.
        message: LinkMessage,
    },

    /// Byte is neither an opcode nor a digit.
    #[error("undecodable byte: {0}")]
    Decode(#[from] ProtoError),
}

/// Grammar recognizer. Both nodes embed one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkProtocol {
    state: LinkState,
}

impl LinkProtocol {
    /// Recognizer at the start of a fresh session.
    pub const fn new() -> Self {
        Self { state: LinkState::INITIAL }
    }

    /// Recognizer resumed at `state`.
    pub const fn resume(state: LinkState) -> Self {
        Self { state }
    }

    /// Current grammar state.
    pub const fn state(&self) -> LinkState {
        self.state
    }

    /// Node allowed to send next.
    pub const fn expected_sender(&self) -> Sender {
        self.state.expected_sender()
    }

    /// Phase implied by the grammar state.
    pub const fn phase(&self) -> SessionPhase {
        self.state.phase()
    }

    /// Whether `sender` may send `message` now.
    pub fn accepts(&self, sender: Sender, message: LinkMessage) -> bool {
        sender == self.state.expected_sender() && self.state.next(message).is_some()
    }

    /// Advance over one message, returning the new state.
    ///
    /// # Errors
    ///
    /// - `LinkError::OutOfTurn` if it is not `sender`'s turn
    /// - `LinkError::Unexpected` if `message` is not legal in this state
    pub fn advance(&mut self, sender: Sender, message: LinkMessage) -> Result<LinkState, LinkError> {
        let state = self.state;
        if sender != state.expected_sender() {
            return Err(LinkError::OutOfTurn { state, sender, message });
        }
        let next = state.next(message).ok_or(LinkError::Unexpected { state, sender, message })?;

        if !matches!(next, LinkState::Payload { received, .. } if received > 0) {
            tracing::debug!(?sender, ?message, from = ?state, to = ?next, "link transition");
        }
        self.state = next;
        Ok(next)
    }

    /// Decode a wire byte and advance over it.
    pub fn advance_byte(&mut self, sender: Sender, byte: u8) -> Result<LinkState, LinkError> {
        let message = LinkMessage::decode(byte)?;
        self.advance(sender, message)
    }
}

impl Default for LinkProtocol {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use latchkey_proto::{Code, Digit};

    use super::*;

    const P: Sender = Sender::Panel;
    const C: Sender = Sender::Control;

    fn entry(link: &mut LinkProtocol, code: [u8; 5]) {
        let code = Code::from_values(code).expect("valid code");
        for message in LinkMessage::payload(&code) {
            link.advance(P, message).expect("entry byte");
        }
    }

    fn op(link: &mut LinkProtocol, sender: Sender, op: Opcode) -> LinkState {
        link.advance(sender, op.into()).expect("legal opcode")
    }

    fn enrolled() -> LinkProtocol {
        let mut link = LinkProtocol::new();
        entry(&mut link, [1, 2, 3, 4, 5]);
        entry(&mut link, [1, 2, 3, 4, 5]);
        op(&mut link, C, Opcode::VerifyOk);
        link
    }

    #[test]
    fn enrollment_reaches_ready() {
        let link = enrolled();
        assert_eq!(link.state(), LinkState::READY);
        assert_eq!(link.phase(), SessionPhase::Idle);
    }

    #[test]
    fn failed_enrollment_restarts() {
        let mut link = LinkProtocol::new();
        entry(&mut link, [1, 2, 3, 4, 5]);
        assert_eq!(link.phase(), SessionPhase::Enrolling);
        entry(&mut link, [5, 4, 3, 2, 1]);
        assert_eq!(op(&mut link, C, Opcode::VerifyFail), LinkState::INITIAL);
    }

    #[test]
    fn door_flow_needs_two_verifications() {
        let mut link = enrolled();
        entry(&mut link, [1, 2, 3, 4, 5]);
        assert!(!link.accepts(P, Opcode::BeginMotor.into()));
        op(&mut link, C, Opcode::VerifyOk);

        assert!(!link.accepts(P, Opcode::BeginMotor.into()));
        op(&mut link, P, Opcode::RequestDoorFlow);
        assert_eq!(link.phase(), SessionPhase::DoorRequest);
        entry(&mut link, [1, 2, 3, 4, 5]);
        op(&mut link, C, Opcode::VerifyOk);

        assert_eq!(op(&mut link, P, Opcode::BeginMotor), LinkState::DoorCycle);
        assert_eq!(op(&mut link, C, Opcode::Cleared), LinkState::READY);
    }

    #[test]
    fn change_flow_returns_to_enrollment() {
        let mut link = enrolled();
        entry(&mut link, [1, 2, 3, 4, 5]);
        op(&mut link, C, Opcode::VerifyOk);
        op(&mut link, P, Opcode::RequestChangeFlow);
        assert_eq!(link.phase(), SessionPhase::ChangeRequest);
        entry(&mut link, [1, 2, 3, 4, 5]);
        op(&mut link, C, Opcode::VerifyOk);
        assert!(!link.accepts(P, Opcode::BeginMotor.into()));
        assert_eq!(op(&mut link, P, Opcode::ResetCredential), LinkState::INITIAL);
    }

    #[test]
    fn failed_gate_retries_then_locks_down() {
        let mut link = enrolled();
        entry(&mut link, [9, 9, 9, 9, 9]);
        op(&mut link, C, Opcode::VerifyFail);
        assert_eq!(
            op(&mut link, P, Opcode::Retry),
            LinkState::AwaitMarker(EntryContext::Gate(Gate::Entry))
        );
        entry(&mut link, [9, 9, 9, 9, 9]);
        op(&mut link, C, Opcode::VerifyFail);
        assert_eq!(op(&mut link, P, Opcode::Lockdown), LinkState::Lockdown);
        assert_eq!(link.phase(), SessionPhase::Lockdown);

        // Only Cleared leaves lockdown.
        assert!(!link.accepts(P, Opcode::EnterDigits.into()));
        assert!(!link.accepts(C, Opcode::VerifyOk.into()));
        assert_eq!(op(&mut link, C, Opcode::Cleared), LinkState::INITIAL);
    }

    #[test]
    fn out_of_turn_is_rejected_without_moving() {
        let mut link = enrolled();
        let err = link.advance(C, Opcode::EnterDigits.into()).expect_err("control cannot start an entry");
        assert!(matches!(err, LinkError::OutOfTurn { sender: Sender::Control, .. }));
        assert_eq!(link.state(), LinkState::READY);
    }

    #[test]
    fn digit_outside_payload_is_unexpected() {
        let mut link = enrolled();
        let digit = LinkMessage::Digit(Digit::ZERO);
        assert!(matches!(link.advance(P, digit), Err(LinkError::Unexpected { .. })));
    }

    #[test]
    fn short_payload_cannot_be_followed_by_an_opcode() {
        let mut link = LinkProtocol::new();
        link.advance(P, Opcode::EnterDigits.into()).expect("marker");
        link.advance(P, LinkMessage::Digit(Digit::ZERO)).expect("digit");
        assert!(link.advance(P, Opcode::EnterDigits.into()).is_err());
    }

    #[test]
    fn reserved_bytes_are_decode_errors() {
        let mut link = LinkProtocol::new();
        assert!(matches!(
            link.advance_byte(P, 0x33),
            Err(LinkError::Decode(ProtoError::UnknownByte(0x33)))
        ));
    }

    #[test]
    fn exactly_one_sender_per_state() {
        let mut link = enrolled();
        entry(&mut link, [1, 2, 3, 4, 5]);
        assert_eq!(link.expected_sender(), Sender::Control);
        for op in Opcode::ALL {
            assert!(!link.accepts(Sender::Panel, op.into()));
        }
    }
}

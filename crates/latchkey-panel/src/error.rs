//! Panel node error types.

use latchkey_core::{LinkError, TimerError, WaitError};
use thiserror::Error;

use crate::event::Awaiting;

/// Errors from the panel state machine.
#[derive(Debug, Error)]
pub enum PanelError {
    /// The control node broke the session grammar, or this node tried to.
    #[error("protocol desync: {0}")]
    Desync(#[from] LinkError),

    /// The node already halted after a desync.
    #[error("node halted after protocol desync")]
    Halted,

    /// The driver delivered something the node is not waiting for.
    #[error("unexpected {received:?} event while awaiting {awaiting:?}")]
    UnexpectedEvent {
        /// What the node waits on.
        awaiting: Awaiting,
        /// What the event answers.
        received: Awaiting,
    },
}

impl PanelError {
    /// Returns true if the node cannot continue.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Desync(_) | Self::Halted)
    }
}

/// Failure class of a runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nodes disagree about the conversation.
    ProtocolDesync,
    /// A bounded wait never completed.
    HardwareStall,
    /// Link or keypad I/O failed.
    Io,
    /// Driver and node disagree; a bug.
    Internal,
}

/// Errors from the panel driver.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// State machine rejected an event.
    #[error("panel node: {0}")]
    Node(#[from] PanelError),

    /// Serial link or keypad failed.
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    /// Interval timer misuse.
    #[error("timer: {0}")]
    Timer(#[from] TimerError),

    /// A bounded wait ran out.
    #[error("{0}")]
    Stall(#[from] WaitError),

    /// The keypad has no more input.
    #[error("keypad closed")]
    KeypadClosed,
}

impl RuntimeError {
    /// Failure class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Node(PanelError::Desync(_) | PanelError::Halted) => ErrorKind::ProtocolDesync,
            Self::Node(_) | Self::Timer(_) => ErrorKind::Internal,
            Self::Stall(_) => ErrorKind::HardwareStall,
            Self::Io(_) | Self::KeypadClosed => ErrorKind::Io,
        }
    }

    /// Returns true unless the keypad simply ran out of input.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::KeypadClosed)
    }
}

//! Control node error types.

use latchkey_core::{LinkError, StoreError, TimerError, WaitError};
use thiserror::Error;

use crate::{door::DoorStage, event::Awaiting};

/// Errors from the control state machine.
#[derive(Debug, Error)]
pub enum ControlError {
    /// The panel broke the session grammar, or this node tried to.
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

    /// `BeginMotor` arrived while a door cycle was running.
    #[error("door cycle already running ({0:?})")]
    DoorBusy(DoorStage),

    /// Door event arrived in the wrong stage.
    #[error("door received {event:?} while {stage:?}")]
    DoorOutOfStep {
        /// Door stage at the time.
        stage: DoorStage,
        /// Event received.
        event: Awaiting,
    },

    /// `Lockdown` arrived while the alarm was sounding.
    #[error("lockdown already engaged")]
    AlreadyLockedDown,
}

impl ControlError {
    /// Returns true if the node cannot continue.
    ///
    /// A desync leaves the two nodes disagreeing about whose turn it is, and
    /// there is no resynchronization short of a reset. The rest are driver
    /// bugs that leave the node's state untouched.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Desync(_) | Self::Halted => true,
            Self::UnexpectedEvent { .. }
            | Self::DoorBusy(_)
            | Self::DoorOutOfStep { .. }
            | Self::AlreadyLockedDown => false,
        }
    }
}

/// Failure class of a runtime error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Nodes disagree about the conversation.
    ProtocolDesync,
    /// A bounded wait never completed.
    HardwareStall,
    /// Link or storage I/O failed.
    Io,
    /// Driver and node disagree; a bug.
    Internal,
}

/// Errors from the control driver.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// State machine rejected an event.
    #[error("control node: {0}")]
    Node(#[from] ControlError),

    /// Serial link failed.
    #[error("serial link: {0}")]
    Link(#[from] std::io::Error),

    /// Credential storage failed.
    #[error("credential store: {0}")]
    Store(#[from] StoreError),

    /// Interval timer misuse.
    #[error("timer: {0}")]
    Timer(#[from] TimerError),

    /// A bounded wait ran out.
    #[error("{0}")]
    Stall(#[from] WaitError),
}

impl RuntimeError {
    /// Failure class.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Node(ControlError::Desync(_) | ControlError::Halted) => ErrorKind::ProtocolDesync,
            Self::Node(_) | Self::Timer(_) => ErrorKind::Internal,
            Self::Stall(_) => ErrorKind::HardwareStall,
            Self::Link(_) | Self::Store(_) => ErrorKind::Io,
        }
    }

    /// Returns true if the driver must stop.
    ///
    /// Every runtime error is fatal except a corrupt record, which the node
    /// answers with a failed verification.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Store(StoreError::CorruptRecord { .. }))
    }
}

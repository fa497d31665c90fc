//! Events consumed and actions produced by the control node.

use latchkey_proto::{Code, LinkMessage};

/// Input to [`ControlNode::handle`](crate::ControlNode::handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// A byte arrived from the panel.
    ByteReceived(u8),
    /// The stored credential was read after a candidate arrived.
    CredentialLoaded(Code),
    /// The stored credential could not be decoded.
    CredentialUnreadable,
    /// The armed interval timer completed.
    TimerElapsed,
    /// The intrusion sensor reports the doorway clear.
    SensorClear,
}

impl ControlEvent {
    /// What kind of wait this event answers.
    pub const fn answers(&self) -> Awaiting {
        match self {
            Self::ByteReceived(_) => Awaiting::Byte,
            Self::CredentialLoaded(_) | Self::CredentialUnreadable => Awaiting::Credential,
            Self::TimerElapsed => Awaiting::Timer,
            Self::SensorClear => Awaiting::SensorClear,
        }
    }
}

/// What the node is blocked on. The driver must deliver exactly this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Awaiting {
    /// Next byte from the link.
    Byte,
    /// The stored credential.
    Credential,
    /// Completion of the armed timer.
    Timer,
    /// Intrusion sensor reporting clear.
    SensorClear,
    /// Nothing: the node halted after a desync.
    Halted,
}

/// Motor direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorDirection {
    /// Opening.
    Forward,
    /// Closing.
    Reverse,
    /// Stopped.
    Stop,
}

/// Motor drive command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorCommand {
    /// Direction to drive.
    pub direction: MotorDirection,
    /// PWM duty, 0-255.
    pub speed: u8,
}

impl MotorCommand {
    /// Stop the motor.
    pub const STOP: Self = Self { direction: MotorDirection::Stop, speed: 0 };
}

/// Output of the control node, executed by the driver in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Transmit a message to the panel.
    Send(LinkMessage),
    /// Write the credential record. Completes before any later action.
    PersistCredential(Code),
    /// Arm the interval timer.
    ArmTimer {
        /// Ticks until completion.
        ticks: u32,
    },
    /// Disarm the interval timer.
    DisarmTimer,
    /// Drive the motor.
    Motor(MotorCommand),
    /// Switch the alarm.
    Alarm(bool),
}

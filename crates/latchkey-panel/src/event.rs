//! Events consumed and actions produced by the panel node.

use latchkey_proto::LinkMessage;

use crate::{key::Key, screen::Screen};

/// Input to [`PanelNode::handle`](crate::PanelNode::handle).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelEvent {
    /// A key was pressed.
    KeyPressed(Key),
    /// A byte arrived from the control node.
    ByteReceived(u8),
    /// The armed interval timer completed.
    TimerElapsed,
}

impl PanelEvent {
    /// What kind of wait this event answers.
    pub const fn answers(&self) -> Awaiting {
        match self {
            Self::KeyPressed(_) => Awaiting::Key,
            Self::ByteReceived(_) => Awaiting::Byte,
            Self::TimerElapsed => Awaiting::Timer,
        }
    }
}

/// What the panel is blocked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Awaiting {
    /// Next key press.
    Key,
    /// Next byte from the control node.
    Byte,
    /// Completion of the armed timer.
    Timer,
    /// Nothing: the node halted after a desync.
    Halted,
}

/// Output of the panel node, executed by the driver in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelAction {
    /// Transmit a message to the control node.
    Send(LinkMessage),
    /// Replace the display contents.
    Show(Screen),
    /// Arm the interval timer.
    ArmTimer {
        /// Ticks until completion.
        ticks: u32,
    },
    /// Disarm the interval timer.
    DisarmTimer,
}

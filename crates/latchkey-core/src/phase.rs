//! Coarse session phase exposed by each node.

use std::fmt;

/// Where a node believes the session is.
///
/// Derived from the node's own link state. The panel may be one protocol step
/// ahead of the control node, so the two phases can differ briefly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// No usable credential; double entry in progress.
    Enrolling,
    /// Credential enrolled; waiting for an operator to pass the entry gate.
    Idle,
    /// Door flow: verification for, or execution of, a door cycle.
    DoorRequest,
    /// Password-change flow.
    ChangeRequest,
    /// Alarm raised after exhausted attempts.
    Lockdown,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enrolling => "enrolling",
            Self::Idle => "idle",
            Self::DoorRequest => "door-request",
            Self::ChangeRequest => "change-request",
            Self::Lockdown => "lockdown",
        };
        f.write_str(name)
    }
}

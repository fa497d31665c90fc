//! Lockdown sequencer: alarm on for a fixed duration, then off.

use crate::{
    error::ControlError,
    event::{Awaiting, ControlAction},
};

/// Runs the alarm after exhausted attempts.
#[derive(Debug, Clone)]
pub struct LockdownController {
    ticks: u32,
    engaged: bool,
}

impl LockdownController {
    /// Controller sounding the alarm for `ticks`.
    pub fn new(ticks: u32) -> Self {
        Self { ticks, engaged: false }
    }

    /// Whether the alarm is sounding.
    pub fn is_engaged(&self) -> bool {
        self.engaged
    }

    /// Arm the alarm duration and switch the alarm on.
    pub fn engage(&mut self) -> Result<Vec<ControlAction>, ControlError> {
        if self.engaged {
            return Err(ControlError::AlreadyLockedDown);
        }
        self.engaged = true;
        tracing::warn!(ticks = self.ticks, "lockdown engaged, alarm on");
        Ok(vec![ControlAction::ArmTimer { ticks: self.ticks }, ControlAction::Alarm(true)])
    }

    /// The alarm duration elapsed: switch it off and disarm.
    pub fn on_timer(&mut self) -> Result<Vec<ControlAction>, ControlError> {
        if !self.engaged {
            return Err(ControlError::UnexpectedEvent { awaiting: Awaiting::Byte, received: Awaiting::Timer });
        }
        self.engaged = false;
        tracing::info!("alarm off, lockdown over");
        Ok(vec![ControlAction::Alarm(false), ControlAction::DisarmTimer])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engage_then_elapse() {
        let mut lockdown = LockdownController::new(500);
        assert_eq!(
            lockdown.engage().expect("engage"),
            vec![ControlAction::ArmTimer { ticks: 500 }, ControlAction::Alarm(true)]
        );
        assert!(lockdown.is_engaged());
        assert_eq!(
            lockdown.on_timer().expect("elapse"),
            vec![ControlAction::Alarm(false), ControlAction::DisarmTimer]
        );
        assert!(!lockdown.is_engaged());
    }

    #[test]
    fn double_engage_is_rejected() {
        let mut lockdown = LockdownController::new(5);
        lockdown.engage().expect("engage");
        assert!(matches!(lockdown.engage(), Err(ControlError::AlreadyLockedDown)));
    }
}

//! Door cycle sequencer.
//!
//! ```text
//! Idle ─BeginMotor→ Opening ─timer→ AwaitingClear ─sensor→ Closing ─timer→ Idle
//! ```
//!
//! Opening and closing run the motor for the same number of ticks. The wait
//! for the sensor has no timeout of its own; a driver may bound it.

use crate::{
    error::ControlError,
    event::{Awaiting, ControlAction, MotorCommand, MotorDirection},
};

/// Where the door cycle is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorStage {
    /// No cycle running.
    Idle,
    /// Motor running forward.
    Opening,
    /// Door open, waiting for the doorway to clear.
    AwaitingClear,
    /// Motor running in reverse.
    Closing,
}

/// Sequences one door cycle per `BeginMotor`.
#[derive(Debug, Clone)]
pub struct DoorCycleController {
    stage: DoorStage,
    ticks: u32,
    speed: u8,
}

impl DoorCycleController {
    /// Controller running the motor for `ticks` each way at `speed`.
    pub fn new(ticks: u32, speed: u8) -> Self {
        Self { stage: DoorStage::Idle, ticks, speed }
    }

    /// Current stage.
    pub fn stage(&self) -> DoorStage {
        self.stage
    }

    /// Whether a cycle is running.
    pub fn is_active(&self) -> bool {
        self.stage != DoorStage::Idle
    }

    /// What the cycle waits on, if running.
    pub fn awaiting(&self) -> Option<Awaiting> {
        match self.stage {
            DoorStage::Idle => None,
            DoorStage::Opening | DoorStage::Closing => Some(Awaiting::Timer),
            DoorStage::AwaitingClear => Some(Awaiting::SensorClear),
        }
    }

    /// Start opening.
    pub fn begin(&mut self) -> Result<Vec<ControlAction>, ControlError> {
        if self.stage != DoorStage::Idle {
            return Err(ControlError::DoorBusy(self.stage));
        }
        self.stage = DoorStage::Opening;
        tracing::info!(ticks = self.ticks, "door opening");
        Ok(vec![ControlAction::ArmTimer { ticks: self.ticks }, self.drive(MotorDirection::Forward)])
    }

    /// The armed duration elapsed.
    ///
    /// Returns whether the cycle is finished alongside the actions.
    pub fn on_timer(&mut self) -> Result<(Vec<ControlAction>, bool), ControlError> {
        let finished = match self.stage {
            DoorStage::Opening => {
                self.stage = DoorStage::AwaitingClear;
                tracing::info!("door open, waiting for passage");
                false
            },
            DoorStage::Closing => {
                self.stage = DoorStage::Idle;
                tracing::info!("door closed");
                true
            },
            stage => return Err(ControlError::DoorOutOfStep { stage, event: Awaiting::Timer }),
        };
        Ok((vec![ControlAction::DisarmTimer, ControlAction::Motor(MotorCommand::STOP)], finished))
    }

    /// The doorway is clear; start closing.
    pub fn on_sensor_clear(&mut self) -> Result<Vec<ControlAction>, ControlError> {
        if self.stage != DoorStage::AwaitingClear {
            return Err(ControlError::DoorOutOfStep { stage: self.stage, event: Awaiting::SensorClear });
        }
        self.stage = DoorStage::Closing;
        tracing::info!("passage clear, door closing");
        Ok(vec![ControlAction::ArmTimer { ticks: self.ticks }, self.drive(MotorDirection::Reverse)])
    }

    fn drive(&self, direction: MotorDirection) -> ControlAction {
        ControlAction::Motor(MotorCommand { direction, speed: self.speed })
    }
}

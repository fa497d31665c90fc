//! Simulated actuators, sensor, keypad and display.
//!
//! Every device writes into one shared [`HardwareLog`], which the scenario
//! hands to its oracle after the run.

use std::{
    collections::VecDeque,
    io,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use latchkey_control::{Alarm, IntrusionSensor, Motor, MotorCommand};
use latchkey_panel::{Display, Key, Keypad, Screen};

#[derive(Debug, Default)]
struct LogInner {
    motor: Vec<MotorCommand>,
    alarm: Vec<bool>,
    screens: Vec<Screen>,
    sensor_polls: u64,
}

/// Shared record of what the simulated devices saw.
#[derive(Debug, Clone, Default)]
pub struct HardwareLog {
    inner: Arc<Mutex<LogInner>>,
}

impl HardwareLog {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut LogInner) -> R) -> Option<R> {
        let mut guard = self.inner.lock().ok()?;
        Some(f(&mut guard))
    }

    /// Motor commands in order.
    pub fn motor(&self) -> Vec<MotorCommand> {
        self.with(|log| log.motor.clone()).unwrap_or_default()
    }

    /// Alarm switch states in order.
    pub fn alarm(&self) -> Vec<bool> {
        self.with(|log| log.alarm.clone()).unwrap_or_default()
    }

    /// Screens drawn in order.
    pub fn screens(&self) -> Vec<Screen> {
        self.with(|log| log.screens.clone()).unwrap_or_default()
    }

    /// Total sensor polls.
    pub fn sensor_polls(&self) -> u64 {
        self.with(|log| log.sensor_polls).unwrap_or_default()
    }
}

/// Motor that records its commands.
#[derive(Debug, Clone)]
pub struct SimMotor {
    log: HardwareLog,
}

impl SimMotor {
    /// Motor recording into `log`.
    pub fn new(log: HardwareLog) -> Self {
        Self { log }
    }
}

impl Motor for SimMotor {
    fn drive(&mut self, command: MotorCommand) {
        self.log.with(|log| log.motor.push(command));
    }
}

/// Alarm that records its switch states.
#[derive(Debug, Clone)]
pub struct SimAlarm {
    log: HardwareLog,
}

impl SimAlarm {
    /// Alarm recording into `log`.
    pub fn new(log: HardwareLog) -> Self {
        Self { log }
    }
}

impl Alarm for SimAlarm {
    fn set(&mut self, on: bool) {
        self.log.with(|log| log.alarm.push(on));
    }
}

/// How the simulated doorway behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorBehavior {
    /// Occupied for this many polls of each wait, then clear.
    ClearAfter(u64),
    /// Never clears.
    Stuck,
}

/// Intrusion sensor following a [`SensorBehavior`].
#[derive(Debug, Clone)]
pub struct SimSensor {
    behavior: SensorBehavior,
    occupied_polls: u64,
    log: HardwareLog,
}

impl SimSensor {
    /// Sensor recording its polls into `log`.
    pub fn new(behavior: SensorBehavior, log: HardwareLog) -> Self {
        Self { behavior, occupied_polls: 0, log }
    }
}

impl IntrusionSensor for SimSensor {
    fn is_clear(&mut self) -> bool {
        self.log.with(|log| log.sensor_polls += 1);
        match self.behavior {
            SensorBehavior::Stuck => false,
            SensorBehavior::ClearAfter(dwell) if self.occupied_polls >= dwell => {
                self.occupied_polls = 0;
                true
            },
            SensorBehavior::ClearAfter(_) => {
                self.occupied_polls += 1;
                false
            },
        }
    }
}

/// Keypad replaying a fixed key sequence, then reporting end of input.
#[derive(Debug, Clone, Default)]
pub struct ScriptedKeypad {
    keys: VecDeque<Key>,
}

impl ScriptedKeypad {
    /// Keypad that will press `keys` in order.
    pub fn new(keys: impl IntoIterator<Item = Key>) -> Self {
        Self { keys: keys.into_iter().collect() }
    }

    /// Keys not yet pressed.
    pub fn remaining(&self) -> usize {
        self.keys.len()
    }
}

#[async_trait]
impl Keypad for ScriptedKeypad {
    async fn next_key(&mut self) -> io::Result<Option<Key>> {
        Ok(self.keys.pop_front())
    }
}

/// Display that records every screen.
#[derive(Debug, Clone)]
pub struct RecordingDisplay {
    log: HardwareLog,
}

impl RecordingDisplay {
    /// Display recording into `log`.
    pub fn new(log: HardwareLog) -> Self {
        Self { log }
    }
}

impl Display for RecordingDisplay {
    fn show(&mut self, screen: &Screen) {
        tracing::trace!(%screen, "display");
        self.log.with(|log| log.screens.push(*screen));
    }
}

//! Timing, pacing and wait configuration.
//!
//! Defaults reproduce the deployed firmware: an 8 MHz clock with an 8-bit
//! timer and prescaler 64 overflows every 2.048 ms.

use std::time::Duration;

/// Consecutive failures allowed at one gate before lockdown.
pub const MAX_ATTEMPTS: u8 = 3;

/// Full motor speed.
pub const MOTOR_SPEED: u8 = 255;

/// Tick period and the durations expressed in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// Period of one tick source overflow.
    pub tick_period: Duration,
    /// Ticks the motor runs in each direction (≈ 15 s).
    pub door_ticks: u32,
    /// Ticks the alarm sounds during lockdown (≈ 60 s).
    pub alarm_ticks: u32,
}

impl TimingConfig {
    /// Default tick period, 2.048 ms.
    pub const TICK_PERIOD: Duration = Duration::from_micros(2048);
    /// Default door run time in ticks.
    pub const DOOR_TICKS: u32 = 7324;
    /// Default alarm time in ticks.
    pub const ALARM_TICKS: u32 = 29296;

    /// Wall-clock length of a tick count.
    pub fn ticks_to_duration(&self, ticks: u32) -> Duration {
        self.tick_period * ticks
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_period: Self::TICK_PERIOD,
            door_ticks: Self::DOOR_TICKS,
            alarm_ticks: Self::ALARM_TICKS,
        }
    }
}

/// Delay inserted between transmitted payload bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingConfig {
    /// Gap after each digit sent.
    pub digit_gap: Duration,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self { digit_gap: Duration::from_millis(50) }
    }
}

/// How the named await functions poll their conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    /// Interval between condition checks.
    pub poll_interval: Duration,
    /// Maximum number of checks; `None` waits forever.
    pub max_polls: Option<u64>,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self { poll_interval: Duration::from_millis(1), max_polls: None }
    }
}

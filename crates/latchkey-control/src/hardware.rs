//! Actuator and sensor seams, plus host adapters.
//!
//! The traits are deliberately infallible: a motor or alarm driver has nothing
//! useful to report back, and a sensor that cannot be read reports occupied.

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use latchkey_core::{Storage, StoreError};

use crate::event::{MotorCommand, MotorDirection};

/// Door motor.
pub trait Motor: Send {
    /// Apply a drive command.
    fn drive(&mut self, command: MotorCommand);
}

/// Binary intrusion sensor in the doorway.
pub trait IntrusionSensor: Send {
    /// Whether the doorway is clear.
    fn is_clear(&mut self) -> bool;
}

/// Binary alarm.
pub trait Alarm: Send {
    /// Switch the alarm on or off.
    fn set(&mut self, on: bool);
}

/// Motor that only logs its commands.
#[derive(Debug, Default)]
pub struct TracingMotor {
    last: Option<MotorDirection>,
}

impl Motor for TracingMotor {
    fn drive(&mut self, command: MotorCommand) {
        if self.last != Some(command.direction) {
            tracing::info!(direction = ?command.direction, speed = command.speed, "motor");
        }
        self.last = Some(command.direction);
    }
}

/// Alarm that only logs.
#[derive(Debug, Default)]
pub struct TracingAlarm;

impl Alarm for TracingAlarm {
    fn set(&mut self, on: bool) {
        if on {
            tracing::warn!("alarm on");
        } else {
            tracing::info!("alarm off");
        }
    }
}

/// Sensor read from a sysfs-style file holding `0` (clear) or `1` (occupied).
///
/// Anything else, including a read error, counts as occupied.
#[derive(Debug, Clone)]
pub struct SysfsSensor {
    path: PathBuf,
}

impl SysfsSensor {
    /// Sensor reading `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl IntrusionSensor for SysfsSensor {
    fn is_clear(&mut self) -> bool {
        match std::fs::read_to_string(&self.path) {
            Ok(value) => value.trim() == "0",
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "sensor unreadable, treating as occupied");
                false
            },
        }
    }
}

/// EEPROM image kept in a regular file.
#[derive(Debug)]
pub struct FileStorage {
    file: File,
    size: usize,
}

impl FileStorage {
    /// Open the image at `path`, creating an erased one of `size` bytes if
    /// it does not exist.
    pub fn open(path: &Path, size: usize) -> Result<Self, StoreError> {
        let mut file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?;
        let file_len = file.metadata()?.len();
        let len = usize::try_from(file_len).unwrap_or(usize::MAX);
        if len < size {
            file.seek(SeekFrom::Start(file_len))?;
            file.write_all(&vec![0xFF; size - len])?;
            file.sync_data()?;
            tracing::info!(path = %path.display(), size, "initialised EEPROM image");
        }
        Ok(Self { file, size })
    }

    fn seek_to(&mut self, address: u16) -> Result<(), StoreError> {
        if usize::from(address) >= self.size {
            return Err(StoreError::OutOfRange { address, size: self.size });
        }
        self.file.seek(SeekFrom::Start(u64::from(address)))?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn read_byte(&mut self, address: u16) -> Result<u8, StoreError> {
        self.seek_to(address)?;
        let mut byte = [0u8; 1];
        self.file.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), StoreError> {
        self.seek_to(address)?;
        self.file.write_all(&[value])?;
        self.file.sync_data()?;
        Ok(())
    }
}

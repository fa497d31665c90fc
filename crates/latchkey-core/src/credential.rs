//! Persistent credential record.
//!
//! The record is five bytes at a fixed base address, one digit per byte, with
//! a settle delay after every byte access. There is no journal: a write torn
//! by power loss leaves a mixed record that will simply fail to verify.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use latchkey_proto::{CODE_LENGTH, Code, ProtoError};
use thiserror::Error;

use crate::env::Environment;

/// Byte-addressable persistent storage.
pub trait Storage: Send {
    /// Read the byte at `address`.
    fn read_byte(&mut self, address: u16) -> Result<u8, StoreError>;

    /// Write `value` at `address`.
    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), StoreError>;
}

/// Credential store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backing storage failed.
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Address is outside the storage.
    #[error("address 0x{address:04x} out of range (size {size})")]
    OutOfRange {
        /// Requested address.
        address: u16,
        /// Storage size in bytes.
        size: usize,
    },

    /// A stored byte is not a digit.
    #[error("corrupt credential byte 0x{value:02x} at 0x{address:04x}")]
    CorruptRecord {
        /// Address of the bad byte.
        address: u16,
        /// Value found there.
        value: u8,
    },

    /// Shared storage lock was poisoned.
    #[error("storage lock poisoned")]
    Poisoned,
}

/// Store placement and timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Address of the first digit.
    pub base_address: u16,
    /// Delay after each byte access.
    pub settle: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { base_address: 0x0310, settle: Duration::from_millis(20) }
    }
}

/// In-memory storage, erased to `0xFF` like fresh EEPROM.
///
/// Clones share the same bytes, so a test can keep a handle and inspect what
/// a node persisted.
#[derive(Debug, Clone)]
pub struct MemoryStorage {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl MemoryStorage {
    /// Default capacity, matching a 4 KiB EEPROM.
    pub const DEFAULT_SIZE: usize = 4096;

    /// Create erased storage of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self { bytes: Arc::new(Mutex::new(vec![0xFF; size])) }
    }

    /// Copy of the bytes in `address..address + len`, if in range.
    pub fn snapshot(&self, address: u16, len: usize) -> Option<Vec<u8>> {
        let bytes = self.bytes.lock().ok()?;
        let start = usize::from(address);
        bytes.get(start..start + len).map(<[u8]>::to_vec)
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SIZE)
    }
}

impl Storage for MemoryStorage {
    fn read_byte(&mut self, address: u16) -> Result<u8, StoreError> {
        let bytes = self.bytes.lock().map_err(|_| StoreError::Poisoned)?;
        bytes
            .get(usize::from(address))
            .copied()
            .ok_or(StoreError::OutOfRange { address, size: bytes.len() })
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), StoreError> {
        let mut bytes = self.bytes.lock().map_err(|_| StoreError::Poisoned)?;
        let size = bytes.len();
        let slot = bytes.get_mut(usize::from(address)).ok_or(StoreError::OutOfRange { address, size })?;
        *slot = value;
        Ok(())
    }
}

/// Encode a code as its stored bytes.
pub fn encode_record(code: &Code) -> [u8; CODE_LENGTH] {
    code.values()
}

/// Decode stored bytes, rejecting anything that is not a digit.
pub fn decode_record(base_address: u16, bytes: &[u8; CODE_LENGTH]) -> Result<Code, StoreError> {
    Code::from_values(*bytes).map_err(|err| match err {
        ProtoError::DigitOutOfRange(value) => {
            let offset = bytes.iter().position(|&b| b == value).unwrap_or(0);
            StoreError::CorruptRecord { address: record_address(base_address, offset), value }
        },
        _ => StoreError::CorruptRecord { address: base_address, value: bytes[0] },
    })
}

fn record_address(base: u16, offset: usize) -> u16 {
    base.wrapping_add(u16::try_from(offset).unwrap_or(u16::MAX))
}

/// The single persisted credential.
pub struct CredentialStore<S, E> {
    storage: S,
    env: E,
    config: StoreConfig,
}

impl<S: Storage, E: Environment> CredentialStore<S, E> {
    /// Create a store over `storage`.
    pub fn new(storage: S, env: E, config: StoreConfig) -> Self {
        Self { storage, env, config }
    }

    /// Persist `code`, overwriting the record in place.
    pub async fn write(&mut self, code: &Code) -> Result<(), StoreError> {
        for (offset, value) in encode_record(code).into_iter().enumerate() {
            let address = record_address(self.config.base_address, offset);
            self.storage.write_byte(address, value)?;
            self.env.sleep(self.config.settle).await;
        }
        tracing::debug!(base = self.config.base_address, "credential written");
        Ok(())
    }

    /// Read the record.
    ///
    /// # Errors
    ///
    /// `StoreError::CorruptRecord` if any byte is outside `0..=9`, which is
    /// also what erased storage reads as.
    pub async fn read(&mut self) -> Result<Code, StoreError> {
        let mut bytes = [0u8; CODE_LENGTH];
        for (offset, slot) in bytes.iter_mut().enumerate() {
            let address = record_address(self.config.base_address, offset);
            *slot = self.storage.read_byte(address)?;
            self.env.sleep(self.config.settle).await;
        }
        decode_record(self.config.base_address, &bytes)
    }

    /// Store configuration.
    pub fn config(&self) -> StoreConfig {
        self.config
    }

    /// Borrow the backing storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

//! # Register Sinks
//!
//! Downstream reporting hardware exposes a small, fixed set of writable 32-bit
//! registers. The pipeline only needs to write them by position, so the sink is
//! an injected capability: [`RegisterSink`]. How and when register contents
//! reach the outside world is entirely the sink's business.
//!
//! Provided sinks:
//!
//! - [`RegisterBank`] - plain in-memory registers
//! - [`JsonFileSink`] - in-memory registers mirrored to a JSON file after every
//!   write, for a reporting process polling the file
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::SinkError;

/// Fixed-size set of writable signed 32-bit registers.
pub trait RegisterSink {
    /// Number of registers; valid indices are `0..slot_count()`.
    fn slot_count(&self) -> usize;

    /// Write `value` into register `index`.
    fn publish(&mut self, index: usize, value: i32) -> Result<(), SinkError>;
}

impl<S: RegisterSink + ?Sized> RegisterSink for Box<S> {
    fn slot_count(&self) -> usize {
        (**self).slot_count()
    }

    fn publish(&mut self, index: usize, value: i32) -> Result<(), SinkError> {
        (**self).publish(index, value)
    }
}

/// In-memory registers. Slots never written read back as `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterBank {
    slots: Vec<Option<i32>>,
    writes: u64,
}

impl RegisterBank {
    pub fn new(slots: usize) -> Self {
        Self {
            slots: vec![None; slots],
            writes: 0,
        }
    }

    pub fn get(&self, index: usize) -> Option<i32> {
        self.slots.get(index).copied().flatten()
    }

    pub fn values(&self) -> &[Option<i32>] {
        &self.slots
    }

    /// Total successful writes since creation.
    pub fn writes(&self) -> u64 {
        self.writes
    }
}

impl RegisterSink for RegisterBank {
    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn publish(&mut self, index: usize, value: i32) -> Result<(), SinkError> {
        let slots = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(SinkError::NoSuchSlot { index, slots })?;
        *slot = Some(value);
        self.writes += 1;
        Ok(())
    }
}

/// On-disk form of a [`JsonFileSink`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSnapshot {
    pub updated_at: DateTime<Utc>,
    pub registers: Vec<Option<i32>>,
}

/// Registers mirrored to a JSON file.
///
/// The file is replaced atomically (write to a sibling temp file, then rename)
/// so a reader never sees a half-written snapshot. Each write rewrites the
/// whole file; a reader may still observe a set where only some registers of
/// a datagram have been updated.
#[derive(Debug)]
pub struct JsonFileSink {
    bank: RegisterBank,
    path: PathBuf,
}

impl JsonFileSink {
    pub fn new(path: impl AsRef<Path>, slots: usize) -> Self {
        Self {
            bank: RegisterBank::new(slots),
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn bank(&self) -> &RegisterBank {
        &self.bank
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<(), SinkError> {
        let snapshot = RegisterSnapshot {
            updated_at: Utc::now(),
            registers: self.bank.values().to_vec(),
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!("registers written to {}", self.path.display());
        Ok(())
    }

    /// Read a snapshot previously written by a sink.
    pub fn load_snapshot(path: impl AsRef<Path>) -> Result<RegisterSnapshot, SinkError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl RegisterSink for JsonFileSink {
    fn slot_count(&self) -> usize {
        self.bank.slot_count()
    }

    fn publish(&mut self, index: usize, value: i32) -> Result<(), SinkError> {
        self.bank.publish(index, value)?;
        self.persist()
    }
}

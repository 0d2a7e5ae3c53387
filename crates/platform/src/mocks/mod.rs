//! Mock implementations for testing
//!
//! This module provides a host register file implementing [`PhyRegisters`]
//! for use in unit and integration tests.

#![cfg(any(test, feature = "std"))]

use std::collections::BTreeMap;
use std::vec::Vec;

use crate::registers::{RegisterError, PhyRegisters, PHY_WINDOW_WORDS};

/// One recorded register access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Read of `offset` that returned `value`
    Read {
        /// Word offset
        offset: u32,
        /// Value returned
        value: u16,
    },
    /// Write of `value` to `offset`
    Write {
        /// Word offset
        offset: u32,
        /// Value written
        value: u16,
    },
}

/// Mock PHY register file.
///
/// Unwritten registers read as zero. Every access is recorded in order so
/// tests can assert on the exact write sequence a loader produced.
pub struct MockRegisters {
    values: BTreeMap<u32, u16>,
    accesses: Vec<Access>,
    window_words: u32,
}

impl MockRegisters {
    /// Create a register file covering the full PHY window.
    pub fn new() -> Self {
        Self::with_window(PHY_WINDOW_WORDS)
    }

    /// Create a register file that rejects offsets at or above `window_words`.
    pub fn with_window(window_words: u32) -> Self {
        Self {
            values: BTreeMap::new(),
            accesses: Vec::new(),
            window_words,
        }
    }

    /// Preset a register value without recording an access.
    pub fn preset(&mut self, offset: u32, value: u16) {
        self.values.insert(offset, value);
    }

    /// Current value of a register (zero if never written).
    pub fn value(&self, offset: u32) -> u16 {
        self.values.get(&offset).copied().unwrap_or(0)
    }

    /// All accesses in order.
    pub fn accesses(&self) -> &[Access] {
        &self.accesses
    }

    /// Writes only, as `(offset, value)` pairs in order.
    pub fn writes(&self) -> Vec<(u32, u16)> {
        self.accesses
            .iter()
            .filter_map(|access| match *access {
                Access::Write { offset, value } => Some((offset, value)),
                Access::Read { .. } => None,
            })
            .collect()
    }

    /// Forget recorded accesses, keeping register contents.
    pub fn clear_log(&mut self) {
        self.accesses.clear();
    }

    fn check(&self, offset: u32) -> Result<(), RegisterError> {
        if offset < self.window_words {
            Ok(())
        } else {
            Err(RegisterError::OutOfWindow { offset })
        }
    }
}

impl Default for MockRegisters {
    fn default() -> Self {
        Self::new()
    }
}

impl PhyRegisters for MockRegisters {
    type Error = RegisterError;

    fn read16(&mut self, offset: u32) -> Result<u16, Self::Error> {
        self.check(offset)?;
        let value = self.value(offset);
        self.accesses.push(Access::Read { offset, value });
        Ok(value)
    }

    fn write16(&mut self, offset: u32, value: u16) -> Result<(), Self::Error> {
        self.check(offset)?;
        self.values.insert(offset, value);
        self.accesses.push(Access::Write { offset, value });
        Ok(())
    }
}

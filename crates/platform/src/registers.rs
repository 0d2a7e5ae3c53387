//! PHY register access abstraction.
//!
//! The PHY exposes its CSRs, the PMU instruction/data memories and the
//! message block through one 16-bit register window. Register offsets are
//! word offsets: offset `n` lives at byte address `base + 2 * n`.
//!
//! # Windows
//!
//! ```text
//! 0x0000_0  ┌──────────────────────────┐
//!           │  PHY CSRs (per block)     │
//! 0x5000_0  ├──────────────────────────┤
//!           │  PMU IMEM (1D / 2D image) │
//! 0x5400_0  ├──────────────────────────┤
//!           │  PMU DMEM / message block │
//! 0x9000_0  ├──────────────────────────┤
//!           │  PIE / APB-only CSRs      │
//! 0xE000_0  └──────────────────────────┘
//! ```
//!
//! The training core only ever sees [`PhyRegisters`]; the MMIO block is a
//! hardware-only implementation and tests use `mocks::MockRegisters`.

/// Number of 16-bit registers in the PHY window (offsets `0..0xE_0000`).
pub const PHY_WINDOW_WORDS: u32 = 0xE_0000;

/// Register access errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror_no_std::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegisterError {
    /// The word offset lies outside the mapped PHY window.
    #[error("PHY register offset {offset:#x} is outside the mapped window")]
    OutOfWindow {
        /// Offending word offset.
        offset: u32,
    },
}

/// 16-bit PHY register interface.
///
/// Implementations provide read/write of one 16-bit register at a word
/// offset. The training core treats every error as fatal: training cannot
/// proceed against a partially written configuration.
pub trait PhyRegisters {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read the register at word offset `offset`.
    fn read16(&mut self, offset: u32) -> Result<u16, Self::Error>;

    /// Write `value` to the register at word offset `offset`.
    fn write16(&mut self, offset: u32, value: u16) -> Result<(), Self::Error>;
}

impl<R: PhyRegisters + ?Sized> PhyRegisters for &mut R {
    type Error = R::Error;

    fn read16(&mut self, offset: u32) -> Result<u16, Self::Error> {
        (**self).read16(offset)
    }

    fn write16(&mut self, offset: u32, value: u16) -> Result<(), Self::Error> {
        (**self).write16(offset, value)
    }
}

/// Byte address of word `offset` in a window of `window_words` registers
/// mapped at `base`.
///
/// Formula: `base + 2 * offset`. Returns `Err` when the offset is outside
/// the window or the address would overflow.
pub fn csr_byte_address(base: usize, offset: u32, window_words: u32) -> Result<usize, RegisterError> {
    if offset >= window_words {
        return Err(RegisterError::OutOfWindow { offset });
    }
    usize::try_from(offset)
        .ok()
        .and_then(|words| words.checked_mul(2))
        .and_then(|bytes| base.checked_add(bytes))
        .ok_or(RegisterError::OutOfWindow { offset })
}

/// Volatile MMIO access to the PHY register window.
///
/// Only compiled for hardware targets; the base address comes from the SoC
/// memory map of the board support code.
#[cfg(feature = "hardware")]
pub struct MmioPhy {
    base: usize,
    window_words: u32,
}

#[cfg(feature = "hardware")]
impl MmioPhy {
    /// Create a register block over the PHY window at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the start of the PHY register window, mapped as device
    /// memory for at least `2 * PHY_WINDOW_WORDS` bytes, and no other code
    /// may write the window while this value exists.
    pub const unsafe fn new(base: usize) -> Self {
        Self {
            base,
            window_words: PHY_WINDOW_WORDS,
        }
    }
}

#[cfg(feature = "hardware")]
impl PhyRegisters for MmioPhy {
    type Error = RegisterError;

    fn read16(&mut self, offset: u32) -> Result<u16, Self::Error> {
        let addr = csr_byte_address(self.base, offset, self.window_words)?;
        // SAFETY: `addr` is inside the window guaranteed mapped by `new`,
        // and 2-byte aligned because `base` is and offsets are doubled.
        Ok(unsafe { core::ptr::read_volatile(addr as *const u16) })
    }

    fn write16(&mut self, offset: u32, value: u16) -> Result<(), Self::Error> {
        let addr = csr_byte_address(self.base, offset, self.window_words)?;
        // SAFETY: see `read16`; exclusive access is guaranteed by `new`.
        unsafe { core::ptr::write_volatile(addr as *mut u16, value) };
        Ok(())
    }
}

//! PMU mailbox channel.
//!
//! Half-duplex, polled, no interrupt. One exchange reads one 16- or 32-bit
//! mailbox word:
//!
//! ```text
//! CPU                                       PMU
//!  │ MicroContMuxSel = 0  (acquire CSRs)     │
//!  │ poll UctShadowRegs until bit 0 == 0 ◄── │ message posted
//!  │ read UctWriteOnlyShadow [+ UctDat...]   │
//!  │ DctWriteProt = 0  (acknowledge) ──────► │
//!  │ poll UctShadowRegs until bit 0 == 1 ◄── │ ack seen
//!  │ DctWriteProt = 1                        │
//!  │ MicroContMuxSel = 1  (release CSRs)     │
//! ```
//!
//! Every poll loop is bounded by `mailbox_retry_count` with
//! `polling_delay_us` between polls; exceeding it yields
//! [`TrainingError::RegisterTimeout`]. The release step runs on every exit
//! path through [`CsrAccess`]'s `Drop`.

pub mod log;
pub mod message;

pub use self::log::MessageLog;
pub use self::message::{
    classify, LogLevel, MailboxMessage, MajorMessage, MessageRecord, StreamArgs, StreamFormat, MAX_STREAM_ARGS,
};

use embedded_hal::delay::DelayNs;

use self::message::stream_format;
use platform::PhyRegisters;

use crate::config::TrainingConfig;
use crate::error::{TrainingError, Violation};
use crate::regs::{
    self, CSR_ACCESS_CPU, CSR_ACCESS_PMU, DCT_WRITE_PROT, MICRO_CONT_MUX_SEL, UCT_DAT_WRITE_ONLY_SHADOW,
    UCT_SHADOW_REGS, UCT_WRITE_ONLY_SHADOW, UCT_WRITE_PROT_SHADOW,
};

/// RAII guard giving the CPU the PHY CSR bus.
///
/// Acquiring writes `MicroContMuxSel = 0`; dropping writes
/// `MicroContMuxSel = 1`, including on early returns and `?` paths. The guard
/// borrows the register block mutably, so exchanges cannot overlap.
pub struct CsrAccess<'r, R: PhyRegisters> {
    regs: &'r mut R,
}

impl<'r, R: PhyRegisters> CsrAccess<'r, R> {
    /// Take the CSR bus from the PMU.
    pub fn acquire(regs: &'r mut R) -> Result<Self, TrainingError> {
        regs::write(regs, MICRO_CONT_MUX_SEL, CSR_ACCESS_CPU)?;
        Ok(Self { regs })
    }
}

impl<R: PhyRegisters> Drop for CsrAccess<'_, R> {
    fn drop(&mut self) {
        if self.regs.write16(MICRO_CONT_MUX_SEL, CSR_ACCESS_PMU).is_err() {
            error!("failed to return the CSR bus to the PMU");
        }
    }
}

impl<R: PhyRegisters> PhyRegisters for CsrAccess<'_, R> {
    type Error = R::Error;

    fn read16(&mut self, offset: u32) -> Result<u16, Self::Error> {
        self.regs.read16(offset)
    }

    fn write16(&mut self, offset: u32, value: u16) -> Result<(), Self::Error> {
        self.regs.write16(offset, value)
    }
}

/// Mailbox reader.
pub struct Mailbox<D> {
    delay: D,
    retry_count: u32,
    polling_delay_us: u32,
    formats: &'static [StreamFormat],
    last_polls: u32,
}

impl<D: DelayNs> Mailbox<D> {
    /// Mailbox using the poll bound, interval and stream formats from
    /// `config`.
    pub fn new(delay: D, config: &TrainingConfig) -> Self {
        Self::with_bounds(delay, config.mailbox_retry_count, config.polling_delay_us)
            .with_stream_formats(config.stream_formats)
    }

    /// Mailbox with an explicit poll bound and interval and no stream
    /// formats.
    pub fn with_bounds(delay: D, retry_count: u32, polling_delay_us: u32) -> Self {
        Self {
            delay,
            retry_count,
            polling_delay_us,
            formats: &[],
            last_polls: 0,
        }
    }

    /// Resolve stream message levels from `formats`.
    pub fn with_stream_formats(mut self, formats: &'static [StreamFormat]) -> Self {
        self.formats = formats;
        self
    }

    /// Status polls the last exchange spent waiting for a message.
    pub fn last_poll_count(&self) -> u32 {
        self.last_polls
    }

    /// Read one 16-bit mailbox word.
    pub fn read16<R: PhyRegisters>(&mut self, regs: &mut R) -> Result<u16, TrainingError> {
        let [low, _] = self.exchange(regs, false)?;
        Ok(low)
    }

    /// Read one 32-bit mailbox word.
    pub fn read32<R: PhyRegisters>(&mut self, regs: &mut R) -> Result<u32, TrainingError> {
        let [low, high] = self.exchange(regs, true)?;
        let [l0, l1] = low.to_le_bytes();
        let [h0, h1] = high.to_le_bytes();
        Ok(u32::from_le_bytes([l0, l1, h0, h1]))
    }

    /// Read one complete message.
    ///
    /// A major word of `0x08` announces a stream message: a 32-bit header
    /// (`string id << 16 | argument count`) follows, then one 32-bit word per
    /// argument. An argument count above [`MAX_STREAM_ARGS`] is rejected
    /// before any argument is read.
    pub fn read_message<R: PhyRegisters>(&mut self, regs: &mut R) -> Result<MailboxMessage, TrainingError> {
        let major = MajorMessage::from_id(self.read16(regs)?);
        if major != MajorMessage::StreamMessage {
            trace!("mailbox: major {:#x}", major.id());
            return Ok(MailboxMessage::Major(major));
        }

        let [c0, c1, s0, s1] = self.read32(regs)?.to_le_bytes();
        let count = u16::from_le_bytes([c0, c1]);
        let string_id = u16::from_le_bytes([s0, s1]);
        let violation = Violation::ArgumentCount {
            count: u32::from(count),
        };
        if usize::from(count) > MAX_STREAM_ARGS {
            warn!("mailbox: stream {:#x} announces {} arguments", string_id, count);
            return Err(violation.into());
        }

        let mut args = StreamArgs::new();
        for _ in 0..count {
            let arg = self.read32(regs)?;
            args.push(arg).map_err(|_| violation)?;
        }
        if stream_format(self.formats, string_id).is_none() {
            debug!("mailbox: stream string {:#x} not in the format table", string_id);
        }
        Ok(MailboxMessage::stream(self.formats, string_id, args))
    }

    fn exchange<R: PhyRegisters>(&mut self, regs: &mut R, wide: bool) -> Result<[u16; 2], TrainingError> {
        let mut csr = CsrAccess::acquire(regs)?;

        self.last_polls = 0;
        self.last_polls = self.wait_for_shadow(&mut csr, false)?;
        let low = regs::read(&mut csr, UCT_WRITE_ONLY_SHADOW)?;
        let high = if wide {
            regs::read(&mut csr, UCT_DAT_WRITE_ONLY_SHADOW)?
        } else {
            0
        };

        regs::write(&mut csr, DCT_WRITE_PROT, 0)?;
        self.wait_for_shadow(&mut csr, true)?;
        regs::write(&mut csr, DCT_WRITE_PROT, 1)?;

        Ok([low, high])
    }

    /// Poll UctWriteProtShadow until it reads `set`; returns the polls used.
    fn wait_for_shadow<R: PhyRegisters>(&mut self, regs: &mut R, set: bool) -> Result<u32, TrainingError> {
        let mut polls: u32 = 0;
        while polls < self.retry_count {
            let status = regs::read(regs, UCT_SHADOW_REGS)?;
            polls = polls.saturating_add(1);
            if (status & UCT_WRITE_PROT_SHADOW != 0) == set {
                return Ok(polls);
            }
            if polls < self.retry_count {
                self.delay.delay_us(self.polling_delay_us);
            }
        }
        warn!("mailbox: no response after {} polls", polls);
        Err(TrainingError::RegisterTimeout {
            address: UCT_SHADOW_REGS,
        })
    }
}

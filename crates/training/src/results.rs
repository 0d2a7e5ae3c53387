//! Per-run training results read back from the PMU message block.
//!
//! At the end of every firmware run the sequencer captures the fields of the
//! active message-block layout into a staged [`ResultLogEntry`]. The entry
//! becomes visible to [`ResultLog::decode_result`] (and to dynamic-update
//! value functions of later runs) only once the run is committed.

use core::fmt;

use heapless::Vec;
use platform::PhyRegisters;

use crate::error::{LogKind, TrainingError, Violation};
use crate::regs::{self, MB_CDD_RW_0_3, MB_CDD_RW_1_0, MB_CS_TEST_FAIL, MB_PMU_REVISION, MB_RX_CLK_DLY_MARGIN_2D};
use crate::state::{SequenceCtrl, TrainingState};

/// Maximum number of committed runs.
pub const MAX_RUN_COUNT: usize = 10;

/// Result fields the controller knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResultId {
    /// Firmware revision
    PmuRevision,
    /// Non-zero if a chip select failed its test
    CsTestFail,
    /// Read-to-write critical delay difference, rank 1 to rank 0
    CdDRw1_0,
    /// Read-to-write critical delay difference, rank 0 to rank 3
    CdDRw0_3,
    /// Receive clock delay margin from 2D training
    RxClkDelayMargin2d,
}

impl ResultId {
    /// Number of result kinds.
    pub const COUNT: usize = 5;

    /// All result kinds, in field order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::PmuRevision,
        Self::CsTestFail,
        Self::CdDRw1_0,
        Self::CdDRw0_3,
        Self::RxClkDelayMargin2d,
    ];

    const fn index(self) -> usize {
        match self {
            Self::PmuRevision => 0,
            Self::CsTestFail => 1,
            Self::CdDRw1_0 => 2,
            Self::CdDRw0_3 => 3,
            Self::RxClkDelayMargin2d => 4,
        }
    }

    /// Field name as used by the firmware.
    pub const fn name(self) -> &'static str {
        match self {
            Self::PmuRevision => "PmuRevision",
            Self::CsTestFail => "CsTestFail",
            Self::CdDRw1_0 => "CdD_RW_1_0",
            Self::CdDRw0_3 => "CdD_RW_0_3",
            Self::RxClkDelayMargin2d => "RxClkDly_Margin",
        }
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a result lives: register, mask, and right shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultDescriptor {
    /// Result kind
    pub id: ResultId,
    /// Message-block word offset
    pub address: u32,
    /// Field mask, applied before the shift
    pub mask: u16,
    /// Field position
    pub offset: u16,
}

impl ResultDescriptor {
    /// Construct a descriptor.
    pub const fn new(id: ResultId, address: u32, mask: u16, offset: u16) -> Self {
        Self {
            id,
            address,
            mask,
            offset,
        }
    }

    /// `(raw & mask) >> offset`
    pub const fn extract(&self, raw: u16) -> u16 {
        (raw & self.mask).wrapping_shr(self.offset as u32)
    }

    /// Read the register and extract the field.
    pub fn read<R: PhyRegisters>(&self, regs: &mut R) -> Result<u16, TrainingError> {
        Ok(self.extract(regs::read(regs, self.address)?))
    }
}

const LAYOUT_1D: [ResultDescriptor; 4] = [
    ResultDescriptor::new(ResultId::PmuRevision, MB_PMU_REVISION, 0xFFFF, 0),
    ResultDescriptor::new(ResultId::CsTestFail, MB_CS_TEST_FAIL, 0x00FF, 0),
    ResultDescriptor::new(ResultId::CdDRw1_0, MB_CDD_RW_1_0, 0xFF00, 8),
    ResultDescriptor::new(ResultId::CdDRw0_3, MB_CDD_RW_0_3, 0x00FF, 0),
];

const LAYOUT_2D: [ResultDescriptor; 3] = [
    ResultDescriptor::new(ResultId::PmuRevision, MB_PMU_REVISION, 0xFFFF, 0),
    ResultDescriptor::new(ResultId::CsTestFail, MB_CS_TEST_FAIL, 0x00FF, 0),
    ResultDescriptor::new(ResultId::RxClkDelayMargin2d, MB_RX_CLK_DLY_MARGIN_2D, 0x00FF, 0),
];

/// Message-block layout of the firmware image in use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageBlockLayout {
    /// 1D training firmware
    OneD,
    /// 2D training firmware
    TwoD,
}

impl MessageBlockLayout {
    /// Layout written by the firmware that runs in `state`.
    pub const fn for_state(state: TrainingState) -> Self {
        match state {
            TrainingState::Training2d => Self::TwoD,
            _ => Self::OneD,
        }
    }

    /// Descriptor table of this layout.
    pub const fn descriptors(self) -> &'static [ResultDescriptor] {
        match self {
            Self::OneD => &LAYOUT_1D,
            Self::TwoD => &LAYOUT_2D,
        }
    }
}

/// Results of one firmware run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultLogEntry {
    /// Run number, assigned at capture
    pub run: usize,
    /// Steps the run executed
    pub sequence: SequenceCtrl,
    /// State the run belonged to
    pub state: TrainingState,
    fields: [Option<u16>; ResultId::COUNT],
}

impl ResultLogEntry {
    /// Captured value of `id`, if the run's layout contains it.
    pub fn field(&self, id: ResultId) -> Option<u16> {
        self.fields.get(id.index()).copied().flatten()
    }

    /// Captured fields in [`ResultId::ALL`] order.
    pub fn fields(&self) -> impl Iterator<Item = (ResultId, u16)> + '_ {
        ResultId::ALL
            .iter()
            .filter_map(|&id| self.field(id).map(|value| (id, value)))
    }
}

/// Committed results, at most [`MAX_RUN_COUNT`] runs.
///
/// Run numbers count committed runs only; a retried or failed run is
/// discarded and its number reused.
#[derive(Debug, Clone, Default)]
pub struct ResultLog {
    entries: Vec<ResultLogEntry, MAX_RUN_COUNT>,
    pending: Option<ResultLogEntry>,
}

impl ResultLog {
    /// Empty log.
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
            pending: None,
        }
    }

    /// Runs committed so far.
    pub fn current_run(&self) -> usize {
        self.entries.len()
    }

    /// Capture the layout used by `state` into a staged entry.
    pub fn capture<R: PhyRegisters>(
        &mut self,
        regs: &mut R,
        state: TrainingState,
        sequence: SequenceCtrl,
    ) -> Result<&ResultLogEntry, TrainingError> {
        let layout = MessageBlockLayout::for_state(state);
        self.capture_layout(regs, layout.descriptors(), state, sequence)
    }

    /// Capture an explicit descriptor table into a staged entry.
    ///
    /// Replaces any entry staged earlier and not committed.
    pub fn capture_layout<R: PhyRegisters>(
        &mut self,
        regs: &mut R,
        descriptors: &[ResultDescriptor],
        state: TrainingState,
        sequence: SequenceCtrl,
    ) -> Result<&ResultLogEntry, TrainingError> {
        let mut fields = [None; ResultId::COUNT];
        for descriptor in descriptors {
            let value = descriptor.read(regs)?;
            if let Some(slot) = fields.get_mut(descriptor.id.index()) {
                *slot = Some(value);
            }
        }
        let entry = ResultLogEntry {
            run: self.current_run(),
            sequence,
            state,
            fields,
        };
        Ok(self.pending.insert(entry))
    }

    /// Stage an entry with no fields, for a run whose message block was
    /// not read.
    pub fn stage_empty(&mut self, state: TrainingState, sequence: SequenceCtrl) {
        self.pending = Some(ResultLogEntry {
            run: self.current_run(),
            sequence,
            state,
            fields: [None; ResultId::COUNT],
        });
    }

    /// Staged entry, if any.
    pub fn pending(&self) -> Option<&ResultLogEntry> {
        self.pending.as_ref()
    }

    /// Commit the staged entry; returns the new run count.
    ///
    /// Without a staged entry nothing is committed.
    pub fn commit(&mut self) -> Result<usize, TrainingError> {
        let Some(entry) = self.pending.take() else {
            return Ok(self.current_run());
        };
        self.entries
            .push(entry)
            .map_err(|_| TrainingError::CapacityExceeded {
                log: LogKind::Results,
                capacity: MAX_RUN_COUNT,
            })?;
        Ok(self.current_run())
    }

    /// Drop the staged entry.
    pub fn discard(&mut self) {
        self.pending = None;
    }

    /// Committed entry of `run`.
    pub fn entry(&self, run: usize) -> Option<&ResultLogEntry> {
        self.entries.get(run)
    }

    /// Most recently committed entry.
    pub fn last(&self) -> Option<&ResultLogEntry> {
        self.entries.last()
    }

    /// Committed entries in run order.
    pub fn entries(&self) -> &[ResultLogEntry] {
        &self.entries
    }

    /// Field `id` of committed run `run`.
    ///
    /// The run must have executed every step in `sequence`; a single step
    /// flag selects the run that included it, whether that run was one step
    /// or the full sequence.
    pub fn decode_result(
        &self,
        id: ResultId,
        run: usize,
        sequence: SequenceCtrl,
    ) -> Result<u16, TrainingError> {
        let entry = self.entries.get(run).ok_or(Violation::RunOutOfRange {
            run,
            current: self.current_run(),
        })?;
        if sequence.is_empty() || !entry.sequence.contains(sequence) {
            return Err(Violation::SequenceMismatch {
                captured: entry.sequence,
                requested: sequence,
            }
            .into());
        }
        entry
            .field(id)
            .ok_or_else(|| Violation::UnknownResult { result: id }.into())
    }

    /// Emit every committed entry to the log sink.
    pub fn log_results(&self) {
        for entry in &self.entries {
            info!("run {}: {} {}", entry.run, entry.state, entry.sequence);
            for (id, value) in entry.fields() {
                info!("  {} = {:#x}", id, value);
            }
        }
    }
}

//! Sections and the three-pass section loader.
//!
//! A section is one functional region of PHY configuration (CSR block, PMU
//! IMEM image, message block, ...). Loading it applies up to three tables
//! in order:
//!
//! 1. **Static**: the vendor delivery image, either a contiguous run of
//!    values from a base address or explicit address/value pairs.
//! 2. **Static update**: fixed overrides, skipped when the static image
//!    already embeds them.
//! 3. **Dynamic update**: values computed by a function at the moment the
//!    entry is reached, from an [`UpdateContext`].
//!
//! Table order is preserved; later writes may depend on side effects of
//! earlier ones.

use core::fmt;

use platform::{DramTopology, PhyRegisters};

use crate::error::TrainingError;
use crate::regs;
use crate::results::ResultLog;
use crate::state::{SequenceCtrl, TrainingState};

/// Section identifiers, in load order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SectionId {
    /// PHY configuration CSRs
    PhyConfig,
    /// 1D training firmware instruction memory
    Imem1d,
    /// 1D training firmware data memory (message block)
    Dmem1d,
    /// 2D training firmware instruction memory
    Imem2d,
    /// 2D training firmware data memory (message block)
    Dmem2d,
    /// PHY init engine registers
    PhyInitEngine,
}

impl SectionId {
    /// Section name for log output.
    pub const fn name(self) -> &'static str {
        match self {
            Self::PhyConfig => "PHY_CONFIG",
            Self::Imem1d => "1D_IMEM",
            Self::Dmem1d => "1D_DMEM",
            Self::Imem2d => "2D_IMEM",
            Self::Dmem2d => "2D_DMEM",
            Self::PhyInitEngine => "PHY_INIT_ENGINE",
        }
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One explicit register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressData {
    /// Word offset
    pub address: u32,
    /// Value to write
    pub value: u16,
}

impl AddressData {
    /// Construct an entry.
    pub const fn new(address: u32, value: u16) -> Self {
        Self { address, value }
    }
}

/// Static table of a section.
#[derive(Debug, Clone, Copy)]
pub enum StaticData<'a> {
    /// Consecutive values written from `base` upward.
    Sequential {
        /// First word offset
        base: u32,
        /// Values, written to `base`, `base + 1`, ...
        values: &'a [u16],
    },
    /// Explicit address/value pairs.
    Random(&'a [AddressData]),
}

impl StaticData<'_> {
    /// Number of writes the table produces.
    pub const fn len(&self) -> usize {
        match self {
            Self::Sequential { values, .. } => values.len(),
            Self::Random(pairs) => pairs.len(),
        }
    }

    /// True if the table produces no writes.
    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether a section's static image already carries the static-update
/// values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StaticUpdate {
    /// Static image includes the updates; the static-update table is skipped.
    Embedded,
    /// Static-update table is applied after the static image.
    Separate,
}

/// Read-only view handed to dynamic-update value functions.
///
/// This is the complete set of state a value function may depend on.
#[derive(Clone, Copy)]
pub struct UpdateContext<'a> {
    /// Current training state
    pub state: TrainingState,
    /// Sequence control of the step being loaded
    pub sequence: SequenceCtrl,
    /// Board DRAM topology
    pub topology: &'a DramTopology,
    /// Results of committed runs
    pub results: &'a ResultLog,
}

impl<'a> UpdateContext<'a> {
    /// Bundle a context.
    pub const fn new(
        state: TrainingState,
        sequence: SequenceCtrl,
        topology: &'a DramTopology,
        results: &'a ResultLog,
    ) -> Self {
        Self {
            state,
            sequence,
            topology,
            results,
        }
    }
}

/// Value function of a dynamic-update entry.
pub type ValueFn<'a> = &'a dyn Fn(&UpdateContext<'_>) -> Result<u16, TrainingError>;

/// Register written with a value computed at load time.
#[derive(Clone, Copy)]
pub struct DynamicUpdate<'a> {
    /// Word offset
    pub address: u32,
    /// Called exactly once per load, when this entry is reached.
    pub value: ValueFn<'a>,
}

impl fmt::Debug for DynamicUpdate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicUpdate")
            .field("address", &format_args!("{:#x}", self.address))
            .finish_non_exhaustive()
    }
}

/// A named configuration table.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    /// Identifier
    pub id: SectionId,
    /// Static table (required, non-empty)
    pub static_data: StaticData<'a>,
    /// Whether `static_data` already embeds `static_update`
    pub static_update_flag: StaticUpdate,
    /// Fixed overrides
    pub static_update: Option<&'a [AddressData]>,
    /// Load-time computed values
    pub dynamic_update: Option<&'a [DynamicUpdate<'a>]>,
}

impl<'a> Section<'a> {
    /// Section with only a static table.
    pub const fn new(id: SectionId, static_data: StaticData<'a>) -> Self {
        Self {
            id,
            static_data,
            static_update_flag: StaticUpdate::Separate,
            static_update: None,
            dynamic_update: None,
        }
    }

    /// Attach a static-update table and say whether the image embeds it.
    #[must_use]
    pub const fn with_static_update(mut self, flag: StaticUpdate, table: &'a [AddressData]) -> Self {
        self.static_update_flag = flag;
        self.static_update = Some(table);
        self
    }

    /// Attach a dynamic-update table.
    #[must_use]
    pub const fn with_dynamic_update(mut self, table: &'a [DynamicUpdate<'a>]) -> Self {
        self.dynamic_update = Some(table);
        self
    }
}

/// The six sections of a full training invocation.
#[derive(Debug, Clone, Copy)]
pub struct SectionSet<'a> {
    /// PHY configuration
    pub phy_config: Section<'a>,
    /// 1D IMEM image
    pub imem_1d: Section<'a>,
    /// 1D DMEM image
    pub dmem_1d: Section<'a>,
    /// 2D IMEM image
    pub imem_2d: Section<'a>,
    /// 2D DMEM image
    pub dmem_2d: Section<'a>,
    /// PHY init engine
    pub phy_init_engine: Section<'a>,
}

impl<'a> SectionSet<'a> {
    /// Section by identifier.
    pub const fn get(&self, id: SectionId) -> &Section<'a> {
        match id {
            SectionId::PhyConfig => &self.phy_config,
            SectionId::Imem1d => &self.imem_1d,
            SectionId::Dmem1d => &self.dmem_1d,
            SectionId::Imem2d => &self.imem_2d,
            SectionId::Dmem2d => &self.dmem_2d,
            SectionId::PhyInitEngine => &self.phy_init_engine,
        }
    }
}

/// Write counts of one section load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LoadSummary {
    /// Static table writes
    pub static_writes: usize,
    /// Static-update writes (0 when skipped)
    pub static_update_writes: usize,
    /// Dynamic-update writes
    pub dynamic_writes: usize,
}

impl LoadSummary {
    /// Total writes.
    pub const fn total(&self) -> usize {
        self.static_writes
            .saturating_add(self.static_update_writes)
            .saturating_add(self.dynamic_writes)
    }
}

/// Load a section: static, then static update, then dynamic update.
///
/// No value validation happens here. A value function error aborts the load
/// before its entry is written; a register access error is fatal.
pub fn load_section<R: PhyRegisters>(
    regs: &mut R,
    section: &Section<'_>,
    ctx: &UpdateContext<'_>,
) -> Result<LoadSummary, TrainingError> {
    if section.static_data.is_empty() {
        error!("section {} has no static data", section.id);
        return Err(TrainingError::EmptySection {
            section: section.id,
        });
    }

    let mut summary = LoadSummary::default();

    match section.static_data {
        StaticData::Sequential { base, values } => {
            let mut address = base;
            for &value in values {
                regs::write(regs, address, value)?;
                address = address
                    .checked_add(1)
                    .ok_or(TrainingError::RegisterAccess { address })?;
            }
        }
        StaticData::Random(pairs) => {
            for entry in pairs {
                regs::write(regs, entry.address, entry.value)?;
            }
        }
    }
    summary.static_writes = section.static_data.len();
    debug!("{}: static load, {} writes", section.id, summary.static_writes);

    match (section.static_update_flag, section.static_update) {
        (StaticUpdate::Separate, Some(table)) => {
            for entry in table {
                regs::write(regs, entry.address, entry.value)?;
            }
            summary.static_update_writes = table.len();
            debug!(
                "{}: static update, {} writes",
                section.id, summary.static_update_writes
            );
        }
        (StaticUpdate::Embedded, Some(_)) => {
            debug!("{}: static update embedded in image", section.id);
        }
        (_, None) => {}
    }

    if let Some(table) = section.dynamic_update {
        for entry in table {
            let value = (entry.value)(ctx)?;
            trace!("{}: dynamic {:#x} = {:#x}", section.id, entry.address, value);
            regs::write(regs, entry.address, value)?;
        }
        summary.dynamic_writes = table.len();
        debug!(
            "{}: dynamic update, {} writes ({} {})",
            section.id, summary.dynamic_writes, ctx.state, ctx.sequence
        );
    }

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use core::cell::Cell;
    use platform::mocks::MockRegisters;

    const IMAGE: [u16; 4] = [0xA0, 0xA1, 0xA2, 0xA3];
    const OVERRIDES: [AddressData; 2] = [AddressData::new(0x5_4002, 0x11), AddressData::new(0x5_4004, 0x22)];

    fn ctx<'a>(topology: &'a DramTopology, results: &'a ResultLog) -> UpdateContext<'a> {
        UpdateContext::new(
            TrainingState::Training1d,
            SequenceCtrl::DEV_INIT,
            topology,
            results,
        )
    }

    #[test]
    fn test_sequential_image_writes_consecutive_offsets() {
        let topology = DramTopology::default();
        let results = ResultLog::new();
        let section = Section::new(
            SectionId::Imem1d,
            StaticData::Sequential {
                base: 0x5_0000,
                values: &IMAGE,
            },
        );
        let mut regs = MockRegisters::new();
        let summary = load_section(&mut regs, &section, &ctx(&topology, &results)).unwrap();
        assert_eq!(
            regs.writes(),
            vec![(0x5_0000, 0xA0), (0x5_0001, 0xA1), (0x5_0002, 0xA2), (0x5_0003, 0xA3)]
        );
        assert_eq!(summary.total(), 4);
    }

    #[test]
    fn test_embedded_static_update_is_skipped() {
        let topology = DramTopology::default();
        let results = ResultLog::new();
        let update = [AddressData::new(0x5_4003, 0xFF)];
        let section = Section::new(SectionId::Dmem1d, StaticData::Random(&OVERRIDES))
            .with_static_update(StaticUpdate::Embedded, &update);
        let mut regs = MockRegisters::new();
        let summary = load_section(&mut regs, &section, &ctx(&topology, &results)).unwrap();
        assert_eq!(summary.static_update_writes, 0);
        assert!(regs.writes().iter().all(|&(addr, _)| addr != 0x5_4003));
    }

    #[test]
    fn test_empty_static_table_is_rejected_before_any_write() {
        let topology = DramTopology::default();
        let results = ResultLog::new();
        let section = Section::new(SectionId::PhyInitEngine, StaticData::Random(&[]));
        let mut regs = MockRegisters::new();
        assert_eq!(
            load_section(&mut regs, &section, &ctx(&topology, &results)),
            Err(TrainingError::EmptySection {
                section: SectionId::PhyInitEngine
            })
        );
        assert!(regs.accesses().is_empty());
    }

    #[test]
    fn test_value_function_error_stops_before_its_write() {
        let topology = DramTopology::default();
        let results = ResultLog::new();
        let calls = Cell::new(0u32);
        let ok = |_: &UpdateContext<'_>| -> Result<u16, TrainingError> {
            calls.set(calls.get() + 1);
            Ok(0x55)
        };
        let unsupported = |_: &UpdateContext<'_>| -> Result<u16, TrainingError> {
            calls.set(calls.get() + 1);
            Err(TrainingError::UnsupportedConfiguration { parameter: "test" })
        };
        let table = [
            DynamicUpdate { address: 0x2_0000, value: &ok },
            DynamicUpdate { address: 0x2_0001, value: &unsupported },
            DynamicUpdate { address: 0x2_0002, value: &ok },
        ];
        let section = Section::new(SectionId::PhyConfig, StaticData::Random(&OVERRIDES))
            .with_dynamic_update(&table);
        let mut regs = MockRegisters::new();
        let err = load_section(&mut regs, &section, &ctx(&topology, &results)).unwrap_err();
        assert_eq!(err, TrainingError::UnsupportedConfiguration { parameter: "test" });
        assert_eq!(calls.get(), 2);
        let writes = regs.writes();
        assert_eq!(writes.last(), Some(&(0x2_0000, 0x55)));
    }

    #[test]
    fn test_register_failure_is_fatal() {
        let topology = DramTopology::default();
        let results = ResultLog::new();
        let section = Section::new(
            SectionId::Imem2d,
            StaticData::Sequential {
                base: 0xFE,
                values: &IMAGE,
            },
        );
        let mut regs = MockRegisters::with_window(0x100);
        assert_eq!(
            load_section(&mut regs, &section, &ctx(&topology, &results)),
            Err(TrainingError::RegisterAccess { address: 0x100 })
        );
        assert_eq!(regs.writes().len(), 2);
    }
}

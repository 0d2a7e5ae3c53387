//! Training state and PMU sequence-control flags.

use core::fmt;
use core::ops::BitOr;

/// Training state, advanced only by the sequencer.
///
/// ```text
/// PhyConfig ─→ Training1d ─→ Training2d ─→ PhyInitEngine
///                  ↺ retry        ↺ retry
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrainingState {
    /// PHY configuration registers
    PhyConfig,
    /// 1D training (delay-only eye centering)
    Training1d,
    /// 2D training (delay and voltage eye centering)
    Training2d,
    /// PHY init engine programming
    PhyInitEngine,
}

impl TrainingState {
    /// All states in execution order.
    pub const ALL: [Self; 4] = [
        Self::PhyConfig,
        Self::Training1d,
        Self::Training2d,
        Self::PhyInitEngine,
    ];

    /// The state that follows this one, or `None` after the last state.
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::PhyConfig => Some(Self::Training1d),
            Self::Training1d => Some(Self::Training2d),
            Self::Training2d => Some(Self::PhyInitEngine),
            Self::PhyInitEngine => None,
        }
    }

    /// Whether this state runs the PMU training firmware.
    pub const fn runs_firmware(self) -> bool {
        matches!(self, Self::Training1d | Self::Training2d)
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::PhyConfig => "PHY config",
            Self::Training1d => "1D training",
            Self::Training2d => "2D training",
            Self::PhyInitEngine => "PHY init engine",
        }
    }
}

impl fmt::Display for TrainingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// PMU SequenceCtrl flags: which training sub-steps the next firmware run
/// executes.
///
/// Bit positions follow the message-block SequenceCtrl field; 1D and 2D
/// flags never share a bit so a single value identifies the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SequenceCtrl(u16);

impl SequenceCtrl {
    /// DRAM device initialization
    pub const DEV_INIT: Self = Self(1 << 0);
    /// Write leveling
    pub const WR_LVL: Self = Self(1 << 1);
    /// Read gate (receive enable) training
    pub const RX_EN: Self = Self(1 << 2);
    /// 1D read DQS delay centering
    pub const RD_DQS_1D: Self = Self(1 << 3);
    /// 1D write DQ delay centering
    pub const WR_DQ_1D: Self = Self(1 << 4);
    /// 2D read DQS delay/voltage centering
    pub const RD_DQS_2D: Self = Self(1 << 5);
    /// 2D write DQ delay/voltage centering
    pub const WR_DQ_2D: Self = Self(1 << 6);
    /// Read deskew
    pub const RD_DESKEW: Self = Self(1 << 8);
    /// Max read latency
    pub const MX_RD_LAT: Self = Self(1 << 9);

    /// No steps selected.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Wrap raw register bits.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Raw register bits.
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Union of two flag sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// True if every flag in `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any flag in `other` is set in `self`.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// True if no flag is set.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl BitOr for SequenceCtrl {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl fmt::Display for SequenceCtrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#06x}", self.0)
    }
}

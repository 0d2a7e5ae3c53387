//! DRAM topology description.
//!
//! The board support code fills in a [`DramTopology`] from SPD data or a
//! board table; the training core's value-resolution functions read it while
//! dynamic-update entries are applied. Everything here is pure data, no
//! register access, fully host-testable.
//!
//! Raw fields (`memory_freq_mhz`, impedances in ohms) are kept raw on
//! purpose: the training core validates them at the point of use and reports
//! an unsupported value as a configuration error instead of the topology
//! layer refusing to describe the board.

/// Supported DDR4 memory clock frequencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DdrFreq {
    /// 800 MHz clock (DDR4-1600)
    Mhz800,
    /// 1200 MHz clock (DDR4-2400)
    Mhz1200,
    /// 1333 MHz clock (DDR4-2666)
    Mhz1333,
    /// 1466 MHz clock (DDR4-2933)
    Mhz1466,
    /// 1600 MHz clock (DDR4-3200)
    Mhz1600,
}

impl DdrFreq {
    /// Map a clock frequency in MHz to a supported frequency.
    ///
    /// Returns `None` for any frequency without a PHY configuration table.
    pub const fn from_mhz(mhz: u32) -> Option<Self> {
        match mhz {
            800 => Some(Self::Mhz800),
            1200 => Some(Self::Mhz1200),
            1333 => Some(Self::Mhz1333),
            1466 => Some(Self::Mhz1466),
            1600 => Some(Self::Mhz1600),
            _ => None,
        }
    }

    /// Memory clock in MHz.
    pub const fn mhz(self) -> u32 {
        match self {
            Self::Mhz800 => 800,
            Self::Mhz1200 => 1200,
            Self::Mhz1333 => 1333,
            Self::Mhz1466 => 1466,
            Self::Mhz1600 => 1600,
        }
    }

    /// Data rate in MT/s (two transfers per clock).
    pub const fn data_rate_mts(self) -> u16 {
        match self {
            Self::Mhz800 => 1600,
            Self::Mhz1200 => 2400,
            Self::Mhz1333 => 2666,
            Self::Mhz1466 => 2933,
            Self::Mhz1600 => 3200,
        }
    }

    /// DFI clock in MHz (1:2 DFI frequency ratio).
    pub const fn dfi_mhz(self) -> u32 {
        self.mhz() / 2
    }

    /// Clock period in picoseconds, truncated.
    pub const fn tck_ps(self) -> u32 {
        match 1_000_000u32.checked_div(self.mhz()) {
            Some(ps) => ps,
            None => 0,
        }
    }
}

/// DRAM device data width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DeviceWidth {
    /// x8 devices
    X8,
    /// x16 devices
    X16,
}

/// Impedance in ohms as written in the board table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ohm(pub u16);

impl Ohm {
    /// Termination disabled.
    pub const DISABLED: Self = Self(0);

    /// Raw ohm value.
    pub const fn get(self) -> u16 {
        self.0
    }
}

/// Board DRAM topology consumed by value resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DramTopology {
    /// Memory clock in MHz (must match a [`DdrFreq`] to train).
    pub memory_freq_mhz: u32,
    /// Number of populated chip selects.
    pub cs_num: u8,
    /// Interface data bus width in bits (32 or 64).
    pub bus_width: u8,
    /// ECC byte lane populated and enabled.
    pub ecc_enabled: bool,
    /// 32-bit bus with the ECC byte routed on PUP8 (trained as a 64-bit bus).
    pub ecc_on_pup8: bool,
    /// DRAM device width.
    pub device_width: DeviceWidth,
    /// Apply the x16 workaround: report x16 devices as x8 so per-device
    /// VrefDQ comes from the first PHY of each x16 pair.
    pub x16_as_x8: bool,
    /// Address mirroring bitmask per chip select.
    pub mirror_mask: u8,
    /// PHY address/command driver pull-up impedance.
    pub drv_ctrl_p: Ohm,
    /// PHY data driver pull-up impedance.
    pub drv_data_p: Ohm,
    /// PHY receiver ODT pull-up impedance, indexed by `cs_num - 1`.
    pub odt_p: [Ohm; 2],
    /// DRAM RTT_NOM termination.
    pub rtt_nom: Ohm,
    /// DRAM RTT_WR termination.
    pub rtt_wr: Ohm,
    /// DRAM RTT_PARK termination.
    pub rtt_park: Ohm,
    /// CAS latency in clocks.
    pub cas_latency: u8,
    /// CAS write latency in clocks.
    pub cas_write_latency: u8,
    /// Write recovery time tWR in picoseconds (speed-bin value).
    pub t_wr_ps: u32,
    /// Long CAS-to-CAS delay tCCD_L in picoseconds (speed-bin value).
    pub t_ccd_l_ps: u32,
}

impl DramTopology {
    /// Reference board: single chip select, 64-bit bus of x8 DDR4-2400 devices.
    pub const fn ddr4_2400_single_cs() -> Self {
        Self {
            memory_freq_mhz: 1200,
            cs_num: 1,
            bus_width: 64,
            ecc_enabled: false,
            ecc_on_pup8: false,
            device_width: DeviceWidth::X8,
            x16_as_x8: false,
            mirror_mask: 0,
            drv_ctrl_p: Ohm(40),
            drv_data_p: Ohm(48),
            odt_p: [Ohm(60), Ohm(120)],
            rtt_nom: Ohm::DISABLED,
            rtt_wr: Ohm(120),
            rtt_park: Ohm(60),
            cas_latency: 17,
            cas_write_latency: 12,
            t_wr_ps: 15_000,
            t_ccd_l_ps: 5_000,
        }
    }

    /// Supported memory frequency, or `None` if the board clock has no table.
    pub const fn freq(&self) -> Option<DdrFreq> {
        DdrFreq::from_mhz(self.memory_freq_mhz)
    }
}

impl Default for DramTopology {
    fn default() -> Self {
        Self::ddr4_2400_single_cs()
    }
}

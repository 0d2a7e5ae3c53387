//! Value functions for dynamic-update entries.
//!
//! Every function reads only its [`UpdateContext`] and returns the 16-bit
//! register value, or [`TrainingError::UnsupportedConfiguration`] naming the
//! topology parameter that has no case. Nothing here touches registers.

pub mod mode_register;

use platform::{DdrFreq, DeviceWidth, Ohm};

use crate::error::TrainingError;
use crate::section::UpdateContext;
use crate::state::SequenceCtrl;

/// HdtCtrl: coarse debug messages (rank information).
pub const HDT_CTRL_COARSE_DEBUG: u16 = 0x0A;
/// HdtCtrl: firmware completion messages only.
pub const HDT_CTRL_FW_COMPLETION: u16 = 0xFF;

/// OdtCtrl values per chip-select count.
const ODT_CTRL_ONE_CS: u16 = 0x0001;
const ODT_CTRL_TWO_CS: u16 = 0x0201;

/// CsPresent (low byte) / CsPresentD0 (high byte).
const CS_PRESENT_ONE_CS: u16 = 0x0101;
const CS_PRESENT_TWO_CS: u16 = 0x0303;

/// DisabledDbyte masks per bus width.
const DISABLED_DBYTES_32_BIT: u8 = 0xF0;
const DISABLED_DBYTES_64_BIT: u8 = 0x00;

/// CsSetupGDDec (X16Present high byte): gear-down decode off.
const CS_SETUP_GDDEC: u8 = 0;

/// PHY impedances the firmware accepts for PhyDrvImpedance / PhyOdtImpedance.
const PHY_IMPEDANCES: [u16; 6] = [30, 48, 60, 80, 120, 240];

/// TxOdtDrvStren pull-up code per impedance.
const TX_STRENGTH_CODES: [(u16, u16); 6] = [(30, 0x3F), (48, 0x28), (60, 0x1E), (80, 0x18), (120, 0x0C), (240, 0x06)];
const TX_ODT_STREN_SHIFT: u32 = 6;

const fn unsupported(parameter: &'static str) -> TrainingError {
    TrainingError::UnsupportedConfiguration { parameter }
}

fn freq(ctx: &UpdateContext<'_>) -> Result<DdrFreq, TrainingError> {
    ctx.topology.freq().ok_or(unsupported("memory frequency"))
}

fn dfi_mhz(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    u16::try_from(freq(ctx)?.dfi_mhz()).map_err(|_| unsupported("memory frequency"))
}

/// PHY ODT impedance for the populated chip-select count.
fn phy_odt(ctx: &UpdateContext<'_>) -> Result<Ohm, TrainingError> {
    usize::from(ctx.topology.cs_num)
        .checked_sub(1)
        .and_then(|index| ctx.topology.odt_p.get(index))
        .copied()
        .ok_or(unsupported("chip select count"))
}

fn phy_impedance(ohm: Ohm, parameter: &'static str) -> Result<u8, TrainingError> {
    if !PHY_IMPEDANCES.contains(&ohm.get()) {
        return Err(unsupported(parameter));
    }
    u8::try_from(ohm.get()).map_err(|_| unsupported(parameter))
}

// ── PHY configuration ───────────────────────────────────────────────────────

/// PllCtrl2: PLL frequency select.
pub fn pll_ctrl2(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    Ok(match freq(ctx)? {
        DdrFreq::Mhz800 => 0x1A,
        DdrFreq::Mhz1200 | DdrFreq::Mhz1333 => 0x19,
        DdrFreq::Mhz1466 | DdrFreq::Mhz1600 => 0x18,
    })
}

/// ARdPtrInitVal: read FIFO pointer init, one more above 2400 MT/s.
pub fn ard_ptr_init_val(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    Ok(match freq(ctx)? {
        DdrFreq::Mhz800 | DdrFreq::Mhz1200 => 0x2,
        DdrFreq::Mhz1333 | DdrFreq::Mhz1466 | DdrFreq::Mhz1600 => 0x3,
    })
}

/// ProcOdtTimeCtl: read ODT timing.
pub fn proc_odt_time_ctl(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    Ok(match freq(ctx)? {
        DdrFreq::Mhz800 => 0x7,
        DdrFreq::Mhz1200 | DdrFreq::Mhz1333 => 0x6,
        DdrFreq::Mhz1466 | DdrFreq::Mhz1600 => 0x3,
    })
}

/// CalUClkInfo: DFI clock in MHz.
pub fn cal_uclk_info(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    dfi_mhz(ctx)
}

/// OdtCtrl / TxOdtDrvStren enable per chip-select count.
pub fn odt_ctrl(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    match ctx.topology.cs_num {
        1 => Ok(ODT_CTRL_ONE_CS),
        2 => Ok(ODT_CTRL_TWO_CS),
        _ => Err(unsupported("chip select count")),
    }
}

/// TxOdtDrvStren: data driver code `[5:0]`, ODT code `[11:6]`.
pub fn tx_odt_drv_stren(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    let code = |ohm: Ohm, parameter| {
        TX_STRENGTH_CODES
            .iter()
            .find(|&&(value, _)| value == ohm.get())
            .map(|&(_, code)| code)
            .ok_or(unsupported(parameter))
    };
    let drv = code(ctx.topology.drv_data_p, "PHY data drive strength")?;
    let odt = code(phy_odt(ctx)?, "PHY ODT")?;
    Ok(drv | odt.wrapping_shl(TX_ODT_STREN_SHIFT))
}

/// ATxImpedance: address/command driver strength.
pub fn atx_impedance(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    match ctx.topology.drv_ctrl_p.get() {
        20 => Ok(0x3FF),
        30 => Ok(0xE7),
        40 => Ok(0x63),
        60 => Ok(0x21),
        120 => Ok(0x0),
        _ => Err(unsupported("PHY control drive strength")),
    }
}

// ── PHY init engine ─────────────────────────────────────────────────────────

/// Seq0BDLY0: 0.5 us in DFI clocks / 4.
pub fn seq0b_dly0(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    Ok(dfi_mhz(ctx)? / 8)
}

/// Seq0BDLY1: 1 us in DFI clocks / 4.
pub fn seq0b_dly1(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    Ok(dfi_mhz(ctx)? / 4)
}

/// Seq0BDLY2: 10 us in DFI clocks / 4.
pub fn seq0b_dly2(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    dfi_mhz(ctx)?
        .checked_mul(10)
        .map(|clocks| clocks / 4)
        .ok_or(unsupported("memory frequency"))
}

// ── Message block (1D and 2D) ───────────────────────────────────────────────

/// DRAMFreq: data rate in MT/s.
pub fn dram_data_rate(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    Ok(freq(ctx)?.data_rate_mts())
}

/// PhyDrvImpedance (high byte) / PhyOdtImpedance (low byte), in ohms.
pub fn drv_imp_phy_odt_imp(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    let drv = phy_impedance(ctx.topology.drv_data_p, "PHY data drive strength")?;
    let odt = phy_impedance(phy_odt(ctx)?, "PHY ODT")?;
    Ok(u16::from_le_bytes([odt, drv]))
}

/// CsPresent / CsPresentD0.
pub fn cs_present(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    match ctx.topology.cs_num {
        1 => Ok(CS_PRESENT_ONE_CS),
        2 => Ok(CS_PRESENT_TWO_CS),
        _ => Err(unsupported("chip select count")),
    }
}

/// AddrMirror, high byte.
pub fn addr_mirror(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    Ok(u16::from_le_bytes([0, ctx.topology.mirror_mask]))
}

/// MR0 image.
pub fn mr0(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    let topology = ctx.topology;
    mode_register::mr0(topology.cas_latency, topology.t_wr_ps, freq(ctx)?.mhz())
}

/// MR2 image.
pub fn mr2(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    mode_register::mr2(ctx.topology.cas_write_latency, ctx.topology.rtt_wr)
}

/// MR5 image.
pub fn mr5(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    mode_register::mr5(ctx.topology.rtt_park)
}

/// MR6 image.
pub fn mr6(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    mode_register::mr6(ctx.topology.t_ccd_l_ps, freq(ctx)?.mhz())
}

/// RttNomWrPark0.
pub fn rtt_nom_wr_park(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    let topology = ctx.topology;
    mode_register::rtt_nom_wr_park(topology.rtt_nom, topology.rtt_wr, topology.rtt_park)
}

/// EnabledDQs (high byte) / DisabledDbyte (low byte).
///
/// A 32-bit bus with ECC on PUP8 is trained as 64 DQs so the ECC byte lane
/// is reached; an enabled ECC lane adds 8 DQs.
pub fn en_dq_dis_dbyte(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    let topology = ctx.topology;
    let (mut total_dq, disabled) = match topology.bus_width {
        32 => (32u8, DISABLED_DBYTES_32_BIT),
        64 => (64u8, DISABLED_DBYTES_64_BIT),
        _ => return Err(unsupported("bus width")),
    };
    if topology.ecc_on_pup8 {
        total_dq = 64;
    }
    if topology.ecc_enabled {
        total_dq = total_dq.saturating_add(8);
    }
    Ok(u16::from_le_bytes([disabled, total_dq]))
}

/// X16Present (low byte) / CsSetupGDDec (high byte).
pub fn gear_down_x16_present(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    let topology = ctx.topology;
    let x16 = topology.device_width == DeviceWidth::X16 && !topology.x16_as_x8;
    let present: u8 = match (x16, topology.cs_num) {
        (false, _) => 0,
        (true, 1) => 0b01,
        (true, 2) => 0b11,
        (true, _) => return Err(unsupported("chip select count")),
    };
    Ok(u16::from_le_bytes([present, CS_SETUP_GDDEC]))
}

/// HdtCtrl: coarse debug during write leveling, completion messages
/// otherwise.
pub fn hdt_ctrl(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    if ctx.sequence.contains(SequenceCtrl::WR_LVL) {
        Ok(HDT_CTRL_COARSE_DEBUG)
    } else {
        Ok(HDT_CTRL_FW_COMPLETION)
    }
}

/// SequenceCtrl of the step being loaded.
pub fn sequence_ctrl(ctx: &UpdateContext<'_>) -> Result<u16, TrainingError> {
    Ok(ctx.sequence.bits())
}

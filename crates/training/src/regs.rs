//! PHY register map used by the training core.
//!
//! All addresses are 16-bit word offsets into the PHY window (see
//! `platform::registers`).

use platform::PhyRegisters;

use crate::error::TrainingError;

// ── PMU memories ────────────────────────────────────────────────────────────

/// PMU instruction memory base.
pub const IMEM_BASE: u32 = 0x5_0000;
/// PMU data memory base; the message block starts here.
pub const DMEM_BASE: u32 = 0x5_4000;

// ── APB-only CSRs ───────────────────────────────────────────────────────────

/// MicroContMuxSel: 0 = CPU owns the CSR bus, 1 = PMU owns it.
pub const MICRO_CONT_MUX_SEL: u32 = 0xD_0000;
/// UctShadowRegs: mailbox status as seen by the CPU.
pub const UCT_SHADOW_REGS: u32 = 0xD_0004;
/// DctWriteProt: CPU acknowledge of a mailbox message (active low).
pub const DCT_WRITE_PROT: u32 = 0xD_0031;
/// UctWriteOnlyShadow: mailbox data, low 16 bits.
pub const UCT_WRITE_ONLY_SHADOW: u32 = 0xD_0032;
/// UctDatWriteOnlyShadow: mailbox data, high 16 bits.
pub const UCT_DAT_WRITE_ONLY_SHADOW: u32 = 0xD_0034;
/// MicroReset: PMU stall/reset control.
pub const MICRO_RESET: u32 = 0xD_0099;

/// UctShadowRegs bit 0 (UctWriteProtShadow): 0 = message pending.
pub const UCT_WRITE_PROT_SHADOW: u16 = 1 << 0;

/// MicroContMuxSel value giving the CPU the CSR bus.
pub const CSR_ACCESS_CPU: u16 = 0;
/// MicroContMuxSel value returning the CSR bus to the PMU.
pub const CSR_ACCESS_PMU: u16 = 1;

/// MicroReset: stall + reset.
pub const MICRO_RESET_STALL_RESET: u16 = 0x9;
/// MicroReset: stall.
pub const MICRO_RESET_STALL: u16 = 0x1;
/// MicroReset: run.
pub const MICRO_RESET_RUN: u16 = 0x0;

// ── PHY configuration CSRs written by dynamic updates ───────────────────────

/// PllCtrl2
pub const PLL_CTRL2: u32 = 0x2_00C5;
/// ARdPtrInitVal
pub const ARD_PTR_INIT_VAL: u32 = 0x2_002E;
/// ProcOdtTimeCtl (DBYTE0)
pub const PROC_ODT_TIME_CTL: u32 = 0x1_0056;
/// CalUClkInfo
pub const CAL_UCLK_INFO: u32 = 0x2_0008;
/// TxOdtDrvStren (DBYTE0)
pub const TX_ODT_DRV_STREN: u32 = 0x1_004D;
/// ATxImpedance (ANIB0)
pub const ATX_IMPEDANCE: u32 = 0x0_0043;

// ── PHY init engine CSRs ────────────────────────────────────────────────────

/// Seq0BDLY0: 0.5 us delay in DFI clocks / 4
pub const SEQ0B_DLY0: u32 = 0x2_000B;
/// Seq0BDLY1: 1 us delay in DFI clocks / 4
pub const SEQ0B_DLY1: u32 = 0x2_000C;
/// Seq0BDLY2: 10 us delay in DFI clocks / 4
pub const SEQ0B_DLY2: u32 = 0x2_000D;

// ── Message block (DMEM word offsets) ───────────────────────────────────────

/// PmuRevision
pub const MB_PMU_REVISION: u32 = DMEM_BASE + 0x01;
/// Pstate / PllBypassEn
pub const MB_PSTATE: u32 = DMEM_BASE + 0x02;
/// DRAMFreq (data rate, MT/s)
pub const MB_DRAM_FREQ: u32 = DMEM_BASE + 0x03;
/// DfiFreqRatio / BPZNResVal
pub const MB_DFI_FREQ_RATIO: u32 = DMEM_BASE + 0x04;
/// PhyOdtImpedance (low byte) / PhyDrvImpedance (high byte)
pub const MB_PHY_IMPEDANCE: u32 = DMEM_BASE + 0x05;
/// DisabledDbyte (low byte) / EnabledDQs (high byte)
pub const MB_ENABLED_DQS: u32 = DMEM_BASE + 0x07;
/// CsPresent (low byte) / CsPresentD0 (high byte)
pub const MB_CS_PRESENT: u32 = DMEM_BASE + 0x08;
/// AddrMirror (high byte)
pub const MB_ADDR_MIRROR: u32 = DMEM_BASE + 0x09;
/// SequenceCtrl
pub const MB_SEQUENCE_CTRL: u32 = DMEM_BASE + 0x0B;
/// HdtCtrl
pub const MB_HDT_CTRL: u32 = DMEM_BASE + 0x0C;
/// X16Present (low byte) / CsSetupGDDec (high byte)
pub const MB_X16_PRESENT: u32 = DMEM_BASE + 0x0D;
/// CsTestFail
pub const MB_CS_TEST_FAIL: u32 = DMEM_BASE + 0x0E;
/// 2D: R0_RxClkDly_Margin
pub const MB_RX_CLK_DLY_MARGIN_2D: u32 = DMEM_BASE + 0x12;
/// MR0
pub const MB_MR0: u32 = DMEM_BASE + 0x2F;
/// MR2
pub const MB_MR2: u32 = DMEM_BASE + 0x31;
/// MR5
pub const MB_MR5: u32 = DMEM_BASE + 0x34;
/// MR6
pub const MB_MR6: u32 = DMEM_BASE + 0x35;
/// RttNomWrPark0
pub const MB_RTT_NOM_WR_PARK0: u32 = DMEM_BASE + 0x3D;
/// 1D: CDD_RW_1_0 (high byte)
pub const MB_CDD_RW_1_0: u32 = DMEM_BASE + 0x58;
/// 1D: CDD_RW_0_3 (low byte)
pub const MB_CDD_RW_0_3: u32 = DMEM_BASE + 0x59;

/// Read one register, mapping any access failure to
/// [`TrainingError::RegisterAccess`].
pub(crate) fn read<R: PhyRegisters>(regs: &mut R, address: u32) -> Result<u16, TrainingError> {
    regs.read16(address)
        .map_err(|_| TrainingError::RegisterAccess { address })
}

/// Write one register, mapping any access failure to
/// [`TrainingError::RegisterAccess`].
pub(crate) fn write<R: PhyRegisters>(
    regs: &mut R,
    address: u32,
    value: u16,
) -> Result<(), TrainingError> {
    trace!("write {:#x} = {:#x}", address, value);
    regs.write16(address, value)
        .map_err(|_| TrainingError::RegisterAccess { address })
}

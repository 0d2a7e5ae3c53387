//! Update tables and section assembly.
//!
//! The static images (PHY config pairs, IMEM/DMEM images, PIE pairs) come
//! from the PHY vendor's delivery and are handed in by the board through
//! [`FirmwareImages`]. The update tables below are owned here: a fixed
//! static update for the message block and the dynamic updates resolved
//! from the topology at load time.

use crate::regs::{
    ARD_PTR_INIT_VAL, ATX_IMPEDANCE, CAL_UCLK_INFO, DMEM_BASE, IMEM_BASE, MB_ADDR_MIRROR, MB_CS_PRESENT,
    MB_DFI_FREQ_RATIO, MB_DRAM_FREQ, MB_ENABLED_DQS, MB_HDT_CTRL, MB_MR0, MB_MR2, MB_MR5, MB_MR6,
    MB_PHY_IMPEDANCE, MB_PSTATE, MB_RTT_NOM_WR_PARK0, MB_SEQUENCE_CTRL, MB_X16_PRESENT, PLL_CTRL2,
    PROC_ODT_TIME_CTL, SEQ0B_DLY0, SEQ0B_DLY1, SEQ0B_DLY2, TX_ODT_DRV_STREN,
};
use crate::section::{AddressData, DynamicUpdate, Section, SectionId, SectionSet, StaticData, StaticUpdate};
use crate::values;

/// PHY config registers that depend on frequency, chip selects and drive
/// strengths.
pub const PHY_CONFIG_DYNAMIC: [DynamicUpdate<'static>; 6] = [
    DynamicUpdate {
        address: PLL_CTRL2,
        value: &values::pll_ctrl2,
    },
    DynamicUpdate {
        address: ARD_PTR_INIT_VAL,
        value: &values::ard_ptr_init_val,
    },
    DynamicUpdate {
        address: PROC_ODT_TIME_CTL,
        value: &values::proc_odt_time_ctl,
    },
    DynamicUpdate {
        address: CAL_UCLK_INFO,
        value: &values::cal_uclk_info,
    },
    DynamicUpdate {
        address: TX_ODT_DRV_STREN,
        value: &values::tx_odt_drv_stren,
    },
    DynamicUpdate {
        address: ATX_IMPEDANCE,
        value: &values::atx_impedance,
    },
];

/// Message-block fields shared by the 1D and 2D images: Pstate 0, DFI
/// ratio 1:2.
pub const DMEM_STATIC_UPDATE: [AddressData; 2] = [AddressData::new(MB_PSTATE, 0x0000), AddressData::new(MB_DFI_FREQ_RATIO, 0x0002)];

/// Message-block fields resolved per step; shared by the 1D and 2D images.
pub const DMEM_DYNAMIC: [DynamicUpdate<'static>; 13] = [
    DynamicUpdate {
        address: MB_DRAM_FREQ,
        value: &values::dram_data_rate,
    },
    DynamicUpdate {
        address: MB_PHY_IMPEDANCE,
        value: &values::drv_imp_phy_odt_imp,
    },
    DynamicUpdate {
        address: MB_ENABLED_DQS,
        value: &values::en_dq_dis_dbyte,
    },
    DynamicUpdate {
        address: MB_CS_PRESENT,
        value: &values::cs_present,
    },
    DynamicUpdate {
        address: MB_ADDR_MIRROR,
        value: &values::addr_mirror,
    },
    DynamicUpdate {
        address: MB_SEQUENCE_CTRL,
        value: &values::sequence_ctrl,
    },
    DynamicUpdate {
        address: MB_HDT_CTRL,
        value: &values::hdt_ctrl,
    },
    DynamicUpdate {
        address: MB_X16_PRESENT,
        value: &values::gear_down_x16_present,
    },
    DynamicUpdate {
        address: MB_MR0,
        value: &values::mr0,
    },
    DynamicUpdate {
        address: MB_MR2,
        value: &values::mr2,
    },
    DynamicUpdate {
        address: MB_MR5,
        value: &values::mr5,
    },
    DynamicUpdate {
        address: MB_MR6,
        value: &values::mr6,
    },
    DynamicUpdate {
        address: MB_RTT_NOM_WR_PARK0,
        value: &values::rtt_nom_wr_park,
    },
];

/// PIE delay registers.
pub const PIE_DYNAMIC: [DynamicUpdate<'static>; 3] = [
    DynamicUpdate {
        address: SEQ0B_DLY0,
        value: &values::seq0b_dly0,
    },
    DynamicUpdate {
        address: SEQ0B_DLY1,
        value: &values::seq0b_dly1,
    },
    DynamicUpdate {
        address: SEQ0B_DLY2,
        value: &values::seq0b_dly2,
    },
];

/// Vendor static images for one training invocation.
#[derive(Debug, Clone, Copy)]
pub struct FirmwareImages<'a> {
    /// PHY configuration register pairs
    pub phy_config: &'a [AddressData],
    /// 1D training firmware, written from [`IMEM_BASE`]
    pub imem_1d: &'a [u16],
    /// 1D message block image, written from [`DMEM_BASE`]
    pub dmem_1d: &'a [u16],
    /// 2D training firmware, written from [`IMEM_BASE`]
    pub imem_2d: &'a [u16],
    /// 2D message block image, written from [`DMEM_BASE`]
    pub dmem_2d: &'a [u16],
    /// PHY init engine register pairs
    pub phy_init_engine: &'a [AddressData],
    /// Whether the DMEM images already carry [`DMEM_STATIC_UPDATE`]
    pub dmem_static_update: StaticUpdate,
}

impl<'a> FirmwareImages<'a> {
    /// Assemble the six sections around these images.
    pub const fn sections(&self) -> SectionSet<'a> {
        SectionSet {
            phy_config: Section::new(SectionId::PhyConfig, StaticData::Random(self.phy_config))
                .with_dynamic_update(&PHY_CONFIG_DYNAMIC),
            imem_1d: Section::new(
                SectionId::Imem1d,
                StaticData::Sequential {
                    base: IMEM_BASE,
                    values: self.imem_1d,
                },
            ),
            dmem_1d: Section::new(
                SectionId::Dmem1d,
                StaticData::Sequential {
                    base: DMEM_BASE,
                    values: self.dmem_1d,
                },
            )
            .with_static_update(self.dmem_static_update, &DMEM_STATIC_UPDATE)
            .with_dynamic_update(&DMEM_DYNAMIC),
            imem_2d: Section::new(
                SectionId::Imem2d,
                StaticData::Sequential {
                    base: IMEM_BASE,
                    values: self.imem_2d,
                },
            ),
            dmem_2d: Section::new(
                SectionId::Dmem2d,
                StaticData::Sequential {
                    base: DMEM_BASE,
                    values: self.dmem_2d,
                },
            )
            .with_static_update(self.dmem_static_update, &DMEM_STATIC_UPDATE)
            .with_dynamic_update(&DMEM_DYNAMIC),
            phy_init_engine: Section::new(SectionId::PhyInitEngine, StaticData::Random(self.phy_init_engine))
                .with_dynamic_update(&PIE_DYNAMIC),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::results::ResultLog;
    use crate::section::{load_section, UpdateContext};
    use crate::state::{SequenceCtrl, TrainingState};
    use platform::mocks::MockRegisters;
    use platform::DramTopology;

    const PHY: [AddressData; 1] = [AddressData::new(0x2_0001, 0x1)];
    const IMAGE: [u16; 2] = [0xAAAA, 0xBBBB];

    fn images() -> FirmwareImages<'static> {
        FirmwareImages {
            phy_config: &PHY,
            imem_1d: &IMAGE,
            dmem_1d: &IMAGE,
            imem_2d: &IMAGE,
            dmem_2d: &IMAGE,
            phy_init_engine: &PHY,
            dmem_static_update: StaticUpdate::Separate,
        }
    }

    #[test]
    fn test_dmem_load_resolves_reference_board() {
        let topology = DramTopology::default();
        let results = ResultLog::new();
        let ctx = UpdateContext::new(
            TrainingState::Training1d,
            SequenceCtrl::DEV_INIT | SequenceCtrl::WR_LVL,
            &topology,
            &results,
        );
        let sections = images().sections();
        let mut regs = MockRegisters::new();
        let summary = load_section(&mut regs, &sections.dmem_1d, &ctx).unwrap();
        assert_eq!(summary.static_writes, 2);
        assert_eq!(summary.static_update_writes, 2);
        assert_eq!(summary.dynamic_writes, DMEM_DYNAMIC.len());
        assert_eq!(regs.value(MB_DRAM_FREQ), 2400);
        assert_eq!(regs.value(MB_SEQUENCE_CTRL), 0x0003);
        assert_eq!(regs.value(MB_HDT_CTRL), 0x0A);
        assert_eq!(regs.value(MB_MR0), 0x0864);
        assert_eq!(regs.value(MB_RTT_NOM_WR_PARK0), 0x8048);
    }

    #[test]
    fn test_phy_config_section_has_no_firmware_image() {
        let sections = images().sections();
        assert!(matches!(sections.phy_config.static_data, StaticData::Random(_)));
        assert!(sections.imem_1d.dynamic_update.is_none());
        assert_eq!(sections.get(SectionId::PhyInitEngine).id, SectionId::PhyInitEngine);
    }
}

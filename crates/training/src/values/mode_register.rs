//! DDR4 mode-register encoders for the message block.
//!
//! Each encoder maps topology values onto the JEDEC field codes and returns
//! [`TrainingError::UnsupportedConfiguration`] for a value the table does not
//! list. Bit layouts:
//!
//! ```text
//! MR0  A13 A11..A9 = WR   A6..A4 A2 = CL
//! MR2  A11..A9 = RTT_WR   A5..A3 = CWL
//! MR5  A10 = DM enable    A8..A6 = RTT_PARK   A5 = ODT input buffer off in PD
//! MR6  A12..A10 = tCCD_L  A7 = VrefDQ training   A6 = range   A5..A0 = value
//! ```

use platform::Ohm;

use crate::error::TrainingError;

/// MR0 CL field per CAS latency (A6 A5 A4 A2).
const MR0_CAS_LATENCY: [(u8, u16); 16] = [
    (9, 0x0000),
    (10, 0x0004),
    (11, 0x0010),
    (12, 0x0014),
    (13, 0x0020),
    (14, 0x0024),
    (15, 0x0030),
    (16, 0x0034),
    (17, 0x0064),
    (18, 0x0040),
    (19, 0x0070),
    (20, 0x0044),
    (21, 0x0074),
    (22, 0x0050),
    (23, 0x0060),
    (24, 0x0054),
];

/// MR0 WR field per write recovery in clocks, ascending (A13 A11 A10 A9).
const MR0_WRITE_RECOVERY: [(u32, u16); 9] = [
    (10, 0x0000),
    (12, 0x0200),
    (14, 0x0400),
    (16, 0x0600),
    (18, 0x0800),
    (20, 0x0A00),
    (22, 0x0E00),
    (24, 0x0C00),
    (26, 0x2000),
];

/// MR2 CWL field per CAS write latency (A5 A4 A3).
const MR2_CAS_WRITE_LATENCY: [(u8, u16); 8] = [
    (9, 0x0000),
    (10, 0x0008),
    (11, 0x0010),
    (12, 0x0018),
    (14, 0x0020),
    (16, 0x0028),
    (18, 0x0030),
    (20, 0x0038),
];

/// MR6 tCCD_L field per clocks (A12 A11 A10).
const MR6_TCCD_L: [(u32, u16); 4] = [(5, 0x0400), (6, 0x0800), (7, 0x0C00), (8, 0x1000)];

const MR2_RTT_WR_SHIFT: u32 = 9;
const MR5_RTT_PARK_SHIFT: u32 = 6;
const MR5_DM_ENABLE: u16 = 1 << 10;
const MR5_PD_ODT_IBUF_DISABLE: u16 = 1 << 5;
const MR6_TCCD_L_MIN_NCLK: u32 = 5;
const MR6_VREFDQ_VALUE: u16 = 0x09;
const MR6_VREFDQ_RANGE_1: u16 = 0;
const MR6_VREFDQ_TRAINING_DISABLED: u16 = 0;

const RTT_NOM_SHIFT: u32 = 0;
const RTT_PARK_SHIFT: u32 = 3;
const RTT_WR_SHIFT: u32 = 6;
const RTT_NOM_WR_PARK_ENABLE: u16 = 1 << 15;

fn lookup<K: PartialEq + Copy>(table: &[(K, u16)], key: K, parameter: &'static str) -> Result<u16, TrainingError> {
    table
        .iter()
        .find(|&&(k, _)| k == key)
        .map(|&(_, bits)| bits)
        .ok_or(TrainingError::UnsupportedConfiguration { parameter })
}

/// Clocks needed to cover `t_ps` at `mhz`, rounded up.
pub fn time_to_nclk(t_ps: u32, mhz: u32) -> Result<u32, TrainingError> {
    let unsupported = TrainingError::UnsupportedConfiguration {
        parameter: "timing parameter",
    };
    let scaled = u64::from(t_ps)
        .checked_mul(u64::from(mhz))
        .ok_or(unsupported)?;
    u32::try_from(scaled.div_ceil(1_000_000)).map_err(|_| unsupported)
}

/// 3-bit RTT_NOM / RTT_PARK code (MR1 A10..A8, MR5 A8..A6).
pub fn rtt_nom_park_code(rtt: Ohm) -> Option<u16> {
    match rtt.get() {
        0 => Some(0),
        60 => Some(1),
        120 => Some(2),
        40 => Some(3),
        240 => Some(4),
        48 => Some(5),
        80 => Some(6),
        34 => Some(7),
        _ => None,
    }
}

/// 3-bit RTT_WR code (MR2 A11..A9).
pub fn rtt_wr_code(rtt: Ohm) -> Option<u16> {
    match rtt.get() {
        0 => Some(0),
        120 => Some(1),
        240 => Some(2),
        80 => Some(4),
        _ => None,
    }
}

/// MR0 from CAS latency and the write recovery time.
///
/// The WR field takes the smallest supported setting not below the
/// required clock count.
pub fn mr0(cas_latency: u8, t_wr_ps: u32, mhz: u32) -> Result<u16, TrainingError> {
    let cl = lookup(&MR0_CAS_LATENCY, cas_latency, "CAS latency")?;
    let wr_nclk = time_to_nclk(t_wr_ps, mhz)?;
    let wr = MR0_WRITE_RECOVERY
        .iter()
        .find(|&&(nclk, _)| nclk >= wr_nclk)
        .map(|&(_, bits)| bits)
        .ok_or(TrainingError::UnsupportedConfiguration {
            parameter: "write recovery",
        })?;
    Ok(cl | wr)
}

/// MR2 from CAS write latency and RTT_WR.
pub fn mr2(cas_write_latency: u8, rtt_wr: Ohm) -> Result<u16, TrainingError> {
    let cwl = lookup(&MR2_CAS_WRITE_LATENCY, cas_write_latency, "CAS write latency")?;
    let rtt = rtt_wr_code(rtt_wr).ok_or(TrainingError::UnsupportedConfiguration { parameter: "RTT_WR" })?;
    Ok(cwl | rtt.wrapping_shl(MR2_RTT_WR_SHIFT))
}

/// MR5 from RTT_PARK, data mask enabled.
pub fn mr5(rtt_park: Ohm) -> Result<u16, TrainingError> {
    let park = rtt_nom_park_code(rtt_park).ok_or(TrainingError::UnsupportedConfiguration {
        parameter: "RTT_PARK",
    })?;
    Ok(MR5_PD_ODT_IBUF_DISABLE | MR5_DM_ENABLE | park.wrapping_shl(MR5_RTT_PARK_SHIFT))
}

/// MR6 from tCCD_L, VrefDQ training off.
pub fn mr6(t_ccd_l_ps: u32, mhz: u32) -> Result<u16, TrainingError> {
    let nclk = time_to_nclk(t_ccd_l_ps, mhz)?.max(MR6_TCCD_L_MIN_NCLK);
    let tccd_l = lookup(&MR6_TCCD_L, nclk, "tCCD_L")?;
    Ok(tccd_l | MR6_VREFDQ_TRAINING_DISABLED | MR6_VREFDQ_RANGE_1 | MR6_VREFDQ_VALUE)
}

/// Message-block RttNomWrPark0: nom `[2:0]`, park `[5:3]`, wr `[8:6]`,
/// enable bit 15.
pub fn rtt_nom_wr_park(rtt_nom: Ohm, rtt_wr: Ohm, rtt_park: Ohm) -> Result<u16, TrainingError> {
    let nom = rtt_nom_park_code(rtt_nom).ok_or(TrainingError::UnsupportedConfiguration { parameter: "RTT_NOM" })?;
    let park = rtt_nom_park_code(rtt_park).ok_or(TrainingError::UnsupportedConfiguration {
        parameter: "RTT_PARK",
    })?;
    let wr = rtt_wr_code(rtt_wr).ok_or(TrainingError::UnsupportedConfiguration { parameter: "RTT_WR" })?;
    Ok(nom.wrapping_shl(RTT_NOM_SHIFT)
        | park.wrapping_shl(RTT_PARK_SHIFT)
        | wr.wrapping_shl(RTT_WR_SHIFT)
        | RTT_NOM_WR_PARK_ENABLE)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_time_to_nclk_rounds_up() {
        // 15 ns at 1200 MHz is exactly 18 clocks
        assert_eq!(time_to_nclk(15_000, 1200).unwrap(), 18);
        assert_eq!(time_to_nclk(15_001, 1200).unwrap(), 19);
        assert_eq!(time_to_nclk(5_000, 800).unwrap(), 4);
    }

    #[test]
    fn test_mr0_ddr4_2400() {
        // CL17 -> code 13, WR18 -> code 4
        assert_eq!(mr0(17, 15_000, 1200).unwrap(), 0x0864);
    }

    #[test]
    fn test_mr0_rounds_write_recovery_up_to_next_setting() {
        // 15 ns at 1466 MHz needs 22 clocks -> WR22 (code 7)
        assert_eq!(mr0(9, 15_000, 1466).unwrap(), 0x0E00);
        // 15 ns at 1333 MHz needs 20 clocks
        assert_eq!(mr0(9, 15_000, 1333).unwrap(), 0x0A00);
    }

    #[test]
    fn test_mr0_rejects_unknown_cas_latency() {
        assert_eq!(
            mr0(25, 15_000, 1200),
            Err(TrainingError::UnsupportedConfiguration {
                parameter: "CAS latency"
            })
        );
    }

    #[test]
    fn test_mr2_combines_cwl_and_rtt_wr() {
        assert_eq!(mr2(12, Ohm(120)).unwrap(), 0x0218);
        assert_eq!(mr2(9, Ohm::DISABLED).unwrap(), 0x0000);
        assert!(mr2(12, Ohm(60)).is_err());
    }

    #[test]
    fn test_mr5_places_rtt_park() {
        assert_eq!(mr5(Ohm(60)).unwrap(), 0x0460);
        assert_eq!(mr5(Ohm(34)).unwrap(), 0x05E0);
    }

    #[test]
    fn test_mr6_clamps_tccd_l_to_five_clocks() {
        assert_eq!(mr6(5_000, 1200).unwrap(), 0x0809);
        assert_eq!(mr6(5_000, 800).unwrap(), 0x0409);
    }

    #[test]
    fn test_rtt_nom_wr_park_layout() {
        assert_eq!(
            rtt_nom_wr_park(Ohm::DISABLED, Ohm(120), Ohm(60)).unwrap(),
            0x8048
        );
        assert_eq!(
            rtt_nom_wr_park(Ohm(34), Ohm(80), Ohm(34)).unwrap(),
            0x813F
        );
    }
}

//! Ratio-of-ratios SpO2 estimate.
//!
//! `R = (red_ac / red_dc) / (ir_ac / ir_dc)` and `SpO2 = 110 - 25 R`, clamped to
//! the physiologically plausible `[70, 100]` range and truncated to a whole
//! percent.

use crate::analysis::filter::ac_dc;

pub const SPO2_FLOOR: f64 = 70.0;
pub const SPO2_CEILING: f64 = 100.0;

/// Estimate SpO2 from equally long IR and red windows.
///
/// Returns `None` when either window holds fewer than `min_samples` values or
/// when a DC level or the IR amplitude is zero.
pub fn estimate(ir: &[u32], red: &[u32], min_samples: usize) -> Option<u8> {
    if ir.len() < min_samples || red.len() < min_samples {
        return None;
    }

    let (ir_ac, ir_dc) = ac_dc(ir)?;
    let (red_ac, red_dc) = ac_dc(red)?;

    if ir_dc == 0.0 || red_dc == 0.0 || ir_ac == 0.0 {
        return None;
    }

    let r = (red_ac / red_dc) / (ir_ac / ir_dc);
    Some(from_ratio(r))
}

/// Empirical calibration curve from R to a clamped, truncated percentage.
pub fn from_ratio(r: f64) -> u8 {
    let spo2 = 110.0 - 25.0 * r;
    spo2.clamp(SPO2_FLOOR, SPO2_CEILING) as u8
}

//! H.263 线性量化 (quant_type = 0)
//!
//! 量化: intra AC |L| = |c| / 2QP, inter |L| = (|c| - QP/2) / 2QP.
//! 反量化: |F| = QP * (2|L| + 1) - (QP 为偶数 ? 1 : 0), 非零电平永远不会还原成 0.

use super::fdct::DctBlock;
use super::quant::{QuantParams, quant_intra_dc, store};
use super::types::BlockCoeffs;

#[inline]
fn dequant(level: i32, params: &QuantParams) -> i32 {
    let mag = level.abs() * params.qp_x2 + params.addition;
    if level < 0 { -mag } else { mag }
}

#[inline]
fn quant_ac_intra(c: i32, params: &QuantParams) -> i32 {
    let mag = (c.abs() / params.qp_x2).min(params.level_max);
    if c < 0 { -mag } else { mag }
}

#[inline]
fn quant_ac_inter(c: i32, params: &QuantParams) -> i32 {
    let mag = c.abs() - params.qp_div2;
    if mag < params.qp_x2 {
        return 0;
    }
    let mag = (mag / params.qp_x2).min(params.level_max);
    if c < 0 { -mag } else { mag }
}

/// Intra 块: DC 按 DC 缩放因子, AC 线性量化
pub(super) fn quant_intra(
    dct: &DctBlock,
    params: &QuantParams,
    dc_scaler: i32,
    out: &mut BlockCoeffs,
) -> bool {
    let n = dct.transform.size();
    quant_intra_dc(dct.coef[0], dc_scaler, out);
    for v in 0..n {
        for u in 0..n {
            let idx = v * 8 + u;
            if idx == 0 || dct.coef[idx] == 0 {
                continue;
            }
            let level = quant_ac_intra(dct.coef[idx], params);
            if level != 0 {
                store(out, idx, level, dequant(level, params));
            }
        }
    }
    out.coded
}

/// Inter 块: 所有位置带死区量化
pub(super) fn quant_inter(dct: &DctBlock, params: &QuantParams, out: &mut BlockCoeffs) -> bool {
    let n = dct.transform.size();
    for v in 0..n {
        for u in 0..n {
            let idx = v * 8 + u;
            if dct.coef[idx] == 0 {
                continue;
            }
            let level = quant_ac_inter(dct.coef[idx], params);
            if level != 0 {
                store(out, idx, level, dequant(level, params));
            }
        }
    }
    out.coded
}

/// 只处理 0 号位置 (intra 用 DC 规则, inter 用 inter 规则)
pub(super) fn quant_dc(
    dc: i32,
    params: &QuantParams,
    intra: bool,
    dc_scaler: i32,
    out: &mut BlockCoeffs,
) -> bool {
    if intra {
        quant_intra_dc(dc, dc_scaler, out);
    } else {
        let level = quant_ac_inter(dc, params);
        if level != 0 {
            store(out, 0, level, dequant(level, params));
        }
    }
    out.coded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::mpeg4::types::TransformMode;

    #[test]
    fn test_inter_dead_zone() {
        let p = QuantParams::new(16, false);
        // (|c| - 8) / 32
        assert_eq!(quant_ac_inter(39, &p), 0);
        assert_eq!(quant_ac_inter(40, &p), 1);
        assert_eq!(quant_ac_inter(80, &p), 2);
        assert_eq!(quant_ac_inter(-80, &p), -2);
    }

    #[test]
    fn test_dequant_never_zero() {
        for qp in 1..=31u8 {
            let p = QuantParams::new(qp, false);
            for level in [-3, -1, 1, 2, 100] {
                let f = dequant(level, &p);
                assert_ne!(f, 0);
                assert_eq!(f.signum(), level.signum());
            }
        }
        let p = QuantParams::new(16, false);
        assert_eq!(dequant(2, &p), 79);
        let p = QuantParams::new(7, false);
        assert_eq!(dequant(1, &p), 21);
    }

    #[test]
    fn test_short_header_level_clip() {
        let p = QuantParams::new(1, true);
        assert_eq!(quant_ac_intra(2000, &p), 127);
        assert_eq!(quant_ac_inter(-2000, &p), -127);
    }

    #[test]
    fn test_dequant_saturates() {
        let p = QuantParams::new(31, false);
        let dct = DctBlock {
            coef: {
                let mut c = [0; 64];
                c[1] = 4000;
                c
            },
            transform: TransformMode::Approx2x2,
            ..Default::default()
        };
        let mut out = BlockCoeffs::default();
        assert!(quant_inter(&dct, &p, &mut out));
        assert_eq!(out.dequant[1], 2047);
    }

    #[test]
    fn test_intra_dc_rule() {
        let p = QuantParams::new(10, false);
        let mut out = BlockCoeffs::default();
        quant_dc(1000, &p, true, 18, &mut out);
        // (1000 + 9) / 18 = 56
        assert_eq!(out.levels[0], 56);
        assert_eq!(out.dequant[0], 1008);
        let mut out = BlockCoeffs::default();
        quant_dc(0, &p, true, 18, &mut out);
        assert_eq!(out.levels[0], 1);
    }
}

//! MPEG 矩阵量化 (quant_type = 1)
//!
//! 每个位置按量化矩阵权重 W 缩放: k = (16|c| + W/2) / W,
//! intra |L| = (k + ((3QP + 2) >> 2)) / 2QP, inter |L| = k / 2QP.
//! 反量化后执行失配控制: 块内反量化系数之和为偶数时翻转 63 号系数的最低位.

use super::fdct::DctBlock;
use super::quant::{DEQUANT_MAX, DEQUANT_MIN, QuantParams, quant_intra_dc, store};
use super::tables::EncoderTables;
use super::types::BlockCoeffs;

#[inline]
fn scaled(c: i32, w: i32) -> i32 {
    (16 * c.abs() + (w >> 1)) / w
}

#[inline]
fn quant_intra_ac(c: i32, w: i32, params: &QuantParams) -> i32 {
    let q = params.qp as i32;
    let mag = ((scaled(c, w) + ((3 * q + 2) >> 2)) / params.qp_x2).min(params.level_max);
    if c < 0 { -mag } else { mag }
}

#[inline]
fn quant_inter_ac(c: i32, w: i32, params: &QuantParams) -> i32 {
    let mag = (scaled(c, w) / params.qp_x2).min(params.level_max);
    if c < 0 { -mag } else { mag }
}

#[inline]
fn dequant_intra(level: i32, w: i32, params: &QuantParams) -> i32 {
    let mag = (2 * level.abs() * w * params.qp as i32) >> 4;
    if level < 0 { -mag } else { mag }
}

#[inline]
fn dequant_inter(level: i32, w: i32, params: &QuantParams) -> i32 {
    let mag = ((2 * level.abs() + 1) * w * params.qp as i32) >> 4;
    if level < 0 { -mag } else { mag }
}

/// 失配控制
///
/// 编码块的反量化系数和为偶数时翻转 63 号系数最低位, 并补上列/行位图.
/// zigzag 位图只描述量化电平, 不受影响.
fn mismatch_control(out: &mut BlockCoeffs) {
    if !out.coded {
        return;
    }
    let sum: i32 = out.dequant.iter().sum();
    if sum & 1 == 0 {
        out.dequant[63] ^= 1;
        debug_assert!((DEQUANT_MIN..=DEQUANT_MAX).contains(&out.dequant[63]));
        out.bitmap.mark_spatial(63);
    }
}

/// Intra 块: DC 按 DC 缩放因子, AC 按 intra 矩阵
pub(super) fn quant_intra(
    dct: &DctBlock,
    tables: &EncoderTables,
    params: &QuantParams,
    dc_scaler: i32,
    out: &mut BlockCoeffs,
) -> bool {
    let n = dct.transform.size();
    let matrix = tables.matrix(true);
    quant_intra_dc(dct.coef[0], dc_scaler, out);
    for v in 0..n {
        for u in 0..n {
            let idx = v * 8 + u;
            if idx == 0 || dct.coef[idx] == 0 {
                continue;
            }
            let w = matrix[idx] as i32;
            let level = quant_intra_ac(dct.coef[idx], w, params);
            if level != 0 {
                store(out, idx, level, dequant_intra(level, w, params));
            }
        }
    }
    mismatch_control(out);
    out.coded
}

/// Inter 块: 所有位置按 inter 矩阵
pub(super) fn quant_inter(
    dct: &DctBlock,
    tables: &EncoderTables,
    params: &QuantParams,
    out: &mut BlockCoeffs,
) -> bool {
    let n = dct.transform.size();
    let matrix = tables.matrix(false);
    for v in 0..n {
        for u in 0..n {
            let idx = v * 8 + u;
            if dct.coef[idx] == 0 {
                continue;
            }
            let w = matrix[idx] as i32;
            let level = quant_inter_ac(dct.coef[idx], w, params);
            if level != 0 {
                store(out, idx, level, dequant_inter(level, w, params));
            }
        }
    }
    mismatch_control(out);
    out.coded
}

/// 只处理 0 号位置
pub(super) fn quant_dc(
    dc: i32,
    tables: &EncoderTables,
    params: &QuantParams,
    intra: bool,
    dc_scaler: i32,
    out: &mut BlockCoeffs,
) -> bool {
    if intra {
        quant_intra_dc(dc, dc_scaler, out);
    } else {
        let w = tables.matrix(false)[0] as i32;
        let level = quant_inter_ac(dc, w, params);
        if level != 0 {
            store(out, 0, level, dequant_inter(level, w, params));
        }
    }
    mismatch_control(out);
    out.coded
}

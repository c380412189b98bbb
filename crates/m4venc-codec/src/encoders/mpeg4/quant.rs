//! 量化/反量化分发
//!
//! 两个量化族 (H.263 线性, MPEG 矩阵) 各有 intra / inter / DC 三个入口.
//! 每个入口同时产出量化电平、反量化系数、位图三元组和编码块标志.

use super::config::QuantFamily;
use super::fdct::DctBlock;
use super::quant_h263;
use super::quant_mpeg;
use super::tables::{EncoderTables, NEUTRAL_DC, ZIGZAG_POSITION, dc_scaler};
use super::types::{BlockCoeffs, TransformMode};

/// 反量化系数范围
pub(super) const DEQUANT_MIN: i32 = -2048;
pub(super) const DEQUANT_MAX: i32 = 2047;

/// 量化参数记录
///
/// QP 变化时重新计算一次, 量化器直接读取派生常量.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuantParams {
    pub qp: u8,
    /// 2 * QP
    pub qp_x2: i32,
    /// QP / 2
    pub qp_div2: i32,
    /// 2 * QP + QP / 2, inter 死区
    pub qp_x2_plus: i32,
    /// H.263 反量化偏移: QP 为奇数时取 QP, 否则 QP - 1
    pub addition: i32,
    pub dc_scaler_luma: i32,
    pub dc_scaler_chroma: i32,
    /// 电平绝对值上限 (短头 127, 否则 2047)
    pub level_max: i32,
}

impl QuantParams {
    pub fn new(qp: u8, short_header: bool) -> Self {
        debug_assert!((1..=31).contains(&qp));
        let q = qp as i32;
        Self {
            qp,
            qp_x2: 2 * q,
            qp_div2: q >> 1,
            qp_x2_plus: 2 * q + (q >> 1),
            addition: if q & 1 == 1 { q } else { q - 1 },
            dc_scaler_luma: dc_scaler(qp, true, short_header),
            dc_scaler_chroma: dc_scaler(qp, false, short_header),
            level_max: if short_header { 127 } else { 2047 },
        }
    }

    #[inline]
    pub fn dc_scaler(&self, luma: bool) -> i32 {
        if luma {
            self.dc_scaler_luma
        } else {
            self.dc_scaler_chroma
        }
    }
}

/// 写入一个非零位置并更新位图
#[inline]
pub(super) fn store(out: &mut BlockCoeffs, idx: usize, level: i32, dequant: i32) {
    debug_assert!(level != 0);
    out.levels[idx] = level as i16;
    out.dequant[idx] = dequant.clamp(DEQUANT_MIN, DEQUANT_MAX);
    out.bitmap.mark(idx, ZIGZAG_POSITION[idx]);
    out.coded = true;
}

/// Intra DC 量化 (两个量化族共用)
///
/// 电平 = (DC + scaler / 2) / scaler, 限制在 [1, 254], 反量化为电平 * scaler.
#[inline]
pub(super) fn quant_intra_dc(dc: i32, scaler: i32, out: &mut BlockCoeffs) {
    let level = ((dc.max(0) + (scaler >> 1)) / scaler).clamp(1, 254);
    store(out, 0, level, level * scaler);
}

/// 对变换结果做量化和反量化, 返回编码块标志
///
/// Intra 的 `Zero` 块按中灰 DC 走 DC 入口, 保证解码端重建出中性值.
pub fn quantize_block(
    tables: &EncoderTables,
    params: &QuantParams,
    dct: &DctBlock,
    intra: bool,
    luma: bool,
    out: &mut BlockCoeffs,
) -> bool {
    out.reset(dct.transform);
    let scaler = params.dc_scaler(luma);
    match (tables.family, dct.transform, intra) {
        (_, TransformMode::Zero, false) => false,
        (QuantFamily::H263, TransformMode::Zero, true) => {
            quant_h263::quant_dc(NEUTRAL_DC, params, true, scaler, out)
        }
        (QuantFamily::Mpeg, TransformMode::Zero, true) => {
            quant_mpeg::quant_dc(NEUTRAL_DC, tables, params, true, scaler, out)
        }
        (QuantFamily::H263, TransformMode::DcOnly, _) => {
            quant_h263::quant_dc(dct.coef[0], params, intra, scaler, out)
        }
        (QuantFamily::Mpeg, TransformMode::DcOnly, _) => {
            quant_mpeg::quant_dc(dct.coef[0], tables, params, intra, scaler, out)
        }
        (QuantFamily::H263, _, true) => quant_h263::quant_intra(dct, params, scaler, out),
        (QuantFamily::H263, _, false) => quant_h263::quant_inter(dct, params, out),
        (QuantFamily::Mpeg, _, true) => quant_mpeg::quant_intra(dct, tables, params, scaler, out),
        (QuantFamily::Mpeg, _, false) => quant_mpeg::quant_inter(dct, tables, params, out),
    }
}

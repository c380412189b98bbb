//! 块复杂度分级
//!
//! 活动度依次与 4 个递增阈值比较, 选出正变换要计算的系数范围.

use super::tables::EncoderTables;
use super::types::TransformMode;

/// 按活动度选择变换复杂度
///
/// 阈值按 QP 与 intra 取自 `tables`; 短头 intra 块必须编码 DC, 不会得到 `Zero`.
pub fn classify(
    tables: &EncoderTables,
    activity: i32,
    qp: u8,
    intra: bool,
    short_header: bool,
) -> TransformMode {
    debug_assert!((1..=31).contains(&qp));
    let th = tables.thresholds(qp, intra);
    let mode = if activity < th[0] {
        TransformMode::Zero
    } else if activity < th[1] {
        TransformMode::DcOnly
    } else if activity < th[2] {
        TransformMode::Approx2x2
    } else if activity < th[3] {
        TransformMode::Approx4x4
    } else {
        TransformMode::Full8x8
    };

    if intra && short_header && mode == TransformMode::Zero {
        TransformMode::DcOnly
    } else {
        mode
    }
}

//! 重建: 按位图形状选择快速路径, 把反变换结果与预测块融合后直接写入帧缓冲

use m4venc_core::PlaneMut;

use super::idct::{IdctSink, dc_offset, idct_put};
use super::tables::NEUTRAL_SAMPLE;
use super::types::BlockCoeffs;

/// 实际走过的重建路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconPath {
    /// 未编码: intra 写中性值, inter 原样复制预测块
    Skip,
    /// 只有 DC: 统一偏移
    DcOffset,
    /// 位图分发的部分反变换
    Idct,
}

#[inline]
fn clip(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// 重建一个 8x8 块到 `dst`
///
/// `sink` 为 `Inter` 时预测块不能与 `dst` 重叠. 不会失败, 越界值一律饱和.
pub fn reconstruct_block(block: &BlockCoeffs, sink: IdctSink<'_>, dst: &mut PlaneMut<'_>) -> ReconPath {
    if !block.coded {
        match sink {
            IdctSink::Intra => dst.fill(NEUTRAL_SAMPLE),
            IdctSink::Inter(pred) => dst.copy_from(pred),
        }
        return ReconPath::Skip;
    }

    if block.bitmap.is_dc_only() {
        let offset = dc_offset(block.dequant[0]);
        match sink {
            IdctSink::Intra => dst.fill(clip(offset)),
            IdctSink::Inter(pred) => {
                for y in 0..8 {
                    let p = &pred.row(y)[..8];
                    for (d, &s) in dst.row_mut(y)[..8].iter_mut().zip(p) {
                        *d = clip(s as i32 + offset);
                    }
                }
            }
        }
        return ReconPath::DcOffset;
    }

    idct_put(&block.dequant, &block.bitmap, sink, dst);
    ReconPath::Idct
}

//! 半像素预测块构造与边缘扩展
//!
//! 双线性平均 1 / 2 / 4 个整像素样本, 舍入控制 `r` 每个 P 帧交替:
//! 两点 `(a + b + 1 - r) >> 1`, 四点 `(a + b + c + d + 2 - r) >> 2`.
//! 参考区域超出填充边界时先经边缘扩展复制到暂存缓冲再插值.

use m4venc_core::{FrameBuffer, PLANE_CB, PLANE_CR, PLANE_Y, Plane, PlaneMut, PlaneRef};

use super::tables::{ROUNDTAB_76, ROUNDTAB_79};
use super::types::{MbMotion, MotionVector};

/// 暂存区最大边长 (16 + 1)
const SCRATCH_DIM: usize = 17;

/// 边缘扩展走过的分支
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeCase {
    /// 区域完全在填充范围内, 无需扩展
    Inside,
    /// 只有垂直方向越界: 整行钳位复制
    Rows,
    /// 只有水平方向越界: 每行左右复制边缘样本
    Columns,
    /// 两个方向都越界
    Corner,
}

/// 把 `(x, y)` 起 `w x h` 的区域复制到 `out`, 越过填充边界的样本用最近的边缘样本代替
pub fn extend_region(
    plane: &Plane,
    x: isize,
    y: isize,
    w: usize,
    h: usize,
    out: &mut PlaneMut<'_>,
) -> EdgeCase {
    let pad = plane.pad() as isize;
    let min = -pad;
    let max_x = (plane.width() + plane.pad()) as isize;
    let max_y = (plane.height() + plane.pad()) as isize;
    let h_inside = x >= min && x + w as isize <= max_x;
    let v_inside = y >= min && y + h as isize <= max_y;

    match (h_inside, v_inside) {
        (true, true) => {
            if let Some(src) = plane.region(x, y, w, h) {
                out.copy_from(src);
            }
            EdgeCase::Inside
        }
        (true, false) => {
            let start = (x - min) as usize;
            for j in 0..h {
                let row = plane.padded_row(y + j as isize);
                out.row_mut(j).copy_from_slice(&row[start..start + w]);
            }
            EdgeCase::Rows
        }
        (false, v) => {
            for j in 0..h {
                let row = plane.padded_row(y + j as isize);
                extend_row(row, x - min, &mut out.row_mut(j)[..w]);
            }
            if v { EdgeCase::Columns } else { EdgeCase::Corner }
        }
    }
}

/// 水平越界的一行: 左侧复制首样本, 中间原样, 右侧复制末样本
///
/// `start` 为区域起点在 `row` 中的下标, 可以为负或超出行长.
fn extend_row(row: &[u8], start: isize, out: &mut [u8]) {
    let len = row.len() as isize;
    let first = row[0];
    let last = row[row.len() - 1];
    let w = out.len() as isize;

    let left = (-start).clamp(0, w) as usize;
    let right_begin = (len - start).clamp(0, w) as usize;
    out[..left].fill(first);
    if right_begin > left {
        let src = (start + left as isize) as usize;
        out[left..right_begin].copy_from_slice(&row[src..src + (right_begin - left)]);
    }
    out[right_begin.max(left)..].fill(last);
}

/// 对 `(w + fx) x (h + fy)` 的源区域做半像素插值
pub fn interpolate(
    src: PlaneRef<'_>,
    fx: bool,
    fy: bool,
    rounding: u8,
    w: usize,
    h: usize,
    out: &mut PlaneMut<'_>,
) {
    let r = rounding as u16;
    for j in 0..h {
        let a = src.row(j);
        let dst = &mut out.row_mut(j)[..w];
        match (fx, fy) {
            (false, false) => dst.copy_from_slice(&a[..w]),
            (true, false) => {
                for i in 0..w {
                    dst[i] = ((a[i] as u16 + a[i + 1] as u16 + 1 - r) >> 1) as u8;
                }
            }
            (false, true) => {
                let b = src.row(j + 1);
                for i in 0..w {
                    dst[i] = ((a[i] as u16 + b[i] as u16 + 1 - r) >> 1) as u8;
                }
            }
            (true, true) => {
                let b = src.row(j + 1);
                for i in 0..w {
                    let sum = a[i] as u16 + a[i + 1] as u16 + b[i] as u16 + b[i + 1] as u16;
                    dst[i] = ((sum + 2 - r) >> 2) as u8;
                }
            }
        }
    }
}

/// 按半像素向量取 `w x h` 预测块
///
/// `(x, y)` 为块在平面内的整像素位置, `mv` 为半像素向量.
/// 返回边缘扩展走过的分支.
#[allow(clippy::too_many_arguments)]
pub fn predict_block(
    plane: &Plane,
    x: usize,
    y: usize,
    mv: MotionVector,
    w: usize,
    h: usize,
    rounding: u8,
    out: &mut PlaneMut<'_>,
) -> EdgeCase {
    debug_assert!(w < SCRATCH_DIM && h < SCRATCH_DIM);
    let ix = x as isize + (mv.x as isize >> 1);
    let iy = y as isize + (mv.y as isize >> 1);
    let fx = mv.x & 1 != 0;
    let fy = mv.y & 1 != 0;
    let sw = w + fx as usize;
    let sh = h + fy as usize;

    if let Some(src) = plane.region(ix, iy, sw, sh) {
        interpolate(src, fx, fy, rounding, w, h, out);
        return EdgeCase::Inside;
    }

    let mut scratch = [0u8; SCRATCH_DIM * SCRATCH_DIM];
    let case = {
        let mut view = PlaneMut::new(&mut scratch, SCRATCH_DIM, sw, sh);
        extend_region(plane, ix, iy, sw, sh, &mut view)
    };
    let src = PlaneRef::new(&scratch, SCRATCH_DIM, sw, sh);
    interpolate(src, fx, fy, rounding, w, h, out);
    case
}

/// 1MV 色度向量分量: (v >> 1) + ROUNDTAB_79[v & 3]
#[inline]
pub fn chroma_component(v: i16) -> i16 {
    (v >> 1) + ROUNDTAB_79[(v & 3) as usize]
}

/// 4MV 色度向量分量: 4 个亮度分量之和 s, (s >> 3) + ROUNDTAB_76[s & 0xf]
#[inline]
pub fn chroma_component_sum(sum: i32) -> i16 {
    ((sum >> 3) + ROUNDTAB_76[(sum & 0xf) as usize] as i32) as i16
}

/// 宏块的色度向量
pub fn chroma_vector(motion: &MbMotion) -> MotionVector {
    match motion {
        MbMotion::None => MotionVector::ZERO,
        MbMotion::Single(sv) => {
            MotionVector::new(chroma_component(sv.mv.x), chroma_component(sv.mv.y))
        }
        MbMotion::Four { parts, .. } => {
            let sx: i32 = parts.iter().map(|p| p.mv.x as i32).sum();
            let sy: i32 = parts.iter().map(|p| p.mv.y as i32).sum();
            MotionVector::new(chroma_component_sum(sx), chroma_component_sum(sy))
        }
    }
}

/// 宏块预测: 16x16 亮度 + 两个 8x8 色度
#[derive(Debug, Clone)]
pub struct MbPrediction {
    pub luma: [u8; 256],
    pub cb: [u8; 64],
    pub cr: [u8; 64],
}

impl Default for MbPrediction {
    fn default() -> Self {
        Self {
            luma: [0; 256],
            cb: [0; 64],
            cr: [0; 64],
        }
    }
}

impl MbPrediction {
    /// 第 `block` 个 8x8 块 (Y0 Y1 Y2 Y3 Cb Cr) 的视图
    pub fn block(&self, block: usize) -> PlaneRef<'_> {
        match block {
            0..=3 => {
                let off = (block >> 1) * 8 * 16 + (block & 1) * 8;
                PlaneRef::new(&self.luma[off..], 16, 8, 8)
            }
            4 => PlaneRef::new(&self.cb, 8, 8, 8),
            _ => PlaneRef::new(&self.cr, 8, 8, 8),
        }
    }
}

/// 按宏块运动信息从参考帧构造完整预测
pub fn predict_macroblock(
    reference: &FrameBuffer,
    mb_x: usize,
    mb_y: usize,
    motion: &MbMotion,
    rounding: u8,
    pred: &mut MbPrediction,
) {
    let (px, py) = (mb_x * 16, mb_y * 16);
    let luma = reference.plane(PLANE_Y);
    match motion {
        MbMotion::Four { parts, .. } => {
            for (i, part) in parts.iter().enumerate() {
                let bx = (i & 1) * 8;
                let by = (i >> 1) * 8;
                let off = by * 16 + bx;
                let mut dst = PlaneMut::new(&mut pred.luma[off..], 16, 8, 8);
                predict_block(luma, px + bx, py + by, part.mv, 8, 8, rounding, &mut dst);
            }
        }
        _ => {
            let mv = motion.luma_vector(0);
            let mut dst = PlaneMut::new(&mut pred.luma, 16, 16, 16);
            predict_block(luma, px, py, mv, 16, 16, rounding, &mut dst);
        }
    }

    let cmv = chroma_vector(motion);
    let (cx, cy) = (mb_x * 8, mb_y * 8);
    let mut dst = PlaneMut::new(&mut pred.cb, 8, 8, 8);
    predict_block(reference.plane(PLANE_CB), cx, cy, cmv, 8, 8, rounding, &mut dst);
    let mut dst = PlaneMut::new(&mut pred.cr, 8, 8, 8);
    predict_block(reference.plane(PLANE_CR), cx, cy, cmv, 8, 8, rounding, &mut dst);
}

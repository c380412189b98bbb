//! 整数 IDCT (基于 FFmpeg simple_idct 实现)
//!
//! 8-bit 精度, W 常量按 2^14 缩放, 兼容 IEEE 1180.
//! 先列后行: 第一遍沿列 (系数 v 方向) 变换, 第二遍沿行输出像素.
//! 两遍都按位图选择部分内核, 所有部分内核与通用内核逐位一致.

use m4venc_core::{PlaneMut, PlaneRef};

use super::types::CoeffBitmap;

/// W 常量: cos(i*π/16) * √2 * 2^14
const W1: i64 = 22725;
const W2: i64 = 21407;
const W3: i64 = 19266;
const W4: i64 = 16383;
const W5: i64 = 12873;
const W6: i64 = 8867;
const W7: i64 = 4520;

const FIRST_SHIFT: u32 = 11;
const SECOND_SHIFT: u32 = 20;
const DC_SHIFT: u32 = 3;

/// 第一遍 (列) 内核
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKernel {
    /// 整列为零
    Zero,
    /// 只有 v = 0
    Dc,
    /// 只有 v < 2
    Top2,
    /// 只有 v < 4
    Top4,
    Full,
}

/// 第二遍 (行) 内核
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKernel {
    /// 只有 u = 0
    Dc,
    /// 只有 u < 2
    Left2,
    /// 只有 u < 4
    Left4,
    Full,
}

const fn column_kernel_for(bits: u8) -> ColumnKernel {
    if bits == 0 {
        ColumnKernel::Zero
    } else if bits == 0x80 {
        ColumnKernel::Dc
    } else if bits & 0x3f == 0 {
        ColumnKernel::Top2
    } else if bits & 0x0f == 0 {
        ColumnKernel::Top4
    } else {
        ColumnKernel::Full
    }
}

const fn build_column_table() -> [ColumnKernel; 256] {
    let mut table = [ColumnKernel::Full; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = column_kernel_for(i as u8);
        i += 1;
    }
    table
}

/// 列内核分发表, 下标为 `cols[u]`
pub const COLUMN_KERNELS: [ColumnKernel; 256] = build_column_table();

/// 按 `rows` 选择行内核
pub fn row_kernel(rows: u8) -> RowKernel {
    if rows & 0x7f == 0 {
        RowKernel::Dc
    } else if rows & 0x3f == 0 {
        RowKernel::Left2
    } else if rows & 0x0f == 0 {
        RowKernel::Left4
    } else {
        RowKernel::Full
    }
}

/// 第一遍通用内核 (AC 全零时走 DC 捷径)
fn first_full(x: [i64; 8]) -> [i32; 8] {
    if x[1..].iter().all(|&v| v == 0) {
        return first_dc(x[0]);
    }
    let round = 1i64 << (FIRST_SHIFT - 1);

    // 偶数部分
    let mut a0 = W4 * x[0] + round;
    let mut a1 = a0;
    let mut a2 = a0;
    let mut a3 = a0;

    a0 += W2 * x[2];
    a1 += W6 * x[2];
    a2 -= W6 * x[2];
    a3 -= W2 * x[2];

    if x[4] != 0 || x[6] != 0 {
        a0 += W4 * x[4] + W6 * x[6];
        a1 += -W4 * x[4] - W2 * x[6];
        a2 += -W4 * x[4] + W2 * x[6];
        a3 += W4 * x[4] - W6 * x[6];
    }

    // 奇数部分
    let mut b0 = W1 * x[1] + W3 * x[3];
    let mut b1 = W3 * x[1] - W7 * x[3];
    let mut b2 = W5 * x[1] - W1 * x[3];
    let mut b3 = W7 * x[1] - W5 * x[3];

    if x[5] != 0 || x[7] != 0 {
        b0 += W5 * x[5] + W7 * x[7];
        b1 += -W1 * x[5] - W5 * x[7];
        b2 += W7 * x[5] + W3 * x[7];
        b3 += W3 * x[5] - W1 * x[7];
    }

    butterfly([a0, a1, a2, a3], [b0, b1, b2, b3], FIRST_SHIFT)
}

#[inline]
fn first_dc(x0: i64) -> [i32; 8] {
    [(x0 << DC_SHIFT) as i32; 8]
}

fn first_top2(x0: i64, x1: i64) -> [i32; 8] {
    if x1 == 0 {
        return first_dc(x0);
    }
    let a = W4 * x0 + (1i64 << (FIRST_SHIFT - 1));
    butterfly(
        [a, a, a, a],
        [W1 * x1, W3 * x1, W5 * x1, W7 * x1],
        FIRST_SHIFT,
    )
}

fn first_top4(x: [i64; 8]) -> [i32; 8] {
    if x[1] == 0 && x[2] == 0 && x[3] == 0 {
        return first_dc(x[0]);
    }
    let a = W4 * x[0] + (1i64 << (FIRST_SHIFT - 1));
    butterfly(
        [a + W2 * x[2], a + W6 * x[2], a - W6 * x[2], a - W2 * x[2]],
        [
            W1 * x[1] + W3 * x[3],
            W3 * x[1] - W7 * x[3],
            W5 * x[1] - W1 * x[3],
            W7 * x[1] - W5 * x[3],
        ],
        FIRST_SHIFT,
    )
}

/// 第二遍通用内核
fn second_full(x: [i64; 8]) -> [i32; 8] {
    let round = 1i64 << (SECOND_SHIFT - 1);

    // 偶数部分
    let mut a0 = W4 * x[0] + round;
    let mut a1 = a0;
    let mut a2 = a0;
    let mut a3 = a0;

    a0 += W2 * x[2];
    a1 += W6 * x[2];
    a2 -= W6 * x[2];
    a3 -= W2 * x[2];

    if x[4] != 0 {
        a0 += W4 * x[4];
        a1 -= W4 * x[4];
        a2 -= W4 * x[4];
        a3 += W4 * x[4];
    }

    if x[6] != 0 {
        a0 += W6 * x[6];
        a1 -= W2 * x[6];
        a2 += W2 * x[6];
        a3 -= W6 * x[6];
    }

    // 奇数部分
    let mut b0 = W1 * x[1] + W3 * x[3];
    let mut b1 = W3 * x[1] - W7 * x[3];
    let mut b2 = W5 * x[1] - W1 * x[3];
    let mut b3 = W7 * x[1] - W5 * x[3];

    if x[5] != 0 {
        b0 += W5 * x[5];
        b1 -= W1 * x[5];
        b2 += W7 * x[5];
        b3 += W3 * x[5];
    }

    if x[7] != 0 {
        b0 += W7 * x[7];
        b1 -= W5 * x[7];
        b2 += W3 * x[7];
        b3 -= W1 * x[7];
    }

    butterfly([a0, a1, a2, a3], [b0, b1, b2, b3], SECOND_SHIFT)
}

#[inline]
fn second_dc(x0: i64) -> [i32; 8] {
    [((W4 * x0 + (1i64 << (SECOND_SHIFT - 1))) >> SECOND_SHIFT) as i32; 8]
}

fn second_left2(x0: i64, x1: i64) -> [i32; 8] {
    let a = W4 * x0 + (1i64 << (SECOND_SHIFT - 1));
    butterfly(
        [a, a, a, a],
        [W1 * x1, W3 * x1, W5 * x1, W7 * x1],
        SECOND_SHIFT,
    )
}

fn second_left4(x: [i64; 8]) -> [i32; 8] {
    let a = W4 * x[0] + (1i64 << (SECOND_SHIFT - 1));
    butterfly(
        [a + W2 * x[2], a + W6 * x[2], a - W6 * x[2], a - W2 * x[2]],
        [
            W1 * x[1] + W3 * x[3],
            W3 * x[1] - W7 * x[3],
            W5 * x[1] - W1 * x[3],
            W7 * x[1] - W5 * x[3],
        ],
        SECOND_SHIFT,
    )
}

/// 组合偶/奇部分并右移
#[inline]
fn butterfly(a: [i64; 4], b: [i64; 4], shift: u32) -> [i32; 8] {
    [
        ((a[0] + b[0]) >> shift) as i32,
        ((a[1] + b[1]) >> shift) as i32,
        ((a[2] + b[2]) >> shift) as i32,
        ((a[3] + b[3]) >> shift) as i32,
        ((a[3] - b[3]) >> shift) as i32,
        ((a[2] - b[2]) >> shift) as i32,
        ((a[1] - b[1]) >> shift) as i32,
        ((a[0] - b[0]) >> shift) as i32,
    ]
}

#[inline]
fn column(coef: &[i32; 64], u: usize) -> [i64; 8] {
    let mut x = [0i64; 8];
    for (v, dst) in x.iter_mut().enumerate() {
        *dst = coef[v * 8 + u] as i64;
    }
    x
}

/// 第一遍: 按 `cols[u]` 查表选择列内核, 输出按 `tmp[v * 8 + u]` 存放
fn first_pass(coef: &[i32; 64], bitmap: &CoeffBitmap, tmp: &mut [i64; 64]) {
    for u in 0..8 {
        let out = match COLUMN_KERNELS[bitmap.cols[u] as usize] {
            ColumnKernel::Zero => continue,
            ColumnKernel::Dc => first_dc(coef[u] as i64),
            ColumnKernel::Top2 => first_top2(coef[u] as i64, coef[8 + u] as i64),
            ColumnKernel::Top4 => first_top4(column(coef, u)),
            ColumnKernel::Full => first_full(column(coef, u)),
        };
        for (v, &val) in out.iter().enumerate() {
            tmp[v * 8 + u] = val as i64;
        }
    }
}

/// 第二遍单行
#[inline]
fn second_row(tmp: &[i64; 64], y: usize, kernel: RowKernel) -> [i32; 8] {
    let row = &tmp[y * 8..y * 8 + 8];
    match kernel {
        RowKernel::Dc => second_dc(row[0]),
        RowKernel::Left2 => second_left2(row[0], row[1]),
        RowKernel::Left4 => second_left4([row[0], row[1], row[2], row[3], 0, 0, 0, 0]),
        RowKernel::Full => {
            let mut x = [0i64; 8];
            x.copy_from_slice(row);
            second_full(x)
        }
    }
}

#[inline]
fn clip(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

/// 反变换输出去向
#[derive(Debug, Clone, Copy)]
pub enum IdctSink<'p> {
    /// 直接写饱和后的像素
    Intra,
    /// 叠加到预测块后饱和
    Inter(PlaneRef<'p>),
}

/// 位图分发的 8x8 反变换, 结果经 `sink` 写入 `dst`
pub fn idct_put(coef: &[i32; 64], bitmap: &CoeffBitmap, sink: IdctSink<'_>, dst: &mut PlaneMut<'_>) {
    debug_assert!(dst.width() >= 8 && dst.height() >= 8);
    let mut tmp = [0i64; 64];
    first_pass(coef, bitmap, &mut tmp);
    let kernel = row_kernel(bitmap.rows);
    for y in 0..8 {
        let vals = second_row(&tmp, y, kernel);
        let out = &mut dst.row_mut(y)[..8];
        match sink {
            IdctSink::Intra => {
                for (d, &v) in out.iter_mut().zip(&vals) {
                    *d = clip(v);
                }
            }
            IdctSink::Inter(pred) => {
                let p = &pred.row(y)[..8];
                for x in 0..8 {
                    out[x] = clip(p[x] as i32 + vals[x]);
                }
            }
        }
    }
}

/// 通用 8x8 反变换 (不看位图), 输出残差/像素值
pub fn idct_generic(coef: &[i32; 64]) -> [i32; 64] {
    let mut tmp = [0i64; 64];
    for u in 0..8 {
        let out = first_full(column(coef, u));
        for (v, &val) in out.iter().enumerate() {
            tmp[v * 8 + u] = val as i64;
        }
    }
    let mut out = [0i32; 64];
    for y in 0..8 {
        let mut x = [0i64; 8];
        x.copy_from_slice(&tmp[y * 8..y * 8 + 8]);
        out[y * 8..y * 8 + 8].copy_from_slice(&second_full(x));
    }
    out
}

/// 只有 DC 时每个样本的偏移量: (8 * DC * W4 + 2^19) >> 20
#[inline]
pub fn dc_offset(dc: i32) -> i32 {
    ((((dc as i64) << DC_SHIFT) * W4 + (1i64 << (SECOND_SHIFT - 1))) >> SECOND_SHIFT) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoders::mpeg4::tables::ZIGZAG_POSITION;

    fn bitmap_of(coef: &[i32; 64]) -> CoeffBitmap {
        let mut bm = CoeffBitmap::default();
        for (idx, &c) in coef.iter().enumerate() {
            if c != 0 {
                bm.mark(idx, ZIGZAG_POSITION[idx]);
            }
        }
        bm
    }

    fn run_dispatch(coef: &[i32; 64]) -> [u8; 64] {
        let mut out = [0u8; 64];
        let mut dst = PlaneMut::new(&mut out, 8, 8, 8);
        idct_put(coef, &bitmap_of(coef), IdctSink::Intra, &mut dst);
        out
    }

    fn run_generic(coef: &[i32; 64]) -> [u8; 64] {
        let mut out = [0u8; 64];
        for (d, v) in out.iter_mut().zip(idct_generic(coef)) {
            *d = clip(v);
        }
        out
    }

    #[test]
    fn test_column_table() {
        assert_eq!(COLUMN_KERNELS[0], ColumnKernel::Zero);
        assert_eq!(COLUMN_KERNELS[0x80], ColumnKernel::Dc);
        assert_eq!(COLUMN_KERNELS[0x40], ColumnKernel::Top2);
        assert_eq!(COLUMN_KERNELS[0xc0], ColumnKernel::Top2);
        assert_eq!(COLUMN_KERNELS[0x20], ColumnKernel::Top4);
        assert_eq!(COLUMN_KERNELS[0x01], ColumnKernel::Full);
        assert_eq!(row_kernel(0x80), RowKernel::Dc);
        assert_eq!(row_kernel(0x40), RowKernel::Left2);
        assert_eq!(row_kernel(0x90), RowKernel::Left4);
        assert_eq!(row_kernel(0x81), RowKernel::Full);
    }

    #[test]
    fn test_dispatch_matches_generic() {
        let mut state = 12345u32;
        let mut next = || {
            state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
            (state >> 16) as i32
        };
        for n in [1usize, 2, 3, 4, 6, 8] {
            for round in 0..200 {
                let mut coef = [0i32; 64];
                for v in 0..n {
                    for u in 0..n {
                        // 约一半位置为零, 覆盖不规则形状
                        if next() % 2 == 0 {
                            coef[v * 8 + u] = next() % 600 - 300;
                        }
                    }
                }
                if round % 5 == 0 {
                    coef[0] = next() % 2048;
                }
                assert_eq!(run_dispatch(&coef), run_generic(&coef), "n={} round={}", n, round);
            }
        }
    }

    #[test]
    fn test_dc_offset_matches_dispatch() {
        for dc in [-2048, -100, -8, -1, 1, 8, 79, 1024, 2047] {
            let mut coef = [0i32; 64];
            coef[0] = dc;
            let expected = clip(dc_offset(dc));
            assert!(run_dispatch(&coef).iter().all(|&p| p == expected), "dc {}", dc);
        }
        assert_eq!(dc_offset(79), 10);
        assert_eq!(dc_offset(1024), 128);
    }

    #[test]
    fn test_inter_sink_saturates() {
        let mut coef = [0i32; 64];
        coef[0] = 2047;
        coef[9] = -900;
        let pred = [250u8; 64];
        let mut out = [0u8; 64];
        let mut dst = PlaneMut::new(&mut out, 8, 8, 8);
        idct_put(
            &coef,
            &bitmap_of(&coef),
            IdctSink::Inter(PlaneRef::new(&pred, 8, 8, 8)),
            &mut dst,
        );
        assert!(out.iter().any(|&p| p == 255));
    }
}

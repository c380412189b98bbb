//! 整数正向 DCT (LLM 蝶形, 13 位定点常量)
//!
//! 先行后列. 行变换输出放大 `4 * sqrt(8)` 倍, 列变换再多右移 3 位,
//! 最终系数与反变换使用的自然尺度一致 (DC = 像素和 / 8).
//!
//! 五种复杂度各有一个内核, 只计算需要的系数, 其余位置保证为零.
//! 行变换之后按列绝对值和做提前退出: 低于列阈值的列整列记为零.

use m4venc_core::PlaneRef;

use super::types::TransformMode;

const CONST_BITS: u32 = 13;
const PASS1_BITS: u32 = 2;
/// 列变换额外右移, 把 8 倍的输出还原到自然尺度
const NATURAL_SHIFT: u32 = 3;

const FIX_0_298631336: i64 = 2446;
const FIX_0_390180644: i64 = 3196;
const FIX_0_541196100: i64 = 4433;
const FIX_0_765366865: i64 = 6270;
const FIX_0_899976223: i64 = 7373;
const FIX_1_175875602: i64 = 9633;
const FIX_1_501321110: i64 = 12299;
const FIX_1_847759065: i64 = 15137;
const FIX_1_961570560: i64 = 16069;
const FIX_2_053119869: i64 = 16819;
const FIX_2_562915447: i64 = 20995;
const FIX_3_072711026: i64 = 25172;

/// sqrt(8) * 2^10, 把自然尺度的列阈值换算到行变换输出尺度
const SQRT8_Q10: i64 = 2896;

/// 正变换输出
#[derive(Debug, Clone, Copy)]
pub struct DctBlock {
    /// 自然序系数, `coef[v * 8 + u]`
    pub coef: [i32; 64],
    /// 哨兵槽: 本次变换使用的列阈值
    pub col_threshold: i32,
    /// 被提前退出的列, 第 `7 - u` 位表示第 u 列
    pub skipped_cols: u8,
    pub transform: TransformMode,
}

impl Default for DctBlock {
    fn default() -> Self {
        Self {
            coef: [0; 64],
            col_threshold: 0,
            skipped_cols: 0,
            transform: TransformMode::Zero,
        }
    }
}

#[inline]
fn descale(x: i64, n: u32) -> i64 {
    (x + (1 << (n - 1))) >> n
}

/// 一维 8 点正变换, 只写出前 `n` 个输出 (n 取 1, 2, 4, 8)
#[inline]
fn fdct_1d(d: [i64; 8], n: usize, pass: Pass, out: &mut [i64; 8]) {
    let tmp0 = d[0] + d[7];
    let tmp7 = d[0] - d[7];
    let tmp1 = d[1] + d[6];
    let tmp6 = d[1] - d[6];
    let tmp2 = d[2] + d[5];
    let tmp5 = d[2] - d[5];
    let tmp3 = d[3] + d[4];
    let tmp4 = d[3] - d[4];

    let tmp10 = tmp0 + tmp3;
    let tmp13 = tmp0 - tmp3;
    let tmp11 = tmp1 + tmp2;
    let tmp12 = tmp1 - tmp2;

    out[0] = pass.even(tmp10 + tmp11);
    if n == 1 {
        return;
    }

    // 奇数部分
    let z1 = tmp4 + tmp7;
    let z2 = tmp5 + tmp6;
    let z3 = tmp4 + tmp6;
    let z4 = tmp5 + tmp7;
    let z5 = (z3 + z4) * FIX_1_175875602;

    let z1 = z1 * -FIX_0_899976223;
    let z2 = z2 * -FIX_2_562915447;
    let z3 = z3 * -FIX_1_961570560 + z5;
    let z4 = z4 * -FIX_0_390180644 + z5;

    out[1] = pass.odd(tmp7 * FIX_1_501321110 + z1 + z4);
    if n == 2 {
        return;
    }

    let e = (tmp12 + tmp13) * FIX_0_541196100;
    out[2] = pass.odd(e + tmp13 * FIX_0_765366865);
    out[3] = pass.odd(tmp6 * FIX_3_072711026 + z2 + z3);
    if n == 4 {
        return;
    }

    out[4] = pass.even(tmp10 - tmp11);
    out[5] = pass.odd(tmp5 * FIX_2_053119869 + z2 + z4);
    out[6] = pass.odd(e - tmp12 * FIX_1_847759065);
    out[7] = pass.odd(tmp4 * FIX_0_298631336 + z1 + z3);
}

#[derive(Clone, Copy)]
enum Pass {
    Row,
    Column,
}

impl Pass {
    #[inline]
    fn even(self, x: i64) -> i64 {
        match self {
            Pass::Row => x << PASS1_BITS,
            Pass::Column => descale(x, PASS1_BITS + NATURAL_SHIFT),
        }
    }

    #[inline]
    fn odd(self, x: i64) -> i64 {
        match self {
            Pass::Row => descale(x, CONST_BITS - PASS1_BITS),
            Pass::Column => descale(x, CONST_BITS + PASS1_BITS + NATURAL_SHIFT),
        }
    }
}

/// 自然尺度的列阈值换算到行变换输出尺度
#[inline]
fn scaled_column_threshold(col_th: i32) -> i64 {
    (col_th as i64 * SQRT8_Q10) >> (10 - PASS1_BITS)
}

/// 部分正变换: 计算左上 N x N 的系数
fn fdct_partial<const N: usize>(input: &[i32; 64], col_th: i32, intra: bool, out: &mut DctBlock) {
    let mut rows = [0i64; 64];
    let mut line = [0i64; 8];
    for y in 0..8 {
        let src = &input[y * 8..y * 8 + 8];
        let d = [
            src[0] as i64,
            src[1] as i64,
            src[2] as i64,
            src[3] as i64,
            src[4] as i64,
            src[5] as i64,
            src[6] as i64,
            src[7] as i64,
        ];
        fdct_1d(d, N, Pass::Row, &mut line);
        rows[y * 8..y * 8 + N].copy_from_slice(&line[..N]);
    }

    let limit = scaled_column_threshold(col_th);
    for u in 0..N {
        let mut d = [0i64; 8];
        let mut energy = 0i64;
        for (y, v) in d.iter_mut().enumerate() {
            *v = rows[y * 8 + u];
            energy += v.abs();
        }
        if col_th > 0 && energy < limit && !(intra && u == 0) {
            out.skipped_cols |= 0x80 >> u;
            continue;
        }
        fdct_1d(d, N, Pass::Column, &mut line);
        for v in 0..N {
            out.coef[v * 8 + u] = line[v] as i32;
        }
    }
}

/// DC 内核: DC = (像素和 + 4) >> 3, 与 N = 1 的部分变换结果一致
fn fdct_dc(input: &[i32; 64], col_th: i32, intra: bool, out: &mut DctBlock) {
    let mut energy = 0i64;
    let mut sum = 0i64;
    for y in 0..8 {
        let row: i64 = input[y * 8..y * 8 + 8].iter().map(|&v| v as i64).sum();
        energy += (row << PASS1_BITS).abs();
        sum += row;
    }
    if !intra && col_th > 0 && energy < scaled_column_threshold(col_th) {
        out.skipped_cols |= 0x80;
        return;
    }
    out.coef[0] = ((sum + 4) >> 3) as i32;
}

/// 对残差/像素执行选定复杂度的正变换
///
/// `input` 为自然序的 8x8 输入, intra 为像素值, inter 为当前块减预测块.
pub fn forward_transform(
    input: &[i32; 64],
    mode: TransformMode,
    col_th: i32,
    intra: bool,
    out: &mut DctBlock,
) {
    out.coef = [0; 64];
    out.col_threshold = col_th;
    out.skipped_cols = 0;
    out.transform = mode;
    match mode {
        TransformMode::Zero => {}
        TransformMode::DcOnly => fdct_dc(input, col_th, intra, out),
        TransformMode::Approx2x2 => fdct_partial::<2>(input, col_th, intra, out),
        TransformMode::Approx4x4 => fdct_partial::<4>(input, col_th, intra, out),
        TransformMode::Full8x8 => fdct_partial::<8>(input, col_th, intra, out),
    }
}

/// 帧内块: 直接从像素计算
pub fn forward_intra(cur: PlaneRef<'_>, mode: TransformMode, col_th: i32, out: &mut DctBlock) {
    let mut input = [0i32; 64];
    for y in 0..8 {
        for (dst, &p) in input[y * 8..y * 8 + 8].iter_mut().zip(&cur.row(y)[..8]) {
            *dst = p as i32;
        }
    }
    forward_transform(&input, mode, col_th, true, out);
}

/// 帧间块: 先算残差 (当前 - 预测) 再变换
pub fn forward_inter(
    cur: PlaneRef<'_>,
    pred: PlaneRef<'_>,
    mode: TransformMode,
    col_th: i32,
    out: &mut DctBlock,
) {
    let mut input = [0i32; 64];
    if mode != TransformMode::Zero {
        for y in 0..8 {
            let c = &cur.row(y)[..8];
            let p = &pred.row(y)[..8];
            for x in 0..8 {
                input[y * 8 + x] = c[x] as i32 - p[x] as i32;
            }
        }
    }
    forward_transform(&input, mode, col_th, false, out);
}

//! 宏块编码核心使用的常量表
//!
//! 扫描顺序, MPEG 默认量化矩阵, 复杂度分级系数, 半像素搜索表.
//! 会话相关的派生表在 [`EncoderTables`] 中按 QP 预先计算.

use super::config::{EncoderConfig, QuantFamily};

/// 常规 zigzag 扫描: 扫描位置 -> 自然序下标
pub const ZIGZAG_SCAN: [usize; 64] = [
    0, 1, 8, 16, 9, 2, 3, 10, 17, 24, 32, 25, 18, 11, 4, 5, 12, 19, 26, 33, 40, 48, 41, 34, 27,
    20, 13, 6, 7, 14, 21, 28, 35, 42, 49, 56, 57, 50, 43, 36, 29, 22, 15, 23, 30, 37, 44, 51, 58,
    59, 52, 45, 38, 31, 39, 46, 53, 60, 61, 54, 47, 55, 62, 63,
];

const fn invert_scan(scan: &[usize; 64]) -> [u8; 64] {
    let mut out = [0u8; 64];
    let mut i = 0;
    while i < 64 {
        out[scan[i]] = i as u8;
        i += 1;
    }
    out
}

/// 自然序下标 -> zigzag 扫描位置
pub const ZIGZAG_POSITION: [u8; 64] = invert_scan(&ZIGZAG_SCAN);

/// MPEG-4 默认 Intra 量化矩阵 (自然序)
pub const DEFAULT_INTRA_MATRIX: [u8; 64] = [
    8, 17, 18, 19, 21, 23, 25, 27, //
    17, 18, 19, 21, 23, 25, 27, 28, //
    20, 21, 22, 23, 24, 26, 28, 30, //
    21, 22, 23, 24, 26, 28, 30, 32, //
    22, 23, 24, 26, 28, 30, 32, 35, //
    23, 24, 26, 28, 30, 32, 35, 38, //
    25, 26, 28, 30, 32, 35, 38, 41, //
    27, 28, 30, 32, 35, 38, 41, 45,
];

/// MPEG-4 默认 Inter 量化矩阵 (自然序)
pub const DEFAULT_INTER_MATRIX: [u8; 64] = [
    16, 17, 18, 19, 20, 21, 22, 23, //
    17, 18, 19, 20, 21, 22, 23, 24, //
    18, 19, 20, 21, 22, 23, 24, 25, //
    19, 20, 21, 22, 23, 24, 26, 27, //
    20, 21, 22, 23, 25, 26, 27, 28, //
    21, 22, 23, 24, 26, 27, 28, 30, //
    22, 23, 24, 26, 27, 28, 30, 31, //
    23, 24, 25, 27, 28, 30, 31, 33,
];

/// 1MV 色度向量舍入表 (下标 mv & 3)
pub const ROUNDTAB_79: [i16; 4] = [0, 1, 0, 0];

/// 4MV 色度向量舍入表 (下标 sum & 0xf)
pub const ROUNDTAB_76: [i16; 16] = [0, 0, 0, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 1, 1];

/// 复杂度分级系数, 下标 [量化族][intra][阈值级]
///
/// 阈值 = (系数 * QP as f32) as i32, 截断取整, 逐位保留.
/// 阈值级依次为 Zero / DcOnly / 2x2 / 4x4 的上界.
pub const CLASSIFY_FACTORS: [[[f32; 4]; 2]; 2] = [
    // H.263 线性量化: [inter, intra]
    [[10.5, 42.0, 104.0, 224.0], [4.0, 24.0, 64.0, 160.0]],
    // MPEG 矩阵量化: [inter, intra]
    [[12.25, 48.5, 120.0, 256.0], [4.5, 27.0, 72.0, 180.0]],
];

/// 中性样本值 (中灰)
pub const NEUTRAL_SAMPLE: u8 = 128;

/// 中灰块的 DC 系数 (自然尺度: 128 * 8)
pub const NEUTRAL_DC: i32 = 1024;

/// 半像素邻点的螺旋顺序 (dx, dy): 左上, 上, 右上, 右, 右下, 下, 左下, 左
pub const HALFPEL_SPIRAL: [(i16, i16); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
];

/// 半像素候选距离表, 下标 [方向猜测][候选序号]
///
/// 序号 0 表示中心 (无猜测), 1..=8 对应 `HALFPEL_SPIRAL` 的位置.
/// 值为两者在螺旋环上的步数.
pub const HALFPEL_DISTANCE: [[u8; 9]; 9] = [
    [0, 1, 1, 1, 1, 1, 1, 1, 1],
    [1, 0, 1, 2, 3, 4, 3, 2, 1],
    [1, 1, 0, 1, 2, 3, 4, 3, 2],
    [1, 2, 1, 0, 1, 2, 3, 4, 3],
    [1, 3, 2, 1, 0, 1, 2, 3, 4],
    [1, 4, 3, 2, 1, 0, 1, 2, 3],
    [1, 3, 4, 3, 2, 1, 0, 1, 2],
    [1, 2, 3, 4, 3, 2, 1, 0, 1],
    [1, 1, 2, 3, 4, 3, 2, 1, 0],
];

/// 距离达到该值的候选不再计算 SAD
pub const HALFPEL_RELEVANCE_LIMIT: u8 = 3;

/// 4MV 模式需要比 1MV 至少低出的 SAD
pub const INTER4V_BIAS: i32 = 200;

/// Intra/Inter 判决偏置 (2 * 宏块像素数)
pub const INTRA_MODE_BIAS: i32 = 512;

/// MPEG-4 Intra DC 缩放因子
///
/// 短头模式固定为 8; 否则按 QP 区间和亮度/色度查表.
pub fn dc_scaler(qp: u8, luma: bool, short_header: bool) -> i32 {
    let qp = qp as i32;
    if short_header || qp <= 4 {
        return 8;
    }
    if luma {
        match qp {
            5..=8 => 2 * qp,
            9..=24 => qp + 8,
            _ => 2 * qp - 16,
        }
    } else {
        match qp {
            5..=24 => (qp + 13) >> 1,
            _ => qp - 6,
        }
    }
}

/// 会话级派生表
///
/// 每个 QP (1..=31) 的分级阈值和列阈值预先算好, 编码器实例之间可以共享.
#[derive(Debug, Clone)]
pub struct EncoderTables {
    /// 量化族
    pub family: QuantFamily,
    /// Intra 量化矩阵
    pub intra_matrix: [u8; 64],
    /// Inter 量化矩阵
    pub inter_matrix: [u8; 64],
    /// 分级阈值, 下标 [qp][intra]
    thresholds: [[[i32; 4]; 2]; 32],
    /// 正变换列提前退出阈值, 下标 [qp][intra]
    column_thresholds: [[i32; 2]; 32],
}

impl EncoderTables {
    /// 按配置预计算所有 QP 的表
    pub fn new(config: &EncoderConfig) -> Self {
        let family = config.quant_family;
        let intra_matrix = config.intra_matrix.unwrap_or(DEFAULT_INTRA_MATRIX);
        let inter_matrix = config.inter_matrix.unwrap_or(DEFAULT_INTER_MATRIX);
        let family_idx = match family {
            QuantFamily::H263 => 0,
            QuantFamily::Mpeg => 1,
        };

        let mut thresholds = [[[0i32; 4]; 2]; 32];
        let mut column_thresholds = [[0i32; 2]; 32];
        // Intra 的 DC 走单独的缩放, 列阈值只看 AC 位置的最小权重
        let intra_min_w = intra_matrix[1..].iter().copied().min().unwrap_or(16) as i32;
        let inter_min_w = inter_matrix.iter().copied().min().unwrap_or(16) as i32;

        for qp in 1..32usize {
            for intra in 0..2usize {
                let factors = &CLASSIFY_FACTORS[family_idx][intra];
                for (level, factor) in factors.iter().enumerate() {
                    thresholds[qp][intra][level] = (factor * qp as f32) as i32;
                }
            }

            // 一维变换输出的幅度不超过输入绝对值和的一半,
            // 列绝对值和低于 2 * (死区 - 1) 时整列量化为零
            let q = qp as i32;
            let (intra_dead, inter_dead) = match family {
                QuantFamily::H263 => (2 * q, 2 * q + (q >> 1)),
                QuantFamily::Mpeg => (
                    ((2 * (2 * q - ((3 * q + 2) >> 2)) - 1) * intra_min_w) / 32,
                    ((4 * q - 1) * inter_min_w) / 32,
                ),
            };
            column_thresholds[qp][0] = (2 * (inter_dead - 1)).max(0);
            column_thresholds[qp][1] = (2 * (intra_dead - 1)).max(0);
        }

        Self {
            family,
            intra_matrix,
            inter_matrix,
            thresholds,
            column_thresholds,
        }
    }

    /// 取分级阈值
    #[inline]
    pub fn thresholds(&self, qp: u8, intra: bool) -> &[i32; 4] {
        &self.thresholds[qp as usize][intra as usize]
    }

    /// 取列提前退出阈值
    #[inline]
    pub fn column_threshold(&self, qp: u8, intra: bool) -> i32 {
        self.column_thresholds[qp as usize][intra as usize]
    }

    /// 按块类型取量化矩阵
    #[inline]
    pub fn matrix(&self, intra: bool) -> &[u8; 64] {
        if intra {
            &self.intra_matrix
        } else {
            &self.inter_matrix
        }
    }
}

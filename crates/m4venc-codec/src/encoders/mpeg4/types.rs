//! MPEG-4 Part 2 宏块编码核心的类型定义

use bitflags::bitflags;

/// 运动向量 (半像素单位)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MotionVector {
    pub x: i16,
    pub y: i16,
}

impl MotionVector {
    /// 零向量
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i16, y: i16) -> Self {
        Self { x, y }
    }

    /// 由整像素向量构造
    pub const fn from_full_pel(x: i16, y: i16) -> Self {
        Self { x: x * 2, y: y * 2 }
    }

    /// 曼哈顿长度 |x| + |y|
    pub fn manhattan(&self) -> u32 {
        self.x.unsigned_abs() as u32 + self.y.unsigned_abs() as u32
    }
}

/// 带 SAD 的运动向量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoredVector {
    pub mv: MotionVector,
    pub sad: i32,
}

impl ScoredVector {
    pub const fn new(mv: MotionVector, sad: i32) -> Self {
        Self { mv, sad }
    }
}

/// 宏块运动信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MbMotion {
    /// 帧内宏块
    #[default]
    None,
    /// 整宏块一个向量
    Single(ScoredVector),
    /// 4MV: 整宏块向量 + 4 个 8x8 分区向量
    Four {
        whole: ScoredVector,
        parts: [ScoredVector; 4],
    },
}

impl MbMotion {
    /// 第 `block` 个亮度块 (0..4) 使用的向量
    pub fn luma_vector(&self, block: usize) -> MotionVector {
        match self {
            MbMotion::None => MotionVector::ZERO,
            MbMotion::Single(sv) => sv.mv,
            MbMotion::Four { parts, .. } => parts[block].mv,
        }
    }

    /// 4 个 8x8 分区的向量
    ///
    /// 1MV 时整宏块向量复制到 4 个分区, SAD 四等分, 余数归 0 号分区.
    pub fn partitions(&self) -> [ScoredVector; 4] {
        match self {
            MbMotion::None => [ScoredVector::default(); 4],
            MbMotion::Single(sv) => {
                let quarter = sv.sad / 4;
                let mut parts = [ScoredVector::new(sv.mv, quarter); 4];
                parts[0].sad = sv.sad - 3 * quarter;
                parts
            }
            MbMotion::Four { parts, .. } => *parts,
        }
    }

    /// 向量个数 (0, 1 或 5)
    pub fn vector_count(&self) -> usize {
        match self {
            MbMotion::None => 0,
            MbMotion::Single(_) => 1,
            MbMotion::Four { .. } => 5,
        }
    }
}

/// 正变换复杂度 (按复杂度递增排序)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum TransformMode {
    /// 全零块, 不做变换
    #[default]
    Zero,
    /// 只计算 DC
    DcOnly,
    /// 左上 2x2
    Approx2x2,
    /// 左上 4x4
    Approx4x4,
    /// 完整 8x8
    Full8x8,
}

impl TransformMode {
    /// 计算的系数边长 (0, 1, 2, 4, 8)
    pub fn size(self) -> usize {
        match self {
            TransformMode::Zero => 0,
            TransformMode::DcOnly => 1,
            TransformMode::Approx2x2 => 2,
            TransformMode::Approx4x4 => 4,
            TransformMode::Full8x8 => 8,
        }
    }
}

/// 宏块编码模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MbMode {
    Intra,
    IntraQ,
    Inter,
    InterQ,
    Inter4V,
}

impl MbMode {
    pub fn is_intra(self) -> bool {
        matches!(self, MbMode::Intra | MbMode::IntraQ)
    }
}

bitflags! {
    /// 编码块模式 (CBP), 块 i 对应第 5 - i 位
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Cbp: u8 {
        const Y0 = 1 << 5;
        const Y1 = 1 << 4;
        const Y2 = 1 << 3;
        const Y3 = 1 << 2;
        const CB = 1 << 1;
        const CR = 1 << 0;
        const LUMA = Self::Y0.bits() | Self::Y1.bits() | Self::Y2.bits() | Self::Y3.bits();
        const CHROMA = Self::CB.bits() | Self::CR.bits();
    }
}

impl Cbp {
    /// 块序号 (0..6) 对应的位
    pub fn for_block(block: usize) -> Self {
        debug_assert!(block < 6);
        Self::from_bits_truncate(1 << (5 - block))
    }

    /// 亮度部分 (cbpy, 4 位)
    pub fn cbpy(self) -> u8 {
        (self.bits() >> 2) & 0x0f
    }

    /// 色度部分 (cbpc, 2 位)
    pub fn cbpc(self) -> u8 {
        self.bits() & 0x03
    }
}

/// 非零系数位图三元组
///
/// `cols[u]` 第 `7 - v` 位: 系数 (v, u) 非零;
/// `rows` 第 `7 - u` 位: 第 u 列存在非零;
/// `zigzag` 第 `63 - k` 位: zigzag 扫描位置 k 的量化电平非零.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoeffBitmap {
    pub cols: [u8; 8],
    pub rows: u8,
    pub zigzag: u64,
}

impl CoeffBitmap {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// 标记自然序下标 `idx` (v * 8 + u) 的位置, `scan_pos` 为它的 zigzag 位置
    #[inline]
    pub fn mark(&mut self, idx: usize, scan_pos: u8) {
        let (v, u) = (idx >> 3, idx & 7);
        self.cols[u] |= 0x80 >> v;
        self.rows |= 0x80 >> u;
        self.zigzag |= 1u64 << (63 - scan_pos as u32);
    }

    /// 只在列/行位图中标记 (失配控制改写的位置没有量化电平)
    #[inline]
    pub fn mark_spatial(&mut self, idx: usize) {
        let (v, u) = (idx >> 3, idx & 7);
        self.cols[u] |= 0x80 >> v;
        self.rows |= 0x80 >> u;
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// 只有 DC 非零
    pub fn is_dc_only(&self) -> bool {
        self.rows == 0x80 && self.cols[0] == 0x80
    }

    /// 非零电平个数
    pub fn level_count(&self) -> u32 {
        self.zigzag.count_ones()
    }
}

/// 单个 8x8 块的量化结果
#[derive(Debug, Clone, Copy)]
pub struct BlockCoeffs {
    /// 量化电平 (自然序)
    pub levels: [i16; 64],
    /// 反量化系数 (自然序), 重建输入
    pub dequant: [i32; 64],
    pub bitmap: CoeffBitmap,
    /// 任意电平非零 (含 intra DC)
    pub coded: bool,
    pub transform: TransformMode,
}

impl Default for BlockCoeffs {
    fn default() -> Self {
        Self {
            levels: [0; 64],
            dequant: [0; 64],
            bitmap: CoeffBitmap::default(),
            coded: false,
            transform: TransformMode::Zero,
        }
    }
}

impl BlockCoeffs {
    pub fn reset(&mut self, transform: TransformMode) {
        self.levels = [0; 64];
        self.dequant = [0; 64];
        self.bitmap.clear();
        self.coded = false;
        self.transform = transform;
    }
}

/// 宏块编码结果, 交给熵编码器
#[derive(Debug, Clone)]
pub struct Macroblock {
    pub mb_x: usize,
    pub mb_y: usize,
    pub mode: MbMode,
    pub qp: u8,
    /// 相对上一宏块的 QP 变化 (-2..=2)
    pub dquant: i8,
    pub cbp: Cbp,
    /// Y0 Y1 Y2 Y3 Cb Cr
    pub blocks: [BlockCoeffs; 6],
    pub motion: MbMotion,
}

impl Macroblock {
    pub fn new(mb_x: usize, mb_y: usize) -> Self {
        Self {
            mb_x,
            mb_y,
            mode: MbMode::Intra,
            qp: 1,
            dquant: 0,
            cbp: Cbp::empty(),
            blocks: [BlockCoeffs::default(); 6],
            motion: MbMotion::None,
        }
    }

    /// 帧间且无任何编码块 (可作为 not_coded 跳过)
    pub fn is_skippable(&self) -> bool {
        self.mode == MbMode::Inter
            && self.cbp.is_empty()
            && matches!(self.motion, MbMotion::Single(sv) if sv.mv == MotionVector::ZERO)
    }

    /// 整宏块向量的 SAD
    pub fn sad(&self) -> i32 {
        match self.motion {
            MbMotion::None => 0,
            MbMotion::Single(sv) => sv.sad,
            MbMotion::Four { whole, .. } => whole.sad,
        }
    }
}

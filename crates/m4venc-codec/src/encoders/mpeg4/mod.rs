//! MPEG-4 Part 2 / H.263 宏块编码核心
//!
//! 每个宏块 6 个 8x8 块 (4 亮度 + 2 色度) 依次经过:
//! 活动度度量 -> 复杂度分级 -> 部分正变换 -> 量化/反量化 -> 位图分发的反变换重建.
//! 帧间宏块先在整像素种子周围做半像素细化, 得到预测块后再进入上述流程.
//!
//! 已实现:
//! - 两种量化族: H.263 线性量化, MPEG 矩阵量化 (含失配控制)
//! - 五档正变换复杂度 (零 / DC / 2x2 / 4x4 / 8x8), 列能量提前退出
//! - 非零系数位图 (列 / 行 / zigzag), 供重建和熵编码使用
//! - 三层重建快速路径 (跳过 / DC 偏移 / 部分 IDCT)
//! - 半像素细化, 1MV / 4MV 判决, 边缘扩展, 色度向量舍入
//! - 帧内/帧间判决, DQUANT 跟踪, 舍入控制交替
//!
//! ## 模块结构
//!
//! - `types`: 类型定义 (MbMode, MotionVector, CoeffBitmap, Macroblock 等)
//! - `tables`: 常量表与会话级派生表 `EncoderTables`
//! - `config`: 编码器配置
//! - `metric`: SAD / 像素和
//! - `classify`: 复杂度分级
//! - `fdct`: 整数正向 DCT
//! - `quant`, `quant_h263`, `quant_mpeg`: 量化/反量化
//! - `idct`: 整数 IDCT 内核
//! - `recon`: 重建快速路径
//! - `interp`: 半像素插值与边缘扩展
//! - `halfpel`: 半像素细化

pub mod classify;
pub mod config;
pub mod fdct;
pub mod halfpel;
pub mod idct;
pub mod interp;
pub mod metric;
pub mod quant;
mod quant_h263;
mod quant_mpeg;
pub mod recon;
pub mod tables;
pub mod types;

use std::sync::Arc;

use log::{debug, trace, warn};
use m4venc_core::{FrameBuffer, M4vError, M4vResult, PLANE_CB, PLANE_CR, PLANE_Y};

use classify::classify;
use config::EncoderConfig;
use fdct::{DctBlock, forward_inter, forward_intra};
use halfpel::{HalfpelSeed, SearchWindow, decide_inter4v, full_pel_seed, refine_halfpel};
use idct::IdctSink;
use interp::{MbPrediction, predict_macroblock};
use metric::{block_sad, block_sad_flat, mb_deviation, mb_sum};
use quant::{QuantParams, quantize_block};
use recon::reconstruct_block;
use tables::{EncoderTables, INTRA_MODE_BIAS, NEUTRAL_SAMPLE};
use types::{BlockCoeffs, Cbp, Macroblock, MbMode, MbMotion, MotionVector, ScoredVector};

/// DQUANT 允许的最大变化
const MAX_DQUANT: i32 = 2;

// ============================================================================
// 帧级输入
// ============================================================================

/// 帧类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    /// I 帧: 所有宏块帧内编码
    Intra,
    /// P 帧: 宏块可参考上一重建帧
    Predicted,
}

/// 整像素搜索为一个宏块给出的种子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbSeeds {
    /// 整宏块 16x16 种子
    pub whole: HalfpelSeed,
    /// 4 个 8x8 分区的种子, 只在启用 INTER4V 时使用
    pub parts: Option<[HalfpelSeed; 4]>,
}

impl MbSeeds {
    /// 以给定整像素向量为种子
    ///
    /// 整宏块和 4 个分区各自计算中心 SAD, 并由 8 个整像素邻点的 SAD
    /// 得出半像素方向猜测.
    pub fn at_vector(
        cur: &FrameBuffer,
        reference: &FrameBuffer,
        mb_x: usize,
        mb_y: usize,
        full_pel: (i16, i16),
    ) -> Self {
        let mv = MotionVector::from_full_pel(full_pel.0, full_pel.1);
        let (px, py) = (mb_x * 16, mb_y * 16);
        let cur_luma = cur.plane(PLANE_Y).view();
        let ref_luma = reference.plane(PLANE_Y);

        let whole = full_pel_seed(ref_luma, cur_luma.sub(px, py, 16, 16), px, py, 16, mv);
        let parts = std::array::from_fn(|i| {
            let (bx, by) = (px + (i & 1) * 8, py + (i >> 1) * 8);
            full_pel_seed(ref_luma, cur_luma.sub(bx, by, 8, 8), bx, by, 8, mv)
        });

        Self {
            whole,
            parts: Some(parts),
        }
    }
}

/// 块序号 -> (平面, x, y)
#[inline]
fn block_origin(block: usize, mb_x: usize, mb_y: usize) -> (usize, usize, usize) {
    match block {
        0..=3 => (PLANE_Y, mb_x * 16 + (block & 1) * 8, mb_y * 16 + (block >> 1) * 8),
        4 => (PLANE_CB, mb_x * 8, mb_y * 8),
        _ => (PLANE_CR, mb_x * 8, mb_y * 8),
    }
}

// ============================================================================
// 宏块编码器
// ============================================================================

/// 宏块编码会话
///
/// 持有只读的会话表 (可在多个实例间共享) 和本实例独占的暂存缓冲.
/// 并行编码时每个工作线程使用各自的实例.
pub struct MbEncoder {
    config: EncoderConfig,
    tables: Arc<EncoderTables>,
    params: QuantParams,
    /// 上一个宏块的 QP, 帧开始时为帧 QP
    prev_qp: u8,
    /// 舍入控制, 每个 P 帧交替
    rounding: u8,
    frame_kind: FrameKind,
    pred: MbPrediction,
    dct: DctBlock,
}

impl MbEncoder {
    /// 校验配置并构建会话表
    pub fn new(config: EncoderConfig) -> M4vResult<Self> {
        config.validate()?;
        let tables = Arc::new(EncoderTables::new(&config));
        Self::with_tables(config, tables)
    }

    /// 复用已有的会话表
    pub fn with_tables(config: EncoderConfig, tables: Arc<EncoderTables>) -> M4vResult<Self> {
        config.validate()?;
        if tables.family != config.quant_family {
            return Err(M4vError::Config(format!(
                "会话表量化族 {:?} 与配置 {:?} 不一致",
                tables.family, config.quant_family
            )));
        }
        debug!(
            "MPEG-4 宏块编码器: quant={:?}, short_header={}, half_pel={}, inter4v={}, range={}",
            config.quant_family,
            config.short_header,
            config.half_pel,
            config.inter4v,
            config.search_range
        );
        Ok(Self {
            params: QuantParams::new(1, config.short_header),
            prev_qp: 1,
            // I 帧之后的第一个 P 帧使用 0
            rounding: 1,
            frame_kind: FrameKind::Intra,
            config,
            tables,
            pred: MbPrediction::default(),
            dct: DctBlock::default(),
        })
    }

    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// 会话表, 可交给其他实例共享
    pub fn tables(&self) -> &Arc<EncoderTables> {
        &self.tables
    }

    /// 当前帧的舍入控制值
    pub fn rounding(&self) -> u8 {
        self.rounding
    }

    /// 当前帧类型
    pub fn frame_kind(&self) -> FrameKind {
        self.frame_kind
    }

    /// 开始新的一帧
    ///
    /// `qp` 为帧头 QP, 第一个宏块的 DQUANT 相对它计算.
    /// P 帧切换舍入控制 (短头模式固定为 0).
    pub fn begin_frame(&mut self, kind: FrameKind, qp: u8) -> M4vResult<()> {
        if !(1..=31).contains(&qp) {
            return Err(M4vError::InvalidArgument(format!("帧 QP 超出范围 1..=31: {}", qp)));
        }
        self.frame_kind = kind;
        self.prev_qp = qp;
        self.params = QuantParams::new(qp, self.config.short_header);
        match kind {
            FrameKind::Intra => self.rounding = 1,
            FrameKind::Predicted => {
                self.rounding = if self.config.short_header {
                    0
                } else {
                    self.rounding ^ 1
                };
            }
        }
        debug!("开始帧: {:?}, QP={}, rounding={}", kind, qp, self.rounding);
        Ok(())
    }

    /// 按上一宏块 QP 限制变化幅度, 返回 (实际 QP, dquant)
    fn apply_qp(&mut self, requested: u8, allow_change: bool) -> (u8, i8) {
        debug_assert!((1..=31).contains(&requested));
        let prev = self.prev_qp as i32;
        let delta = if allow_change {
            let wanted = requested as i32 - prev;
            let clamped = wanted.clamp(-MAX_DQUANT, MAX_DQUANT);
            if clamped != wanted {
                warn!(
                    "DQUANT 超出范围: 上一 QP={}, 请求 QP={}, 限制为 {:+}",
                    prev, requested, clamped
                );
            }
            clamped
        } else {
            0
        };
        let qp = (prev + delta) as u8;
        if qp != self.params.qp {
            self.params = QuantParams::new(qp, self.config.short_header);
        }
        self.prev_qp = qp;
        (qp, delta as i8)
    }

    /// Intra 块的 CBP 位
    ///
    /// DC 单独用 DC VLC 编码时 CBP 只反映 AC; 否则 DC 与 AC 一起游程编码.
    fn intra_cbp_bit(&self, block: &BlockCoeffs) -> bool {
        if self.intra_dc_separate() {
            block.bitmap.zigzag & !(1u64 << 63) != 0
        } else {
            block.coded
        }
    }

    /// Intra DC 是否使用单独的 DC VLC (短头模式为 INTRADC 定长码)
    fn intra_dc_separate(&self) -> bool {
        if self.config.short_header {
            return true;
        }
        let thr = self.config.intra_dc_vlc_threshold as i32;
        let qp = self.params.qp as i32;
        !(thr == 7 || (thr > 0 && qp >= 11 + 2 * thr))
    }

    /// 编码一个宏块
    ///
    /// `inter` 为 `None` 时帧内编码; 否则给出参考帧和整像素种子,
    /// 经半像素细化和帧内/帧间判决后编码. 重建样本写入 `recon`.
    pub fn encode_macroblock(
        &mut self,
        cur: &FrameBuffer,
        inter: Option<(&FrameBuffer, &MbSeeds)>,
        recon: &mut FrameBuffer,
        mb_x: usize,
        mb_y: usize,
        qp: u8,
    ) -> Macroblock {
        debug_assert!(mb_x < cur.mb_cols() && mb_y < cur.mb_rows());
        let mut mb = Macroblock::new(mb_x, mb_y);

        let motion = match inter {
            Some((reference, seeds)) => self.estimate_motion(cur, reference, seeds, mb_x, mb_y),
            None => MbMotion::None,
        };

        let intra = match motion {
            MbMotion::None => true,
            _ => self.prefer_intra(cur, mb_x, mb_y, mb_sad_of(&motion)),
        };

        if intra {
            let (qp, dquant) = self.apply_qp(qp, true);
            mb.mode = if dquant != 0 { MbMode::IntraQ } else { MbMode::Intra };
            mb.qp = qp;
            mb.dquant = dquant;
            self.encode_intra_blocks(cur, recon, &mut mb);
        } else {
            let four = matches!(motion, MbMotion::Four { .. });
            // INTER4V 不能携带 DQUANT, 沿用上一宏块 QP
            let (qp, dquant) = self.apply_qp(qp, !four);
            mb.mode = match (four, dquant != 0) {
                (true, _) => MbMode::Inter4V,
                (false, true) => MbMode::InterQ,
                (false, false) => MbMode::Inter,
            };
            mb.qp = qp;
            mb.dquant = dquant;
            mb.motion = motion;
            if let Some((reference, _)) = inter {
                predict_macroblock(reference, mb_x, mb_y, &motion, self.rounding, &mut self.pred);
            }
            self.encode_inter_blocks(cur, recon, &mut mb);
        }

        trace!(
            "MB({}, {}): mode={:?}, qp={}, cbp={:06b}, mv={}, levels={}",
            mb_x,
            mb_y,
            mb.mode,
            mb.qp,
            mb.cbp.bits(),
            mb.motion.vector_count(),
            mb.blocks.iter().map(|b| b.bitmap.level_count()).sum::<u32>()
        );
        mb
    }

    /// 半像素细化与 1MV/4MV 判决
    fn estimate_motion(
        &self,
        cur: &FrameBuffer,
        reference: &FrameBuffer,
        seeds: &MbSeeds,
        mb_x: usize,
        mb_y: usize,
    ) -> MbMotion {
        let ref_luma = reference.plane(PLANE_Y);
        let cur_luma = cur.plane(PLANE_Y).view();
        let (px, py) = (mb_x * 16, mb_y * 16);
        let allow_outside = !self.config.short_header;
        let range = self.config.search_range;

        let whole = if self.config.half_pel {
            let window = SearchWindow::new(ref_luma, px, py, 16, range, allow_outside);
            refine_halfpel(
                ref_luma,
                cur_luma.sub(px, py, 16, 16),
                px,
                py,
                16,
                seeds.whole,
                &window,
                self.rounding,
            )
        } else {
            seeds.whole.best
        };

        let parts = match (self.config.inter4v, seeds.parts) {
            (true, Some(parts)) => parts,
            _ => return MbMotion::Single(whole),
        };

        let mut refined = [ScoredVector::default(); 4];
        for (i, (seed, out)) in parts.iter().zip(refined.iter_mut()).enumerate() {
            let (bx, by) = (px + (i & 1) * 8, py + (i >> 1) * 8);
            *out = if self.config.half_pel {
                let window = SearchWindow::new(ref_luma, bx, by, 8, range, allow_outside);
                refine_halfpel(
                    ref_luma,
                    cur_luma.sub(bx, by, 8, 8),
                    bx,
                    by,
                    8,
                    *seed,
                    &window,
                    self.rounding,
                )
            } else {
                seed.best
            };
        }
        decide_inter4v(whole, refined)
    }

    /// 帧内/帧间判决: 宏块相对均值的偏差明显小于帧间 SAD 时选帧内
    fn prefer_intra(&self, cur: &FrameBuffer, mb_x: usize, mb_y: usize, sad_inter: i32) -> bool {
        let view = cur.plane(PLANE_Y).view().sub(mb_x * 16, mb_y * 16, 16, 16);
        let mean = (mb_sum(view) + 128) >> 8;
        mb_deviation(view, mean) < sad_inter - INTRA_MODE_BIAS
    }

    fn encode_intra_blocks(&mut self, cur: &FrameBuffer, recon: &mut FrameBuffer, mb: &mut Macroblock) {
        let qp = self.params.qp;
        let col_th = self.tables.column_threshold(qp, true);
        let mut cbp = Cbp::empty();
        for i in 0..6 {
            let (plane, x, y) = block_origin(i, mb.mb_x, mb.mb_y);
            let src = cur.plane(plane).view().sub(x, y, 8, 8);
            let activity = block_sad_flat(src, NEUTRAL_SAMPLE);
            let mode = classify(&self.tables, activity, qp, true, self.config.short_header);
            forward_intra(src, mode, col_th, &mut self.dct);

            let block = &mut mb.blocks[i];
            quantize_block(&self.tables, &self.params, &self.dct, true, i < 4, block);
            let mut dst = recon.plane_mut(plane).region_mut(x, y, 8, 8);
            reconstruct_block(block, IdctSink::Intra, &mut dst);
            if self.intra_cbp_bit(&mb.blocks[i]) {
                cbp |= Cbp::for_block(i);
            }
        }
        mb.cbp = cbp;
    }

    fn encode_inter_blocks(&mut self, cur: &FrameBuffer, recon: &mut FrameBuffer, mb: &mut Macroblock) {
        let qp = self.params.qp;
        let col_th = self.tables.column_threshold(qp, false);
        let mut cbp = Cbp::empty();
        for i in 0..6 {
            let (plane, x, y) = block_origin(i, mb.mb_x, mb.mb_y);
            let src = cur.plane(plane).view().sub(x, y, 8, 8);
            let pred = self.pred.block(i);
            let activity = block_sad(src, pred);
            let mode = classify(&self.tables, activity, qp, false, self.config.short_header);
            forward_inter(src, pred, mode, col_th, &mut self.dct);

            let block = &mut mb.blocks[i];
            if quantize_block(&self.tables, &self.params, &self.dct, false, i < 4, block) {
                cbp |= Cbp::for_block(i);
            }
            let mut dst = recon.plane_mut(plane).region_mut(x, y, 8, 8);
            reconstruct_block(block, IdctSink::Inter(pred), &mut dst);
        }
        mb.cbp = cbp;
    }

    /// 按光栅顺序编码一帧
    ///
    /// `qp_for(mb_x, mb_y)` 由码率控制提供每个宏块的 QP;
    /// P 帧时 `seed_for(mb_x, mb_y)` 由整像素搜索提供种子.
    /// 编码结束后对 `recon` 做边缘扩展, 它可以直接作为下一帧的参考.
    pub fn encode_picture<Q, S>(
        &mut self,
        cur: &FrameBuffer,
        reference: Option<&FrameBuffer>,
        recon: &mut FrameBuffer,
        mut qp_for: Q,
        mut seed_for: S,
    ) -> M4vResult<Vec<Macroblock>>
    where
        Q: FnMut(usize, usize) -> u8,
        S: FnMut(usize, usize) -> MbSeeds,
    {
        let same_geometry = |f: &FrameBuffer| f.width() == cur.width() && f.height() == cur.height();
        if !same_geometry(recon) || !reference.is_none_or(same_geometry) {
            return Err(M4vError::InvalidArgument(
                "当前帧、参考帧与重建帧尺寸不一致".into(),
            ));
        }

        let kind = if reference.is_some() {
            FrameKind::Predicted
        } else {
            FrameKind::Intra
        };
        let first_qp = qp_for(0, 0);
        self.begin_frame(kind, first_qp)?;

        let (cols, rows) = (cur.mb_cols(), cur.mb_rows());
        let mut macroblocks = Vec::with_capacity(cols * rows);
        for mb_y in 0..rows {
            for mb_x in 0..cols {
                let qp = if mb_x == 0 && mb_y == 0 {
                    first_qp
                } else {
                    qp_for(mb_x, mb_y)
                };
                if !(1..=31).contains(&qp) {
                    return Err(M4vError::InvalidArgument(format!(
                        "MB({}, {}) QP 超出范围 1..=31: {}",
                        mb_x, mb_y, qp
                    )));
                }
                let mb = match reference {
                    Some(reference) => {
                        let seeds = seed_for(mb_x, mb_y);
                        self.encode_macroblock(cur, Some((reference, &seeds)), recon, mb_x, mb_y, qp)
                    }
                    None => self.encode_macroblock(cur, None, recon, mb_x, mb_y, qp),
                };
                macroblocks.push(mb);
            }
        }
        recon.extend_edges();

        let intra_count = macroblocks.iter().filter(|mb| mb.mode.is_intra()).count();
        debug!(
            "帧编码完成: {:?}, {} 个宏块, 其中帧内 {}",
            kind,
            macroblocks.len(),
            intra_count
        );
        Ok(macroblocks)
    }
}

/// 运动信息对应的帧间 SAD
#[inline]
fn mb_sad_of(motion: &MbMotion) -> i32 {
    match motion {
        MbMotion::None => i32::MAX,
        MbMotion::Single(sv) => sv.sad,
        MbMotion::Four { parts, .. } => parts.iter().map(|p| p.sad).sum(),
    }
}

//! 半像素运动向量细化
//!
//! 从外部整像素搜索给出的种子向量出发, 按固定螺旋顺序检查 8 个半像素邻点.
//! 两类候选直接跳过: 距离表判定与方向猜测相距太远的, 以及落在搜索范围或
//! 填充边界之外的 (预先算好的范围掩码).

use log::trace;

use m4venc_core::{Plane, PlaneMut, PlaneRef};

use super::interp::predict_block;
use super::metric::{block_sad, mb_sad};
use super::tables::{HALFPEL_DISTANCE, HALFPEL_RELEVANCE_LIMIT, HALFPEL_SPIRAL, INTER4V_BIAS};
use super::types::{MbMotion, MotionVector, ScoredVector};

/// 整像素搜索给出的种子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HalfpelSeed {
    /// 半像素单位, 分量为偶数
    pub best: ScoredVector,
    /// 方向猜测: 0 表示无, 1..=8 对应螺旋序号
    pub hp_guess: u8,
}

impl HalfpelSeed {
    pub fn new(best: ScoredVector, hp_guess: u8) -> Self {
        debug_assert!(hp_guess <= 8);
        Self { best, hp_guess }
    }
}

/// 块向量允许的取值范围 (半像素单位, 闭区间)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub min_x: i16,
    pub max_x: i16,
    pub min_y: i16,
    pub max_y: i16,
}

impl SearchWindow {
    /// 由搜索范围和块位置计算窗口
    ///
    /// 插值需要额外一个样本, 预测区域 (含插值样本) 必须落在平面内
    /// 向外 `reach` 个样本的范围里: 允许越出可见区域时 `reach` 为填充宽度, 否则为 0.
    pub fn new(
        plane: &Plane,
        x: usize,
        y: usize,
        size: usize,
        search_range: u8,
        allow_outside: bool,
    ) -> Self {
        let reach = if allow_outside { plane.pad() as i32 } else { 0 };
        let range = 2 * search_range as i32;
        let (x, y, size) = (x as i32, y as i32, size as i32);
        // 整像素部分 >= -reach - pos; 整像素部分 + size + 小数 <= dim + reach
        let min_x = (-2 * (reach + x)).max(-range);
        let max_x = (2 * (plane.width() as i32 + reach - x - size)).min(range);
        let min_y = (-2 * (reach + y)).max(-range);
        let max_y = (2 * (plane.height() as i32 + reach - y - size)).min(range);
        Self {
            min_x: min_x as i16,
            max_x: max_x as i16,
            min_y: min_y as i16,
            max_y: max_y as i16,
        }
    }

    pub fn contains(&self, mv: MotionVector) -> bool {
        mv.x >= self.min_x && mv.x <= self.max_x && mv.y >= self.min_y && mv.y <= self.max_y
    }

    /// 种子周围 8 个邻点的范围掩码, 第 `h - 1` 位对应螺旋序号 h
    pub fn neighbour_mask(&self, center: MotionVector) -> u8 {
        let mut mask = 0u8;
        for (i, &(dx, dy)) in HALFPEL_SPIRAL.iter().enumerate() {
            if self.contains(MotionVector::new(center.x + dx, center.y + dy)) {
                mask |= 1 << i;
            }
        }
        mask
    }
}

/// 新候选是否优于当前最优: SAD 更小, 或相等且曼哈顿长度更小
#[inline]
fn better(candidate: ScoredVector, best: ScoredVector) -> bool {
    candidate.sad < best.sad
        || (candidate.sad == best.sad && candidate.mv.manhattan() < best.mv.manhattan())
}

/// 由整像素邻点 SAD 推出方向猜测
///
/// `neighbour_sads` 按螺旋顺序给出, 未计算的填 `None`. 没有邻点优于中心时返回 0.
pub fn hp_guess_from_neighbours(center_sad: i32, neighbour_sads: &[Option<i32>; 8]) -> u8 {
    let mut guess = 0u8;
    let mut best = center_sad;
    for (i, sad) in neighbour_sads.iter().enumerate() {
        if let Some(sad) = *sad {
            if sad < best {
                best = sad;
                guess = i as u8 + 1;
            }
        }
    }
    guess
}

/// 整像素预测的 SAD, 16x16 时超过 `dmin` 提前返回
fn full_pel_sad(
    reference: &Plane,
    cur: PlaneRef<'_>,
    x: usize,
    y: usize,
    size: usize,
    mv: MotionVector,
    dmin: i32,
) -> i32 {
    let mut scratch = [0u8; 256];
    {
        let mut dst = PlaneMut::new(&mut scratch, size, size, size);
        predict_block(reference, x, y, mv, size, size, 0, &mut dst);
    }
    let pred = PlaneRef::new(&scratch, size, size, size);
    if size == 16 {
        mb_sad(cur, pred, dmin)
    } else {
        block_sad(cur, pred)
    }
}

/// 在整像素向量处构造种子
///
/// `mv` 为半像素单位的整像素向量. 计算中心 SAD, 再按螺旋顺序计算 8 个
/// 整像素邻点 (落在填充边界内的) 的 SAD, 交给 [`hp_guess_from_neighbours`].
pub fn full_pel_seed(
    reference: &Plane,
    cur: PlaneRef<'_>,
    x: usize,
    y: usize,
    size: usize,
    mv: MotionVector,
) -> HalfpelSeed {
    debug_assert!(size == 8 || size == 16);
    debug_assert!(mv.x % 2 == 0 && mv.y % 2 == 0);
    let center_sad = full_pel_sad(reference, cur, x, y, size, mv, i32::MAX);
    let bounds = SearchWindow::new(reference, x, y, size, u8::MAX, true);
    let mut neighbour_sads = [None; 8];
    for (sad, &(dx, dy)) in neighbour_sads.iter_mut().zip(HALFPEL_SPIRAL.iter()) {
        let candidate = MotionVector::new(mv.x + 2 * dx, mv.y + 2 * dy);
        if bounds.contains(candidate) {
            *sad = Some(full_pel_sad(reference, cur, x, y, size, candidate, center_sad));
        }
    }
    HalfpelSeed::new(
        ScoredVector::new(mv, center_sad),
        hp_guess_from_neighbours(center_sad, &neighbour_sads),
    )
}

/// 块级半像素细化
///
/// `cur` 为当前块 (size x size, size 为 8 或 16), `(x, y)` 为块在参考平面中的位置.
/// 结果的 SAD 永远不大于种子.
#[allow(clippy::too_many_arguments)]
pub fn refine_halfpel(
    reference: &Plane,
    cur: PlaneRef<'_>,
    x: usize,
    y: usize,
    size: usize,
    seed: HalfpelSeed,
    window: &SearchWindow,
    rounding: u8,
) -> ScoredVector {
    debug_assert!(size == 8 || size == 16);
    let center = seed.best.mv;
    let mask = window.neighbour_mask(center);
    let distance = &HALFPEL_DISTANCE[seed.hp_guess as usize];
    let mut best = seed.best;
    let mut scratch = [0u8; 256];

    for (i, &(dx, dy)) in HALFPEL_SPIRAL.iter().enumerate() {
        let h = i + 1;
        if distance[h] >= HALFPEL_RELEVANCE_LIMIT || mask & (1 << i) == 0 {
            continue;
        }
        let mv = MotionVector::new(center.x + dx, center.y + dy);
        {
            let mut dst = PlaneMut::new(&mut scratch, size, size, size);
            predict_block(reference, x, y, mv, size, size, rounding, &mut dst);
        }
        let pred = PlaneRef::new(&scratch, size, size, size);
        let sad = if size == 16 {
            mb_sad(cur, pred, best.sad)
        } else {
            block_sad(cur, pred)
        };
        let candidate = ScoredVector::new(mv, sad);
        if better(candidate, best) {
            best = candidate;
        }
    }

    trace!(
        "半像素细化: ({}, {}) 种子 {:?} -> {:?}",
        x, y, seed.best, best
    );
    best
}

/// 1MV / 4MV 判决
///
/// 4 个分区 SAD 之和加偏置不低于整宏块 SAD 时退回 1MV.
pub fn decide_inter4v(whole: ScoredVector, parts: [ScoredVector; 4]) -> MbMotion {
    let sum4: i32 = parts.iter().map(|p| p.sad).sum();
    if sum4 + INTER4V_BIAS >= whole.sad {
        MbMotion::Single(whole)
    } else {
        MbMotion::Four { whole, parts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 平滑纹理, 半像素位置上有明确的最优
    fn textured_plane() -> Plane {
        let mut plane = Plane::new(64, 64, 16, 0);
        {
            let mut view = plane.view_mut();
            for y in 0..64 {
                for (x, v) in view.row_mut(y).iter_mut().enumerate() {
                    let fx = x as f64 * 0.35;
                    let fy = y as f64 * 0.27;
                    *v = (128.0 + 60.0 * fx.sin() + 50.0 * fy.cos()) as u8;
                }
            }
        }
        plane.extend_edges();
        plane
    }

    fn block_at(plane: &Plane, x: usize, y: usize, mv: MotionVector, size: usize) -> Vec<u8> {
        let mut out = vec![0u8; size * size];
        let mut dst = PlaneMut::new(&mut out, size, size, size);
        predict_block(plane, x, y, mv, size, size, 0, &mut dst);
        out
    }

    #[test]
    fn test_finds_exact_halfpel_match() {
        let plane = textured_plane();
        let target = MotionVector::new(3, -1);
        let cur = block_at(&plane, 24, 24, target, 16);
        let cur_view = PlaneRef::new(&cur, 16, 16, 16);

        let seed_mv = MotionVector::new(2, 0);
        let seed_pred = block_at(&plane, 24, 24, seed_mv, 16);
        let seed_sad = mb_sad(cur_view, PlaneRef::new(&seed_pred, 16, 16, 16), i32::MAX);
        let seed = HalfpelSeed::new(ScoredVector::new(seed_mv, seed_sad), 0);
        let window = SearchWindow::new(&plane, 24, 24, 16, 16, true);

        let best = refine_halfpel(&plane, cur_view, 24, 24, 16, seed, &window, 0);
        assert_eq!(best.mv, target);
        assert_eq!(best.sad, 0);
    }

    #[test]
    fn test_never_worse_than_seed() {
        let plane = textured_plane();
        let cur = block_at(&plane, 8, 40, MotionVector::new(0, 0), 8);
        let cur_view = PlaneRef::new(&cur, 8, 8, 8);
        for guess in 0..=8u8 {
            for (sx, sy) in [(0i16, 0i16), (4, -2), (-6, 8)] {
                let mv = MotionVector::new(sx, sy);
                let pred = block_at(&plane, 8, 40, mv, 8);
                let sad = block_sad(cur_view, PlaneRef::new(&pred, 8, 8, 8));
                let seed = HalfpelSeed::new(ScoredVector::new(mv, sad), guess);
                let window = SearchWindow::new(&plane, 8, 40, 8, 16, true);
                let best = refine_halfpel(&plane, cur_view, 8, 40, 8, seed, &window, 1);
                assert!(best.sad <= sad);
            }
        }
    }

    #[test]
    fn test_tie_prefers_shorter_vector() {
        // 全平面同值: 所有候选 SAD 相等
        let mut plane = Plane::new(32, 32, 16, 90);
        plane.extend_edges();
        let cur = [100u8; 64];
        let cur_view = PlaneRef::new(&cur, 8, 8, 8);
        let seed = HalfpelSeed::new(ScoredVector::new(MotionVector::new(2, 2), 640), 0);
        let window = SearchWindow::new(&plane, 8, 8, 8, 16, true);
        let best = refine_halfpel(&plane, cur_view, 8, 8, 8, seed, &window, 0);
        assert_eq!(best.sad, 640);
        assert_eq!(best.mv, MotionVector::new(1, 1));
    }

    #[test]
    fn test_window_masks_out_of_range() {
        let plane = Plane::new(32, 32, 16, 0);
        let window = SearchWindow::new(&plane, 0, 0, 16, 16, false);
        assert_eq!(window.min_x, 0);
        assert_eq!(window.min_y, 0);
        assert_eq!(window.max_x, 32);
        // 左上角种子: 只有右、右下、下在范围内
        let mask = window.neighbour_mask(MotionVector::ZERO);
        assert_eq!(mask, (1 << 3) | (1 << 4) | (1 << 5));

        let window = SearchWindow::new(&plane, 0, 0, 16, 4, true);
        assert_eq!(window.min_x, -8);
        assert_eq!(window.max_x, 8);
    }

    #[test]
    fn test_distance_prunes_far_candidates() {
        // 猜测为右 (4): 距离 >= 3 的左上、左下、左被跳过
        let pruned: Vec<usize> = (1..=8)
            .filter(|&h| HALFPEL_DISTANCE[4][h] >= HALFPEL_RELEVANCE_LIMIT)
            .collect();
        assert_eq!(pruned, vec![1, 7, 8]);
    }

    #[test]
    fn test_hp_guess_from_neighbours() {
        let mut sads = [None; 8];
        assert_eq!(hp_guess_from_neighbours(100, &sads), 0);
        sads[2] = Some(90);
        sads[5] = Some(80);
        assert_eq!(hp_guess_from_neighbours(100, &sads), 6);
        assert_eq!(hp_guess_from_neighbours(50, &sads), 0);
    }

    #[test]
    fn test_full_pel_seed_guesses_direction() {
        let plane = textured_plane();
        // 当前块恰好等于向右一个整像素的位置
        let cur = block_at(&plane, 24, 24, MotionVector::new(6, 0), 16);
        let cur_view = PlaneRef::new(&cur, 16, 16, 16);

        let seed = full_pel_seed(&plane, cur_view, 24, 24, 16, MotionVector::new(4, 0));
        let center = block_at(&plane, 24, 24, MotionVector::new(4, 0), 16);
        assert_eq!(seed.best.mv, MotionVector::new(4, 0));
        assert_eq!(seed.best.sad, mb_sad(cur_view, PlaneRef::new(&center, 16, 16, 16), i32::MAX));
        assert_eq!(seed.hp_guess, 4);

        let exact = full_pel_seed(&plane, cur_view, 24, 24, 16, MotionVector::new(6, 0));
        assert_eq!(exact.best.sad, 0);
        assert_eq!(exact.hp_guess, 0);

        // 分区种子同样给出方向
        let part = PlaneRef::new(&cur[8 * 16 + 8..], 16, 8, 8);
        let seed = full_pel_seed(&plane, part, 32, 32, 8, MotionVector::new(4, 0));
        assert_eq!(seed.hp_guess, 4);
    }

    #[test]
    fn test_inter4v_fallback() {
        let whole = ScoredVector::new(MotionVector::new(2, 0), 1000);
        let parts = [ScoredVector::new(MotionVector::new(1, 1), 200); 4];
        // 800 + 200 >= 1000: 退回 1MV
        assert_eq!(decide_inter4v(whole, parts), MbMotion::Single(whole));
        let parts = [ScoredVector::new(MotionVector::new(1, 1), 199); 4];
        assert!(matches!(decide_inter4v(whole, parts), MbMotion::Four { .. }));
    }
}

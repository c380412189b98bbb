//! 块活动度度量: SAD 与像素和
//!
//! 所有函数都是纯函数. 像素和按 4 字节打包累加 (每字节一个 16 位通道),
//! 结果与逐像素累加完全一致.

use m4venc_core::PlaneRef;

/// 把 4 个像素打包成 u32 后两两拆到 16 位通道里累加
#[inline]
fn packed_row_sum(row: &[u8]) -> u32 {
    let mut lanes = 0u32;
    for chunk in row.chunks_exact(4) {
        let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        lanes += (word & 0x00ff_00ff) + ((word >> 8) & 0x00ff_00ff);
    }
    (lanes & 0xffff) + (lanes >> 16)
}

#[inline]
fn row_sad(cur: &[u8], pred: &[u8]) -> i32 {
    cur.iter()
        .zip(pred)
        .map(|(&a, &b)| (a as i32 - b as i32).abs())
        .sum()
}

/// 8x8 SAD
pub fn block_sad(cur: PlaneRef<'_>, pred: PlaneRef<'_>) -> i32 {
    debug_assert!(cur.width() >= 8 && cur.height() >= 8);
    debug_assert!(pred.width() >= 8 && pred.height() >= 8);
    (0..8).map(|y| row_sad(&cur.row(y)[..8], &pred.row(y)[..8])).sum()
}

/// 8x8 块相对常数电平的 SAD
///
/// 帧内块以中灰为预测计算活动度: 平坦块只剩 DC 偏移, 纹理越强值越大.
pub fn block_sad_flat(cur: PlaneRef<'_>, level: u8) -> i32 {
    let level = level as i32;
    (0..8)
        .map(|y| {
            cur.row(y)[..8]
                .iter()
                .map(|&p| (p as i32 - level).abs())
                .sum::<i32>()
        })
        .sum()
}

/// 16x16 SAD, 累加超过 `dmin` 后提前返回 (返回值 > dmin)
pub fn mb_sad(cur: PlaneRef<'_>, pred: PlaneRef<'_>, dmin: i32) -> i32 {
    debug_assert!(cur.width() >= 16 && cur.height() >= 16);
    let mut sad = 0;
    for y in 0..16 {
        sad += row_sad(&cur.row(y)[..16], &pred.row(y)[..16]);
        if sad > dmin {
            break;
        }
    }
    sad
}

/// 16x16 像素和
pub fn mb_sum(cur: PlaneRef<'_>) -> i32 {
    (0..16).map(|y| packed_row_sum(&cur.row(y)[..16]) as i32).sum()
}

/// 16x16 块相对均值的绝对偏差和, 用于帧内/帧间判决
pub fn mb_deviation(cur: PlaneRef<'_>, mean: i32) -> i32 {
    (0..16)
        .map(|y| {
            cur.row(y)[..16]
                .iter()
                .map(|&p| (p as i32 - mean).abs())
                .sum::<i32>()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(seed: u32, len: usize) -> Vec<u8> {
        let mut state = seed;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_103_515_245).wrapping_add(12345);
                (state >> 16) as u8
            })
            .collect()
    }

    #[test]
    fn test_packed_sum_matches_naive() {
        let data = pattern(7, 24 * 16);
        let view = PlaneRef::new(&data, 24, 16, 16);
        let naive16: i32 = (0..16)
            .flat_map(|y| view.row(y).to_vec())
            .map(|p| p as i32)
            .sum();
        assert_eq!(mb_sum(view), naive16);
    }

    #[test]
    fn test_packed_sum_saturated() {
        let data = vec![255u8; 256];
        let view = PlaneRef::new(&data, 16, 16, 16);
        assert_eq!(mb_sum(view), 255 * 256);
    }

    #[test]
    fn test_block_sad_and_flat() {
        let cur = vec![138u8; 64];
        let pred = vec![128u8; 64];
        let c = PlaneRef::new(&cur, 8, 8, 8);
        let p = PlaneRef::new(&pred, 8, 8, 8);
        assert_eq!(block_sad(c, p), 640);
        assert_eq!(block_sad_flat(c, 128), 640);
        assert_eq!(block_sad(p, p), 0);
    }

    #[test]
    fn test_mb_sad_early_exit() {
        let cur = vec![200u8; 256];
        let pred = vec![0u8; 256];
        let c = PlaneRef::new(&cur, 16, 16, 16);
        let p = PlaneRef::new(&pred, 16, 16, 16);
        assert_eq!(mb_sad(c, p, i32::MAX), 200 * 256);
        let partial = mb_sad(c, p, 1000);
        assert!(partial > 1000);
        assert!(partial < 200 * 256);
    }
}

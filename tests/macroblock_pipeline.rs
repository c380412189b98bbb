//! 宏块编码流水线集成测试
//!
//! 覆盖 I 帧 -> P 帧的完整流程:
//! - 帧内编码与边缘扩展后的参考帧
//! - 整像素种子 + 半像素细化的运动补偿
//! - 块级输出 (电平、反量化值、位图、CBP) 的一致性
//! - 共享会话表的多实例编码

use std::sync::Arc;

use m4venc::codec::encoders::mpeg4::tables::ZIGZAG_POSITION;
use m4venc::codec::{Cbp, EncoderConfig, FrameKind, Macroblock, MbEncoder, MbMode, MbSeeds, QuantFamily};
use m4venc::core::{FrameBuffer, PLANE_CB, PLANE_CR, PLANE_Y};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 带纹理的测试帧 (I420 紧凑排列)
fn synthetic_i420(width: usize, height: usize, phase: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width * height * 3 / 2);
    for y in 0..height {
        for x in 0..width {
            let v = 128.0
                + 50.0 * ((x + phase) as f64 * 0.21).sin()
                + 40.0 * (y as f64 * 0.17).cos()
                + ((x * 7 + y * 3) % 11) as f64;
            data.push(v.clamp(0.0, 255.0) as u8);
        }
    }
    for plane in 0..2 {
        for y in 0..height / 2 {
            for x in 0..width / 2 {
                data.push((110 + plane * 20 + (x + y) % 8) as u8);
            }
        }
    }
    data
}

fn plane_rows(frame: &FrameBuffer, plane: usize) -> Vec<u8> {
    let view = frame.plane(plane).view();
    (0..view.height()).flat_map(|y| view.row(y).to_vec()).collect()
}

/// 块输出与位图、CBP 的一致性
fn assert_block_invariants(mb: &Macroblock) {
    for (i, block) in mb.blocks.iter().enumerate() {
        for idx in 0..64 {
            let level = block.levels[idx];
            let bit = 1u64 << (63 - ZIGZAG_POSITION[idx] as u32);
            assert_eq!(level != 0, block.bitmap.zigzag & bit != 0, "块 {} 位置 {}", i, idx);
            assert!((-2048..=2047).contains(&block.dequant[idx]));
            if level != 0 {
                assert_ne!(block.dequant[idx], 0);
            }
        }
        assert_eq!(block.coded, block.bitmap.zigzag != 0);
        if !mb.mode.is_intra() {
            assert_eq!(block.coded, mb.cbp.contains(Cbp::for_block(i)));
        }
    }
}

#[test]
fn test_intra_frame_reconstruction_quality() {
    init_logger();
    let (w, h) = (64usize, 48usize);
    let src = FrameBuffer::from_i420(w as u32, h as u32, &synthetic_i420(w, h, 0)).unwrap();
    let mut recon = FrameBuffer::new(w as u32, h as u32).unwrap();
    let mut encoder = MbEncoder::new(EncoderConfig::default()).unwrap();

    let mbs = encoder
        .encode_picture(&src, None, &mut recon, |_, _| 2, |_, _| unreachable!())
        .unwrap();
    assert_eq!(mbs.len(), 4 * 3);
    for mb in &mbs {
        assert!(mb.mode.is_intra());
        assert_block_invariants(mb);
    }

    let a = plane_rows(&src, PLANE_Y);
    let b = plane_rows(&recon, PLANE_Y);
    let mae: f64 = a.iter().zip(&b).map(|(&x, &y)| (x as f64 - y as f64).abs()).sum::<f64>()
        / a.len() as f64;
    assert!(mae < 3.0, "亮度平均绝对误差过大: {}", mae);
}

#[test]
fn test_motion_compensated_shift_is_exact() {
    init_logger();
    let (w, h) = (48u32, 32u32);
    let frame0 = FrameBuffer::from_i420(w, h, &synthetic_i420(w as usize, h as usize, 0)).unwrap();
    let mut recon0 = FrameBuffer::new(w, h).unwrap();
    let mut encoder = MbEncoder::new(EncoderConfig::default()).unwrap();
    encoder
        .encode_picture(&frame0, None, &mut recon0, |_, _| 4, |_, _| unreachable!())
        .unwrap();

    // 亮度整体左移 2 像素, 色度左移 1 像素
    let mut frame1 = FrameBuffer::new(w, h).unwrap();
    for (plane, shift) in [(PLANE_Y, 2isize), (PLANE_CB, 1), (PLANE_CR, 1)] {
        let reference = recon0.plane(plane);
        let mut view = frame1.plane_mut(plane).view_mut();
        for y in 0..view.height() {
            for (x, v) in view.row_mut(y).iter_mut().enumerate() {
                *v = reference.sample_clamped(x as isize + shift, y as isize);
            }
        }
    }
    frame1.extend_edges();

    let mut recon1 = FrameBuffer::new(w, h).unwrap();
    let mbs = encoder
        .encode_picture(&frame1, Some(&recon0), &mut recon1, |_, _| 4, |x, y| {
            MbSeeds::at_vector(&frame1, &recon0, x, y, (2, 0))
        })
        .unwrap();
    assert_eq!(encoder.frame_kind(), FrameKind::Predicted);
    for mb in &mbs {
        assert_eq!(mb.mode, MbMode::Inter);
        assert_eq!(mb.sad(), 0);
        assert!(mb.cbp.is_empty());
        assert_block_invariants(mb);
    }
    for plane in [PLANE_Y, PLANE_CB, PLANE_CR] {
        assert_eq!(plane_rows(&recon1, plane), plane_rows(&frame1, plane));
    }
}

#[test]
fn test_json_config_sequence_is_deterministic() {
    init_logger();
    let config = EncoderConfig::from_json(
        r#"{"quant_family": "mpeg", "inter4v": true, "search_range": 8}"#,
    )
    .unwrap();
    assert_eq!(config.quant_family, QuantFamily::Mpeg);
    let text = serde_json::to_string(&config).unwrap();
    assert_eq!(EncoderConfig::from_json(&text).unwrap(), config);

    let (w, h) = (32u32, 32u32);
    let frames: Vec<FrameBuffer> = (0..3)
        .map(|phase| {
            FrameBuffer::from_i420(w, h, &synthetic_i420(w as usize, h as usize, phase)).unwrap()
        })
        .collect();

    let run = || {
        let mut encoder = MbEncoder::new(config.clone()).unwrap();
        let mut reference: Option<FrameBuffer> = None;
        let mut outputs = Vec::new();
        for frame in &frames {
            let mut recon = FrameBuffer::new(w, h).unwrap();
            let mbs = encoder
                .encode_picture(
                    frame,
                    reference.as_ref(),
                    &mut recon,
                    |x, y| (6 + (x + y) % 3) as u8,
                    |x, y| match reference.as_ref() {
                        Some(r) => MbSeeds::at_vector(frame, r, x, y, (1, 0)),
                        None => unreachable!(),
                    },
                )
                .unwrap();
            for mb in &mbs {
                assert_block_invariants(mb);
                assert!((-2..=2).contains(&mb.dquant));
                if mb.mode == MbMode::Inter4V {
                    assert_eq!(mb.dquant, 0);
                }
            }
            outputs.push((mbs, recon.to_i420()));
            reference = Some(recon);
        }
        outputs
    };

    let first = run();
    let second = run();
    for ((mbs_a, recon_a), (mbs_b, recon_b)) in first.iter().zip(&second) {
        assert_eq!(recon_a, recon_b);
        for (a, b) in mbs_a.iter().zip(mbs_b) {
            assert_eq!(a.mode, b.mode);
            assert_eq!(a.cbp, b.cbp);
            assert_eq!(a.motion, b.motion);
            for (ba, bb) in a.blocks.iter().zip(&b.blocks) {
                assert_eq!(ba.levels, bb.levels);
                assert_eq!(ba.dequant, bb.dequant);
            }
        }
    }
}

#[test]
fn test_shared_tables_across_threads() {
    init_logger();
    let (w, h) = (32u32, 32u32);
    let frames: Vec<FrameBuffer> = (0..2)
        .map(|phase| {
            FrameBuffer::from_i420(w, h, &synthetic_i420(w as usize, h as usize, phase * 5)).unwrap()
        })
        .collect();
    let config = EncoderConfig::default();
    let shared = Arc::clone(MbEncoder::new(config.clone()).unwrap().tables());

    let encode = |frame: &FrameBuffer, encoder: &mut MbEncoder| {
        let mut recon = FrameBuffer::new(w, h).unwrap();
        encoder
            .encode_picture(frame, None, &mut recon, |_, _| 5, |_, _| unreachable!())
            .unwrap();
        recon.to_i420()
    };

    let sequential: Vec<Vec<u8>> = frames
        .iter()
        .map(|frame| encode(frame, &mut MbEncoder::new(config.clone()).unwrap()))
        .collect();

    let parallel: Vec<Vec<u8>> = std::thread::scope(|scope| {
        let handles: Vec<_> = frames
            .iter()
            .map(|frame| {
                let mut encoder = MbEncoder::with_tables(config.clone(), Arc::clone(&shared)).unwrap();
                scope.spawn(move || encode(frame, &mut encoder))
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(sequential, parallel);
}

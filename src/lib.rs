//! # m4venc
//!
//! 纯 Rust 实现的 MPEG-4 Part 2 (Simple Profile) / H.263 宏块编码核心.
//!
//! 提供宏块级的完整信号处理流水线:
//! - **度量**: SAD、像素和、宏块偏差
//! - **正变换**: 按复杂度分级的部分整数 DCT
//! - **量化**: H.263 线性量化与 MPEG 矩阵量化
//! - **重建**: 按非零系数位图分发的 IDCT 快速路径
//! - **运动**: 半像素细化、插值与边缘扩展
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use m4venc::codec::{EncoderConfig, MbEncoder};
//! use m4venc::core::FrameBuffer;
//!
//! let cur = FrameBuffer::new(176, 144).unwrap();
//! let mut recon = FrameBuffer::new(176, 144).unwrap();
//! let mut encoder = MbEncoder::new(EncoderConfig::default()).unwrap();
//! let mbs = encoder
//!     .encode_picture(&cur, None, &mut recon, |_, _| 10, |_, _| unreachable!())
//!     .unwrap();
//! println!("编码 {} 个宏块", mbs.len());
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `m4venc-core` | 错误类型、平面视图、帧缓冲 |
//! | `m4venc-codec` | 宏块编码核心 |

pub mod logging;

/// 基础类型: 错误、平面视图、帧缓冲
pub use m4venc_core as core;

/// 宏块编码核心
pub use m4venc_codec as codec;

/// 获取 m4venc 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

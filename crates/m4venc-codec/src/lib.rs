//! # m4venc-codec
//!
//! MPEG-4 Part 2 (Simple Profile) / H.263 宏块编码核心.
//!
//! 本 crate 只负责宏块级的信号处理: 度量、复杂度分级、正变换、量化、
//! 重建与半像素运动细化. 码流语法 (VLC、帧头) 和码率控制由上层完成.
//!
//! ## 使用示例
//!
//! ```rust
//! use m4venc_codec::{EncoderConfig, MbEncoder};
//! use m4venc_core::FrameBuffer;
//!
//! let cur = FrameBuffer::new(32, 32).unwrap();
//! let mut recon = FrameBuffer::new(32, 32).unwrap();
//! let mut encoder = MbEncoder::new(EncoderConfig::default()).unwrap();
//!
//! // I 帧: 所有宏块使用 QP 8
//! let mbs = encoder
//!     .encode_picture(&cur, None, &mut recon, |_, _| 8, |_, _| unreachable!())
//!     .unwrap();
//! assert_eq!(mbs.len(), 4);
//! ```

pub mod encoders;

// 重导出常用类型
pub use encoders::mpeg4::config::{EncoderConfig, QuantFamily};
pub use encoders::mpeg4::tables::EncoderTables;
pub use encoders::mpeg4::types::{
    BlockCoeffs, Cbp, CoeffBitmap, Macroblock, MbMode, MbMotion, MotionVector, ScoredVector,
    TransformMode,
};
pub use encoders::mpeg4::{FrameKind, MbEncoder, MbSeeds};

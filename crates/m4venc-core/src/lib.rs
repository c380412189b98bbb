//! # m4venc-core
//!
//! m4venc 宏块编码核心的基础库, 提供错误类型、二维平面视图与帧缓冲.
//!
//! 编码器的所有像素访问都通过 [`PlaneRef`] / [`PlaneMut`] 完成,
//! 不做裸指针步进.

pub mod error;
pub mod frame;
pub mod plane;

// 重导出常用类型
pub use error::{M4vError, M4vResult};
pub use frame::{CHROMA_PAD, FrameBuffer, LUMA_PAD, PLANE_CB, PLANE_CR, PLANE_Y};
pub use plane::{Plane, PlaneMut, PlaneRef};

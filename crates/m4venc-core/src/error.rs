//! 统一错误类型定义.
//!
//! 编码核心的热路径没有错误返回, 这里的错误只出现在构造阶段:
//! 配置校验, 帧缓冲分配, 量化矩阵检查.

use thiserror::Error;

/// m4venc 统一错误类型
#[derive(Debug, Error)]
pub enum M4vError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 帧几何参数无效 (宽高必须为 16 的正整数倍)
    #[error("无效帧尺寸: {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    /// 不支持的组合
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),
}

/// m4venc 统一 Result 类型
pub type M4vResult<T> = Result<T, M4vError>;

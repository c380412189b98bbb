//! YUV 4:2:0 帧缓冲.
//!
//! 三个平面 (Y, Cb, Cr) 各自带固定宽度的填充边界:
//! 亮度 16 像素, 色度 8 像素. 当前帧与参考帧使用同一结构,
//! 参考帧在重建完成后调用 [`FrameBuffer::extend_edges`] 填满边界.

use log::debug;

use crate::error::{M4vError, M4vResult};
use crate::plane::Plane;

/// 亮度平面填充宽度
pub const LUMA_PAD: usize = 16;
/// 色度平面填充宽度
pub const CHROMA_PAD: usize = 8;

/// 平面索引: 亮度
pub const PLANE_Y: usize = 0;
/// 平面索引: Cb
pub const PLANE_CB: usize = 1;
/// 平面索引: Cr
pub const PLANE_CR: usize = 2;

/// 带填充边界的 YUV 4:2:0 帧
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    planes: [Plane; 3],
}

impl FrameBuffer {
    /// 分配一帧, 所有样本初始化为中灰 (128)
    ///
    /// 宽高必须是 16 的正整数倍 (宏块对齐).
    pub fn new(width: u32, height: u32) -> M4vResult<Self> {
        if width == 0 || height == 0 || width % 16 != 0 || height % 16 != 0 {
            return Err(M4vError::InvalidGeometry { width, height });
        }
        let (w, h) = (width as usize, height as usize);
        debug!("分配帧缓冲: {}x{}, 填充 Y={} C={}", w, h, LUMA_PAD, CHROMA_PAD);
        Ok(Self {
            width,
            height,
            planes: [
                Plane::new(w, h, LUMA_PAD, 128),
                Plane::new(w / 2, h / 2, CHROMA_PAD, 128),
                Plane::new(w / 2, h / 2, CHROMA_PAD, 128),
            ],
        })
    }

    /// 从紧凑排列的 I420 数据 (Y, U, V 依次存放, 无行填充) 构造
    pub fn from_i420(width: u32, height: u32, data: &[u8]) -> M4vResult<Self> {
        let mut frame = Self::new(width, height)?;
        let (w, h) = (width as usize, height as usize);
        let expected = w * h + 2 * (w / 2) * (h / 2);
        if data.len() < expected {
            return Err(M4vError::InvalidArgument(format!(
                "I420 数据不足: 需要 {} 字节, 实际 {} 字节",
                expected,
                data.len()
            )));
        }

        let mut offset = 0;
        for (index, plane) in frame.planes.iter_mut().enumerate() {
            let (pw, ph) = if index == PLANE_Y { (w, h) } else { (w / 2, h / 2) };
            let mut view = plane.view_mut();
            for y in 0..ph {
                view.row_mut(y)
                    .copy_from_slice(&data[offset + y * pw..offset + (y + 1) * pw]);
            }
            offset += pw * ph;
        }
        frame.extend_edges();
        Ok(frame)
    }

    /// 导出为紧凑排列的 I420 数据
    pub fn to_i420(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.width as usize * self.height as usize * 3 / 2);
        for plane in &self.planes {
            let view = plane.view();
            for y in 0..view.height() {
                out.extend_from_slice(view.row(y));
            }
        }
        out
    }

    /// 帧宽度 (像素)
    pub fn width(&self) -> u32 {
        self.width
    }

    /// 帧高度 (像素)
    pub fn height(&self) -> u32 {
        self.height
    }

    /// 水平方向宏块数
    pub fn mb_cols(&self) -> usize {
        self.width as usize / 16
    }

    /// 垂直方向宏块数
    pub fn mb_rows(&self) -> usize {
        self.height as usize / 16
    }

    /// 按索引取平面 (0=Y, 1=Cb, 2=Cr)
    pub fn plane(&self, index: usize) -> &Plane {
        &self.planes[index]
    }

    /// 按索引取可写平面
    pub fn plane_mut(&mut self, index: usize) -> &mut Plane {
        &mut self.planes[index]
    }

    /// 亮度平面
    pub fn luma(&self) -> &Plane {
        &self.planes[PLANE_Y]
    }

    /// 复制所有平面的边缘样本填满填充边界
    pub fn extend_edges(&mut self) {
        for plane in &mut self.planes {
            plane.extend_edges();
        }
    }
}

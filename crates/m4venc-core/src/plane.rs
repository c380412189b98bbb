//! 带跨度 (stride) 的二维平面视图.
//!
//! 编码核心所有的像素访问都经过这里: 一维切片 + stride + 可见宽高.
//! `Plane` 在可见区域外侧保留固定宽度的填充边界, 允许运动向量
//! 略微指向帧外而无需逐像素边界检查.

/// 只读平面视图
#[derive(Debug, Clone, Copy)]
pub struct PlaneRef<'a> {
    data: &'a [u8],
    stride: usize,
    width: usize,
    height: usize,
}

impl<'a> PlaneRef<'a> {
    /// 创建视图
    ///
    /// `data` 从左上角像素开始, 长度至少为 `(height - 1) * stride + width`.
    pub fn new(data: &'a [u8], stride: usize, width: usize, height: usize) -> Self {
        debug_assert!(width <= stride || height <= 1);
        debug_assert!(height == 0 || data.len() >= (height - 1) * stride + width);
        Self {
            data,
            stride,
            width,
            height,
        }
    }

    /// 每行字节数
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// 可见宽度
    pub fn width(&self) -> usize {
        self.width
    }

    /// 可见高度
    pub fn height(&self) -> usize {
        self.height
    }

    /// 第 `y` 行的可见像素
    #[inline]
    pub fn row(&self, y: usize) -> &'a [u8] {
        debug_assert!(y < self.height);
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    /// 读取单个像素
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> u8 {
        debug_assert!(x < self.width && y < self.height);
        self.data[y * self.stride + x]
    }

    /// 取子区域视图
    pub fn sub(&self, x: usize, y: usize, width: usize, height: usize) -> PlaneRef<'a> {
        debug_assert!(x + width <= self.width && y + height <= self.height);
        let start = y * self.stride + x;
        PlaneRef {
            data: &self.data[start..],
            stride: self.stride,
            width,
            height,
        }
    }
}

/// 可写平面视图
#[derive(Debug)]
pub struct PlaneMut<'a> {
    data: &'a mut [u8],
    stride: usize,
    width: usize,
    height: usize,
}

impl<'a> PlaneMut<'a> {
    /// 创建可写视图, 约束同 [`PlaneRef::new`]
    pub fn new(data: &'a mut [u8], stride: usize, width: usize, height: usize) -> Self {
        debug_assert!(width <= stride || height <= 1);
        debug_assert!(height == 0 || data.len() >= (height - 1) * stride + width);
        Self {
            data,
            stride,
            width,
            height,
        }
    }

    /// 每行字节数
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// 可见宽度
    pub fn width(&self) -> usize {
        self.width
    }

    /// 可见高度
    pub fn height(&self) -> usize {
        self.height
    }

    /// 第 `y` 行的可写像素
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        debug_assert!(y < self.height);
        let start = y * self.stride;
        &mut self.data[start..start + self.width]
    }

    /// 转为只读视图
    pub fn view(&self) -> PlaneRef<'_> {
        PlaneRef::new(&*self.data, self.stride, self.width, self.height)
    }

    /// 整块填充同一个值
    pub fn fill(&mut self, value: u8) {
        for y in 0..self.height {
            self.row_mut(y).fill(value);
        }
    }

    /// 从同尺寸的视图逐行拷贝
    pub fn copy_from(&mut self, src: PlaneRef<'_>) {
        debug_assert!(src.width() == self.width && src.height() == self.height);
        for y in 0..self.height {
            self.row_mut(y).copy_from_slice(src.row(y));
        }
    }
}

/// 带填充边界的像素平面
#[derive(Debug, Clone)]
pub struct Plane {
    data: Vec<u8>,
    width: usize,
    height: usize,
    pad: usize,
    stride: usize,
}

impl Plane {
    /// 创建平面, 所有样本 (含边界) 初始化为 `fill`
    pub fn new(width: usize, height: usize, pad: usize, fill: u8) -> Self {
        let stride = width + 2 * pad;
        let rows = height + 2 * pad;
        Self {
            data: vec![fill; stride * rows],
            width,
            height,
            pad,
            stride,
        }
    }

    /// 可见宽度
    pub fn width(&self) -> usize {
        self.width
    }

    /// 可见高度
    pub fn height(&self) -> usize {
        self.height
    }

    /// 边界宽度
    pub fn pad(&self) -> usize {
        self.pad
    }

    /// 每行字节数 (pitch), 等于 width + 2 * pad
    pub fn stride(&self) -> usize {
        self.stride
    }

    #[inline]
    fn offset(&self, x: isize, y: isize) -> usize {
        let px = x + self.pad as isize;
        let py = y + self.pad as isize;
        debug_assert!(px >= 0 && py >= 0);
        py as usize * self.stride + px as usize
    }

    /// 可见区域视图
    pub fn view(&self) -> PlaneRef<'_> {
        let start = self.offset(0, 0);
        PlaneRef::new(&self.data[start..], self.stride, self.width, self.height)
    }

    /// 可见区域可写视图
    pub fn view_mut(&mut self) -> PlaneMut<'_> {
        let start = self.offset(0, 0);
        PlaneMut::new(&mut self.data[start..], self.stride, self.width, self.height)
    }

    /// 以可见原点为坐标系取区域, 区域可以伸入填充边界
    ///
    /// 区域超出填充边界时返回 `None`, 调用方需要走边缘扩展路径.
    pub fn region(&self, x: isize, y: isize, width: usize, height: usize) -> Option<PlaneRef<'_>> {
        let pad = self.pad as isize;
        let max_x = (self.width + self.pad) as isize;
        let max_y = (self.height + self.pad) as isize;
        if x < -pad || y < -pad || x + width as isize > max_x || y + height as isize > max_y {
            return None;
        }
        let start = self.offset(x, y);
        Some(PlaneRef::new(&self.data[start..], self.stride, width, height))
    }

    /// 可见区域内的可写子区域
    pub fn region_mut(&mut self, x: usize, y: usize, width: usize, height: usize) -> PlaneMut<'_> {
        debug_assert!(x + width <= self.width && y + height <= self.height);
        let start = self.offset(x as isize, y as isize);
        PlaneMut::new(&mut self.data[start..], self.stride, width, height)
    }

    /// 读取单个样本, 坐标钳位到填充区域之内
    #[inline]
    pub fn sample_clamped(&self, x: isize, y: isize) -> u8 {
        let pad = self.pad as isize;
        let cx = x.clamp(-pad, (self.width + self.pad) as isize - 1);
        let cy = y.clamp(-pad, (self.height + self.pad) as isize - 1);
        self.data[self.offset(cx, cy)]
    }

    /// 含填充边界的整行, `y` 钳位到填充区域之内
    ///
    /// 返回切片的第 0 个元素对应可见坐标 `x = -pad`.
    pub fn padded_row(&self, y: isize) -> &[u8] {
        let pad = self.pad as isize;
        let cy = y.clamp(-pad, (self.height + self.pad) as isize - 1);
        let start = (cy + pad) as usize * self.stride;
        &self.data[start..start + self.stride]
    }

    /// 用可见区域最外圈样本复制填满填充边界
    pub fn extend_edges(&mut self) {
        let pad = self.pad;
        if pad == 0 || self.width == 0 || self.height == 0 {
            return;
        }
        let stride = self.stride;

        // 左右两侧
        for y in pad..pad + self.height {
            let row = &mut self.data[y * stride..(y + 1) * stride];
            let left = row[pad];
            let right = row[pad + self.width - 1];
            row[..pad].fill(left);
            row[pad + self.width..].fill(right);
        }

        // 上下两侧 (整行复制, 角落随之填好)
        let top = pad * stride;
        let bottom = (pad + self.height - 1) * stride;
        for y in 0..pad {
            self.data.copy_within(top..top + stride, y * stride);
        }
        for y in pad + self.height..self.height + 2 * pad {
            self.data.copy_within(bottom..bottom + stride, y * stride);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_view_rows() {
        let mut plane = Plane::new(16, 16, 4, 0);
        plane.region_mut(2, 3, 1, 1).row_mut(0)[0] = 77;
        assert_eq!(plane.view().at(2, 3), 77);
        assert_eq!(plane.stride(), 24);
    }

    #[test]
    fn test_region_bounds() {
        let plane = Plane::new(16, 16, 4, 0);
        assert!(plane.region(-4, -4, 24, 24).is_some());
        assert!(plane.region(-5, 0, 8, 8).is_none());
        assert!(plane.region(12, 12, 9, 8).is_none());
    }

    #[test]
    fn test_extend_edges_replicates_corners() {
        let mut plane = Plane::new(8, 8, 4, 0);
        {
            let mut view = plane.view_mut();
            for y in 0..8 {
                for (x, v) in view.row_mut(y).iter_mut().enumerate() {
                    *v = (y * 8 + x) as u8;
                }
            }
        }
        plane.extend_edges();
        assert_eq!(plane.sample_clamped(-4, -4), 0);
        assert_eq!(plane.sample_clamped(11, -1), 7);
        assert_eq!(plane.sample_clamped(-2, 11), 56);
        assert_eq!(plane.sample_clamped(10, 10), 63);
        assert_eq!(plane.sample_clamped(3, -3), 3);
    }

    #[test]
    fn test_padded_row_clamps() {
        let mut plane = Plane::new(4, 4, 2, 0);
        plane.region_mut(0, 0, 1, 1).row_mut(0)[0] = 9;
        plane.extend_edges();
        let row = plane.padded_row(-50);
        assert_eq!(row.len(), 8);
        assert_eq!(row[0], 9);
        assert_eq!(row[2], 9);
    }

    #[test]
    fn test_sub_view_offsets() {
        let data: Vec<u8> = (0..64).collect();
        let view = PlaneRef::new(&data, 8, 8, 8);
        let sub = view.sub(2, 3, 4, 2);
        assert_eq!(sub.row(0), &[26, 27, 28, 29]);
        assert_eq!(sub.at(1, 1), 35);
    }
}

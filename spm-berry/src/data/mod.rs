use std::ops::{Index, IndexMut};

use ndarray::{Array3, ArrayView, ArrayViewMut, Ix3};

use crate::error::{FrameError, Result};
use crate::Idx3d;

pub mod geometry;
pub mod io;
pub mod morph_3d;
pub mod resample;

#[cfg(feature = "dicom")]
pub mod dicom_io;

use geometry::{shape_to_size, Geometry, Vec3};

/// 网格 (形状 + 几何信息) 的共用属性和部分通用操作.
pub trait GridAttr {
    /// 获取几何信息.
    fn geometry(&self) -> &Geometry;

    /// 获取数据形状大小, 按 `(z, y, x)` 组织.
    fn shape(&self) -> Idx3d;

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, y, x) = self.shape();
        z * y * x
    }

    /// 获取按物理轴顺序 `(x, y, z)` 组织的体素个数.
    #[inline]
    fn size_xyz(&self) -> Vec3 {
        shape_to_size(self.shape())
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, y0, x0): &Idx3d) -> bool {
        let (z, y, x) = self.shape();
        *z0 < z && *y0 < y && *x0 < x
    }

    /// 原点.
    #[inline]
    fn origin(&self) -> &Vec3 {
        self.geometry().origin()
    }

    /// 体素间距, 按 `(x, y, z)` 组织.
    #[inline]
    fn spacing(&self) -> &Vec3 {
        self.geometry().spacing()
    }

    /// 获取单个体素的实际体积.
    #[inline]
    fn voxel(&self) -> f64 {
        self.spacing().iter().product()
    }

    /// 数组索引 `(z, y, x)` 对应的物理坐标.
    #[inline]
    fn index_to_physical(&self, idx: Idx3d) -> Vec3 {
        self.geometry().index_to_physical(idx)
    }

    /// 与 `other` 是否处于同一网格 (形状一致且几何信息在容差内一致)?
    #[inline]
    fn same_grid<G: GridAttr + ?Sized>(&self, other: &G) -> bool {
        self.shape() == other.shape() && self.geometry().same_as(other.geometry())
    }
}

/// 3D 体数据, 包括按 `(z, y, x)` 组织的数组和物理空间几何信息.
///
/// 该结构是值语义的: 裁剪、重定位等操作总是返回新的实例.
#[derive(Debug, Clone)]
pub struct Volume<T = f32> {
    data: Array3<T>,
    geometry: Geometry,
}

impl<T> GridAttr for Volume<T> {
    #[inline]
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }
}

impl<T> Index<Idx3d> for Volume<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl<T> IndexMut<Idx3d> for Volume<T> {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl<T> Volume<T> {
    /// 由 `(z, y, x)` 组织的数组和几何信息直接创建体数据.
    ///
    /// 若几何信息不合法, 或数组为空, 则返回 `Err`.
    pub fn new(data: Array3<T>, geometry: Geometry) -> Result<Self> {
        geometry.validate()?;
        if data.is_empty() {
            return Err(FrameError::shape_mismatch(format!(
                "volume must not be empty, got shape {:?}",
                data.dim()
            )));
        }
        Ok(Self { data, geometry })
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView<'_, T, Ix3> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut<'_, T, Ix3> {
        self.data.view_mut()
    }

    /// 消费自我, 获得底层数组.
    #[inline]
    pub fn into_data(self) -> Array3<T> {
        self.data
    }

    /// 消费自我, 返回仅替换了原点的新体数据.
    #[inline]
    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.geometry.set_origin(origin);
        self
    }

    /// 对每个体素施加 `f`, 得到几何信息相同的新体数据.
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Volume<U> {
        Volume {
            data: self.data.map(f),
            geometry: self.geometry,
        }
    }
}

impl<T: Copy + PartialOrd> Volume<T> {
    /// 获取最大体素值. 若存在无法比较的值 (如 NaN), 则跳过它们.
    pub fn max_value(&self) -> Option<T> {
        self.data
            .iter()
            .copied()
            .filter(|v| v.partial_cmp(v).is_some())
            .fold(None, |acc, v| match acc {
                Some(m) if m >= v => Some(m),
                _ => Some(v),
            })
    }
}

impl Volume<f32> {
    /// 获取 3D 掩膜中可视为标签 `label` 的体素个数.
    #[inline]
    pub fn count_label(&self, label: u32) -> usize {
        let l = label as f32;
        self.data
            .iter()
            .filter(|v| crate::consts::label::is_close(**v, l))
            .count()
    }

    /// 3D 掩膜中是否至少存在一个可视为标签 `label` 的体素?
    #[inline]
    pub fn contains_label(&self, label: u32) -> bool {
        let l = label as f32;
        self.data
            .iter()
            .any(|v| crate::consts::label::is_close(*v, l))
    }
}

//! 物理空间几何信息: origin, spacing, direction.
//!
//! 物理量一律按 `(x, y, z)` 组织, 与数组索引 `(z, y, x)` 的转换只在本模块完成.

use nalgebra::{Matrix3, Vector3};

use crate::consts::{GEOMETRY_EPS, MIN_DETERMINANT};
use crate::error::{FrameError, Result};
use crate::Idx3d;

/// 物理空间三维向量, 按 `(x, y, z)` 组织.
pub type Vec3 = Vector3<f64>;

/// 方向余弦矩阵. 第 `i` 列是第 `i` 个体素轴 (x, y, z) 在物理空间中的单位方向.
pub type Mat3 = Matrix3<f64>;

/// 数组索引 `(z, y, x)` -> 物理轴顺序的连续索引 `(x, y, z)`.
#[inline]
pub fn idx_to_xyz((z, y, x): Idx3d) -> Vec3 {
    Vec3::new(x as f64, y as f64, z as f64)
}

/// 数组形状 `(z, y, x)` -> 物理轴顺序的体素个数 `(x, y, z)`.
#[inline]
pub fn shape_to_size(shape: Idx3d) -> Vec3 {
    idx_to_xyz(shape)
}

/// 物理轴顺序的连续索引 `(x, y, z)` -> 最近的数组索引 `(z, y, x)`.
///
/// 采用 "四舍五入, 恰为 .5 时向上取整" 的规则. 超出 `shape` 范围时返回 `None`.
#[inline]
pub fn nearest_idx(continuous: &Vec3, (nz, ny, nx): Idx3d) -> Option<Idx3d> {
    #[inline]
    fn round_in(v: f64, n: usize) -> Option<usize> {
        let r = (v + 0.5).floor();
        (r >= 0.0 && r < n as f64).then_some(r as usize)
    }
    Some((
        round_in(continuous.z, nz)?,
        round_in(continuous.y, ny)?,
        round_in(continuous.x, nx)?,
    ))
}

/// 体数据在物理空间中的摆放方式.
///
/// 满足 `physical(idx) = origin + direction * (idx_to_xyz(idx) ⊙ spacing)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geometry {
    origin: Vec3,
    spacing: Vec3,
    direction: Mat3,
}

impl Default for Geometry {
    /// 原点为零, 单位 spacing, 单位方向矩阵.
    fn default() -> Self {
        Self {
            origin: Vec3::zeros(),
            spacing: Vec3::repeat(1.0),
            direction: Mat3::identity(),
        }
    }
}

impl Geometry {
    /// 构建几何信息. 若 spacing 或 direction 不合法, 返回 [`FrameError::InvalidGeometry`].
    pub fn new(origin: Vec3, spacing: Vec3, direction: Mat3) -> Result<Self> {
        let g = Self {
            origin,
            spacing,
            direction,
        };
        g.validate()?;
        Ok(g)
    }

    /// 从裸数组构建. `direction` 按行优先存储, 长度必须为 9.
    pub fn from_parts(origin: [f64; 3], spacing: [f64; 3], direction: &[f64]) -> Result<Self> {
        if direction.len() != 9 {
            return Err(FrameError::invalid_geometry(format!(
                "direction must be a 3x3 matrix (9 values), got {} values",
                direction.len()
            )));
        }
        Self::new(
            Vec3::from(origin),
            Vec3::from(spacing),
            Mat3::from_row_slice(direction),
        )
    }

    /// 检查几何信息是否合法:
    ///
    /// 1. origin 各分量有限;
    /// 2. spacing 各分量有限且为正;
    /// 3. direction 各元素有限且可逆.
    pub fn validate(&self) -> Result<()> {
        if self.origin.iter().any(|v| !v.is_finite()) {
            return Err(FrameError::invalid_geometry(format!(
                "origin must be finite, got {:?}",
                self.origin.as_slice()
            )));
        }
        if self.spacing.iter().any(|v| !v.is_finite() || *v <= 0.0) {
            return Err(FrameError::invalid_geometry(format!(
                "spacing must be finite and positive, got {:?}",
                self.spacing.as_slice()
            )));
        }
        if self.direction.iter().any(|v| !v.is_finite()) {
            return Err(FrameError::invalid_geometry(
                "direction contains non-finite values",
            ));
        }
        let det = self.direction.determinant();
        if det.abs() < MIN_DETERMINANT {
            return Err(FrameError::invalid_geometry(format!(
                "direction matrix is not invertible (det = {det})"
            )));
        }
        Ok(())
    }

    /// 原点, 即体素 `(0, 0, 0)` 的物理坐标.
    #[inline]
    pub fn origin(&self) -> &Vec3 {
        &self.origin
    }

    /// 每个体素轴上相邻体素的物理距离.
    #[inline]
    pub fn spacing(&self) -> &Vec3 {
        &self.spacing
    }

    /// 方向余弦矩阵.
    #[inline]
    pub fn direction(&self) -> &Mat3 {
        &self.direction
    }

    /// 修改原点.
    #[inline]
    pub fn set_origin(&mut self, origin: Vec3) {
        self.origin = origin;
    }

    /// 返回替换原点后的新几何信息.
    #[inline]
    pub fn with_origin(mut self, origin: Vec3) -> Self {
        self.origin = origin;
        self
    }

    /// `direction * (continuous ⊙ spacing)`: 物理轴顺序的连续索引对应的物理位移.
    #[inline]
    pub fn displacement(&self, continuous: &Vec3) -> Vec3 {
        self.direction * continuous.component_mul(&self.spacing)
    }

    /// 物理轴顺序的连续索引 `(x, y, z)` 对应的物理坐标.
    #[inline]
    pub fn continuous_index_to_physical(&self, continuous: &Vec3) -> Vec3 {
        self.origin + self.displacement(continuous)
    }

    /// 数组索引 `(z, y, x)` 对应的物理坐标.
    #[inline]
    pub fn index_to_physical(&self, idx: Idx3d) -> Vec3 {
        self.continuous_index_to_physical(&idx_to_xyz(idx))
    }

    /// 方向矩阵的逆. 不可逆时返回 [`FrameError::InvalidGeometry`].
    pub fn inverse_direction(&self) -> Result<Mat3> {
        self.direction
            .try_inverse()
            .ok_or_else(|| FrameError::invalid_geometry("direction matrix is not invertible"))
    }

    /// 物理坐标 -> 物理轴顺序的连续索引 `(x, y, z)`.
    ///
    /// `inverse` 必须是 [`Self::inverse_direction`] 的结果. 批量计算时应只求一次逆.
    #[inline]
    pub fn physical_to_continuous_index_with(&self, inverse: &Mat3, point: &Vec3) -> Vec3 {
        (inverse * (point - self.origin)).component_div(&self.spacing)
    }

    /// 物理坐标 -> 物理轴顺序的连续索引 `(x, y, z)`.
    pub fn physical_to_continuous_index(&self, point: &Vec3) -> Result<Vec3> {
        let inverse = self.inverse_direction()?;
        Ok(self.physical_to_continuous_index_with(&inverse, point))
    }

    /// 与 `other` 是否在容差 `eps` 内完全一致?
    pub fn approx_eq(&self, other: &Geometry, eps: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= eps;
        self.origin.iter().zip(other.origin.iter()).all(|(a, b)| close(*a, *b))
            && self.spacing.iter().zip(other.spacing.iter()).all(|(a, b)| close(*a, *b))
            && self
                .direction
                .iter()
                .zip(other.direction.iter())
                .all(|(a, b)| close(*a, *b))
    }

    /// 以 [`GEOMETRY_EPS`] 为容差判断是否一致.
    #[inline]
    pub fn same_as(&self, other: &Geometry) -> bool {
        self.approx_eq(other, GEOMETRY_EPS)
    }

    /// 按照 NIfTI sform 的习惯, 构建 `direction * diag(spacing)`.
    #[inline]
    pub fn scaled_direction(&self) -> Mat3 {
        self.direction * Mat3::from_diagonal(&self.spacing)
    }
}

#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 从 3D 医学影像中按照标签掩膜裁剪出感兴趣区域 (一般是脑),
//! 并在物理坐标系下将其重新定位到参考图谱 (例如 MNI 模板) 的中心.
//!
//! 该 crate 只负责几何与坐标系相关的计算. 分割、配准、重切片等工作都交给外部工具,
//! 本库仅通过 [`pipeline::Registrar`] 和 [`pipeline::Segmenter`] 两个 trait 与它们交互.
//!
//! # 坐标约定
//!
//! 1. 所有体数据数组按照 `(z, y, x)` 组织, 即 [`Idx3d`] 的第一个分量变化最慢.
//! 2. 所有物理量 (origin, spacing, direction 的行列) 按照 `(x, y, z)` 组织.
//! 3. 两者之间 **只** 通过 [`data::geometry::idx_to_xyz`] 和
//!   [`data::geometry::shape_to_size`] 转换, 不在别处手写轴翻转.
//!
//! 因此对任意体数据, 以下关系恒成立:
//!
//! `physical(idx) = origin + direction * (idx_to_xyz(idx) ⊙ spacing)`.
//!
//! # 开发计划
//!
//! ### 体数据与几何信息 ✅
//!
//! NIfTI (`.nii`, `.nii.gz`, `.hdr/.img`) 读写, 以及可选的 DICOM 序列目录读取.
//!
//! 实现位于 `spm-berry/src/data`.
//!
//! ### 标签掩膜最近邻重采样 ✅
//!
//! 掩膜与影像不在同一网格上时, 以最近邻方式将掩膜重采样到影像网格上.
//!
//! 实现位于 `spm-berry/src/data/resample.rs`.
//!
//! ### 三维二值膨胀与包围盒 ✅
//!
//! 面连通 (6-邻域)、边连通 (18-邻域)、点连通 (26-邻域) 三种结构元.
//!
//! 实现位于 `spm-berry/src/data/morph_3d`.
//!
//! ### 裁剪与重定位 ✅
//!
//! 实现位于 `spm-berry/src/frame`.
//!
//! ### 参数校验 ✅
//!
//! 实现位于 `spm-berry/src/validate.rs`.
//!
//! ### 外部流程编排 ✅
//!
//! 分割 → 裁剪 → 重定位 → 配准/重切片 → 回写原点.
//!
//! 实现位于 `spm-berry/src/pipeline`.

/// 三维索引, 按 `(z, y, x)` 组织. 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 体数据及其几何信息.
pub mod data;

pub use data::geometry::{Geometry, Mat3, Vec3};
pub use data::{GridAttr, Volume};

pub mod consts;

pub mod error;

pub use error::{FrameError, Result, Warning};

pub mod frame;

pub mod pipeline;

pub mod prelude;

pub mod validate;

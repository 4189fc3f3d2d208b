//! 物理坐标系相关的两个核心变换:
//!
//! 1. [`crop`]: 按标签掩膜的 (膨胀后) 包围盒裁剪影像, 并重新计算原点;
//! 2. [`recenter`]: 平移裁剪结果的原点, 使其体素网格中心与参考图像对齐.
//!
//! 两者都不修改输入, 总是返回新的 [`Volume`](crate::Volume).

mod crop;
mod recenter;

pub use crop::{crop, CropOptions, CroppedResult};
pub use recenter::{physical_center, recenter, recenter_origin};

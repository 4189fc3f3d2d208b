use ndarray::{s, Array3, Zip};

use crate::consts::{DEFAULT_DILATION, DEFAULT_MARGIN};
use crate::data::geometry::Vec3;
use crate::data::morph_3d::{binary_dilation, bounding_box, occupancy};
use crate::data::morph_3d::{BoundingBox, Connectivity, PaddedBox};
use crate::data::resample::align_label_to;
use crate::error::{FrameError, Result, Warning};
use crate::{GridAttr, Volume};

/// 裁剪参数.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CropOptions {
    /// 感兴趣区域的标签值.
    pub label: u32,
    /// 包围盒每一侧外扩的体素数.
    pub margin: usize,
    /// 计算包围盒前二值膨胀的次数.
    pub dilation: usize,
    /// 膨胀结构元.
    pub connectivity: Connectivity,
}

impl Default for CropOptions {
    /// 标签 1, 外扩 5, 膨胀 4 次, 面连通.
    fn default() -> Self {
        Self::new(1)
    }
}

impl CropOptions {
    /// 以标签 `label` 和默认参数构建.
    pub const fn new(label: u32) -> Self {
        Self {
            label,
            margin: DEFAULT_MARGIN,
            dilation: DEFAULT_DILATION,
            connectivity: Connectivity::Face,
        }
    }

    /// 设置外扩体素数.
    pub const fn with_margin(mut self, margin: usize) -> Self {
        self.margin = margin;
        self
    }

    /// 设置膨胀次数.
    pub const fn with_dilation(mut self, iterations: usize) -> Self {
        self.dilation = iterations;
        self
    }

    /// 设置膨胀结构元.
    pub const fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }
}

/// 裁剪结果.
#[derive(Debug, Clone)]
pub struct CroppedResult {
    /// 裁剪后的体数据. spacing 和 direction 与原影像相同, 原点已重新计算.
    pub volume: Volume<f32>,
    /// 膨胀后占据区域的包围盒 (外扩前).
    pub bbox: BoundingBox,
    /// 实际截取的区间.
    pub padded: PaddedBox,
    /// 裁剪过程中产生的警告.
    pub warnings: Vec<Warning>,
}

impl CroppedResult {
    /// 裁剪结果的原点, 即原影像中索引 `padded.start` 处的物理坐标.
    #[inline]
    pub fn origin(&self) -> &Vec3 {
        self.volume.origin()
    }
}

/// 按照标签掩膜裁剪影像.
///
/// 步骤如下:
///
/// 1. 若 `mask` 与 `image` 不在同一网格上, 先以最近邻方式重采样 `mask`;
/// 2. 构建标签 `options.label` 的占据掩膜, 并进行 `options.dilation` 次二值膨胀;
/// 3. 将影像与膨胀后的掩膜逐元素相乘, 掩膜外的体素置零;
/// 4. 求膨胀后掩膜的包围盒, 截取 `[min - margin, max + margin)`,
///   超出数组范围的部分被截断并产生 [`Warning::BoundaryClamped`];
/// 5. 截取子数组, 并以原影像中截取起点的物理坐标作为新的原点.
///
/// # 错误
///
/// 1. 掩膜无法重采样到影像网格时返回 [`FrameError::ShapeMismatch`];
/// 2. 掩膜中不存在该标签时返回 [`FrameError::LabelNotFound`].
pub fn crop(image: &Volume<f32>, mask: &Volume<f32>, options: &CropOptions) -> Result<CroppedResult> {
    let mask = align_label_to(mask, image)?;
    let occ = occupancy(mask.data(), options.label);
    if !occ.iter().any(|v| *v != 0) {
        return Err(FrameError::LabelNotFound(options.label));
    }

    let dilated = binary_dilation(occ.view(), options.connectivity, options.dilation);
    let bbox = bounding_box(dilated.view()).ok_or(FrameError::LabelNotFound(options.label))?;
    let padded = bbox.pad(options.margin, image.shape());
    log::debug!(
        "label {} bounding box {:?}..={:?}, padded to {:?}..{:?}",
        options.label,
        bbox.min,
        bbox.max,
        padded.start,
        padded.end
    );

    let (start, end) = (padded.start, padded.end);
    let mut data: Array3<f32> = image
        .data()
        .slice(s![start.0..end.0, start.1..end.1, start.2..end.2])
        .to_owned();
    let keep = dilated.slice(s![start.0..end.0, start.1..end.1, start.2..end.2]);

    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            Zip::from(&mut data).and(keep).par_for_each(|v, &k| *v *= f32::from(k));
        } else {
            Zip::from(&mut data).and(keep).for_each(|v, &k| *v *= f32::from(k));
        }
    }

    let origin = image.index_to_physical(start);
    let volume = Volume::new(data, image.geometry().with_origin(origin))?;
    log::info!(
        "cropped {:?} -> {:?}, new origin {:?}",
        image.shape(),
        volume.shape(),
        origin.as_slice()
    );

    let warnings = padded.clamps.clone();
    Ok(CroppedResult {
        volume,
        bbox,
        padded,
        warnings,
    })
}

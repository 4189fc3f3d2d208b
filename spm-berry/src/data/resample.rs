//! 最近邻重采样. 用于将标签掩膜对齐到影像网格上.

use ndarray::{Array3, ArrayViewMut2, Axis};

use super::geometry::{idx_to_xyz, nearest_idx, Geometry, Mat3};
use super::{GridAttr, Volume};
use crate::consts::label::BACKGROUND;
use crate::error::{FrameError, Result};
use crate::Idx3d;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};
    }
}

/// 对目标网格第 `z` 层填值, 返回落在源网格内的体素个数.
fn fill_slice<T: Copy>(
    source: &Volume<T>,
    target: &Geometry,
    inverse: &Mat3,
    z: usize,
    mut sli: ArrayViewMut2<'_, T>,
) -> usize {
    let src_shape = source.shape();
    let mut hit = 0;
    for ((y, x), v) in sli.indexed_iter_mut() {
        let p = target.continuous_index_to_physical(&idx_to_xyz((z, y, x)));
        let c = source.geometry().physical_to_continuous_index_with(inverse, &p);
        if let Some(idx) = nearest_idx(&c, src_shape) {
            *v = source[idx];
            hit += 1;
        }
    }
    hit
}

/// 以最近邻方式将 `source` 重采样到由 `target` 和 `shape` 描述的网格上.
///
/// 落在源网格之外的体素填充为 `fill`.
///
/// # 错误
///
/// 1. 源几何信息的方向矩阵不可逆时返回 [`FrameError::InvalidGeometry`];
/// 2. 目标网格与源网格没有任何重叠时返回 [`FrameError::ShapeMismatch`].
pub fn resample_nearest<T>(
    source: &Volume<T>,
    target: &Geometry,
    shape: Idx3d,
    fill: T,
) -> Result<Volume<T>>
where
    T: Copy + Send + Sync,
{
    let inverse = source.geometry().inverse_direction()?;
    let mut out = Array3::from_elem(shape, fill);

    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            let cnt = AtomicUsize::new(0);
            out.axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(|(z, sli)| {
                    let local = fill_slice(source, target, &inverse, z, sli);
                    cnt.fetch_add(local, Ordering::Release);
                });
            let hit = cnt.load(Ordering::Acquire);
        } else {
            let hit: usize = out
                .axis_iter_mut(Axis(0))
                .enumerate()
                .map(|(z, sli)| fill_slice(source, target, &inverse, z, sli))
                .sum();
        }
    }

    if hit == 0 {
        return Err(FrameError::shape_mismatch(format!(
            "no voxel of the target grid {shape:?} falls inside the source grid {:?}",
            source.shape()
        )));
    }
    log::debug!(
        "nearest-neighbour resampled {:?} -> {shape:?}, {hit} voxels inside source",
        source.shape()
    );
    Volume::new(out, *target)
}

/// 将标签掩膜 `mask` 对齐到影像 `image` 的网格.
///
/// 若两者已处于同一网格则直接复制; 否则以最近邻方式重采样, 网格外体素视为背景.
pub fn align_label_to<G: GridAttr>(mask: &Volume<f32>, image: &G) -> Result<Volume<f32>> {
    if mask.same_grid(image) {
        return Ok(mask.clone());
    }
    log::info!(
        "mask grid {:?} differs from image grid {:?}, resampling with nearest neighbour",
        mask.shape(),
        image.shape()
    );
    resample_nearest(mask, image.geometry(), image.shape(), BACKGROUND)
}

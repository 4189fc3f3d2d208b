//! 3D 形态学操作.
//!
//! 掩膜统一表示为 `u8` 数组, 非零即前景.

use itertools::iproduct;
use ndarray::{s, Array3, ArrayView3, Zip};
use num::ToPrimitive;

use crate::consts::label::is_close;

mod bbox;

pub use bbox::{bounding_box, BoundingBox, PaddedBox};

/// 结构元的连通方式.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Connectivity {
    /// 面连通, 6-邻域.
    #[default]
    Face,

    /// 边连通, 18-邻域.
    Edge,

    /// 点连通, 26-邻域.
    Vertex,
}

impl Connectivity {
    /// 与中心体素的曼哈顿距离上限.
    #[inline]
    const fn rank(self) -> i32 {
        match self {
            Connectivity::Face => 1,
            Connectivity::Edge => 2,
            Connectivity::Vertex => 3,
        }
    }

    /// 结构元中除中心外的所有偏移 `(dz, dy, dx)`.
    pub fn offsets(self) -> Vec<(isize, isize, isize)> {
        let rank = self.rank();
        iproduct!(-1..=1, -1..=1, -1..=1)
            .filter(|&(z, y, x): &(i32, i32, i32)| {
                let d = z.abs() + y.abs() + x.abs();
                d > 0 && d <= rank
            })
            .map(|(z, y, x)| (z as isize, y as isize, x as isize))
            .collect()
    }
}

/// 标签 `label` 的占据掩膜: 体素值可视为 `label` 处为 1, 否则为 0.
///
/// 无法转换为 `f32` 的体素视为背景.
pub fn occupancy<T: Copy + ToPrimitive>(data: ArrayView3<'_, T>, label: u32) -> Array3<u8> {
    let l = label as f32;
    data.map(|v| u8::from(v.to_f32().is_some_and(|v| is_close(v, l))))
}

/// 单个轴上平移 `d` 后, 目标与源各自的有效区间. 完全移出时返回 `None`.
#[inline]
fn shifted_ranges(d: isize, n: usize) -> Option<((usize, usize), (usize, usize))> {
    let k = d.unsigned_abs();
    if k >= n {
        return None;
    }
    Some(if d >= 0 {
        ((k, n), (0, n - k))
    } else {
        ((0, n - k), (k, n))
    })
}

/// 将 `src` 平移 `(dz, dy, dx)` 后按位或到 `dst` 上. 越界部分视为背景.
fn shift_or(dst: &mut Array3<u8>, src: &ArrayView3<'_, u8>, (dz, dy, dx): (isize, isize, isize)) {
    let (nz, ny, nx) = src.dim();
    let (Some((dz0, sz0)), Some((dy0, sy0)), Some((dx0, sx0))) = (
        shifted_ranges(dz, nz),
        shifted_ranges(dy, ny),
        shifted_ranges(dx, nx),
    ) else {
        return;
    };
    let target = dst.slice_mut(s![dz0.0..dz0.1, dy0.0..dy0.1, dx0.0..dx0.1]);
    let source = src.slice(s![sz0.0..sz0.1, sy0.0..sy0.1, sx0.0..sx0.1]);
    Zip::from(target).and(source).for_each(|d, &s| *d |= s);
}

/// 三维二值膨胀, 重复 `iterations` 次. `iterations == 0` 时返回原掩膜的拷贝.
///
/// 数组外部视为背景, 与 `scipy.ndimage.binary_dilation` 的默认行为一致.
pub fn binary_dilation(
    mask: ArrayView3<'_, u8>,
    connectivity: Connectivity,
    iterations: usize,
) -> Array3<u8> {
    let offsets = connectivity.offsets();
    let mut cur = mask.map(|&v| u8::from(v != 0));
    for _ in 0..iterations {
        let mut next = cur.clone();
        let view = cur.view();
        for off in offsets.iter() {
            shift_or(&mut next, &view, *off);
        }
        if next == cur {
            // 已到达不动点 (例如空掩膜或占满整个数组), 后续迭代不会再改变结果.
            break;
        }
        cur = next;
    }
    cur
}

//! 轴对齐包围盒.

use ndarray::ArrayView3;

use crate::error::Warning;
use crate::Idx3d;

/// 前景体素的最小轴对齐包围盒. 两端均为闭区间, 按 `(z, y, x)` 组织.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BoundingBox {
    /// 各轴最小索引.
    pub min: Idx3d,
    /// 各轴最大索引 (包含).
    pub max: Idx3d,
}

/// 外扩并截断后的包围盒. 左闭右开.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBox {
    /// 起始索引 (包含).
    pub start: Idx3d,
    /// 结束索引 (不包含).
    pub end: Idx3d,
    /// 每一次截断对应的警告.
    pub clamps: Vec<Warning>,
}

#[inline]
const fn to_arr((z, y, x): Idx3d) -> [usize; 3] {
    [z, y, x]
}

#[inline]
const fn from_arr([z, y, x]: [usize; 3]) -> Idx3d {
    (z, y, x)
}

/// 获取掩膜中所有非零体素的包围盒. 不存在前景时返回 `None`.
pub fn bounding_box(mask: ArrayView3<'_, u8>) -> Option<BoundingBox> {
    mask.indexed_iter()
        .filter(|(_, v)| **v != 0)
        .fold(None, |acc, ((z, y, x), _)| {
            Some(match acc {
                None => BoundingBox {
                    min: (z, y, x),
                    max: (z, y, x),
                },
                Some(BoundingBox { min, max }) => BoundingBox {
                    min: (min.0.min(z), min.1.min(y), min.2.min(x)),
                    max: (max.0.max(z), max.1.max(y), max.2.max(x)),
                },
            })
        })
}

impl BoundingBox {
    /// 各轴上的体素个数.
    #[inline]
    pub fn extent(&self) -> Idx3d {
        (
            self.max.0 - self.min.0 + 1,
            self.max.1 - self.min.1 + 1,
            self.max.2 - self.min.2 + 1,
        )
    }

    /// `idx` 是否位于包围盒内?
    #[inline]
    pub fn contains(&self, (z, y, x): &Idx3d) -> bool {
        (self.min.0..=self.max.0).contains(z)
            && (self.min.1..=self.max.1).contains(y)
            && (self.min.2..=self.max.2).contains(x)
    }

    /// 在每一侧外扩 `margin` 个体素, 并截断到形状 `shape` 的范围内.
    ///
    /// 截取区间为 `[min - margin, max + margin)`, 与 `arr[min - m : max + m]` 一致.
    /// 结束位置至少为 `min + 1`, 保证 `margin = 0` 时结果非空.
    ///
    /// 每个被截断的轴都会产生一个 [`Warning::BoundaryClamped`] 并通过日志输出.
    pub fn pad(&self, margin: usize, shape: Idx3d) -> PaddedBox {
        let (min, max, shape) = (to_arr(self.min), to_arr(self.max), to_arr(shape));
        let m = margin as isize;
        let mut start = [0; 3];
        let mut end = [0; 3];
        let mut clamps = vec![];

        for axis in 0..3 {
            let requested = (
                min[axis] as isize - m,
                (max[axis] as isize + m).max(min[axis] as isize + 1),
            );
            let clamped = (
                requested.0.max(0) as usize,
                requested.1.min(shape[axis] as isize) as usize,
            );
            if requested != (clamped.0 as isize, clamped.1 as isize) {
                clamps.push(
                    Warning::BoundaryClamped {
                        axis,
                        requested,
                        clamped,
                    }
                    .emit(),
                );
            }
            (start[axis], end[axis]) = clamped;
        }

        PaddedBox {
            start: from_arr(start),
            end: from_arr(end),
            clamps,
        }
    }
}

impl PaddedBox {
    /// 截取后的形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        (
            self.end.0 - self.start.0,
            self.end.1 - self.start.1,
            self.end.2 - self.start.2,
        )
    }
}

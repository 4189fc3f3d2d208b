use crate::data::geometry::{Geometry, Vec3};
use crate::error::Result;
use crate::{GridAttr, Volume};

/// 体素网格中心 (`size / 2`, 不取整) 的物理坐标.
pub fn physical_center<G: GridAttr + ?Sized>(grid: &G) -> Vec3 {
    grid.geometry()
        .continuous_index_to_physical(&(grid.size_xyz() / 2.0))
}

/// 计算使 `cropped` 的网格中心与 `reference` 对齐的新原点.
///
/// 以 `cropped` 的大小和 spacing 求出中心位移 `d = (size / 2) ⊙ spacing`, 则
///
/// `origin' = (reference.origin + reference.direction * d) - cropped.direction * d`.
///
/// 注意这里只做平移, 并假定两者体素大小相近; 它不是配准.
///
/// # 错误
///
/// 任一方向矩阵不合法时返回 [`FrameError::InvalidGeometry`](crate::FrameError::InvalidGeometry).
pub fn recenter_origin<G: GridAttr + ?Sized>(cropped: &G, reference: &Geometry) -> Result<Vec3> {
    cropped.geometry().validate()?;
    reference.validate()?;

    let d = (cropped.size_xyz() / 2.0).component_mul(cropped.spacing());
    let reference_center = reference.origin() + reference.direction() * d;
    Ok(reference_center - cropped.geometry().direction() * d)
}

/// 返回仅原点被替换的新体数据, 其网格中心与 `reference` 对齐.
///
/// 参见 [`recenter_origin`].
pub fn recenter<T: Clone, R: GridAttr + ?Sized>(
    cropped: &Volume<T>,
    reference: &R,
) -> Result<Volume<T>> {
    let origin = recenter_origin(cropped, reference.geometry())?;
    log::info!(
        "recentered origin {:?} -> {:?}",
        cropped.origin().as_slice(),
        origin.as_slice()
    );
    Ok(cropped.clone().with_origin(origin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geometry::Mat3;
    use crate::error::FrameError;
    use ndarray::Array3;

    fn cube(n: usize, g: Geometry) -> Volume<f32> {
        Volume::new(Array3::zeros((n, n, n)), g).unwrap()
    }

    #[test]
    fn test_shift_to_reference() {
        let cropped = cube(10, Geometry::default());
        let reference = cube(10, Geometry::default().with_origin(Vec3::new(100.0, 0.0, 0.0)));
        assert_eq!(physical_center(&cropped), Vec3::repeat(5.0));
        assert_eq!(physical_center(&reference), Vec3::new(105.0, 5.0, 5.0));

        let out = recenter(&cropped, &reference).unwrap();
        assert!((out.origin() - Vec3::new(100.0, 0.0, 0.0)).norm() < 1e-12);
        assert_eq!(out.data(), cropped.data());
        assert_eq!(out.spacing(), cropped.spacing());
    }

    #[test]
    fn test_aligned_reference_keeps_origin() {
        let dir = [0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let g = Geometry::from_parts([3.0, -7.0, 11.0], [1.5, 2.0, 0.5], &dir).unwrap();
        let v = Volume::new(Array3::<f32>::zeros((4, 6, 8)), g).unwrap();
        // 参考图像与 v 处于同一坐标系, 中心必然重合.
        let o = recenter_origin(&v, &g).unwrap();
        assert!((o - g.origin()).norm() < 1e-9);
    }

    #[test]
    fn test_recenter_uses_cropped_spacing() {
        // 参考图像 spacing 不同, 但计算中心时只使用裁剪结果的 spacing.
        let cropped = cube(
            4,
            Geometry::new(Vec3::zeros(), Vec3::repeat(2.0), Mat3::identity()).unwrap(),
        );
        let reference = Geometry::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::repeat(1.0), Mat3::identity())
            .unwrap();
        let o = recenter_origin(&cropped, &reference).unwrap();
        assert!((o - Vec3::new(-10.0, 0.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_flipped_reference_direction() {
        let cropped = cube(10, Geometry::default());
        let flip = [-1.0, 0.0, 0.0, 0.0, -1.0, 0.0, 0.0, 0.0, 1.0];
        let reference = Geometry::from_parts([90.0, 126.0, -72.0], [1.0; 3], &flip).unwrap();
        let o = recenter_origin(&cropped, &reference).unwrap();
        // 参考中心 = (85, 121, -67); o = 参考中心 - (5, 5, 5).
        assert!((o - Vec3::new(80.0, 116.0, -72.0)).norm() < 1e-12);
        let out = cropped.clone().with_origin(o);
        assert!((physical_center(&out) - Vec3::new(85.0, 121.0, -67.0)).norm() < 1e-12);
    }

    #[test]
    fn test_invalid_direction_rejected() {
        assert!(matches!(
            Geometry::from_parts([0.0; 3], [1.0; 3], &[1.0, 0.0, 0.0, 0.0]),
            Err(FrameError::InvalidGeometry(_))
        ));
        let mut singular = Mat3::identity();
        singular[(2, 2)] = 0.0;
        assert!(matches!(
            Geometry::new(Vec3::zeros(), Vec3::repeat(1.0), singular),
            Err(FrameError::InvalidGeometry(_))
        ));
    }
}

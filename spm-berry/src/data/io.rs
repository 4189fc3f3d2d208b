//! 体数据读写.
//!
//! 1. 单文件: `.nii`, `.nii.gz`, `.hdr/.img` 交给 `nifti` 读取;
//! 2. 目录: 视为 DICOM 序列 (需要 `dicom` feature);
//! 3. 其他格式 (`.mha`, `.mhd`, `.nrrd`, ...) 返回 [`FrameError::UnsupportedFormat`].
//!
//! 所有体数据统一使用 DICOM 的 LPS 物理坐标系. nifti 仿射矩阵基于 RAS+,
//! 读写时在此处转换.

use std::path::Path;

use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, NiftiType, ReaderOptions};

use super::geometry::{Geometry, Mat3, Vec3};
use super::{GridAttr, Volume};
use crate::consts::{has_nifti_extension, MIN_DETERMINANT};
use crate::error::{FrameError, Result};

/// 将 nifti 读取错误映射为核心错误.
fn map_read_error(path: &Path, e: nifti::NiftiError) -> FrameError {
    match e {
        nifti::NiftiError::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            FrameError::path_not_found("image file", path)
        }
        other => FrameError::unsupported(path, other.to_string()),
    }
}

/// 从 header 中获取 `[x, y, z]` 三个方向的 (未归一化的) 轴向量和原点.
///
/// 优先使用 sform, 其次 qform, 最后退化为只使用 pixdim.
fn affine_from_header(h: &NiftiHeader) -> (Mat3, Vec3) {
    if h.sform_code > 0 {
        let rows = [h.srow_x, h.srow_y, h.srow_z];
        let m = Mat3::from_fn(|r, c| rows[r][c] as f64);
        let t = Vec3::new(rows[0][3] as f64, rows[1][3] as f64, rows[2][3] as f64);
        return (m, t);
    }

    let [_, dx, dy, dz, ..] = h.pixdim.map(|v| v as f64);
    if h.qform_code > 0 {
        let (b, c, d) = (
            h.quatern_b as f64,
            h.quatern_c as f64,
            h.quatern_d as f64,
        );
        let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
        let qfac = if h.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
        #[rustfmt::skip]
        let r = Mat3::new(
            a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d),         2.0 * (b * d + a * c),
            2.0 * (b * c + a * d),         a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b),
            2.0 * (b * d - a * c),         2.0 * (c * d + a * b),         a * a + d * d - b * b - c * c,
        );
        let m = r * Mat3::from_diagonal(&Vec3::new(dx, dy, dz * qfac));
        let t = Vec3::new(
            h.quatern_x as f64,
            h.quatern_y as f64,
            h.quatern_z as f64,
        );
        return (m, t);
    }

    (Mat3::from_diagonal(&Vec3::new(dx, dy, dz)), Vec3::zeros())
}

/// RAS+ 与 LPS 之间的转换: x, y 两轴取反. 该矩阵是自身的逆.
#[inline]
fn ras_lps() -> Mat3 {
    Mat3::from_diagonal(&Vec3::new(-1.0, -1.0, 1.0))
}

/// 根据 nifti header 计算 LPS 坐标系下的几何信息. spacing 为仿射矩阵的列范数,
/// direction 为归一化后的列向量.
pub fn geometry_from_header(h: &NiftiHeader) -> Result<Geometry> {
    let (m, origin) = affine_from_header(h);
    let (m, origin) = (ras_lps() * m, ras_lps() * origin);
    let spacing = Vec3::from_fn(|i, _| m.column(i).norm());
    if spacing.iter().any(|s| *s < MIN_DETERMINANT) {
        return Err(FrameError::invalid_geometry(format!(
            "degenerate voxel axes in header, spacing = {:?}",
            spacing.as_slice()
        )));
    }
    let direction = Mat3::from_fn(|r, c| m[(r, c)] / spacing[c]);
    Geometry::new(origin, spacing, direction)
}

/// 将 nifti 读出的 `[x, y, z, 1, ...]` 数组转换为 `(z, y, x)` 标准布局数组.
fn into_zyx(path: &Path, mut data: ArrayD<f32>) -> Result<Array3<f32>> {
    while data.ndim() > 3 {
        let last = Axis(data.ndim() - 1);
        if data.len_of(last) != 1 {
            return Err(FrameError::unsupported(
                path,
                format!("expected a 3D volume, got shape {:?}", data.shape()),
            ));
        }
        data = data.index_axis_move(last, 0);
    }
    let ndim = data.ndim();
    let data = data.into_dimensionality::<Ix3>().map_err(|_| {
        FrameError::unsupported(path, format!("expected a 3D volume, got {ndim} dims"))
    })?;

    // [x, y, z] -> [z, y, x].
    let data = data.permuted_axes([2, 1, 0]);
    Ok(data.as_standard_layout().into_owned())
}

impl Volume<f32> {
    /// 打开 3D 体数据. `path` 可以是 nifti 文件, 也可以是 DICOM 序列目录.
    ///
    /// # 错误
    ///
    /// 1. 路径不存在时返回 [`FrameError::PathNotFound`];
    /// 2. 格式无法识别或解析失败时返回 [`FrameError::UnsupportedFormat`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(FrameError::path_not_found("image path", path));
        }
        if path.is_dir() {
            return open_series_dir(path);
        }

        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if !has_nifti_extension(name) {
            return Err(FrameError::unsupported(
                path,
                "only NIfTI files (.nii, .nii.gz, .hdr/.img) and DICOM directories are supported",
            ));
        }

        let obj = ReaderOptions::new()
            .read_file(path)
            .map_err(|e| map_read_error(path, e))?;
        let geometry = geometry_from_header(obj.header())?;
        let data = obj
            .into_volume()
            .into_ndarray::<f32>()
            .map_err(|e| map_read_error(path, e))?;
        let data = into_zyx(path, data)?;
        log::debug!(
            "loaded {} with shape {:?}, origin {:?}",
            path.display(),
            data.dim(),
            geometry.origin().as_slice()
        );
        Volume::new(data, geometry)
    }

    /// 以 nifti 格式保存. 数据类型为 `f32`, 几何信息写入 sform (`sform_code = 2`).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let header = self.make_header()?;
        // (z, y, x) -> [x, y, z], nifti 写入器会自行处理内存布局.
        let view = self.data().permuted_axes([2, 1, 0]);
        WriterOptions::new(path)
            .reference_header(&header)
            .write_nifti(&view)?;
        log::debug!("saved {} with shape {:?}", path.display(), self.shape());
        Ok(())
    }

    /// 根据几何信息构建 nifti header, 仿射矩阵转换回 RAS+.
    ///
    /// 任一维度超出 nifti-1 的 `u16` 范围时返回 [`FrameError::InvalidArgument`].
    fn make_header(&self) -> Result<NiftiHeader> {
        let (nz, ny, nx) = self.shape();
        let dim = |n: usize| {
            u16::try_from(n).map_err(|_| {
                FrameError::invalid_argument(format!(
                    "volume shape {:?} exceeds the NIfTI-1 dimension limit of {}",
                    self.shape(),
                    u16::MAX
                ))
            })
        };
        let g = self.geometry();
        let m = ras_lps() * g.scaled_direction();
        let o = ras_lps() * g.origin();
        let s = g.spacing();

        let mut header = NiftiHeader::default();
        header.dim = [3, dim(nx)?, dim(ny)?, dim(nz)?, 1, 1, 1, 1];
        header.pixdim = [1.0, s.x as f32, s.y as f32, s.z as f32, 1.0, 1.0, 1.0, 1.0];
        header.datatype = NiftiType::Float32 as i16;
        header.bitpix = 32;
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;
        header.qform_code = 0;
        header.sform_code = 2;
        let row = |r: usize| {
            [
                m[(r, 0)] as f32,
                m[(r, 1)] as f32,
                m[(r, 2)] as f32,
                o[r] as f32,
            ]
        };
        header.srow_x = row(0);
        header.srow_y = row(1);
        header.srow_z = row(2);
        Ok(header)
    }
}

/// 读取目录中的 DICOM 序列.
#[cfg(feature = "dicom")]
fn open_series_dir(path: &Path) -> Result<Volume<f32>> {
    super::dicom_io::read_dicom_series(path)
}

/// 未开启 `dicom` feature 时, 目录一律视为不支持的格式.
#[cfg(not(feature = "dicom"))]
fn open_series_dir(path: &Path) -> Result<Volume<f32>> {
    Err(FrameError::unsupported(
        path,
        "DICOM series directories require the `dicom` feature",
    ))
}

/// 读取 `path` 处的图像, 将其原点替换为 `origin` 后原地写回.
///
/// 外部重切片工具可能会丢弃或修改原点, 因此需要在其完成后重新写入.
pub fn rewrite_origin<P: AsRef<Path>>(path: P, origin: Vec3) -> Result<()> {
    let path = path.as_ref();
    let vol = Volume::open(path)?.with_origin(origin);
    vol.save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_header_roundtrip_geometry() {
        let dir = [0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0];
        let g = Geometry::from_parts([-90.0, 126.0, -72.0], [1.5, 2.0, 2.5], &dir).unwrap();
        let v = Volume::new(Array3::<f32>::zeros((4, 5, 6)), g).unwrap();
        let h = v.make_header().unwrap();
        assert_eq!(&h.dim[..4], &[3, 6, 5, 4]);
        // 写入的仿射矩阵为 RAS+: 原点 x, y 取反.
        assert_eq!(h.srow_x[3], 90.0);
        assert_eq!(h.srow_y[3], -126.0);
        assert_eq!(h.srow_z[3], -72.0);

        let back = geometry_from_header(&h).unwrap();
        assert!(back.approx_eq(&g, 1e-5));
    }

    #[test]
    fn test_qform_identity() {
        let mut h = NiftiHeader::default();
        h.sform_code = 0;
        h.qform_code = 1;
        h.quatern_b = 0.0;
        h.quatern_c = 0.0;
        h.quatern_d = 0.0;
        h.quatern_x = 1.0;
        h.quatern_y = 2.0;
        h.quatern_z = 3.0;
        h.pixdim = [1.0, 2.0, 2.0, 3.0, 0.0, 0.0, 0.0, 0.0];
        let g = geometry_from_header(&h).unwrap();
        assert_eq!(g.origin(), &Vec3::new(-1.0, -2.0, 3.0));
        assert_eq!(g.spacing(), &Vec3::new(2.0, 2.0, 3.0));
        assert_eq!(g.direction(), &Mat3::from_diagonal(&Vec3::new(-1.0, -1.0, 1.0)));
    }

    #[test]
    fn test_qform_negative_qfac_flips_z() {
        let mut h = NiftiHeader::default();
        h.sform_code = 0;
        h.qform_code = 1;
        h.quatern_b = 0.0;
        h.quatern_c = 0.0;
        h.quatern_d = 0.0;
        h.pixdim = [-1.0, 1.0, 1.0, 1.0, 0.0, 0.0, 0.0, 0.0];
        let g = geometry_from_header(&h).unwrap();
        assert_eq!(g.direction()[(2, 2)], -1.0);
    }

    #[test]
    fn test_ras_header_loads_as_lps() {
        let mut h = NiftiHeader::default();
        h.sform_code = 1;
        h.srow_x = [-2.0, 0.0, 0.0, 90.0];
        h.srow_y = [0.0, 2.0, 0.0, -126.0];
        h.srow_z = [0.0, 0.0, 2.0, -72.0];
        let g = geometry_from_header(&h).unwrap();
        assert_eq!(g.origin(), &Vec3::new(-90.0, 126.0, -72.0));
        assert_eq!(g.spacing(), &Vec3::repeat(2.0));
        assert_eq!(
            g.direction(),
            &Mat3::from_diagonal(&Vec3::new(1.0, -1.0, 1.0))
        );
    }

    #[test]
    fn test_oversized_dimension_is_rejected() {
        let v = Volume::new(Array3::<f32>::zeros((1, 1, 70_000)), Geometry::default()).unwrap();
        assert!(matches!(
            v.make_header(),
            Err(FrameError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_open_missing_and_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.nii");
        assert!(matches!(
            Volume::open(&missing),
            Err(FrameError::PathNotFound { .. })
        ));

        let mha = dir.path().join("scan.mha");
        std::fs::write(&mha, b"ObjectType = Image\n").unwrap();
        assert!(matches!(
            Volume::open(&mha),
            Err(FrameError::UnsupportedFormat { .. })
        ));

        let garbage = dir.path().join("garbage.nii");
        std::fs::write(&garbage, b"definitely not nifti").unwrap();
        assert!(matches!(
            Volume::open(&garbage),
            Err(FrameError::UnsupportedFormat { .. })
        ));
    }
}

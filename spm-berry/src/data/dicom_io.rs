//! DICOM 序列目录读取. 需要 `dicom` feature.
//!
//! 目录中可能有多个序列; 按 SeriesInstanceUID 排序后取第一个.
//! 几何信息直接取自 ImagePositionPatient/ImageOrientationPatient, 即 LPS 坐标系.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use dicom::dictionary_std::tags;
use dicom::object::{open_file, FileDicomObject, InMemDicomObject};
use dicom::pixeldata::{ConvertOptions, ModalityLutOption, PixelDecoder};
use ndarray::Array3;

use super::geometry::{Geometry, Mat3, Vec3};
use super::Volume;
use crate::error::{FrameError, Result};

type DicomObj = FileDicomObject<InMemDicomObject>;

/// 读取 `path` 目录下的第一个 DICOM 序列.
pub fn read_dicom_series(path: &Path) -> Result<Volume<f32>> {
    let mut series = scan_dicom_directory(path)?;
    let Some((uid, files)) = series.pop_first() else {
        return Err(FrameError::unsupported(path, "no DICOM series found in directory"));
    };
    if !series.is_empty() {
        log::warn!(
            "{} DICOM series found in {}, using {uid}",
            series.len() + 1,
            path.display()
        );
    }
    load_series(path, files)
}

/// 按 SeriesInstanceUID 分组目录下的所有 DICOM 文件.
fn scan_dicom_directory(path: &Path) -> Result<BTreeMap<String, Vec<(PathBuf, DicomObj)>>> {
    let mut map: BTreeMap<String, Vec<(PathBuf, DicomObj)>> = BTreeMap::new();
    let mut entries: Vec<PathBuf> = fs::read_dir(path)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .collect();
    entries.sort();

    for file in entries {
        // 非 DICOM 文件直接跳过.
        let Ok(obj) = open_file(&file) else {
            continue;
        };
        let Some(uid) = get_string(&obj, tags::SERIES_INSTANCE_UID) else {
            continue;
        };
        map.entry(uid).or_default().push((file, obj));
    }
    Ok(map)
}

/// 将同一序列的切片按法向投影排序并堆叠成 `(z, y, x)` 体数据.
fn load_series(dir: &Path, mut slices: Vec<(PathBuf, DicomObj)>) -> Result<Volume<f32>> {
    let bad = |reason: &str| FrameError::unsupported(dir, reason.to_string());

    let orientation = get_f64_vec(&slices[0].1, tags::IMAGE_ORIENTATION_PATIENT)
        .filter(|o| o.len() == 6)
        .ok_or_else(|| bad("missing or invalid ImageOrientationPatient"))?;
    let dir_x = Vec3::new(orientation[0], orientation[1], orientation[2]).normalize();
    let dir_y = Vec3::new(orientation[3], orientation[4], orientation[5]).normalize();
    let dir_z = dir_x.cross(&dir_y).normalize();

    let depth_of = |obj: &DicomObj| get_position(obj).map_or(0.0, |p| p.dot(&dir_z));
    slices.sort_by(|a, b| depth_of(&a.1).total_cmp(&depth_of(&b.1)));

    let first = &slices[0].1;
    let rows = get_u32(first, tags::ROWS).ok_or_else(|| bad("missing Rows"))? as usize;
    let cols = get_u32(first, tags::COLUMNS).ok_or_else(|| bad("missing Columns"))? as usize;
    let pixel_spacing = get_f64_vec(first, tags::PIXEL_SPACING)
        .filter(|s| s.len() == 2)
        .ok_or_else(|| bad("missing PixelSpacing"))?;
    let origin = get_position(first).ok_or_else(|| bad("missing ImagePositionPatient"))?;

    let dz = if slices.len() > 1 {
        let last = get_position(&slices[slices.len() - 1].1)
            .ok_or_else(|| bad("missing ImagePositionPatient"))?;
        ((last - origin).dot(&dir_z) / (slices.len() - 1) as f64).abs()
    } else {
        get_f64(first, tags::SLICE_THICKNESS).unwrap_or(1.0)
    };

    // PixelSpacing = [行间距 (y), 列间距 (x)].
    let spacing = Vec3::new(pixel_spacing[1], pixel_spacing[0], dz);
    let direction = Mat3::from_columns(&[dir_x, dir_y, dir_z]);
    let geometry = Geometry::new(origin, spacing, direction)?;

    // 解码原始值, rescale 在下面统一处理.
    let raw = ConvertOptions::new().with_modality_lut(ModalityLutOption::None);
    let mut flat = Vec::with_capacity(slices.len() * rows * cols);
    for (file, obj) in slices.iter() {
        let decoded = obj
            .decode_pixel_data()
            .map_err(|e| FrameError::unsupported(file, e.to_string()))?;
        let values = decoded
            .to_vec_with_options::<f32>(&raw)
            .map_err(|e| FrameError::unsupported(file, e.to_string()))?;
        if values.len() != rows * cols {
            return Err(FrameError::unsupported(
                file,
                format!("slice has {} pixels, expected {}", values.len(), rows * cols),
            ));
        }
        let slope = get_f64(obj, tags::RESCALE_SLOPE).unwrap_or(1.0) as f32;
        let intercept = get_f64(obj, tags::RESCALE_INTERCEPT).unwrap_or(0.0) as f32;
        flat.extend(values.into_iter().map(|v| v * slope + intercept));
    }

    let data = Array3::from_shape_vec((slices.len(), rows, cols), flat)
        .map_err(|e| bad(&e.to_string()))?;
    log::debug!(
        "loaded DICOM series from {} with shape {:?}",
        dir.display(),
        data.dim()
    );
    Volume::new(data, geometry)
}

fn get_string(obj: &DicomObj, tag: dicom::core::Tag) -> Option<String> {
    obj.element(tag)
        .ok()?
        .to_str()
        .ok()
        .map(|s| s.trim().to_string())
}

fn get_u32(obj: &DicomObj, tag: dicom::core::Tag) -> Option<u32> {
    obj.element(tag).ok()?.to_int::<u32>().ok()
}

fn get_f64(obj: &DicomObj, tag: dicom::core::Tag) -> Option<f64> {
    obj.element(tag).ok()?.to_float64().ok()
}

fn get_f64_vec(obj: &DicomObj, tag: dicom::core::Tag) -> Option<Vec<f64>> {
    obj.element(tag).ok()?.to_multi_float64().ok()
}

fn get_position(obj: &DicomObj) -> Option<Vec3> {
    let v = get_f64_vec(obj, tags::IMAGE_POSITION_PATIENT)?;
    (v.len() == 3).then(|| Vec3::new(v[0], v[1], v[2]))
}

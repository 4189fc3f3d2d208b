use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::BRAIN_MASK_FILE;
use crate::error::{FrameError, Result};
use crate::Volume;

/// 脑分割工具.
pub trait Segmenter {
    /// 对 `ct` 进行脑分割, 结果写入 `output_dir`, 返回结果文件路径.
    fn segment(&self, ct: &Path, output_dir: &Path) -> Result<PathBuf>;
}

/// 确保 `output_dir` 下存在脑掩膜 `brainmask.nii.gz`, 返回其路径.
///
/// 已存在时直接复用; 否则调用 `segmenter`, 并将其结果重命名为 `brainmask.nii.gz`.
pub fn ensure_brain_mask<S: Segmenter + ?Sized>(
    segmenter: &S,
    ct: &Path,
    output_dir: &Path,
) -> Result<PathBuf> {
    let target = output_dir.join(BRAIN_MASK_FILE);
    if target.is_file() {
        log::info!("brain mask found at {}, skipping segmentation", target.display());
        return Ok(target);
    }

    let produced = segmenter.segment(ct, output_dir)?;
    if !produced.is_file() {
        return Err(FrameError::external(
            "segmentation",
            format!("expected output {} was not produced", produced.display()),
        ));
    }
    if produced != target {
        fs::rename(&produced, &target)?;
    }
    log::info!("segmentation finished, mask at {}", target.display());
    Ok(target)
}

/// 掩膜中的最大标签值 (向零取整). 为 0 (即只有背景) 时返回 [`FrameError::LabelNotFound`].
pub fn max_label(mask: &Volume<f32>) -> Result<u32> {
    match mask.max_value() {
        Some(m) if m >= 1.0 => Ok(m.trunc() as u32),
        _ => Err(FrameError::LabelNotFound(0)),
    }
}

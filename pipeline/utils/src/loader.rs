//! 从环境变量或用户主目录获取外部工具和参考图谱的位置.

use std::env;
use std::path::PathBuf;

/// 参考图谱路径的环境变量.
pub const REFERENCE_ENV: &str = "AUTOSPM_REFERENCE";

/// 配准命令的环境变量.
pub const REGISTER_CMD_ENV: &str = "AUTOSPM_REGISTER_CMD";

/// 分割命令的环境变量.
pub const SEGMENT_CMD_ENV: &str = "AUTOSPM_SEGMENT_CMD";

/// 获取 `$HOME/dataset/{...paths}`. 无法获取用户主目录时返回 `None`.
pub fn home_dataset_dir_with<I, S>(paths: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = S>,
    S: AsRef<std::path::Path>,
{
    let mut p = dirs::home_dir()?;
    p.push("dataset");
    for s in paths {
        p.push(s);
    }
    Some(p)
}

/// 获取环境变量 `key` 的非空值.
fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// 获取参考图谱 (MNI 模板) 路径.
///
/// 1. 若环境变量 `$AUTOSPM_REFERENCE` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/mni/MNI152_T1_1mm.nii.gz`.
pub fn reference_path_from_env_or_home() -> Option<PathBuf> {
    non_empty_var(REFERENCE_ENV)
        .map(PathBuf::from)
        .or_else(|| home_dataset_dir_with(["mni", "MNI152_T1_1mm.nii.gz"]))
}

/// 获取 `$AUTOSPM_REGISTER_CMD`.
#[inline]
pub fn register_cmd_from_env() -> Option<String> {
    non_empty_var(REGISTER_CMD_ENV)
}

/// 获取 `$AUTOSPM_SEGMENT_CMD`.
#[inline]
pub fn segment_cmd_from_env() -> Option<String> {
    non_empty_var(SEGMENT_CMD_ENV)
}

//! 运行时错误与警告.
//!
//! 所有致命错误都是 [`FrameError`], 在参数校验阶段立即返回, 不做任何重试.
//! 非致命情况以 [`Warning`] 表示: 它们既通过 `log::warn!` 输出,
//! 也作为返回值的一部分交给调用方.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// 核心库的错误类型.
#[derive(Error, Debug)]
pub enum FrameError {
    /// 输入路径不存在. 第一个字段描述该路径的用途.
    #[error("{what} does not exist: {}", .path.display())]
    PathNotFound {
        /// 路径用途, 如 "image path".
        what: &'static str,
        /// 不存在的路径.
        path: PathBuf,
    },

    /// 读取器无法解析该文件或目录.
    #[error("unsupported image format at {}: {reason}", .path.display())]
    UnsupportedFormat {
        /// 无法解析的路径.
        path: PathBuf,
        /// 具体原因.
        reason: String,
    },

    /// 网格无法对齐 (例如重采样后与源网格没有任何重叠).
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// 掩膜中不存在该标签.
    #[error("no voxels with label '{0}' found in the mask")]
    LabelNotFound(u32),

    /// 参数取值非法.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// 额外图像个数与插值方式个数不一致.
    #[error(
        "'other' and 'inter' must be of the same length, got {others} and {inter}; \
         choose one interpolation method for each image in 'other'"
    )]
    LengthMismatch {
        /// 额外图像个数.
        others: usize,
        /// 插值方式个数.
        inter: usize,
    },

    /// 方向矩阵不是 3x3, 奇异, 或包含非有限值; 以及 spacing 非正等情况.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// 无法创建输出目录.
    #[error("failed to create output directory {}: {source}", .path.display())]
    DirectoryCreation {
        /// 目标目录.
        path: PathBuf,
        /// 底层 I/O 错误.
        source: std::io::Error,
    },

    /// 外部协作者 (分割、配准) 调用失败.
    #[error("external {stage} failed: {message}")]
    External {
        /// 出错阶段, 如 "registration".
        stage: &'static str,
        /// 外部工具给出的信息.
        message: String,
    },

    /// 写 nifti 文件时的底层错误.
    #[error("nifti error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 其他底层 I/O 错误.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// 核心库的 `Result`.
pub type Result<T> = std::result::Result<T, FrameError>;

impl FrameError {
    /// 创建 [`FrameError::PathNotFound`].
    pub fn path_not_found(what: &'static str, path: impl Into<PathBuf>) -> Self {
        Self::PathNotFound {
            what,
            path: path.into(),
        }
    }

    /// 创建 [`FrameError::UnsupportedFormat`].
    pub fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// 创建 [`FrameError::InvalidArgument`].
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// 创建 [`FrameError::InvalidGeometry`].
    pub fn invalid_geometry(msg: impl Into<String>) -> Self {
        Self::InvalidGeometry(msg.into())
    }

    /// 创建 [`FrameError::ShapeMismatch`].
    pub fn shape_mismatch(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    /// 创建 [`FrameError::External`].
    pub fn external(stage: &'static str, msg: impl Into<String>) -> Self {
        Self::External {
            stage,
            message: msg.into(),
        }
    }
}

/// 非致命警告. 流程不会因此中断.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
    /// 目标空间为 MNI 时, 额外图像不会被配准到影像空间.
    OtherPathsIgnoredForMni {
        /// 被忽略的额外图像个数.
        count: usize,
    },

    /// 仅在目标空间为 MNI 时才会进行标准化.
    NormalizeRequiresMni,

    /// 外扩后的包围盒超出数组范围, 已被截断.
    ///
    /// 区间均为左闭右开, `axis` 为数组轴 (0 = z, 1 = y, 2 = x).
    BoundaryClamped {
        /// 数组轴.
        axis: usize,
        /// 截断前的区间.
        requested: (isize, isize),
        /// 截断后的区间.
        clamped: (usize, usize),
    },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::OtherPathsIgnoredForMni { count } => write!(
                f,
                "{count} image(s) in 'other' are not co-registered when 'toSpace' is 'MNI'; \
                 they are assumed to already be in MNI space"
            ),
            Warning::NormalizeRequiresMni => write!(
                f,
                "normalization is only possible for registration to MNI space"
            ),
            Warning::BoundaryClamped {
                axis,
                requested: (r0, r1),
                clamped: (c0, c1),
            } => write!(
                f,
                "padded bounding box on array axis {axis} clamped from [{r0}, {r1}) to [{c0}, {c1})"
            ),
        }
    }
}

impl Warning {
    /// 通过 `log` 输出该警告, 并返回自身.
    #[inline]
    pub(crate) fn emit(self) -> Self {
        log::warn!("{self}");
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length_mismatch_names_both_counts() {
        let msg = FrameError::LengthMismatch { others: 1, inter: 2 }.to_string();
        assert!(msg.contains('1'));
        assert!(msg.contains('2'));
    }

    #[test]
    fn test_warning_display() {
        let w = Warning::BoundaryClamped {
            axis: 0,
            requested: (-2, 12),
            clamped: (0, 10),
        };
        assert_eq!(
            w.to_string(),
            "padded bounding box on array axis 0 clamped from [-2, 12) to [0, 10)"
        );
    }
}

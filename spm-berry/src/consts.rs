//! 通用常量.

/// 标签值相关.
pub mod label {
    /// 背景体素值. 重采样时网格外的体素也填充为该值.
    pub const BACKGROUND: f32 = 0.0;

    /// 判断体素值与标签值是否 "相等" 时使用的相对容差.
    pub const RTOL: f32 = 1e-5;

    /// 判断体素值与标签值是否 "相等" 时使用的绝对容差.
    pub const ATOL: f32 = 1e-8;

    /// 体素值 `value` 是否可视为标签 `label`?
    #[inline]
    pub fn is_close(value: f32, label: f32) -> bool {
        (value - label).abs() <= ATOL + RTOL * label.abs()
    }
}

/// 包围盒默认外扩体素数.
pub const DEFAULT_MARGIN: usize = 5;

/// 计算包围盒前, 对标签占据区域进行二值膨胀的默认次数.
pub const DEFAULT_DILATION: usize = 4;

/// 配准后脑图像的默认文件名 (不含扩展名).
pub const DEFAULT_FILENAME: &str = "Brain";

/// 存放重定位后图像的子目录名.
pub const REGISTERED_DIR: &str = "registered";

/// 分割结果被重命名后的文件名. 该文件存在时跳过分割步骤.
pub const BRAIN_MASK_FILE: &str = "brainmask.nii.gz";

/// 可识别的影像文件扩展名. 输出文件名不允许以这些扩展名结尾.
pub const IMAGE_EXTENSIONS: [&str; 8] = [
    ".nii", ".nii.gz", ".img", ".hdr", ".mha", ".mhd", ".nrrd", ".dcm",
];

/// 可由 `nifti` 直接读取的扩展名.
pub const NIFTI_EXTENSIONS: [&str; 4] = [".nii", ".nii.gz", ".hdr", ".img"];

/// 几何计算使用的浮点容差.
pub const GEOMETRY_EPS: f64 = 1e-6;

/// 方向矩阵行列式绝对值的下限. 低于该值视为奇异矩阵.
pub const MIN_DETERMINANT: f64 = 1e-9;

/// `path` 的文件名是否以 [`IMAGE_EXTENSIONS`] 中的某一项结尾 (忽略大小写)?
pub fn has_image_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// `path` 的文件名是否以 [`NIFTI_EXTENSIONS`] 中的某一项结尾 (忽略大小写)?
pub fn has_nifti_extension(name: &str) -> bool {
    let lower = name.to_lowercase();
    NIFTI_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

//! 参数校验.
//!
//! 在进行任何几何计算之前调用. 所有错误立即返回; 跨字段的非致命情况
//! 以 [`Warning`] 的形式既写入日志, 也放入 [`Validated::warnings`].

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::consts::{has_image_extension, DEFAULT_FILENAME};
use crate::error::{FrameError, Result, Warning};
use crate::Volume;

/// 配准的目标空间.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ToSpace {
    /// 将图谱配准到影像空间.
    Image,
    /// 将影像中的脑配准到 MNI 空间.
    Mni,
}

impl FromStr for ToSpace {
    type Err = FrameError;

    /// 忽略大小写, 只接受 `image` 和 `mni`.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "image" => Ok(ToSpace::Image),
            "mni" => Ok(ToSpace::Mni),
            _ => Err(FrameError::invalid_argument(format!(
                "'toSpace' must be either 'Image' or 'MNI', got '{s}'"
            ))),
        }
    }
}

impl fmt::Display for ToSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToSpace::Image => write!(f, "image"),
            ToSpace::Mni => write!(f, "mni"),
        }
    }
}

/// 额外图像的插值方式.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Interpolation {
    /// 所有轴使用同一插值阶数.
    Scalar(f64),
    /// 每个轴单独指定.
    PerAxis(Vec<f64>),
}

impl From<f64> for Interpolation {
    fn from(v: f64) -> Self {
        Interpolation::Scalar(v)
    }
}

impl From<Vec<f64>> for Interpolation {
    fn from(v: Vec<f64>) -> Self {
        Interpolation::PerAxis(v)
    }
}

fn parse_number(token: &str, whole: &str) -> Result<f64> {
    token
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            FrameError::invalid_argument(format!(
                "each item in 'inter' must be numeric or a list of numerics, got '{whole}'"
            ))
        })
}

impl FromStr for Interpolation {
    type Err = FrameError;

    /// `"1"` 解析为 [`Interpolation::Scalar`];
    /// `"1,1,0"`, `"[1, 1, 0]"` 或 `"(1 1 0)"` 解析为 [`Interpolation::PerAxis`].
    fn from_str(s: &str) -> Result<Self> {
        let body = s.trim();
        let bracketed = (body.starts_with('[') && body.ends_with(']'))
            || (body.starts_with('(') && body.ends_with(')'));
        let inner = if bracketed {
            &body[1..body.len() - 1]
        } else {
            body
        };

        let tokens: Vec<&str> = inner
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
            .collect();
        match tokens.as_slice() {
            [] => Err(FrameError::invalid_argument(format!(
                "empty interpolation specification '{s}'"
            ))),
            [one] if !bracketed => Ok(Interpolation::Scalar(parse_number(one, s)?)),
            many => many
                .iter()
                .map(|t| parse_number(t, s))
                .collect::<Result<Vec<_>>>()
                .map(Interpolation::PerAxis),
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interpolation::Scalar(v) => write!(f, "{v}"),
            Interpolation::PerAxis(vs) => {
                let parts: Vec<String> = vs.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", parts.join(","))
            }
        }
    }
}

/// 待校验的原始参数.
#[derive(Debug, Clone)]
pub struct ValidateArgs {
    /// 待配准的影像.
    pub image: PathBuf,
    /// 掩膜或其来源 (CT) 路径.
    pub mask: PathBuf,
    /// 目标空间, 忽略大小写.
    pub to_space: String,
    /// 是否标准化.
    pub normalize: bool,
    /// 输出目录. 不存在时会被创建.
    pub output_dir: Option<PathBuf>,
    /// 输出文件名 (不含扩展名).
    pub filename: Option<String>,
    /// 额外图像.
    pub others: Option<Vec<PathBuf>>,
    /// 额外图像的插值方式, 每一项对应 `others` 中的一幅图像.
    pub interpolation: Option<Vec<String>>,
}

impl ValidateArgs {
    /// 以必需参数构建. 默认开启标准化.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(image: P, mask: Q, to_space: &str) -> Self {
        Self {
            image: image.into(),
            mask: mask.into(),
            to_space: to_space.to_string(),
            normalize: true,
            output_dir: None,
            filename: None,
            others: None,
            interpolation: None,
        }
    }

    /// 设置是否标准化.
    pub fn normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// 设置输出目录.
    pub fn output_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// 设置输出文件名.
    pub fn filename<S: Into<String>>(mut self, name: S) -> Self {
        self.filename = Some(name.into());
        self
    }

    /// 设置额外图像.
    pub fn others<I, P>(mut self, others: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.others = Some(others.into_iter().map(Into::into).collect());
        self
    }

    /// 设置插值方式.
    pub fn interpolation<I, S>(mut self, inter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.interpolation = Some(inter.into_iter().map(Into::into).collect());
        self
    }
}

/// 校验通过后的强类型参数.
#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    /// 待配准的影像.
    pub image: PathBuf,
    /// 掩膜或其来源 (CT) 路径.
    pub mask: PathBuf,
    /// 目标空间.
    pub to_space: ToSpace,
    /// 是否标准化.
    pub normalize: bool,
    /// 输出目录 (已确保存在).
    pub output_dir: Option<PathBuf>,
    /// 输出文件名, 缺省为 [`DEFAULT_FILENAME`].
    pub filename: String,
    /// 额外图像, 均已确认存在.
    pub others: Vec<PathBuf>,
    /// 插值方式.
    pub interpolation: Option<Vec<Interpolation>>,
    /// 跨字段警告.
    pub warnings: Vec<Warning>,
}

fn require_exists(what: &'static str, path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(FrameError::path_not_found(what, path))
    }
}

/// 校验全部参数.
///
/// 检查顺序: 目标空间 → 影像/掩膜路径 → 文件名 → 插值方式 → 个数是否一致
/// → 额外图像路径 → 创建输出目录. 目录只有在其余检查都通过后才会被创建.
pub fn validate(args: &ValidateArgs) -> Result<Validated> {
    let to_space: ToSpace = args.to_space.parse()?;

    require_exists("image path", &args.image)?;
    require_exists("mask path", &args.mask)?;

    let filename = match args.filename.as_deref() {
        None => DEFAULT_FILENAME.to_string(),
        Some("") => return Err(FrameError::invalid_argument("'filename' must not be empty")),
        Some(name) if has_image_extension(name) => {
            return Err(FrameError::invalid_argument(format!(
                "'filename' should not include a file extension, got '{name}'"
            )))
        }
        Some(name) => name.to_string(),
    };

    let interpolation = args
        .interpolation
        .as_ref()
        .map(|inter| inter.iter().map(|s| s.parse()).collect::<Result<Vec<Interpolation>>>())
        .transpose()?;

    if let (Some(others), Some(inter)) = (&args.others, &interpolation) {
        if others.len() != inter.len() {
            return Err(FrameError::LengthMismatch {
                others: others.len(),
                inter: inter.len(),
            });
        }
    }

    let others = args.others.clone().unwrap_or_default();
    for p in others.iter() {
        require_exists("file in 'other'", p)?;
    }

    let mut warnings = vec![];
    if !others.is_empty() && to_space == ToSpace::Mni {
        warnings.push(Warning::OtherPathsIgnoredForMni { count: others.len() }.emit());
    }
    if args.normalize && to_space != ToSpace::Mni {
        warnings.push(Warning::NormalizeRequiresMni.emit());
    }

    if let Some(dir) = &args.output_dir {
        if !dir.is_dir() {
            fs::create_dir_all(dir).map_err(|source| FrameError::DirectoryCreation {
                path: dir.clone(),
                source,
            })?;
            log::debug!("created output directory {}", dir.display());
        }
    }

    Ok(Validated {
        image: args.image.clone(),
        mask: args.mask.clone(),
        to_space,
        normalize: args.normalize,
        output_dir: args.output_dir.clone(),
        filename,
        others,
        interpolation,
        warnings,
    })
}

/// 确认 `label` 是合法的标签值, 且 `mask` 中至少存在一个该标签的体素.
///
/// # 错误
///
/// 1. `label` 为负数或超出 `u32` 范围时返回 [`FrameError::InvalidArgument`];
/// 2. 不存在该标签时返回 [`FrameError::LabelNotFound`].
pub fn validate_label_presence(mask: &Volume<f32>, label: i64) -> Result<u32> {
    let label = u32::try_from(label).map_err(|_| {
        FrameError::invalid_argument(format!(
            "label must be a non-negative integer, got {label}"
        ))
    })?;
    if mask.contains_label(label) {
        Ok(label)
    } else {
        Err(FrameError::LabelNotFound(label))
    }
}

/// 与 [`validate_label_presence`] 相同, 但先从 `path` 读取掩膜.
pub fn validate_label_presence_at<P: AsRef<Path>>(path: P, label: i64) -> Result<u32> {
    let mask = Volume::open(path)?;
    validate_label_presence(&mask, label)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::geometry::Geometry;
    use ndarray::Array3;

    struct Fixture {
        dir: tempfile::TempDir,
        image: PathBuf,
        mask: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("t1.nii");
        let mask = dir.path().join("ct.nii.gz");
        fs::write(&image, b"").unwrap();
        fs::write(&mask, b"").unwrap();
        Fixture { dir, image, mask }
    }

    fn args(f: &Fixture, to_space: &str) -> ValidateArgs {
        ValidateArgs::new(&f.image, &f.mask, to_space)
    }

    #[test]
    fn test_to_space_parse() {
        assert_eq!("MNI".parse::<ToSpace>().unwrap(), ToSpace::Mni);
        assert_eq!("iMaGe".parse::<ToSpace>().unwrap(), ToSpace::Image);
        assert!(matches!(
            "Brain".parse::<ToSpace>(),
            Err(FrameError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_bad_to_space() {
        let f = fixture();
        assert!(matches!(
            validate(&args(&f, "Brain")),
            Err(FrameError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_length_mismatch() {
        let f = fixture();
        let a = args(&f, "MNI").others(["a.nii"]).interpolation(["1", "2"]);
        match validate(&a) {
            Err(e @ FrameError::LengthMismatch { others: 1, inter: 2 }) => {
                let msg = e.to_string();
                assert!(msg.contains("1 and 2"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_missing_paths() {
        let f = fixture();
        let a = ValidateArgs::new(f.dir.path().join("nope.nii"), &f.mask, "mni");
        assert!(matches!(validate(&a), Err(FrameError::PathNotFound { .. })));

        let a = args(&f, "image").others([f.dir.path().join("atlas.nii")]);
        assert!(matches!(validate(&a), Err(FrameError::PathNotFound { .. })));
    }

    #[test]
    fn test_filename_rules() {
        let f = fixture();
        for bad in ["brain.nii", "Brain.NII.GZ", "x.mha", ""] {
            assert!(matches!(
                validate(&args(&f, "mni").filename(bad)),
                Err(FrameError::InvalidArgument(_))
            ));
        }
        let v = validate(&args(&f, "mni")).unwrap();
        assert_eq!(v.filename, "Brain");
        let v = validate(&args(&f, "mni").filename("subject01")).unwrap();
        assert_eq!(v.filename, "subject01");
    }

    #[test]
    fn test_interpolation_parse() {
        assert_eq!("1".parse::<Interpolation>().unwrap(), Interpolation::Scalar(1.0));
        assert_eq!(
            "[1, 1, 0]".parse::<Interpolation>().unwrap(),
            Interpolation::PerAxis(vec![1.0, 1.0, 0.0])
        );
        assert_eq!(
            "4,4,0".parse::<Interpolation>().unwrap(),
            Interpolation::PerAxis(vec![4.0, 4.0, 0.0])
        );
        assert_eq!(
            "[2]".parse::<Interpolation>().unwrap(),
            Interpolation::PerAxis(vec![2.0])
        );
        assert!("linear".parse::<Interpolation>().is_err());
        assert!("[1, x]".parse::<Interpolation>().is_err());
        assert!("".parse::<Interpolation>().is_err());
        assert_eq!(Interpolation::PerAxis(vec![1.0, 0.5]).to_string(), "[1,0.5]");
    }

    #[test]
    fn test_bad_interpolation_element() {
        let f = fixture();
        let a = args(&f, "image").interpolation(["1", "nearest"]);
        assert!(matches!(validate(&a), Err(FrameError::InvalidArgument(_))));
    }

    #[test]
    fn test_warnings() {
        let f = fixture();
        let atlas = f.dir.path().join("atlas.nii");
        fs::write(&atlas, b"").unwrap();

        let v = validate(&args(&f, "MNI").others([&atlas]).interpolation(["0"])).unwrap();
        assert_eq!(v.to_space, ToSpace::Mni);
        assert_eq!(v.warnings, vec![Warning::OtherPathsIgnoredForMni { count: 1 }]);
        assert_eq!(v.interpolation, Some(vec![Interpolation::Scalar(0.0)]));

        let v = validate(&args(&f, "image")).unwrap();
        assert_eq!(v.warnings, vec![Warning::NormalizeRequiresMni]);

        let v = validate(&args(&f, "image").normalize(false)).unwrap();
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn test_output_dir_created_last() {
        let f = fixture();
        let out = f.dir.path().join("out").join("nested");
        assert!(validate(&args(&f, "Brain").output_dir(&out)).is_err());
        assert!(!out.exists());

        validate(&args(&f, "mni").output_dir(&out)).unwrap();
        assert!(out.is_dir());
    }

    #[test]
    fn test_output_dir_creation_failure() {
        let f = fixture();
        // 以普通文件作为父目录, 必然无法创建.
        let out = f.image.join("sub");
        assert!(matches!(
            validate(&args(&f, "mni").output_dir(&out)),
            Err(FrameError::DirectoryCreation { .. })
        ));
    }

    #[test]
    fn test_label_presence() {
        let mut data = Array3::<f32>::zeros((3, 3, 3));
        data[(0, 0, 0)] = 1.0;
        data[(1, 1, 1)] = 2.0;
        let mask = Volume::new(data, Geometry::default()).unwrap();

        assert_eq!(validate_label_presence(&mask, 2).unwrap(), 2);
        assert!(matches!(
            validate_label_presence(&mask, 7),
            Err(FrameError::LabelNotFound(7))
        ));
        assert!(matches!(
            validate_label_presence(&mask, -1),
            Err(FrameError::InvalidArgument(_))
        ));
    }
}

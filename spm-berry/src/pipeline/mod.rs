//! 外部流程编排.
//!
//! 分割、配准和重切片都由外部工具完成. 本模块只通过 [`Registrar`] 和
//! [`Segmenter`] 与它们交互, 完整流程为:
//!
//! 校验 → 读取影像与掩膜 → 裁剪 → 重定位到参考图谱中心 → 写出 → 重切片 → (影像空间) 回写原点.
//!
//! 外部引擎的生命周期由 [`Engine`] 和 [`with_session`] 管理: 每次顶层调用启动一个会话,
//! 会话在 `Drop` 时释放.

use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::REGISTERED_DIR;
use crate::data::geometry::Vec3;
use crate::data::io::rewrite_origin;
use crate::error::{FrameError, Result, Warning};
use crate::frame::{crop, recenter, CropOptions};
use crate::validate::{
    validate, validate_label_presence, Interpolation, ToSpace, ValidateArgs, Validated,
};
use crate::{GridAttr, Volume};

mod segment;

pub use segment::{ensure_brain_mask, max_label, Segmenter};

/// 交给重切片工具的参数.
#[derive(Debug, Clone, PartialEq)]
pub struct ResliceOptions {
    /// 目标空间.
    pub to_space: ToSpace,
    /// 是否标准化. 仅在目标空间为 MNI 时有意义.
    pub normalize: bool,
    /// 需要一并配准到影像空间的额外图像. 目标空间为 MNI 时为空.
    pub others: Vec<PathBuf>,
    /// 每幅额外图像的插值方式.
    pub interpolation: Option<Vec<Interpolation>>,
}

/// 配准/重切片工具.
pub trait Registrar {
    /// 参考图谱 (如 MNI 模板) 的路径. 裁剪结果会被重定位到它的中心.
    fn reference_path(&mut self) -> Result<PathBuf>;

    /// 对 `image` 进行配准和重切片, 返回所有结果文件.
    ///
    /// 目标空间为 MNI 时只有一个结果; 为影像空间时, 每幅额外图像 (以及默认图谱) 各对应一个结果.
    fn reslice(&mut self, image: &Path, options: &ResliceOptions) -> Result<Vec<PathBuf>>;
}

/// 外部引擎. 每次启动得到一个独立会话, 会话在 `Drop` 时释放资源.
pub trait Engine {
    /// 会话类型.
    type Session: Registrar;

    /// 启动一个新会话.
    fn start(&self) -> Result<Self::Session>;
}

/// 启动会话, 在其中运行 `f`, 然后释放会话. 无论 `f` 是否成功, 会话都会被释放.
pub fn with_session<E, T, F>(engine: &E, f: F) -> Result<T>
where
    E: Engine,
    F: FnOnce(&mut E::Session) -> Result<T>,
{
    let mut session = engine.start()?;
    log::debug!("engine session started");
    f(&mut session)
}

/// 流程运行结果.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// 目标空间.
    pub to_space: ToSpace,
    /// 重切片工具给出的结果文件.
    pub outputs: Vec<PathBuf>,
    /// 裁剪结果在原影像空间中的原点.
    pub crop_origin: Vec3,
    /// 重定位到参考图谱中心后的原点.
    pub recentered_origin: Vec3,
    /// 全部非致命警告.
    pub warnings: Vec<Warning>,
}

impl Validated {
    /// 实际使用的输出目录: 未指定时为影像所在目录.
    pub fn output_dir_or_default(&self) -> PathBuf {
        match &self.output_dir {
            Some(dir) => dir.clone(),
            None => self
                .image
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf),
        }
    }
}

fn create_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|source| FrameError::DirectoryCreation {
        path: dir.to_path_buf(),
        source,
    })
}

/// 已有脑掩膜时运行完整流程. `label` 为掩膜中脑区域的标签值.
pub fn run_with_mask<R: Registrar + ?Sized>(
    registrar: &mut R,
    args: &ValidateArgs,
    label: i64,
) -> Result<PipelineOutcome> {
    let validated = validate(args)?;
    run_validated(registrar, validated, label)
}

/// 先分割再运行完整流程.
///
/// `args.mask` 为用于分割的 CT. 输出目录中已有 `brainmask.nii.gz` 时跳过分割;
/// 掩膜中的最大标签值被视为脑区域.
pub fn run_autospm<S, R>(segmenter: &S, registrar: &mut R, args: &ValidateArgs) -> Result<PipelineOutcome>
where
    S: Segmenter + ?Sized,
    R: Registrar + ?Sized,
{
    let mut validated = validate(args)?;
    let out_dir = validated.output_dir_or_default();

    log::info!("segmenting brain from {}", validated.mask.display());
    let mask_path = ensure_brain_mask(segmenter, &validated.mask, &out_dir)?;
    let label = max_label(&Volume::open(&mask_path)?)?;
    log::info!("brain label is {label}");

    validated.mask = mask_path;
    run_validated(registrar, validated, i64::from(label))
}

fn run_validated<R: Registrar + ?Sized>(
    registrar: &mut R,
    validated: Validated,
    label: i64,
) -> Result<PipelineOutcome> {
    let mask = Volume::open(&validated.mask)?;
    let label = validate_label_presence(&mask, label)?;
    let image = Volume::open(&validated.image)?;

    let cropped = crop(&image, &mask, &CropOptions::new(label))?;
    let crop_origin = *cropped.origin();

    let reference_path = registrar.reference_path()?;
    log::info!("recentering onto {}", reference_path.display());
    let reference = Volume::open(&reference_path)?;
    let recentered = recenter(&cropped.volume, &reference)?;
    let recentered_origin = *recentered.origin();

    let registered_dir = validated.output_dir_or_default().join(REGISTERED_DIR);
    create_dir(&registered_dir)?;
    let brain_path = registered_dir.join(format!("{}.nii", validated.filename));
    recentered.save(&brain_path)?;
    log::info!("recentered brain written to {}", brain_path.display());

    let options = ResliceOptions {
        to_space: validated.to_space,
        normalize: validated.normalize,
        others: match validated.to_space {
            ToSpace::Image => validated.others.clone(),
            ToSpace::Mni => vec![],
        },
        interpolation: validated.interpolation.clone(),
    };
    let outputs = registrar.reslice(&brain_path, &options)?;

    if validated.to_space == ToSpace::Image {
        // 影像空间的结果以裁剪前的物理位置为准.
        fs::remove_file(&brain_path)?;
        for out in outputs.iter() {
            rewrite_origin(out, crop_origin)?;
            log::debug!("rewrote origin of {}", out.display());
        }
    }

    let mut warnings = validated.warnings;
    warnings.extend(cropped.warnings);
    Ok(PipelineOutcome {
        to_space: validated.to_space,
        outputs,
        crop_origin,
        recentered_origin,
        warnings,
    })
}

//! 命令行入口: 分割 → 裁剪 → 重定位 → 配准.

use std::path::PathBuf;

use clap::Parser;
use log::LevelFilter;
use simple_logger::SimpleLogger;

mod engine;
mod result;
mod runner;

/// Run the autospm pipeline for brain cropping and registration.
#[derive(Parser, Debug)]
#[command(name = "autospm", version)]
pub struct Args {
    /// Path to the input image file.
    #[arg(long)]
    pub to_segment: PathBuf,

    /// Path to the CT image file used for brain segmentation.
    #[arg(long)]
    pub ct_path: PathBuf,

    /// Directory to save the output image files.
    #[arg(long)]
    pub output_dir: PathBuf,

    /// Filename (without extension) of the registered brain image.
    #[arg(long, default_value = spm_berry::consts::DEFAULT_FILENAME)]
    pub filename: String,

    /// 'Image' or 'MNI': register atlases to image space or the brain to MNI space.
    #[arg(long, default_value = "MNI")]
    pub to_space: String,

    /// Disable full brain normalization to MNI.
    #[arg(long)]
    pub nonorm: bool,

    /// Additional images to co-register (must be in MNI space).
    #[arg(long, num_args = 0..)]
    pub other: Vec<PathBuf>,

    /// Interpolation for each additional image, e.g. `1` or `[1,1,0]`.
    #[arg(long, num_args = 0..)]
    pub inter: Vec<String>,

    /// Reference atlas; defaults to $AUTOSPM_REFERENCE or ~/dataset/mni/MNI152_T1_1mm.nii.gz.
    #[arg(long)]
    pub reference: Option<PathBuf>,

    /// Registration command; defaults to $AUTOSPM_REGISTER_CMD.
    #[arg(long)]
    pub register_cmd: Option<String>,

    /// Segmentation command; defaults to $AUTOSPM_SEGMENT_CMD.
    #[arg(long)]
    pub segment_cmd: Option<String>,

    /// Enable verbose output.
    #[arg(long)]
    pub verbose: bool,

    /// Enable full verbose output.
    #[arg(long)]
    pub fullverbose: bool,
}

impl Args {
    /// 日志级别.
    fn level(&self) -> LevelFilter {
        if self.fullverbose {
            LevelFilter::Debug
        } else if self.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    SimpleLogger::new().with_level(args.level()).init()?;

    let outcome = runner::run(&args)?;
    if args.verbose || args.fullverbose {
        result::report(&outcome)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use spm_berry::validate::{validate, ToSpace};
    use std::ffi::OsString;

    #[test]
    fn test_parse_defaults() {
        let args = Args::try_parse_from([
            "autospm",
            "--to-segment",
            "t1.nii",
            "--ct-path",
            "ct.nii",
            "--output-dir",
            "out",
        ])
        .unwrap();
        assert_eq!(args.filename, "Brain");
        assert_eq!(args.to_space, "MNI");
        assert!(!args.nonorm);
        assert!(args.other.is_empty());
        assert_eq!(args.level(), LevelFilter::Warn);
    }

    #[test]
    fn test_args_flow_into_validation() {
        let dir = tempfile::tempdir().unwrap();
        let t1 = dir.path().join("t1.nii");
        let atlas = dir.path().join("atlas.nii");
        std::fs::write(&t1, b"").unwrap();
        std::fs::write(&atlas, b"").unwrap();
        let out = dir.path().join("out");

        let argv: Vec<OsString> = vec![
            "autospm".into(),
            "--to-segment".into(),
            t1.clone().into(),
            "--ct-path".into(),
            t1.clone().into(),
            "--output-dir".into(),
            out.clone().into(),
            "--to-space".into(),
            "Image".into(),
            "--nonorm".into(),
            "--other".into(),
            atlas.clone().into(),
            "--inter".into(),
            "[1,1,0]".into(),
            "--fullverbose".into(),
        ];
        let args = Args::try_parse_from(argv).unwrap();
        assert_eq!(args.level(), LevelFilter::Debug);

        let v = validate(&runner::validate_args(&args)).unwrap();
        assert_eq!(v.to_space, ToSpace::Image);
        assert!(!v.normalize);
        assert!(v.warnings.is_empty());
        assert_eq!(v.others, vec![atlas]);
        assert!(out.is_dir());
    }
}

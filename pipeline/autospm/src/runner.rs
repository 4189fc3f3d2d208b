//! 程序运行函数.

use std::path::PathBuf;

use anyhow::{anyhow, Context};
use spm_berry::pipeline::{run_autospm, with_session, PipelineOutcome};
use spm_berry::validate::ValidateArgs;
use utils::loader;

use crate::engine::{CommandEngine, CommandSegmenter};
use crate::Args;

/// 由命令行参数构建待校验参数. `mask` 一项为用于分割的 CT.
pub fn validate_args(args: &Args) -> ValidateArgs {
    let mut v = ValidateArgs::new(&args.to_segment, &args.ct_path, &args.to_space)
        .normalize(!args.nonorm)
        .output_dir(&args.output_dir)
        .filename(args.filename.as_str());
    if !args.other.is_empty() {
        v = v.others(args.other.iter());
    }
    if !args.inter.is_empty() {
        v = v.interpolation(args.inter.iter().cloned());
    }
    v
}

/// 参考图谱: 命令行参数优先, 其次为环境变量或用户主目录下的默认位置.
fn reference_path(args: &Args) -> anyhow::Result<PathBuf> {
    args.reference
        .clone()
        .or_else(loader::reference_path_from_env_or_home)
        .ok_or_else(|| anyhow!("no reference atlas given and home directory is unknown"))
}

/// 实际运行.
pub fn run(args: &Args) -> anyhow::Result<PipelineOutcome> {
    let register_cmd = args
        .register_cmd
        .clone()
        .or_else(loader::register_cmd_from_env)
        .with_context(|| format!("no registration command, set --register-cmd or ${}", loader::REGISTER_CMD_ENV))?;
    let segment_cmd = args
        .segment_cmd
        .clone()
        .or_else(loader::segment_cmd_from_env)
        .with_context(|| format!("no segmentation command, set --segment-cmd or ${}", loader::SEGMENT_CMD_ENV))?;

    let engine = CommandEngine::new(register_cmd, reference_path(args)?);
    let segmenter = CommandSegmenter::new(segment_cmd);
    let params = validate_args(args);

    log::info!("running autospm on {}", args.to_segment.display());
    let outcome = with_session(&engine, |session| run_autospm(&segmenter, session, &params))?;
    log::info!("autospm finished");
    Ok(outcome)
}

//! 通过外部命令实现的分割与配准.
//!
//! 配准命令的调用约定:
//!
//! `<cmd> <image> --to-space <image|mni> [--normalize] [--other <path>]... [--inter <interp>]...`
//!
//! 命令标准输出中每个非空行视为一个结果文件路径.
//!
//! 分割命令的调用约定: `<cmd> <ct> <output_dir>`. 若标准输出最后一个非空行是路径,
//! 则以其为结果, 否则默认为 `<output_dir>/brain.nii.gz`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use spm_berry::pipeline::{Engine, Registrar, ResliceOptions, Segmenter};
use spm_berry::validate::ToSpace;
use spm_berry::{FrameError, Result};

/// 将命令字符串按空白切分为程序和参数.
fn split_command(stage: &'static str, cmd: &str) -> Result<(String, Vec<String>)> {
    let mut parts = cmd.split_whitespace().map(str::to_string);
    let program = parts
        .next()
        .ok_or_else(|| FrameError::external(stage, "empty command"))?;
    Ok((program, parts.collect()))
}

/// 运行命令, 失败时将标准错误作为错误信息.
fn run(stage: &'static str, cmd: &str, args: Vec<OsString>) -> Result<Output> {
    let (program, fixed) = split_command(stage, cmd)?;
    log::debug!("running {stage} command `{program}` with {} argument(s)", fixed.len() + args.len());
    let output = Command::new(&program)
        .args(fixed)
        .args(args)
        .output()
        .map_err(|e| FrameError::external(stage, format!("cannot run `{program}`: {e}")))?;
    if !output.status.success() {
        return Err(FrameError::external(
            stage,
            format!(
                "`{program}` exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        ));
    }
    Ok(output)
}

/// 标准输出中的非空行.
fn stdout_lines(output: &Output) -> Vec<String> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// 基于外部命令的配准引擎.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    command: String,
    reference: PathBuf,
}

impl CommandEngine {
    /// 以配准命令和参考图谱路径构建.
    pub fn new<S: Into<String>, P: Into<PathBuf>>(command: S, reference: P) -> Self {
        Self {
            command: command.into(),
            reference: reference.into(),
        }
    }
}

impl Engine for CommandEngine {
    type Session = CommandSession;

    fn start(&self) -> Result<CommandSession> {
        if !self.reference.exists() {
            return Err(FrameError::path_not_found("reference atlas", &self.reference));
        }
        log::info!("registration session opened with `{}`", self.command);
        Ok(CommandSession {
            command: self.command.clone(),
            reference: self.reference.clone(),
            calls: 0,
        })
    }
}

/// 一次配准会话.
#[derive(Debug)]
pub struct CommandSession {
    command: String,
    reference: PathBuf,
    calls: usize,
}

impl CommandSession {
    /// 构建配准命令参数.
    fn reslice_args(image: &Path, options: &ResliceOptions) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            image.into(),
            "--to-space".into(),
            options.to_space.to_string().into(),
        ];
        if options.normalize && options.to_space == ToSpace::Mni {
            args.push("--normalize".into());
        }
        for other in options.others.iter() {
            args.push("--other".into());
            args.push(other.into());
        }
        for inter in options.interpolation.iter().flatten() {
            args.push("--inter".into());
            args.push(inter.to_string().into());
        }
        args
    }
}

impl Registrar for CommandSession {
    fn reference_path(&mut self) -> Result<PathBuf> {
        Ok(self.reference.clone())
    }

    fn reslice(&mut self, image: &Path, options: &ResliceOptions) -> Result<Vec<PathBuf>> {
        self.calls += 1;
        let output = run("registration", &self.command, Self::reslice_args(image, options))?;
        let outputs: Vec<PathBuf> = stdout_lines(&output).into_iter().map(PathBuf::from).collect();
        if outputs.is_empty() {
            return Err(FrameError::external(
                "registration",
                "command reported no output files",
            ));
        }
        Ok(outputs)
    }
}

impl Drop for CommandSession {
    fn drop(&mut self) {
        log::info!("registration session closed after {} call(s)", self.calls);
    }
}

/// 基于外部命令的分割工具.
#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    command: String,
}

impl CommandSegmenter {
    /// 以分割命令构建.
    pub fn new<S: Into<String>>(command: S) -> Self {
        Self {
            command: command.into(),
        }
    }
}

impl Segmenter for CommandSegmenter {
    fn segment(&self, ct: &Path, output_dir: &Path) -> Result<PathBuf> {
        let output = run(
            "segmentation",
            &self.command,
            vec![ct.into(), output_dir.into()],
        )?;
        Ok(stdout_lines(&output)
            .pop()
            .map(PathBuf::from)
            .filter(|p| p.is_file())
            .unwrap_or_else(|| output_dir.join("brain.nii.gz")))
    }
}

//! FFmpeg command wrapper utilities

use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FfmpegError {
    #[error("{0} not found in system PATH")]
    NotInstalled(String),

    #[error("FFmpeg execution failed: {0}")]
    ExecutionFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct FfmpegCommand {
    program: PathBuf,
    args: Vec<String>,
}

impl FfmpegCommand {
    /// Use a specific ffmpeg binary instead of the one on PATH
    pub fn with_program(program: impl AsRef<Path>) -> Self {
        Self {
            program: program.as_ref().to_path_buf(),
            args: vec!["-hide_banner".to_string(), "-nostdin".to_string()],
        }
    }

    /// Seek before the input (fast seek)
    pub fn seek(mut self, start: &str) -> Self {
        self.args.push("-ss".to_string());
        self.args.push(start.to_string());
        self
    }

    /// Limit how much of the input is read, in seconds
    pub fn duration(mut self, seconds: u64) -> Self {
        self.args.push("-t".to_string());
        self.args.push(seconds.to_string());
        self
    }

    pub fn input(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push("-i".to_string());
        self.args.push(path.as_ref().display().to_string());
        self
    }

    pub fn output(mut self, path: impl AsRef<Path>) -> Self {
        self.args.push(path.as_ref().display().to_string());
        self
    }

    pub fn args(mut self, args: &[&str]) -> Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Rendered command line, for acquisition logs
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// A missing binary surfaces as the spawn failing with `NotFound`
    pub fn execute(self) -> Result<Output, FfmpegError> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| spawn_error(&self.program, e))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FfmpegError::ExecutionFailed(stderr.trim().to_string()));
        }

        Ok(output)
    }
}

fn spawn_error(program: &Path, e: io::Error) -> FfmpegError {
    if e.kind() == io::ErrorKind::NotFound {
        FfmpegError::NotInstalled(program.display().to_string())
    } else {
        FfmpegError::Io(e)
    }
}

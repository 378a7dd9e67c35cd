//! Remote segment acquisition via yt-dlp

use crate::error::{KillfeedError, Result};
use crate::video::AcquisitionLog;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::debug;

/// Downloaded containers yt-dlp may produce for a section
const SEGMENT_EXTENSIONS: [&str; 3] = ["mp4", "webm", "mkv"];
const SEGMENT_STEM: &str = "temp_video";

/// Best stream at or below 1080p
pub const DEFAULT_FORMAT: &str = "bestvideo[height<=1080]+bestaudio/best[height<=1080]";

/// Fetches the `[start, end)` window of a remote video into `dest_dir`.
pub trait SegmentSource: Send + Sync {
    fn fetch_segment(
        &self,
        locator: &str,
        start: &str,
        end: &str,
        dest_dir: &Path,
        log: &mut AcquisitionLog,
    ) -> Result<PathBuf>;
}

pub struct YtDlpSource {
    program: PathBuf,
    format: String,
}

impl YtDlpSource {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            format: DEFAULT_FORMAT.to_string(),
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    fn run(&self, step: &str, args: &[&str], log: &mut AcquisitionLog) -> Result<String> {
        let command = format!("{} {}", self.program.display(), args.join(" "));
        let output = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                let msg = if e.kind() == io::ErrorKind::NotFound {
                    format!("{} not found", self.program.display())
                } else {
                    format!("Failed to run {}: {}", self.program.display(), e)
                };
                log.record(step, &command, Err(msg.clone()));
                KillfeedError::SourceUnavailable(msg)
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            log.record(step, &command, Err(stderr.clone()));
            return Err(KillfeedError::SourceUnavailable(stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        log.record(step, &command, Ok(stdout.clone()));
        Ok(stdout)
    }
}

impl Default for YtDlpSource {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}

impl SegmentSource for YtDlpSource {
    fn fetch_segment(
        &self,
        locator: &str,
        start: &str,
        end: &str,
        dest_dir: &Path,
        log: &mut AcquisitionLog,
    ) -> Result<PathBuf> {
        let title = self.run(
            "probe",
            &["--skip-download", "--print", "title", locator],
            log,
        )?;
        debug!("Probed '{}' for {}-{}", title, start, end);

        let template = dest_dir.join(format!("{}.%(ext)s", SEGMENT_STEM));
        let template = template.display().to_string();
        let section = format!("*{}-{}", start, end);
        self.run(
            "download",
            &[
                "--quiet",
                "--no-warnings",
                "-f",
                self.format.as_str(),
                "--download-sections",
                section.as_str(),
                "-o",
                template.as_str(),
                locator,
            ],
            log,
        )?;

        find_segment(dest_dir)?.ok_or_else(|| {
            KillfeedError::EmptyMedia(format!(
                "yt-dlp produced no {}.{{{}}} in {}",
                SEGMENT_STEM,
                SEGMENT_EXTENSIONS.join(","),
                dest_dir.display()
            ))
        })
    }
}

/// Locate the downloaded segment inside `dir`
pub fn find_segment(dir: &Path) -> Result<Option<PathBuf>> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let stem_matches = path
            .file_stem()
            .map(|s| s == SEGMENT_STEM)
            .unwrap_or(false);
        let ext_matches = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| SEGMENT_EXTENSIONS.contains(&e))
            .unwrap_or(false);
        if stem_matches && ext_matches {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{Chunk, TimeRange};
    use tempfile::TempDir;

    fn log() -> AcquisitionLog {
        let chunk = Chunk {
            index: 0,
            range: TimeRange { start: 0, end: 60 },
        };
        AcquisitionLog::new(&chunk, "00:00:00", "00:01:00")
    }

    #[test]
    fn test_find_segment() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("temp_video.part"), b"x").unwrap();
        fs::write(tmp.path().join("frame_0001.jpg"), b"x").unwrap();
        assert!(find_segment(tmp.path()).unwrap().is_none());

        fs::write(tmp.path().join("temp_video.webm"), b"x").unwrap();
        assert_eq!(
            find_segment(tmp.path()).unwrap(),
            Some(tmp.path().join("temp_video.webm"))
        );
    }

    #[test]
    fn test_missing_binary_is_source_unavailable() {
        let tmp = TempDir::new().unwrap();
        let source = YtDlpSource::new("/nonexistent/yt-dlp");
        let mut log = log();

        let err = source
            .fetch_segment("https://example.com/v", "00:00:00", "00:01:00", tmp.path(), &mut log)
            .unwrap_err();
        assert!(matches!(err, KillfeedError::SourceUnavailable(_)));
        assert_eq!(log.steps.len(), 1);
        assert_eq!(log.steps[0].name, "probe");
        assert!(!log.steps[0].ok);
        assert!(err.to_string().contains("/nonexistent/yt-dlp not found"));
    }
}

//! Chunk frame extraction via yt-dlp + FFmpeg

use crate::error::{KillfeedError, Result};
use crate::ffmpeg::FfmpegCommand;
use crate::partition::Chunk;
use crate::timecode::to_hhmmss;
use crate::workarea::{purge_dir, WorkArea};
use crate::ytdlp::SegmentSource;
use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the broadcast comes from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSource {
    /// Remote locator handed to the segment source (e.g. a YouTube URL)
    pub locator: String,
    /// Already-downloaded copy of the full broadcast; skips remote acquisition
    pub local_media: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub ffmpeg_cmd: PathBuf,
    pub fps: u8,
    /// FFmpeg `-q:v` scale, 1 is best
    pub jpeg_quality: u8,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg_cmd: PathBuf::from("ffmpeg"),
            fps: 1,          // one frame per match second
            jpeg_quality: 1,
        }
    }
}

/// A decoded still, owned by the chunk that extracted it
pub struct Frame {
    pub chunk_index: usize,
    pub local_offset: u64,
    pub image: RgbImage,
    pub path: PathBuf,
}

/// Produces the ordered frame files of one chunk
pub trait FrameSource: Send + Sync {
    fn extract(&self, chunk: &Chunk, work: &WorkArea) -> Result<Vec<PathBuf>>;
}

/// One step of segment acquisition, with the tool's diagnostics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionStep {
    pub name: String,
    pub command: String,
    pub ok: bool,
    pub diagnostics: String,
}

/// Structured per-chunk acquisition log, written to `logs/chunk_NNN.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AcquisitionLog {
    pub chunk_index: usize,
    pub start: String,
    pub end: String,
    pub steps: Vec<AcquisitionStep>,
    pub success: bool,
    pub frame_count: usize,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl AcquisitionLog {
    pub fn new(chunk: &Chunk, start: &str, end: &str) -> Self {
        Self {
            chunk_index: chunk.index,
            start: start.to_string(),
            end: end.to_string(),
            steps: Vec::new(),
            success: false,
            frame_count: 0,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, name: &str, command: &str, outcome: std::result::Result<String, String>) {
        let (ok, diagnostics) = match outcome {
            Ok(d) => (true, d),
            Err(d) => (false, d),
        };
        self.steps.push(AcquisitionStep {
            name: name.to_string(),
            command: command.to_string(),
            ok,
            diagnostics,
        });
    }

    pub fn finish(&mut self, result: &Result<Vec<PathBuf>>) {
        match result {
            Ok(frames) => {
                self.success = true;
                self.frame_count = frames.len();
            }
            Err(e) => {
                self.success = false;
                self.error = Some(e.to_string());
            }
        }
        self.finished_at = Some(Utc::now());
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)
            .map_err(|e| KillfeedError::Io(std::io::Error::other(e)))?;
        Ok(())
    }
}

/// Downloads (or seeks into) the chunk window and decodes it at `fps`.
pub struct ChunkFrameExtractor {
    source: VideoSource,
    segments: Arc<dyn SegmentSource>,
    config: VideoConfig,
}

impl ChunkFrameExtractor {
    pub fn new(source: VideoSource, segments: Arc<dyn SegmentSource>, config: VideoConfig) -> Self {
        Self {
            source,
            segments,
            config,
        }
    }

    fn acquire_and_decode(
        &self,
        chunk: &Chunk,
        chunk_dir: &Path,
        start: &str,
        end: &str,
        log: &mut AcquisitionLog,
    ) -> Result<Vec<PathBuf>> {
        let (input, downloaded) = match &self.source.local_media {
            Some(path) => {
                if !path.is_file() {
                    let msg = format!("local media {} not found", path.display());
                    log.record("local", &path.display().to_string(), Err(msg.clone()));
                    return Err(KillfeedError::SourceUnavailable(msg));
                }
                (path.clone(), false)
            }
            None => {
                let segment =
                    self.segments
                        .fetch_segment(&self.source.locator, start, end, chunk_dir, log)?;
                validate_segment(&segment)?;
                (segment, true)
            }
        };

        let mut cmd = FfmpegCommand::with_program(&self.config.ffmpeg_cmd);
        if !downloaded {
            cmd = cmd.seek(start).duration(chunk.range.len());
        }
        let cmd = cmd
            .input(&input)
            .args(&[
                "-vf",
                &format!("fps={}", self.config.fps),
                "-q:v",
                &self.config.jpeg_quality.to_string(),
            ])
            .output(chunk_dir.join("frame_%04d.jpg"));

        let command = cmd.command_line();
        debug!("Decoding chunk {}: {}", chunk.index, command);
        let decoded = cmd.execute();
        match &decoded {
            Ok(output) => log.record(
                "decode",
                &command,
                Ok(String::from_utf8_lossy(&output.stderr).trim().to_string()),
            ),
            Err(e) => log.record("decode", &command, Err(e.to_string())),
        }

        if downloaded {
            if let Err(e) = fs::remove_file(&input) {
                warn!("Failed to remove segment {}: {}", input.display(), e);
            }
        }
        decoded.map_err(|e| KillfeedError::Decode(e.to_string()))?;

        let frames = list_frames(chunk_dir)?;
        if frames.is_empty() {
            return Err(KillfeedError::Decode(format!(
                "no frames decoded into {}",
                chunk_dir.display()
            )));
        }
        Ok(frames)
    }
}

impl FrameSource for ChunkFrameExtractor {
    fn extract(&self, chunk: &Chunk, work: &WorkArea) -> Result<Vec<PathBuf>> {
        let chunk_dir = work.chunk_dir(chunk);
        let stale = purge_dir(&chunk_dir)?;
        if stale > 0 {
            info!("🔄 Removed {} stale files in {}", stale, chunk_dir.display());
        }

        let start = to_hhmmss(chunk.range.start);
        let end = to_hhmmss(chunk.range.end);
        let mut log = AcquisitionLog::new(chunk, &start, &end);

        let result = self.acquire_and_decode(chunk, &chunk_dir, &start, &end, &mut log);

        log.finish(&result);
        let log_path = work.log_path(chunk);
        if let Err(e) = log.write(&log_path) {
            warn!("Failed to write acquisition log {}: {}", log_path.display(), e);
        }

        result
    }
}

/// Reject missing, empty, or non-video downloads
pub fn validate_segment(path: &Path) -> Result<()> {
    let len = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    if len == 0 {
        return Err(KillfeedError::EmptyMedia(format!(
            "{} is missing or empty",
            path.display()
        )));
    }

    match infer::get_from_path(path)? {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Video => Ok(()),
        Some(kind) => Err(KillfeedError::EmptyMedia(format!(
            "{} is {}, not a video container",
            path.display(),
            kind.mime_type()
        ))),
        None => Err(KillfeedError::EmptyMedia(format!(
            "{} has an unrecognized container",
            path.display()
        ))),
    }
}

/// `frame_*.jpg` files in `dir`, ascending; index in the result is the local offset.
pub fn list_frames(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut frames: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            name.starts_with("frame_") && name.ends_with(".jpg")
        })
        .collect();
    frames.sort();
    Ok(frames)
}

/// Decode one frame file into RGB
pub fn load_frame(chunk_index: usize, local_offset: u64, path: &Path) -> Result<Frame> {
    let image = image::open(path)
        .map_err(|e| KillfeedError::FrameRead {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
        .to_rgb8();

    Ok(Frame {
        chunk_index,
        local_offset,
        image,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::TimeRange;
    use tempfile::TempDir;

    struct FailingSource;

    impl SegmentSource for FailingSource {
        fn fetch_segment(
            &self,
            _locator: &str,
            _start: &str,
            _end: &str,
            _dest_dir: &Path,
            log: &mut AcquisitionLog,
        ) -> Result<PathBuf> {
            log.record("probe", "yt-dlp --skip-download", Err("HTTP Error 403".to_string()));
            Err(KillfeedError::SourceUnavailable("HTTP Error 403".to_string()))
        }
    }

    /// Writes a text file where a video should be
    struct BogusSource;

    impl SegmentSource for BogusSource {
        fn fetch_segment(
            &self,
            _locator: &str,
            _start: &str,
            _end: &str,
            dest_dir: &Path,
            _log: &mut AcquisitionLog,
        ) -> Result<PathBuf> {
            let path = dest_dir.join("temp_video.mp4");
            fs::write(&path, b"<html>rate limited</html>")?;
            Ok(path)
        }
    }

    fn chunk() -> Chunk {
        Chunk {
            index: 1,
            range: TimeRange { start: 60, end: 120 },
        }
    }

    fn source() -> VideoSource {
        VideoSource {
            locator: "https://www.youtube.com/watch?v=example".to_string(),
            local_media: None,
        }
    }

    #[test]
    fn test_source_failure_is_logged_and_stale_frames_purged() {
        let tmp = TempDir::new().unwrap();
        let work = WorkArea::new(tmp.path());
        let dir = work.chunk_dir(&chunk());
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("frame_0001.jpg"), b"stale").unwrap();

        let extractor =
            ChunkFrameExtractor::new(source(), Arc::new(FailingSource), VideoConfig::default());
        let err = extractor.extract(&chunk(), &work).unwrap_err();
        assert!(matches!(err, KillfeedError::SourceUnavailable(_)));
        assert_eq!(fs::read_dir(&dir).unwrap().count(), 0);

        let log: AcquisitionLog =
            serde_json::from_slice(&fs::read(work.log_path(&chunk())).unwrap()).unwrap();
        assert!(!log.success);
        assert_eq!(log.start, "00:01:00");
        assert_eq!(log.end, "00:02:00");
        assert_eq!(log.steps[0].diagnostics, "HTTP Error 403");
        assert!(log.error.unwrap().contains("403"));
        assert!(log.finished_at.is_some());
    }

    #[test]
    fn test_non_video_download_is_empty_media() {
        let tmp = TempDir::new().unwrap();
        let work = WorkArea::new(tmp.path());
        let extractor =
            ChunkFrameExtractor::new(source(), Arc::new(BogusSource), VideoConfig::default());
        let err = extractor.extract(&chunk(), &work).unwrap_err();
        assert!(matches!(err, KillfeedError::EmptyMedia(_)));
    }

    #[test]
    fn test_missing_local_media() {
        let tmp = TempDir::new().unwrap();
        let work = WorkArea::new(tmp.path());
        let local = VideoSource {
            local_media: Some(tmp.path().join("missing.mp4")),
            ..source()
        };
        let extractor = ChunkFrameExtractor::new(local, Arc::new(FailingSource), VideoConfig::default());
        let err = extractor.extract(&chunk(), &work).unwrap_err();
        assert!(matches!(err, KillfeedError::SourceUnavailable(_)));
    }

    #[test]
    fn test_validate_segment() {
        let tmp = TempDir::new().unwrap();
        let empty = tmp.path().join("empty.mp4");
        fs::write(&empty, b"").unwrap();
        assert!(matches!(validate_segment(&empty), Err(KillfeedError::EmptyMedia(_))));
        assert!(matches!(
            validate_segment(&tmp.path().join("absent.mp4")),
            Err(KillfeedError::EmptyMedia(_))
        ));

        let mp4 = tmp.path().join("ok.mp4");
        let mut header = vec![0x00, 0x00, 0x00, 0x18];
        header.extend_from_slice(b"ftypisom\x00\x00\x02\x00isomiso2");
        fs::write(&mp4, &header).unwrap();
        assert!(validate_segment(&mp4).is_ok());
    }

    #[test]
    fn test_list_frames_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        for name in ["frame_0003.jpg", "frame_0001.jpg", "temp_video.mp4", "frame_0002.jpg", "notes.txt"] {
            fs::write(tmp.path().join(name), b"x").unwrap();
        }
        let frames = list_frames(tmp.path()).unwrap();
        let names: Vec<_> = frames
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["frame_0001.jpg", "frame_0002.jpg", "frame_0003.jpg"]);
    }

    #[test]
    fn test_load_frame() {
        let tmp = TempDir::new().unwrap();
        let good = tmp.path().join("frame_0001.png");
        RgbImage::new(16, 9).save(&good).unwrap();
        let frame = load_frame(0, 0, &good).unwrap();
        assert_eq!(frame.image.dimensions(), (16, 9));

        let bad = tmp.path().join("frame_0002.jpg");
        fs::write(&bad, b"not a jpeg").unwrap();
        assert!(matches!(
            load_frame(0, 1, &bad),
            Err(KillfeedError::FrameRead { .. })
        ));
    }
}

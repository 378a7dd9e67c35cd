//! Run configuration

use crate::detector::DetectorConfig;
use crate::error::{KillfeedError, Result};
use crate::ocr::OcrConfig;
use crate::partition::TimeRange;
use crate::sink::MatchInfo;
use crate::timecode::to_seconds;
use crate::video::{VideoConfig, VideoSource};
use crate::ytdlp::DEFAULT_FORMAT;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What happens to chunk frame directories once the run is over.
/// Acquisition logs are always kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum CleanupPolicy {
    Always,
    /// Keep frames when persistence fails, for inspection or a retry
    #[default]
    KeepOnFailure,
    Never,
}

impl CleanupPolicy {
    pub fn should_clean(&self, persisted: bool) -> bool {
        match self {
            CleanupPolicy::Always => true,
            CleanupPolicy::KeepOnFailure => persisted,
            CleanupPolicy::Never => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    #[serde(rename = "match")]
    pub match_info: MatchInfo,
    pub source: VideoSource,
    /// Window start, `HH:MM:SS`
    pub start_time: String,
    /// Window end (exclusive), `HH:MM:SS`
    pub end_time: String,
    pub chunk_size: u64,
    pub max_workers: usize,
    /// Parent of the per-match working directory
    pub output_root: PathBuf,
    /// JSON-lines file matches are appended to
    pub sink_path: PathBuf,
    pub cleanup: CleanupPolicy,
    pub chunk_deadline_secs: Option<u64>,
    pub yt_dlp_cmd: PathBuf,
    /// yt-dlp `-f` selector
    pub yt_dlp_format: String,
    pub video: VideoConfig,
    pub ocr: OcrConfig,
    pub detector: DetectorConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            match_info: MatchInfo {
                tournament_name: "BGIS 2025".to_string(),
                match_info: "SF-W2-D4".to_string(),
                map: "Myanmar".to_string(),
                match_number: 22,
                date_of_match: NaiveDate::from_ymd_opt(2025, 4, 6).unwrap_or_default(),
            },
            source: VideoSource {
                locator: String::new(),
                local_media: None,
            },
            start_time: "02:39:00".to_string(),
            end_time: "03:10:00".to_string(),
            chunk_size: 60,
            max_workers: 5,
            output_root: PathBuf::from("."),
            sink_path: PathBuf::from("kills.jsonl"),
            cleanup: CleanupPolicy::default(),
            chunk_deadline_secs: None,
            yt_dlp_cmd: PathBuf::from("yt-dlp"),
            yt_dlp_format: DEFAULT_FORMAT.to_string(),
            video: VideoConfig::default(),
            ocr: OcrConfig::default(),
            detector: DetectorConfig::default(),
        }
    }
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        serde_json::from_str(&text)
            .map_err(|e| KillfeedError::InvalidConfig(format!("{}: {}", path.display(), e)))
    }

    /// Check everything that must hold before any work starts; returns the window.
    pub fn validate(&self) -> Result<TimeRange> {
        let range = TimeRange::new(to_seconds(&self.start_time)?, to_seconds(&self.end_time)?)?;
        if self.chunk_size == 0 {
            return Err(KillfeedError::InvalidRange(
                "chunk size must be positive".to_string(),
            ));
        }
        if self.max_workers == 0 {
            return Err(KillfeedError::InvalidConfig(
                "max_workers must be positive".to_string(),
            ));
        }
        if self.video.fps == 0 {
            return Err(KillfeedError::InvalidConfig("fps must be positive".to_string()));
        }
        if self.source.locator.trim().is_empty() && self.source.local_media.is_none() {
            return Err(KillfeedError::InvalidConfig(
                "a video locator or local media file is required".to_string(),
            ));
        }
        let region = &self.detector.region;
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if ![region.top, region.bottom, region.left, region.right]
            .into_iter()
            .all(in_unit)
            || region.top >= region.bottom
            || region.left >= region.right
        {
            return Err(KillfeedError::InvalidConfig(format!(
                "candidate region {:?} is not a fractional rectangle",
                region
            )));
        }
        Ok(range)
    }

    /// `<output_root>/<tournament>_<match_info>_<match_number>`
    pub fn work_dir(&self) -> PathBuf {
        self.output_root.join(format!(
            "{}_{}_{}",
            self.match_info.tournament_name, self.match_info.match_info, self.match_info.match_number
        ))
    }

    pub fn chunk_deadline(&self) -> Option<Duration> {
        self.chunk_deadline_secs.map(Duration::from_secs)
    }
}

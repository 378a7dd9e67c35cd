//! End-to-end run: partition, schedule, aggregate, persist, clean up.

use crate::aggregate::{aggregate, Aggregate, RunSummary};
use crate::config::RunConfig;
use crate::detector::{KillEvent, KillFeedDetector};
use crate::error::Result;
use crate::metrics::{MetricsSnapshot, RunMetrics};
use crate::ocr::{SpanRecognizer, TesseractProbe, TesseractSpanRecognizer, TextProbe};
use crate::orchestrator::{CancelFlag, ChunkProcessor};
use crate::partition::partition;
use crate::scheduler::{Scheduler, SchedulerConfig};
use crate::sink::{JsonLinesSink, MatchId, MatchSink};
use crate::timecode::to_hhmmss;
use crate::video::{ChunkFrameExtractor, FrameSource};
use crate::workarea::WorkArea;
use crate::ytdlp::YtDlpSource;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Everything a finished run reports
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub summary: RunSummary,
    pub events: Vec<KillEvent>,
    /// `None` when there was nothing to persist
    pub match_id: Option<MatchId>,
    pub work_dir: PathBuf,
    pub cleaned_chunk_dirs: usize,
    pub metrics: MetricsSnapshot,
}

pub struct Pipeline {
    config: RunConfig,
    frames: Arc<dyn FrameSource>,
    probe: Arc<dyn TextProbe>,
    recognizer: Arc<dyn SpanRecognizer>,
    sink: Arc<dyn MatchSink>,
    cancel: CancelFlag,
    metrics: Arc<RunMetrics>,
}

impl Pipeline {
    pub fn new(
        config: RunConfig,
        frames: Arc<dyn FrameSource>,
        probe: Arc<dyn TextProbe>,
        recognizer: Arc<dyn SpanRecognizer>,
        sink: Arc<dyn MatchSink>,
    ) -> Self {
        Self {
            config,
            frames,
            probe,
            recognizer,
            sink,
            cancel: CancelFlag::new(),
            metrics: RunMetrics::new(),
        }
    }

    /// yt-dlp + FFmpeg frames, Tesseract OCR, JSON-lines persistence
    pub fn from_config(config: RunConfig) -> Self {
        let segments = Arc::new(
            YtDlpSource::new(&config.yt_dlp_cmd).with_format(config.yt_dlp_format.clone()),
        );
        let frames = Arc::new(ChunkFrameExtractor::new(
            config.source.clone(),
            segments,
            config.video.clone(),
        ));
        let probe = Arc::new(TesseractProbe::new(config.ocr.clone()));
        let recognizer = Arc::new(TesseractSpanRecognizer::new(config.ocr.clone()));
        let sink = Arc::new(JsonLinesSink::new(&config.sink_path));
        Self::new(config, frames, probe, recognizer, sink)
    }

    /// Raising this flag stops every chunk at its next frame boundary
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Configuration and persistence errors are the only fatal ones; chunk
    /// failures are reported in the summary.
    pub async fn run(&self) -> Result<RunReport> {
        let range = self.config.validate()?;
        let chunks = partition(range, self.config.chunk_size)?;
        let work = WorkArea::new(self.config.work_dir());
        work.create()?;

        let match_info = &self.config.match_info;
        info!(
            "🎮 {} {} match {} on {}: {} to {} in {} chunks",
            match_info.tournament_name,
            match_info.match_info,
            match_info.match_number,
            match_info.map,
            to_hhmmss(range.start),
            to_hhmmss(range.end),
            chunks.len()
        );
        info!("   Work dir: {}", work.root().display());

        let detector = Arc::new(KillFeedDetector::new(
            Arc::clone(&self.probe),
            Arc::clone(&self.recognizer),
            self.config.detector.clone(),
        ));
        let processor = ChunkProcessor::new(
            Arc::clone(&self.frames),
            detector,
            work.clone(),
            Arc::clone(&self.metrics),
        )
        .with_cancel(self.cancel.clone())
        .with_deadline(self.config.chunk_deadline());

        let scheduler = Scheduler::new(
            Arc::new(processor),
            Arc::clone(&self.metrics),
            SchedulerConfig {
                max_workers: self.config.max_workers,
            },
        );
        let outcomes = scheduler.run(chunks.clone()).await;
        let Aggregate { events, summary } = aggregate(outcomes);

        let persisted = if self.cancel.is_cancelled() {
            warn!("⚠️ Run cancelled, not persisting {} partial kills", events.len());
            Ok(None)
        } else if events.is_empty() {
            warn!("⚠️ No kills extracted, nothing to persist");
            Ok(None)
        } else {
            self.sink.persist(match_info, &events).await.map(Some)
        };

        let cleaned_chunk_dirs = if self.config.cleanup.should_clean(persisted.is_ok()) {
            info!("🧹 Removing chunk frames");
            let area = work.clone();
            let all = chunks;
            tokio::task::spawn_blocking(move || area.remove_chunk_dirs(&all))
                .await
                .unwrap_or_else(|e| {
                    warn!("Cleanup task failed: {}", e);
                    0
                })
        } else {
            info!("Keeping chunk frames in {}", work.root().display());
            0
        };

        info!("📊 {}", summary);
        let metrics = self.metrics.snapshot();
        info!(
            "   Frames: {} scanned, {} passed gate ({:.1}%), {} unreadable, {} errored",
            metrics.frames.scanned,
            metrics.frames.gate_passed,
            metrics.frames.gate_pass_rate * 100.0,
            metrics.frames.unreadable,
            metrics.frames.errored
        );

        let match_id = persisted?;
        Ok(RunReport {
            summary,
            events,
            match_id,
            work_dir: work.root().to_path_buf(),
            cleaned_chunk_dirs,
            metrics,
        })
    }
}

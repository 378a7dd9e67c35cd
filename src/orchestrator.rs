//! Per-chunk processing: extract, gate, extract names, timestamp.

use crate::detector::{Detection, KillEvent, KillFeedDetector};
use crate::error::ChunkError;
use crate::metrics::RunMetrics;
use crate::partition::Chunk;
use crate::timecode::to_hhmmss;
use crate::video::{load_frame, FrameSource};
use crate::workarea::WorkArea;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Cooperative cancellation shared by every worker of a run
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Processor for individual chunks. Sequential within a chunk.
pub struct ChunkProcessor {
    frames: Arc<dyn FrameSource>,
    detector: Arc<KillFeedDetector>,
    work: WorkArea,
    metrics: Arc<RunMetrics>,
    cancel: CancelFlag,
    deadline: Option<Duration>,
}

impl ChunkProcessor {
    pub fn new(
        frames: Arc<dyn FrameSource>,
        detector: Arc<KillFeedDetector>,
        work: WorkArea,
        metrics: Arc<RunMetrics>,
    ) -> Self {
        Self {
            frames,
            detector,
            work,
            metrics,
            cancel: CancelFlag::new(),
            deadline: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Give up on a chunk that is still scanning frames after `deadline`
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Process a single chunk. Frame-level failures are logged and skipped;
    /// only extraction failure, cancellation or the deadline fail the chunk.
    pub fn process_chunk(&self, chunk: &Chunk) -> Result<Vec<KillEvent>, ChunkError> {
        if self.cancel.is_cancelled() {
            return Err(ChunkError::Cancelled);
        }
        let started = Instant::now();

        info!(
            "⏳ Processing chunk {}: {} to {}",
            chunk.index,
            to_hhmmss(chunk.range.start),
            to_hhmmss(chunk.range.end)
        );

        let paths = self
            .frames
            .extract(chunk, &self.work)
            .map_err(ChunkError::Extraction)?;

        let mut events = Vec::new();
        for (offset, path) in paths.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(ChunkError::Cancelled);
            }
            if let Some(limit) = self.deadline {
                if started.elapsed() > limit {
                    return Err(ChunkError::DeadlineExceeded(limit.as_secs()));
                }
            }

            let offset = offset as u64;
            // fps filters may emit one frame past the window; it belongs to the next chunk
            if offset >= chunk.range.len() {
                debug!("Ignoring {} past end of chunk {}", path.display(), chunk.index);
                continue;
            }
            let absolute_second = chunk.range.start + offset;

            let frame = match load_frame(chunk.index, offset, path) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Skipping unreadable frame: {}", e);
                    self.metrics.record_unreadable_frame();
                    continue;
                }
            };

            match self.detector.detect(&frame, absolute_second) {
                Ok(detection) => {
                    self.metrics.record_detection(&detection);
                    if let Detection::Kill(event) = detection {
                        debug!(
                            "Kill at {}: {} -> {}",
                            to_hhmmss(event.absolute_second),
                            event.eliminator,
                            event.eliminated
                        );
                        events.push(event);
                    }
                }
                Err(e) => {
                    warn!("❌ Error processing frame {}: {}", path.display(), e);
                    self.metrics.record_frame_error();
                }
            }
        }

        info!(
            "✓ Chunk {} done: {} frames, {} kills",
            chunk.index,
            paths.len(),
            events.len()
        );
        Ok(events)
    }
}

//! Run counters for killfeed

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::detector::Detection;

/// Counters shared by every chunk worker of a run
pub struct RunMetrics {
    pub chunks_succeeded: AtomicU64,
    pub chunks_failed: AtomicU64,
    pub total_chunk_ms: AtomicU64,

    // Per-frame counters
    pub frames_scanned: AtomicU64,
    pub frames_unreadable: AtomicU64,
    pub frames_errored: AtomicU64,
    pub gate_rejected: AtomicU64,
    pub gate_passed: AtomicU64,
    pub events_found: AtomicU64,
}

impl RunMetrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record_chunk(&self, success: bool, latency_ms: u64) {
        if success {
            self.chunks_succeeded.fetch_add(1, Ordering::Relaxed);
        } else {
            self.chunks_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.total_chunk_ms.fetch_add(latency_ms, Ordering::Relaxed);
    }

    pub fn record_detection(&self, detection: &Detection) {
        self.frames_scanned.fetch_add(1, Ordering::Relaxed);
        match detection {
            Detection::GateRejected => self.gate_rejected.fetch_add(1, Ordering::Relaxed),
            Detection::NoNamePair { .. } => self.gate_passed.fetch_add(1, Ordering::Relaxed),
            Detection::Kill(_) => {
                self.gate_passed.fetch_add(1, Ordering::Relaxed);
                self.events_found.fetch_add(1, Ordering::Relaxed)
            }
        };
    }

    pub fn record_unreadable_frame(&self) {
        self.frames_scanned.fetch_add(1, Ordering::Relaxed);
        self.frames_unreadable.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_error(&self) {
        self.frames_scanned.fetch_add(1, Ordering::Relaxed);
        self.frames_errored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let succeeded = self.chunks_succeeded.load(Ordering::Relaxed);
        let failed = self.chunks_failed.load(Ordering::Relaxed);
        let total = succeeded + failed;
        let total_ms = self.total_chunk_ms.load(Ordering::Relaxed);
        let passed = self.gate_passed.load(Ordering::Relaxed);
        let rejected = self.gate_rejected.load(Ordering::Relaxed);

        MetricsSnapshot {
            chunks_succeeded: succeeded,
            chunks_failed: failed,
            avg_chunk_ms: if total > 0 { total_ms / total } else { 0 },
            frames: FrameMetrics {
                scanned: self.frames_scanned.load(Ordering::Relaxed),
                unreadable: self.frames_unreadable.load(Ordering::Relaxed),
                errored: self.frames_errored.load(Ordering::Relaxed),
                gate_rejected: rejected,
                gate_passed: passed,
                gate_pass_rate: if passed + rejected > 0 {
                    passed as f64 / (passed + rejected) as f64
                } else {
                    0.0
                },
            },
            events_found: self.events_found.load(Ordering::Relaxed),
        }
    }
}

impl Default for RunMetrics {
    fn default() -> Self {
        Self {
            chunks_succeeded: AtomicU64::new(0),
            chunks_failed: AtomicU64::new(0),
            total_chunk_ms: AtomicU64::new(0),
            frames_scanned: AtomicU64::new(0),
            frames_unreadable: AtomicU64::new(0),
            frames_errored: AtomicU64::new(0),
            gate_rejected: AtomicU64::new(0),
            gate_passed: AtomicU64::new(0),
            events_found: AtomicU64::new(0),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub chunks_succeeded: u64,
    pub chunks_failed: u64,
    pub avg_chunk_ms: u64,
    pub frames: FrameMetrics,
    pub events_found: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMetrics {
    pub scanned: u64,
    pub unreadable: u64,
    pub errored: u64,
    pub gate_rejected: u64,
    pub gate_passed: u64,
    pub gate_pass_rate: f64,
}

/// Timer for tracking chunk latency
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

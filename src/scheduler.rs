//! Bounded-concurrency chunk scheduler
//!
//! Every chunk is submitted up front; a semaphore caps how many run at once.
//! Chunk work is blocking (subprocesses, image decoding) so it runs on the
//! blocking pool. Outcomes are collected in completion order, and a panic in
//! one chunk is captured as that chunk's failure.

use crate::detector::KillEvent;
use crate::error::ChunkError;
use crate::metrics::{RunMetrics, Timer};
use crate::orchestrator::ChunkProcessor;
use crate::partition::Chunk;
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub max_workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { max_workers: 5 }
    }
}

/// What one chunk produced
#[derive(Debug)]
pub struct ChunkOutcome {
    pub chunk: Chunk,
    pub result: Result<Vec<KillEvent>, ChunkError>,
    pub elapsed_ms: u64,
}

pub struct Scheduler {
    processor: Arc<ChunkProcessor>,
    metrics: Arc<RunMetrics>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        processor: Arc<ChunkProcessor>,
        metrics: Arc<RunMetrics>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            processor,
            metrics,
            config,
        }
    }

    /// Run every chunk and return one outcome per chunk, in completion order.
    pub async fn run(&self, chunks: Vec<Chunk>) -> Vec<ChunkOutcome> {
        let workers = self.config.max_workers.max(1);
        let semaphore = Arc::new(Semaphore::new(workers));
        let total = chunks.len();
        info!("🚀 Scheduling {} chunks on {} workers", total, workers);

        let mut tasks = JoinSet::new();
        for chunk in chunks.iter().copied() {
            let processor = Arc::clone(&self.processor);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return ChunkOutcome {
                            chunk,
                            result: Err(ChunkError::Cancelled),
                            elapsed_ms: 0,
                        }
                    }
                };

                let timer = Timer::new();
                let result =
                    match tokio::task::spawn_blocking(move || processor.process_chunk(&chunk)).await
                    {
                        Ok(result) => result,
                        Err(e) if e.is_panic() => {
                            Err(ChunkError::Panicked(panic_message(e.into_panic())))
                        }
                        Err(e) => Err(ChunkError::Panicked(e.to_string())),
                    };

                ChunkOutcome {
                    chunk,
                    result,
                    elapsed_ms: timer.elapsed_ms(),
                }
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Chunk task aborted: {}", e);
                    continue;
                }
            };

            match &outcome.result {
                Ok(events) => {
                    info!(
                        "✅ Chunk {} finished in {}ms ({} kills) [{}/{}]",
                        outcome.chunk.index,
                        outcome.elapsed_ms,
                        events.len(),
                        outcomes.len() + 1,
                        total
                    );
                }
                Err(e) => {
                    warn!(
                        "❌ Chunk {} failed after {}ms: {} [{}/{}]",
                        outcome.chunk.index,
                        outcome.elapsed_ms,
                        e,
                        outcomes.len() + 1,
                        total
                    );
                }
            }
            self.metrics
                .record_chunk(outcome.result.is_ok(), outcome.elapsed_ms);
            outcomes.push(outcome);
        }

        for _ in 0..fill_missing(&chunks, &mut outcomes) {
            self.metrics.record_chunk(false, 0);
        }
        outcomes
    }
}

/// Record a failed outcome for every chunk whose task died without reporting.
/// Returns how many were missing.
fn fill_missing(chunks: &[Chunk], outcomes: &mut Vec<ChunkOutcome>) -> usize {
    let reported: HashSet<usize> = outcomes.iter().map(|o| o.chunk.index).collect();
    let missing: Vec<Chunk> = chunks
        .iter()
        .filter(|c| !reported.contains(&c.index))
        .copied()
        .collect();

    for chunk in &missing {
        error!("❌ Chunk {} never reported", chunk.index);
        outcomes.push(ChunkOutcome {
            chunk: *chunk,
            result: Err(ChunkError::Panicked("chunk task aborted".to_string())),
            elapsed_ms: 0,
        });
    }
    missing.len()
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

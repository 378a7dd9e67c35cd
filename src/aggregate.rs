//! Merge chunk outcomes into one time-ordered event list

use crate::detector::KillEvent;
use crate::partition::TimeRange;
use crate::scheduler::ChunkOutcome;
use crate::timecode::to_hhmmss;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub range: TimeRange,
    pub reason: String,
}

/// Per-run accounting of chunk outcomes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_chunks: usize,
    pub chunks_succeeded: usize,
    pub failures: Vec<ChunkFailure>,
    pub events_found: usize,
}

impl RunSummary {
    pub fn chunks_failed(&self) -> usize {
        self.failures.len()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} chunks: {} succeeded, {} failed, {} kills",
            self.total_chunks,
            self.chunks_succeeded,
            self.chunks_failed(),
            self.events_found
        )?;
        for failure in &self.failures {
            write!(
                f,
                "\n  chunk {} [{} - {}]: {}",
                failure.chunk_index,
                to_hhmmss(failure.range.start),
                to_hhmmss(failure.range.end),
                failure.reason
            )?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct Aggregate {
    pub events: Vec<KillEvent>,
    pub summary: RunSummary,
}

/// Concatenate events in arrival order, then stable-sort by absolute second.
/// Events sharing a second keep their arrival order.
pub fn aggregate(outcomes: Vec<ChunkOutcome>) -> Aggregate {
    let mut summary = RunSummary {
        total_chunks: outcomes.len(),
        ..Default::default()
    };
    let mut events = Vec::new();

    for outcome in outcomes {
        match outcome.result {
            Ok(chunk_events) => {
                summary.chunks_succeeded += 1;
                events.extend(chunk_events);
            }
            Err(e) => summary.failures.push(ChunkFailure {
                chunk_index: outcome.chunk.index,
                range: outcome.chunk.range,
                reason: e.to_string(),
            }),
        }
    }

    events.sort_by_key(|e| e.absolute_second);
    summary.failures.sort_by_key(|f| f.chunk_index);
    summary.events_found = events.len();

    Aggregate { events, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ChunkError, KillfeedError};
    use crate::partition::Chunk;
    use std::path::PathBuf;

    fn event(name: &str, second: u64) -> KillEvent {
        KillEvent {
            eliminator: name.to_string(),
            eliminated: format!("{}_victim", name),
            raw_ocr_text: String::new(),
            absolute_second: second,
            source_frame: PathBuf::from(format!("frame_{}.jpg", second)),
            method: "Unknown".to_string(),
        }
    }

    fn outcome(index: usize, result: Result<Vec<KillEvent>, ChunkError>) -> ChunkOutcome {
        ChunkOutcome {
            chunk: Chunk {
                index,
                range: TimeRange {
                    start: index as u64 * 60,
                    end: index as u64 * 60 + 60,
                },
            },
            result,
            elapsed_ms: 10,
        }
    }

    #[test]
    fn test_events_sorted_regardless_of_completion_order() {
        let outcomes = vec![
            outcome(2, Ok(vec![event("c", 130), event("d", 125)])),
            outcome(0, Ok(vec![event("a", 5)])),
            outcome(1, Ok(vec![])),
        ];
        let agg = aggregate(outcomes);
        let seconds: Vec<u64> = agg.events.iter().map(|e| e.absolute_second).collect();
        assert_eq!(seconds, vec![5, 125, 130]);
        assert_eq!(agg.summary.events_found, 3);
        assert_eq!(agg.summary.chunks_succeeded, 3);
    }

    #[test]
    fn test_ties_keep_arrival_order() {
        let outcomes = vec![
            outcome(0, Ok(vec![event("first", 30), event("second", 30)])),
            outcome(1, Ok(vec![event("third", 30)])),
        ];
        let names: Vec<String> = aggregate(outcomes)
            .events
            .into_iter()
            .map(|e| e.eliminator)
            .collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_failed_chunks_contribute_nothing() {
        let outcomes = vec![
            outcome(1, Err(ChunkError::Extraction(KillfeedError::EmptyMedia(
                "zero bytes".to_string(),
            )))),
            outcome(0, Ok(vec![event("a", 10)])),
            outcome(2, Err(ChunkError::Panicked("boom".to_string()))),
        ];
        let agg = aggregate(outcomes);

        assert_eq!(agg.events.len(), 1);
        assert_eq!(agg.summary.total_chunks, 3);
        assert_eq!(agg.summary.chunks_failed(), 2);
        assert_eq!(agg.summary.failures[0].chunk_index, 1);
        assert!(agg.summary.failures[0].reason.contains("zero bytes"));

        let text = agg.summary.to_string();
        assert!(text.starts_with("3 chunks: 1 succeeded, 2 failed, 1 kills"));
        assert!(text.contains("chunk 2 [00:02:00 - 00:03:00]: worker panicked: boom"));
    }

    #[test]
    fn test_empty_run() {
        let agg = aggregate(Vec::new());
        assert!(agg.events.is_empty());
        assert_eq!(agg.summary, RunSummary::default());
    }
}

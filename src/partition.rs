//! Time range partitioning into fixed-size chunks

use crate::error::{KillfeedError, Result};
use serde::{Deserialize, Serialize};

/// Half-open `[start, end)` interval in match seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: u64,
    pub end: u64,
}

impl TimeRange {
    pub fn new(start: u64, end: u64) -> Result<Self> {
        if end <= start {
            return Err(KillfeedError::InvalidRange(format!(
                "end ({}) must be greater than start ({})",
                end, start
            )));
        }
        Ok(Self { start, end })
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub index: usize,
    pub range: TimeRange,
}

impl Chunk {
    /// Directory name of the chunk's working area
    pub fn dir_name(&self) -> String {
        format!("chunk_{:03}", self.index)
    }
}

/// Split `range` into contiguous chunks of `chunk_size` seconds. The last chunk may be shorter.
pub fn partition(range: TimeRange, chunk_size: u64) -> Result<Vec<Chunk>> {
    if range.is_empty() {
        return Err(KillfeedError::InvalidRange(format!(
            "empty range [{}, {})",
            range.start, range.end
        )));
    }
    if chunk_size == 0 {
        return Err(KillfeedError::InvalidRange(
            "chunk size must be positive".to_string(),
        ));
    }

    let mut chunks = Vec::new();
    let mut start = range.start;
    while start < range.end {
        let end = start.saturating_add(chunk_size).min(range.end);
        chunks.push(Chunk {
            index: chunks.len(),
            range: TimeRange { start, end },
        });
        start = end;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds(chunks: &[Chunk]) -> Vec<(u64, u64)> {
        chunks.iter().map(|c| (c.range.start, c.range.end)).collect()
    }

    #[test]
    fn test_even_split() {
        let chunks = partition(TimeRange::new(0, 180).unwrap(), 60).unwrap();
        assert_eq!(bounds(&chunks), vec![(0, 60), (60, 120), (120, 180)]);
        assert_eq!(chunks.iter().map(|c| c.index).collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_short_last_chunk() {
        let chunks = partition(TimeRange::new(0, 100).unwrap(), 60).unwrap();
        assert_eq!(bounds(&chunks), vec![(0, 60), (60, 100)]);
    }

    #[test]
    fn test_coverage_is_exact() {
        for (start, end, size) in [(9540, 11400, 60), (5, 6, 1), (0, 1000, 7), (13, 14, 500)] {
            let chunks = partition(TimeRange::new(start, end).unwrap(), size).unwrap();
            assert_eq!(chunks.first().unwrap().range.start, start);
            assert_eq!(chunks.last().unwrap().range.end, end);
            for pair in chunks.windows(2) {
                assert_eq!(pair[0].range.end, pair[1].range.start);
            }
            let total: u64 = chunks.iter().map(|c| c.range.len()).sum();
            assert_eq!(total, end - start);
        }
    }

    #[test]
    fn test_huge_chunk_size_is_one_chunk() {
        let chunks = partition(TimeRange::new(10, 100).unwrap(), u64::MAX).unwrap();
        assert_eq!(bounds(&chunks), vec![(10, 100)]);

        let top = TimeRange::new(u64::MAX - 5, u64::MAX).unwrap();
        let chunks = partition(top, u64::MAX - 1).unwrap();
        assert_eq!(bounds(&chunks), vec![(u64::MAX - 5, u64::MAX)]);
        assert_eq!(chunks[0].range.len(), 5);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(TimeRange::new(60, 60), Err(KillfeedError::InvalidRange(_))));
        assert!(matches!(TimeRange::new(60, 10), Err(KillfeedError::InvalidRange(_))));
        let range = TimeRange::new(0, 60).unwrap();
        assert!(matches!(partition(range, 0), Err(KillfeedError::InvalidRange(_))));
        let empty = TimeRange { start: 10, end: 10 };
        assert!(matches!(partition(empty, 5), Err(KillfeedError::InvalidRange(_))));
    }

    #[test]
    fn test_dir_name() {
        let chunk = Chunk { index: 7, range: TimeRange { start: 0, end: 1 } };
        assert_eq!(chunk.dir_name(), "chunk_007");
    }
}

//! Per-run working directory layout
//!
//! ```text
//! <root>/
//!   chunk_000/frame_0001.jpg ...   frames, owned by one chunk
//!   logs/chunk_000.json            acquisition log, kept after cleanup
//! ```

use crate::error::Result;
use crate::partition::Chunk;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct WorkArea {
    root: PathBuf,
}

impl WorkArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn create(&self) -> Result<()> {
        fs::create_dir_all(self.log_dir())?;
        Ok(())
    }

    pub fn chunk_dir(&self, chunk: &Chunk) -> PathBuf {
        self.root.join(chunk.dir_name())
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn log_path(&self, chunk: &Chunk) -> PathBuf {
        self.log_dir().join(format!("{}.json", chunk.dir_name()))
    }

    /// Delete every chunk directory in parallel. Returns how many were removed.
    pub fn remove_chunk_dirs(&self, chunks: &[Chunk]) -> usize {
        chunks
            .par_iter()
            .map(|chunk| self.chunk_dir(chunk))
            .filter(|dir| dir.exists())
            .map(|dir| match fs::remove_dir_all(&dir) {
                Ok(()) => {
                    debug!("Removed {}", dir.display());
                    1
                }
                Err(e) => {
                    warn!("Failed to remove {}: {}", dir.display(), e);
                    0
                }
            })
            .sum()
    }
}

/// Empty `dir` of anything left by a previous run, creating it if needed.
pub fn purge_dir(dir: &Path) -> Result<usize> {
    let mut removed = 0;
    if dir.exists() {
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
            removed += 1;
        }
    }
    fs::create_dir_all(dir)?;
    Ok(removed)
}

//! Match persistence
//!
//! A sink stores one match (metadata plus its kill rows) and hands back an id.
//! [`JsonLinesSink`] appends one JSON document per match to a file.

use crate::detector::KillEvent;
use crate::error::{KillfeedError, Result};
use crate::timecode::to_hhmmss;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Tournament metadata attached to every persisted match
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub tournament_name: String,
    pub match_info: String,
    pub map: String,
    pub match_number: u32,
    pub date_of_match: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchId(pub String);

impl fmt::Display for MatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kill row as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillRow {
    pub player: String,
    pub finished_player: String,
    pub kill_method: String,
    pub ocr_text: String,
    pub kill_timestamp: String,
}

impl From<&KillEvent> for KillRow {
    fn from(event: &KillEvent) -> Self {
        Self {
            player: event.eliminator.clone(),
            finished_player: event.eliminated.clone(),
            kill_method: event.method.clone(),
            ocr_text: event.raw_ocr_text.clone(),
            kill_timestamp: to_hhmmss(event.absolute_second),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub match_id: MatchId,
    pub recorded_at: DateTime<Utc>,
    #[serde(flatten)]
    pub info: MatchInfo,
    pub kills: Vec<KillRow>,
}

#[async_trait]
pub trait MatchSink: Send + Sync {
    async fn persist(&self, info: &MatchInfo, events: &[KillEvent]) -> Result<MatchId>;
}

pub struct JsonLinesSink {
    path: PathBuf,
}

impl JsonLinesSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MatchSink for JsonLinesSink {
    async fn persist(&self, info: &MatchInfo, events: &[KillEvent]) -> Result<MatchId> {
        let recorded_at = Utc::now();
        let match_id = MatchId(format!(
            "{}-{}",
            info.match_number,
            recorded_at.format("%Y%m%dT%H%M%S%3f")
        ));
        let record = MatchRecord {
            match_id: match_id.clone(),
            recorded_at,
            info: info.clone(),
            kills: events.iter().map(KillRow::from).collect(),
        };

        let mut line = serde_json::to_string(&record)
            .map_err(|e| KillfeedError::Persistence(e.to_string()))?;
        line.push('\n');

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| KillfeedError::Persistence(format!("{}: {}", parent.display(), e)))?;
            }
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| KillfeedError::Persistence(format!("{}: {}", self.path.display(), e)))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| KillfeedError::Persistence(e.to_string()))?;
        file.flush()
            .await
            .map_err(|e| KillfeedError::Persistence(e.to_string()))?;

        info!(
            "💾 Saved match {} with {} kills to {}",
            match_id,
            record.kills.len(),
            self.path.display()
        );
        Ok(match_id)
    }
}

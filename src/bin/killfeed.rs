// killfeed - extract kill events from a match broadcast and persist them

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use killfeed::{CleanupPolicy, MatchInfo, Pipeline, RunConfig, VideoSource};

#[derive(Parser)]
#[command(name = "killfeed", version, about = "Kill feed OCR for esports broadcasts")]
struct Args {
    /// Load the whole run configuration from a JSON file; other flags are ignored
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "BGIS 2025")]
    tournament_name: String,

    #[arg(long, default_value = "SF-W2-D4")]
    match_info: String,

    #[arg(long, default_value = "Myanmar")]
    map: String,

    #[arg(long, default_value_t = 22)]
    match_number: u32,

    /// Match date, YYYY-MM-DD
    #[arg(long, default_value = "2025-04-06")]
    date_of_match: NaiveDate,

    /// Broadcast URL handed to yt-dlp
    #[arg(long, default_value = "")]
    yt_url: String,

    /// Local copy of the broadcast; skips yt-dlp
    #[arg(long)]
    local_media: Option<PathBuf>,

    /// Window start, HH:MM:SS
    #[arg(long, default_value = "02:39:00")]
    start_time: String,

    /// Window end, HH:MM:SS
    #[arg(long, default_value = "03:10:00")]
    end_time: String,

    /// Chunk length in seconds
    #[arg(long, default_value_t = 60)]
    chunk_size: u64,

    #[arg(long, default_value_t = 5)]
    max_workers: usize,

    /// Give up on a chunk after this many seconds
    #[arg(long)]
    chunk_deadline: Option<u64>,

    #[arg(long, default_value = ".")]
    output_root: PathBuf,

    /// JSON-lines file matches are appended to
    #[arg(long, default_value = "kills.jsonl")]
    sink_path: PathBuf,

    #[arg(long, value_enum, default_value_t = CleanupPolicy::KeepOnFailure)]
    cleanup: CleanupPolicy,

    #[arg(long, default_value = "ffmpeg")]
    ffmpeg_cmd: PathBuf,

    #[arg(long, default_value = "yt-dlp")]
    ytdlp_cmd: PathBuf,

    /// yt-dlp format selector
    #[arg(long, default_value = killfeed::ytdlp::DEFAULT_FORMAT)]
    ytdlp_format: String,

    #[arg(long, default_value = "tesseract")]
    tesseract_cmd: PathBuf,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Args {
    fn into_config(self) -> RunConfig {
        let mut config = RunConfig {
            match_info: MatchInfo {
                tournament_name: self.tournament_name,
                match_info: self.match_info,
                map: self.map,
                match_number: self.match_number,
                date_of_match: self.date_of_match,
            },
            source: VideoSource {
                locator: self.yt_url,
                local_media: self.local_media,
            },
            start_time: self.start_time,
            end_time: self.end_time,
            chunk_size: self.chunk_size,
            max_workers: self.max_workers,
            output_root: self.output_root,
            sink_path: self.sink_path,
            cleanup: self.cleanup,
            chunk_deadline_secs: self.chunk_deadline,
            yt_dlp_cmd: self.ytdlp_cmd,
            yt_dlp_format: self.ytdlp_format,
            ..Default::default()
        };
        config.video.ffmpeg_cmd = self.ffmpeg_cmd;
        config.ocr.tesseract_cmd = self.tesseract_cmd;
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let args = Args::parse();
    let print_json = args.json;

    let config = match args.config.clone() {
        Some(path) => RunConfig::from_json_file(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => args.into_config(),
    };

    info!("🎬 Starting killfeed");
    let pipeline = Pipeline::from_config(config);

    let cancel = pipeline.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after current frames");
            cancel.cancel();
        }
    });

    let report = pipeline.run().await.context("Kill extraction failed")?;

    match &report.match_id {
        Some(id) => info!("✅ Saved match {} with {} kills", id, report.events.len()),
        None => info!("No match saved"),
    }

    if print_json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
        println!("{}", json);
    }

    Ok(())
}

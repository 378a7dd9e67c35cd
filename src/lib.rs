//! killfeed - kill feed extraction from esports broadcasts
//!
//! Splits a match window into chunks, samples one frame per second from each
//! chunk, and runs two-stage OCR over the kill feed region: a cheap probe on a
//! binarized crop gates a precise recognizer that must find exactly two player
//! names. Events are merged into one time-ordered list and persisted per match.
//! Media tools (`yt-dlp`, `ffmpeg`, `tesseract`) are invoked as subprocesses.

pub mod aggregate;
pub mod config;
pub mod detector;
pub mod error;
pub mod ffmpeg;
pub mod metrics;
pub mod ocr;
pub mod orchestrator;
pub mod partition;
pub mod pipeline;
pub mod region;
pub mod scheduler;
pub mod sink;
pub mod timecode;
pub mod video;
pub mod workarea;
pub mod ytdlp;

pub use aggregate::{aggregate, Aggregate, ChunkFailure, RunSummary};
pub use config::{CleanupPolicy, RunConfig};
pub use detector::{Detection, DetectorConfig, KillEvent, KillFeedDetector};
pub use error::{ChunkError, KillfeedError, Result};
pub use ffmpeg::{FfmpegCommand, FfmpegError};
pub use ocr::{OcrConfig, SpanRecognizer, TesseractProbe, TesseractSpanRecognizer, TextProbe, TextSpan};
pub use orchestrator::{CancelFlag, ChunkProcessor};
pub use partition::{partition, Chunk, TimeRange};
pub use pipeline::{Pipeline, RunReport};
pub use scheduler::{ChunkOutcome, Scheduler, SchedulerConfig};
pub use sink::{JsonLinesSink, MatchId, MatchInfo, MatchSink};
pub use video::{ChunkFrameExtractor, Frame, FrameSource, VideoConfig, VideoSource};
pub use workarea::WorkArea;
pub use ytdlp::{SegmentSource, YtDlpSource};

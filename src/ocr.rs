//! OCR collaborators
//!
//! Two recognizers back the kill feed detector:
//!
//! - [`TextProbe`]: fast, plain-text pass used as a gate on the binarized region
//! - [`SpanRecognizer`]: slower pass returning `(text, confidence)` spans
//!
//! Both ship with a Tesseract implementation that shells out to the `tesseract`
//! binary and feeds the image as PNG on stdin. Handles are created once per
//! process and shared behind `Arc`.

use crate::error::{KillfeedError, Result};
use image::{GrayImage, ImageBuffer, ImageFormat, Pixel, PixelWithColorType, RgbImage};
use serde::{Deserialize, Serialize};
use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::debug;

/// A recognized text span with confidence in `[0, 1]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub confidence: f32,
}

impl TextSpan {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
        }
    }
}

/// Cheap text-presence probe
pub trait TextProbe: Send + Sync {
    fn read_text(&self, region: &GrayImage) -> Result<String>;
}

/// High-accuracy recognizer returning spans in reading order
pub trait SpanRecognizer: Send + Sync {
    fn recognize(&self, region: &RgbImage) -> Result<Vec<TextSpan>>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub tesseract_cmd: PathBuf,
    pub language: String,
    /// Run orientation/script detection before recognition on the precise pass
    pub orientation_correction: bool,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            tesseract_cmd: PathBuf::from("tesseract"),
            language: "eng".to_string(),
            orientation_correction: true,
        }
    }
}

/// `tesseract stdin stdout` on the cleaned binary region
pub struct TesseractProbe {
    config: OcrConfig,
}

impl TesseractProbe {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }
}

impl TextProbe for TesseractProbe {
    fn read_text(&self, region: &GrayImage) -> Result<String> {
        let png = encode_png(region)?;
        let stdout = run_tesseract(&self.config, "6", &[], &png)?;
        Ok(stdout)
    }
}

/// `tesseract stdin stdout tsv`, word rows grouped into line spans
pub struct TesseractSpanRecognizer {
    config: OcrConfig,
}

impl TesseractSpanRecognizer {
    pub fn new(config: OcrConfig) -> Self {
        Self { config }
    }
}

impl SpanRecognizer for TesseractSpanRecognizer {
    fn recognize(&self, region: &RgbImage) -> Result<Vec<TextSpan>> {
        let png = encode_png(region)?;
        // PSM 1 = automatic segmentation with OSD, 3 = automatic without it
        let psm = if self.config.orientation_correction { "1" } else { "3" };
        let tsv = run_tesseract(&self.config, psm, &["tsv"], &png)?;
        Ok(parse_tsv_lines(&tsv))
    }
}

/// Group Tesseract TSV word rows (level 5) into one span per text line.
/// Line confidence is the mean word confidence scaled to `[0, 1]`.
pub fn parse_tsv_lines(tsv: &str) -> Vec<TextSpan> {
    let mut spans: Vec<TextSpan> = Vec::new();
    let mut current_key: Option<(u32, u32, u32, u32)> = None;
    let mut words: Vec<&str> = Vec::new();
    let mut confs: Vec<f32> = Vec::new();

    let mut flush = |words: &mut Vec<&str>, confs: &mut Vec<f32>| {
        if !words.is_empty() {
            let mean = confs.iter().sum::<f32>() / confs.len() as f32;
            spans.push(TextSpan::new(words.join(" "), (mean / 100.0).clamp(0.0, 1.0)));
        }
        words.clear();
        confs.clear();
    };

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }
        let num = |i: usize| cols[i].trim().parse::<u32>().unwrap_or(0);
        let key = (num(1), num(2), num(3), num(4));
        let conf: f32 = cols[10].trim().parse().unwrap_or(-1.0);
        let text = cols[11].trim();
        if conf < 0.0 || text.is_empty() {
            continue;
        }

        if current_key != Some(key) {
            flush(&mut words, &mut confs);
            current_key = Some(key);
        }
        words.push(text);
        confs.push(conf);
    }
    flush(&mut words, &mut confs);

    spans
}

fn encode_png<P>(img: &ImageBuffer<P, Vec<P::Subpixel>>) -> Result<Vec<u8>>
where
    P: Pixel + PixelWithColorType,
    [P::Subpixel]: image::EncodableLayout,
{
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| KillfeedError::Ocr(format!("Failed to encode region: {}", e)))?;
    Ok(buf.into_inner())
}

fn run_tesseract(config: &OcrConfig, psm: &str, extra: &[&str], png: &[u8]) -> Result<String> {
    let mut child = Command::new(&config.tesseract_cmd)
        .args(["stdin", "stdout", "-l", config.language.as_str(), "--psm", psm])
        .args(extra)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| {
            KillfeedError::Ocr(format!(
                "Failed to start {}: {}",
                config.tesseract_cmd.display(),
                e
            ))
        })?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(png)?;
    }

    let output = child.wait_with_output()?;
    if !output.status.success() {
        return Err(KillfeedError::Ocr(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    debug!("tesseract psm={} returned {} bytes", psm, text.len());
    Ok(text)
}

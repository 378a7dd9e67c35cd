//! Candidate region crop and binarization

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use serde::{Deserialize, Serialize};

/// Fractional crop of a frame where the kill feed is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandidateRegion {
    pub top: f64,
    pub bottom: f64,
    pub left: f64,
    pub right: f64,
}

impl Default for CandidateRegion {
    fn default() -> Self {
        Self {
            top: 0.32,
            bottom: 0.38,
            left: 0.0,
            right: 0.3,
        }
    }
}

/// Pixel rectangle inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl CandidateRegion {
    /// Pixel bounds for a frame of the given size (fractions are floored, like slice indices).
    pub fn bounds(&self, frame_width: u32, frame_height: u32) -> PixelBounds {
        let edge = |dim: u32, frac: f64| ((dim as f64 * frac.clamp(0.0, 1.0)).floor() as u32).min(dim);
        let y0 = edge(frame_height, self.top);
        let y1 = edge(frame_height, self.bottom).max(y0);
        let x0 = edge(frame_width, self.left);
        let x1 = edge(frame_width, self.right).max(x0);

        PixelBounds {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    /// Crop the region out of a frame. `None` when the frame is too small to contain it.
    pub fn crop(&self, frame: &RgbImage) -> Option<RgbImage> {
        let b = self.bounds(frame.width(), frame.height());
        if b.width == 0 || b.height == 0 {
            return None;
        }
        Some(image::imageops::crop_imm(frame, b.x, b.y, b.width, b.height).to_image())
    }
}

/// Binarization and noise suppression applied before the cheap OCR pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinarizeConfig {
    pub threshold: u8,
    /// Structuring element (width, height) of the morphological opening
    pub kernel: (u32, u32),
}

impl Default for BinarizeConfig {
    fn default() -> Self {
        Self {
            threshold: 180,
            kernel: (1, 2),
        }
    }
}

/// Single-channel intensity using BT.601 weights.
pub fn to_intensity(region: &RgbImage) -> GrayImage {
    ImageBuffer::from_fn(region.width(), region.height(), |x, y| {
        let [r, g, b] = region.get_pixel(x, y).0;
        let v = 0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32;
        Luma([v.round().clamp(0.0, 255.0) as u8])
    })
}

/// Pixels strictly above `threshold` become white, everything else black.
pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    ImageBuffer::from_fn(gray.width(), gray.height(), |x, y| {
        if gray.get_pixel(x, y).0[0] > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Morphological opening with a rectangular element anchored at its center.
/// Dilation uses the reflected element so the opening never shifts strokes.
pub fn open(binary: &GrayImage, kernel: (u32, u32)) -> GrayImage {
    let eroded = morph(binary, kernel, false, u8::min, u8::MAX);
    morph(&eroded, kernel, true, u8::max, u8::MIN)
}

/// Full gate preprocessing: intensity, threshold, opening.
pub fn clean_for_probe(region: &RgbImage, config: &BinarizeConfig) -> GrayImage {
    let gray = to_intensity(region);
    let binary = binarize(&gray, config.threshold);
    open(&binary, config.kernel)
}

fn morph(
    src: &GrayImage,
    kernel: (u32, u32),
    reflect: bool,
    pick: fn(u8, u8) -> u8,
    identity: u8,
) -> GrayImage {
    let (kw, kh) = (kernel.0.max(1) as i64, kernel.1.max(1) as i64);
    let (ax, ay) = (kw / 2, kh / 2);
    let (w, h) = (src.width() as i64, src.height() as i64);

    ImageBuffer::from_fn(src.width(), src.height(), |x, y| {
        let mut acc = identity;
        for j in 0..kh {
            let dy = if reflect { ay - j } else { j - ay };
            let sy = y as i64 + dy;
            if sy < 0 || sy >= h {
                continue;
            }
            for i in 0..kw {
                let dx = if reflect { ax - i } else { i - ax };
                let sx = x as i64 + dx;
                if sx < 0 || sx >= w {
                    continue;
                }
                acc = pick(acc, src.get_pixel(sx as u32, sy as u32).0[0]);
            }
        }
        Luma([acc])
    })
}

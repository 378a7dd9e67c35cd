//! Kill feed detection on a single frame
//!
//! Detection is a probe/commit pair: the cropped region is binarized and run
//! through the cheap [`TextProbe`]; only regions whose cleaned probe text is
//! long enough are handed to the expensive [`SpanRecognizer`], which must
//! return exactly two confident name spans.

use crate::error::Result;
use crate::ocr::{SpanRecognizer, TextProbe, TextSpan};
use crate::region::{clean_for_probe, BinarizeConfig, CandidateRegion};
use crate::video::Frame;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// One recognized elimination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KillEvent {
    pub eliminator: String,
    pub eliminated: String,
    /// Surviving span texts joined by the configured separator
    pub raw_ocr_text: String,
    pub absolute_second: u64,
    pub source_frame: PathBuf,
    /// Weapon or method; OCR never recovers it
    pub method: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub region: CandidateRegion,
    pub binarize: BinarizeConfig,
    /// Cleaned probe text shorter than this rejects the frame
    pub gate_min_chars: usize,
    pub min_confidence: f32,
    /// Span text must be strictly longer than this
    pub min_name_chars: usize,
    pub separator: String,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            region: CandidateRegion::default(),
            binarize: BinarizeConfig::default(),
            gate_min_chars: 5,
            min_confidence: 0.5,
            min_name_chars: 6,
            separator: " | ".to_string(),
        }
    }
}

/// Outcome of running detection on one frame
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// Cheap probe saw no plausible text; the precise recognizer did not run
    GateRejected,
    /// Precise recognizer ran but did not produce exactly two names
    NoNamePair { qualifying_spans: usize },
    Kill(KillEvent),
}

pub struct KillFeedDetector {
    probe: Arc<dyn TextProbe>,
    recognizer: Arc<dyn SpanRecognizer>,
    config: DetectorConfig,
}

impl KillFeedDetector {
    pub fn new(
        probe: Arc<dyn TextProbe>,
        recognizer: Arc<dyn SpanRecognizer>,
        config: DetectorConfig,
    ) -> Self {
        Self {
            probe,
            recognizer,
            config,
        }
    }

    /// Run gate then name-pair extraction. `absolute_second` is the frame's match time.
    pub fn detect(&self, frame: &Frame, absolute_second: u64) -> Result<Detection> {
        let Some(region) = self.config.region.crop(&frame.image) else {
            return Ok(Detection::GateRejected);
        };

        let cleaned = clean_for_probe(&region, &self.config.binarize);
        let probe_text = self.probe.read_text(&cleaned)?;
        if !passes_gate(&probe_text, self.config.gate_min_chars) {
            return Ok(Detection::GateRejected);
        }

        let spans = self.recognizer.recognize(&region)?;
        let names = qualifying_names(&spans, &self.config);
        debug!(
            "frame {} at {}s: {} of {} spans qualify",
            frame.local_offset,
            absolute_second,
            names.len(),
            spans.len()
        );

        match names.as_slice() {
            [eliminator, eliminated] => Ok(Detection::Kill(KillEvent {
                eliminator: eliminator.clone(),
                eliminated: eliminated.clone(),
                raw_ocr_text: names.join(&self.config.separator),
                absolute_second,
                source_frame: frame.path.clone(),
                method: "unknown".to_string(),
            })),
            _ => Ok(Detection::NoNamePair {
                qualifying_spans: names.len(),
            }),
        }
    }
}

/// Keep ASCII only, blank out anything that is not a word character or whitespace, trim.
pub fn clean_probe_text(raw: &str) -> String {
    raw.chars()
        .filter(char::is_ascii)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .trim()
        .to_string()
}

pub fn passes_gate(probe_text: &str, min_chars: usize) -> bool {
    if probe_text.trim().is_empty() {
        return false;
    }
    clean_probe_text(probe_text).chars().count() >= min_chars
}

/// Trimmed texts of spans meeting the confidence and length thresholds, in recognizer order.
pub fn qualifying_names(spans: &[TextSpan], config: &DetectorConfig) -> Vec<String> {
    spans
        .iter()
        .filter(|s| s.confidence >= config.min_confidence)
        .map(|s| s.text.trim())
        .filter(|t| t.chars().count() > config.min_name_chars)
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::KillfeedError;
    use image::{GrayImage, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedProbe(&'static str);

    impl TextProbe for FixedProbe {
        fn read_text(&self, _region: &GrayImage) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct CountingRecognizer {
        spans: Vec<TextSpan>,
        calls: AtomicUsize,
    }

    impl CountingRecognizer {
        fn new(spans: Vec<TextSpan>) -> Arc<Self> {
            Arc::new(Self {
                spans,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl SpanRecognizer for CountingRecognizer {
        fn recognize(&self, _region: &RgbImage) -> Result<Vec<TextSpan>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.spans.clone())
        }
    }

    struct FailingRecognizer;

    impl SpanRecognizer for FailingRecognizer {
        fn recognize(&self, _region: &RgbImage) -> Result<Vec<TextSpan>> {
            Err(KillfeedError::Ocr("model crashed".to_string()))
        }
    }

    fn frame() -> Frame {
        Frame {
            chunk_index: 2,
            local_offset: 5,
            image: RgbImage::from_pixel(320, 180, Rgb([20, 20, 20])),
            path: PathBuf::from("chunk_002/frame_0006.jpg"),
        }
    }

    fn detector(probe: &'static str, recognizer: Arc<dyn SpanRecognizer>) -> KillFeedDetector {
        KillFeedDetector::new(Arc::new(FixedProbe(probe)), recognizer, DetectorConfig::default())
    }

    #[test]
    fn test_clean_probe_text() {
        assert_eq!(clean_probe_text("  Viper™ knocked—out Ghost!\n"), "Viper knockedout Ghost");
        assert_eq!(clean_probe_text("§§§"), "");
        assert_eq!(clean_probe_text("a_b-c"), "a_b c");
    }

    #[test]
    fn test_gate_threshold() {
        assert!(!passes_gate("", 5));
        assert!(!passes_gate("   \n", 5));
        assert!(!passes_gate("ab!c", 5));
        assert!(!passes_gate("é€abcd", 5));
        assert!(passes_gate("abcde", 5));
        assert!(passes_gate("ab cd", 5));
    }

    #[test]
    fn test_qualifying_names_filters() {
        let config = DetectorConfig::default();
        let spans = vec![
            TextSpan::new("  TeamXViper  ", 0.93),
            TextSpan::new("Short", 0.99),
            TextSpan::new("1234567", 0.5),
            TextSpan::new("LowConfidence", 0.49),
            TextSpan::new("sixsix", 0.9),
        ];
        assert_eq!(qualifying_names(&spans, &config), vec!["TeamXViper", "1234567"]);
    }

    #[test]
    fn test_two_spans_yield_event() {
        let recognizer = CountingRecognizer::new(vec![
            TextSpan::new("GodLGhost", 0.91),
            TextSpan::new("noise", 0.99),
            TextSpan::new("SouLManya", 0.87),
        ]);
        let det = detector("GodLGhost knocked SouLManya", recognizer.clone());

        let detection = det.detect(&frame(), 125).unwrap();
        match detection {
            Detection::Kill(event) => {
                assert_eq!(event.eliminator, "GodLGhost");
                assert_eq!(event.eliminated, "SouLManya");
                assert_eq!(event.raw_ocr_text, "GodLGhost | SouLManya");
                assert_eq!(event.absolute_second, 125);
                assert_eq!(event.source_frame, PathBuf::from("chunk_002/frame_0006.jpg"));
                assert_eq!(event.method, "unknown");
            }
            other => panic!("expected kill, got {:?}", other),
        }
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_three_spans_yield_nothing() {
        let recognizer = CountingRecognizer::new(vec![
            TextSpan::new("PlayerOne", 0.9),
            TextSpan::new("PlayerTwo", 0.9),
            TextSpan::new("PlayerThree", 0.9),
        ]);
        let det = detector("PlayerOne PlayerTwo", recognizer);
        assert_eq!(
            det.detect(&frame(), 10).unwrap(),
            Detection::NoNamePair { qualifying_spans: 3 }
        );
    }

    #[test]
    fn test_one_span_yields_nothing() {
        let recognizer = CountingRecognizer::new(vec![TextSpan::new("PlayerOne", 0.9)]);
        let det = detector("PlayerOne", recognizer);
        assert_eq!(
            det.detect(&frame(), 10).unwrap(),
            Detection::NoNamePair { qualifying_spans: 1 }
        );
    }

    #[test]
    fn test_gate_rejection_skips_recognizer() {
        let recognizer = CountingRecognizer::new(vec![
            TextSpan::new("PlayerOne", 0.9),
            TextSpan::new("PlayerTwo", 0.9),
        ]);
        let det = detector("x!", recognizer.clone());
        assert_eq!(det.detect(&frame(), 10).unwrap(), Detection::GateRejected);
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_tiny_frame_is_rejected() {
        let recognizer = CountingRecognizer::new(vec![]);
        let det = detector("PlayerOne PlayerTwo", recognizer.clone());
        let mut tiny = frame();
        tiny.image = RgbImage::new(2, 2);
        assert_eq!(det.detect(&tiny, 0).unwrap(), Detection::GateRejected);
        assert_eq!(recognizer.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_recognizer_error_propagates() {
        let det = detector("PlayerOne PlayerTwo", Arc::new(FailingRecognizer));
        assert!(matches!(det.detect(&frame(), 0), Err(KillfeedError::Ocr(_))));
    }
}

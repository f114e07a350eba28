//! Guessing the encoding of a byte buffer
//!
//! Detection is deliberately shallow: byte order marks, UTF-8 validity and
//! the zero-byte pattern of UTF-16 text. Everything else is reported as the
//! detector's fallback encoding, normally the system encoding.

use serde::Serialize;

use crate::Classification;
use crate::catalog::FALLBACK_ENCODING;

/// Result of encoding detection with confidence score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionResult {
    /// Catalog name of the most likely encoding
    pub name: String,
    /// Classification of that encoding, unknown for a custom fallback
    pub classification: Option<Classification>,
    /// Length of the byte order mark to skip, 0 when there is none
    pub bom_len: usize,
    /// Confidence score (0.0 to 1.0)
    pub confidence: f64,
}

impl DetectionResult {
    fn unicode(classification: Classification, bom_len: usize, confidence: f64) -> Self {
        Self {
            name: classification_name(classification).to_string(),
            classification: Some(classification),
            bom_len,
            confidence,
        }
    }
}

fn classification_name(classification: Classification) -> &'static str {
    match classification {
        Classification::Utf8 => "UTF-8",
        Classification::Utf16Le => "UTF-16LE",
        Classification::Utf16Be => "UTF-16BE",
        Classification::Utf32Le => "UTF-32LE",
        Classification::Utf32Be => "UTF-32BE",
        _ => FALLBACK_ENCODING,
    }
}

/// BOMs in match order; UTF-32LE shares its first two bytes with UTF-16LE
const BOMS: [Classification; 5] = [
    Classification::Utf32Le,
    Classification::Utf32Be,
    Classification::Utf8,
    Classification::Utf16Le,
    Classification::Utf16Be,
];

/// Encoding detector using byte order marks and simple heuristics
#[derive(Debug, Clone)]
pub struct EncodingDetector {
    /// Maximum bytes to analyze for detection
    max_sample_size: usize,
    /// Name reported when nothing Unicode is recognised
    fallback: String,
}

impl Default for EncodingDetector {
    fn default() -> Self {
        Self {
            max_sample_size: 8192,
            fallback: FALLBACK_ENCODING.to_string(),
        }
    }
}

impl EncodingDetector {
    /// Create a new encoding detector
    pub fn new() -> Self {
        Self::default()
    }

    /// Create detector with custom sample size
    pub fn with_sample_size(mut self, max_sample_size: usize) -> Self {
        self.max_sample_size = max_sample_size;
        self
    }

    /// Report `name` when no Unicode form is recognised
    pub fn with_fallback(mut self, name: impl Into<String>) -> Self {
        self.fallback = name.into();
        self
    }

    /// Detect encoding of the given data
    pub fn detect(&self, data: &[u8]) -> DetectionResult {
        let truncated = data.len() > self.max_sample_size;
        let sample = &data[..data.len().min(self.max_sample_size)];

        if let Some(result) = detect_bom(sample) {
            return result;
        }

        if let Some(confidence) = detect_utf8(sample, truncated) {
            return DetectionResult::unicode(Classification::Utf8, 0, confidence);
        }

        if let Some((classification, confidence)) = detect_utf16(sample) {
            return DetectionResult::unicode(classification, 0, confidence);
        }

        DetectionResult {
            classification: None,
            name: self.fallback.clone(),
            bom_len: 0,
            confidence: 0.3,
        }
    }
}

/// Detect BOM (Byte Order Mark)
fn detect_bom(data: &[u8]) -> Option<DetectionResult> {
    BOMS.iter().find_map(|&classification| {
        let bom = classification.bom()?;
        data.starts_with(bom)
            .then(|| DetectionResult::unicode(classification, bom.len(), 1.0))
    })
}

/// Valid, NUL-free UTF-8; a sequence cut off by the sample limit still counts
fn detect_utf8(data: &[u8], truncated: bool) -> Option<f64> {
    if data.is_empty() || data.contains(&0) {
        return None;
    }
    let valid = match std::str::from_utf8(data) {
        Ok(text) => text,
        Err(e) if truncated && e.error_len().is_none() => {
            // Cannot fail: valid_up_to marks a char boundary
            std::str::from_utf8(&data[..e.valid_up_to()]).ok()?
        }
        Err(_) => return None,
    };

    let multibyte = valid.chars().filter(|c| !c.is_ascii()).count();
    if multibyte == 0 {
        // All ASCII, could be nearly anything
        return Some(0.5);
    }
    let ratio = multibyte as f64 / valid.chars().count() as f64;
    Some((0.8 + ratio * 0.2).min(1.0))
}

/// Detect UTF-16 from where the zero bytes of Latin text fall
fn detect_utf16(data: &[u8]) -> Option<(Classification, f64)> {
    if data.len() < 2 {
        return None;
    }

    let units = data.len() / 2;
    let mut even_zeros = 0usize;
    let mut odd_zeros = 0usize;
    for chunk in data.chunks_exact(2) {
        if chunk[0] == 0 && chunk[1] != 0 {
            even_zeros += 1;
        } else if chunk[1] == 0 && chunk[0] != 0 {
            odd_zeros += 1;
        }
    }

    let le = odd_zeros as f64 / units as f64;
    let be = even_zeros as f64 / units as f64;
    if le > 0.3 && le > be * 4.0 {
        Some((Classification::Utf16Le, (0.5 + le * 0.4).min(0.9)))
    } else if be > 0.3 && be > le * 4.0 {
        Some((Classification::Utf16Be, (0.5 + be * 0.4).min(0.9)))
    } else {
        None
    }
}

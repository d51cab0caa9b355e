//! Pure screenshot-comparison primitive for visual regression gating.
//!
//! Given a freshly captured candidate image and an accepted baseline of the
//! same dimensions, [`compare`] classifies each pixel as matching or
//! differing under a fixed per-channel tolerance and renders a verdict
//! against a maximum tolerated ratio of differing pixels. The comparison is
//! a pure function over two buffers and a threshold: no I/O, no shared
//! state, safe to run from any number of threads at once.

pub mod diff_overlay;

use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Raw RGBA8 image data with dimensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RgbaImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RgbaImageData {
    /// Constructs an image buffer, without validating the pixel length.
    /// Validation happens at comparison time.
    #[must_use]
    pub const fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Total number of pixels in the grid.
    #[must_use]
    pub const fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Converts to an [`image::RgbaImage`] for encoding.
    ///
    /// Returns `None` if the buffer length does not match the dimensions.
    #[must_use]
    pub fn into_rgba_image(self) -> Option<image::RgbaImage> {
        image::RgbaImage::from_raw(self.width, self.height, self.pixels)
    }
}

impl From<image::RgbaImage> for RgbaImageData {
    fn from(img: image::RgbaImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            pixels: img.into_raw(),
        }
    }
}

/// Hard comparison failures. A candidate that merely differs too much is a
/// [`Verdict::Fail`], not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompareError {
    /// Baseline and candidate dimensions differ; reported as (width, height).
    DimensionMismatch {
        baseline: (u32, u32),
        candidate: (u32, u32),
    },
    /// Zero-size image or a pixel buffer of the wrong length.
    InvalidImage(String),
    /// No baseline stored for the requested (test, screenshot) key.
    BaselineMissing(String),
}

impl Display for CompareError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DimensionMismatch {
                baseline,
                candidate,
            } => write!(
                formatter,
                "dimension mismatch: baseline {}x{}, candidate {}x{}",
                baseline.0, baseline.1, candidate.0, candidate.1
            ),
            Self::InvalidImage(message) => write!(formatter, "invalid image: {message}"),
            Self::BaselineMissing(key) => write!(formatter, "baseline missing: {key}"),
        }
    }
}

impl std::error::Error for CompareError {}

/// Pass/fail verdict of a single comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Display for Verdict {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pass => write!(formatter, "PASS"),
            Self::Fail => write!(formatter, "FAIL"),
        }
    }
}

/// Metrics of a single comparison run. Transient: recomputed on every run,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonReport {
    pub total_pixels: u64,
    pub differing_pixels: u64,
    pub diff_ratio: f64,
    pub max_diff_pixel_ratio: f64,
    pub verdict: Verdict,
}

/// Per-channel absolute difference above which a channel counts as changed.
/// Absorbs sub-perceptual rendering jitter (anti-aliasing, color profile
/// rounding) without masking real changes.
const CHANNEL_TOLERANCE: u16 = 16;

/// Maximum summed RGB difference a matching pixel may accumulate.
const SUMMED_RGB_TOLERANCE: u32 = 32;

/// Compares a candidate capture against a baseline.
///
/// `max_diff_pixel_ratio` is the maximum tolerated fraction of differing
/// pixels, clamped into `[0, 1]`. The verdict is `Pass` iff the measured
/// ratio is at or below it.
///
/// # Errors
///
/// Returns [`CompareError::InvalidImage`] for zero-size images or buffers
/// whose length does not match the stated dimensions, and
/// [`CompareError::DimensionMismatch`] when the two images disagree on
/// width or height (always, regardless of pixel content).
pub fn compare(
    candidate: &RgbaImageData,
    baseline: &RgbaImageData,
    max_diff_pixel_ratio: f64,
) -> Result<ComparisonReport, CompareError> {
    validate_pair(candidate, baseline)?;

    let max_ratio = if max_diff_pixel_ratio.is_nan() {
        0.0
    } else {
        max_diff_pixel_ratio.clamp(0.0, 1.0)
    };

    let total_pixels = candidate.pixel_count();
    let mut differing_pixels = 0u64;

    for pixel_index in 0..total_pixels as usize {
        let offset = pixel_index * 4;
        if !pixels_match(&candidate.pixels, &baseline.pixels, offset) {
            differing_pixels += 1;
        }
    }

    let diff_ratio = (differing_pixels as f64) / (total_pixels as f64);
    let verdict = if diff_ratio <= max_ratio {
        Verdict::Pass
    } else {
        Verdict::Fail
    };

    Ok(ComparisonReport {
        total_pixels,
        differing_pixels,
        diff_ratio,
        max_diff_pixel_ratio: max_ratio,
        verdict,
    })
}

/// Shared input validation for [`compare`] and the diff overlay, so both
/// agree on which image pairs are acceptable.
pub(crate) fn validate_pair(
    candidate: &RgbaImageData,
    baseline: &RgbaImageData,
) -> Result<(), CompareError> {
    validate(candidate, "candidate")?;
    validate(baseline, "baseline")?;

    if candidate.width != baseline.width || candidate.height != baseline.height {
        return Err(CompareError::DimensionMismatch {
            baseline: (baseline.width, baseline.height),
            candidate: (candidate.width, candidate.height),
        });
    }
    Ok(())
}

fn validate(img: &RgbaImageData, role: &str) -> Result<(), CompareError> {
    if img.width == 0 || img.height == 0 {
        return Err(CompareError::InvalidImage(format!(
            "{role} image has zero size ({}x{})",
            img.width, img.height
        )));
    }
    let expected_len = img.pixel_count() * 4;
    if img.pixels.len() as u64 != expected_len {
        return Err(CompareError::InvalidImage(format!(
            "{role} buffer length {} does not match {}x{} RGBA ({expected_len} bytes)",
            img.pixels.len(),
            img.width,
            img.height
        )));
    }
    Ok(())
}

/// Compares one RGBA pixel with per-channel and summed-RGB tolerances.
///
/// Alpha participates in the per-channel check but not in the summed check:
/// a fully transparent region that changes color should still be caught by
/// the channel delta, while opaque content is judged on RGB drift.
pub(crate) fn pixels_match(pixel_a: &[u8], pixel_b: &[u8], offset: usize) -> bool {
    let mut summed_rgb_diff = 0u32;
    for channel_offset in 0..4 {
        let channel_a = pixel_a[offset + channel_offset];
        let channel_b = pixel_b[offset + channel_offset];
        let diff = (i16::from(channel_a) - i16::from(channel_b)).unsigned_abs();

        if diff > CHANNEL_TOLERANCE {
            return false;
        }
        if channel_offset < 3 {
            summed_rgb_diff += u32::from(diff);
        }
    }

    summed_rgb_diff <= SUMMED_RGB_TOLERANCE
}

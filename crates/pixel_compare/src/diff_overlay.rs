//! Visual diff overlay for failed comparisons.

use crate::{CompareError, RgbaImageData, pixels_match, validate_pair};

/// Renders a diff overlay of the differing pixels.
///
/// Differing pixels come out red, matching pixels black, so a glance at the
/// overlay shows where a regression landed. The overlay is returned as a
/// buffer; encoding and persisting it is the caller's concern.
///
/// # Errors
///
/// Same validation as [`crate::compare`]: `InvalidImage` for zero-size or
/// malformed buffers, `DimensionMismatch` when the images disagree on size.
pub fn diff_overlay(
    candidate: &RgbaImageData,
    baseline: &RgbaImageData,
) -> Result<RgbaImageData, CompareError> {
    validate_pair(candidate, baseline)?;

    let mut overlay = vec![0u8; candidate.pixels.len()];

    for pixel_index in 0..candidate.pixel_count() as usize {
        let offset = pixel_index * 4;
        let matches = pixels_match(&candidate.pixels, &baseline.pixels, offset);
        overlay[offset] = if matches { 0 } else { 255 };
        overlay[offset + 3] = 255;
    }

    Ok(RgbaImageData::new(candidate.width, candidate.height, overlay))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_marks_only_changed_pixels() -> Result<(), CompareError> {
        let base = RgbaImageData::new(2, 1, vec![0, 0, 0, 255, 0, 0, 0, 255]);
        let changed = RgbaImageData::new(2, 1, vec![0, 0, 0, 255, 255, 255, 255, 255]);

        let overlay = diff_overlay(&changed, &base)?;
        assert_eq!(overlay.width, 2);
        assert_eq!(overlay.height, 1);
        // First pixel matches: black. Second differs: red.
        assert_eq!(&overlay.pixels[0..4], &[0, 0, 0, 255]);
        assert_eq!(&overlay.pixels[4..8], &[255, 0, 0, 255]);
        Ok(())
    }

    #[test]
    fn overlay_rejects_mismatched_sizes() {
        let small = RgbaImageData::new(1, 1, vec![0, 0, 0, 255]);
        let wide = RgbaImageData::new(2, 1, vec![0u8; 8]);
        assert!(matches!(
            diff_overlay(&small, &wide),
            Err(CompareError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn overlay_rejects_malformed_buffers() {
        // Same acceptance rules as compare(): a truncated buffer is an
        // invalid image, not a partial overlay.
        let truncated = RgbaImageData::new(2, 1, vec![0u8; 5]);
        let full = RgbaImageData::new(2, 1, vec![0u8; 8]);
        assert!(matches!(
            diff_overlay(&full, &truncated),
            Err(CompareError::InvalidImage(_))
        ));
        assert!(matches!(
            diff_overlay(&truncated, &full),
            Err(CompareError::InvalidImage(_))
        ));
    }
}

//! Failure artifacts: when a check fails, the baseline, the candidate, and
//! a red-on-black diff overlay are written next to each other so the
//! regression can be inspected without re-running anything.

use anyhow::{Context as _, Result, anyhow};
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder as _};
use pixel_compare::diff_overlay::diff_overlay;
use pixel_compare::RgbaImageData;
use std::env;
use std::fs::{create_dir_all, read, write};
use std::path::{Path, PathBuf};

/// Writes bytes to a file only if the content has changed.
///
/// # Errors
///
/// Returns an error if file I/O fails.
fn write_bytes_if_changed(path: &Path, bytes: &[u8]) -> Result<bool> {
    if let Ok(existing) = read(path)
        && existing == bytes
    {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    write(path, bytes)?;
    Ok(true)
}

/// Encodes an RGBA buffer as PNG and writes it only if the content changed.
///
/// # Errors
///
/// Returns an error if the buffer is malformed or encoding or I/O fails.
pub fn write_png_rgba_if_changed(path: &Path, image: &RgbaImageData) -> Result<bool> {
    if image.pixels.len() as u64 != image.pixel_count() * 4 {
        return Err(anyhow!(
            "RGBA buffer length {} does not match {}x{}",
            image.pixels.len(),
            image.width,
            image.height
        ));
    }
    let mut buf = Vec::new();
    let encoder = PngEncoder::new(&mut buf);
    encoder.write_image(&image.pixels, image.width, image.height, ColorType::Rgba8.into())?;
    write_bytes_if_changed(path, &buf)
}

/// Default artifacts root: `target/vizreg/failing` under the workspace.
#[must_use]
pub fn default_artifacts_dir() -> PathBuf {
    let workspace_root =
        PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string()))
            .join("..")
            .join("..");
    workspace_root
        .join("target")
        .join("vizreg")
        .join("failing")
}

/// The three images a failed check leaves behind.
pub struct FailureArtifacts<'check> {
    pub test_name: &'check str,
    pub screenshot_name: &'check str,
    pub baseline: &'check RgbaImageData,
    pub candidate: &'check RgbaImageData,
}

impl FailureArtifacts<'_> {
    /// Writes `{name}.baseline.png`, `{name}.candidate.png`, and
    /// `{name}.diff.png` under `{root}/{test_name}/`.
    ///
    /// # Errors
    ///
    /// Returns an error if diff generation, encoding, or I/O fails.
    pub fn write(&self, artifacts_root: &Path) -> Result<PathBuf> {
        let dir = artifacts_root.join(self.test_name);
        create_dir_all(&dir)
            .with_context(|| format!("Failed to create artifacts dir {}", dir.display()))?;

        let stem = self
            .screenshot_name
            .strip_suffix(".png")
            .unwrap_or(self.screenshot_name);

        write_png_rgba_if_changed(&dir.join(format!("{stem}.baseline.png")), self.baseline)?;
        write_png_rgba_if_changed(&dir.join(format!("{stem}.candidate.png")), self.candidate)?;

        let overlay = diff_overlay(self.candidate, self.baseline)?;
        write_png_rgba_if_changed(&dir.join(format!("{stem}.diff.png")), &overlay)?;

        Ok(dir)
    }
}

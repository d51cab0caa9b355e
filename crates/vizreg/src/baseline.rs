//! File-backed baseline store keyed by (test name, screenshot name).
//!
//! One PNG per key under `{root}/{test_name}/{screenshot_name}`. The store
//! holds no mutable state, so concurrent reads during a test run are safe;
//! writes happen only through the explicit update/create paths of the gate.

use anyhow::{Context as _, Result, anyhow};
use image::load_from_memory;
use pixel_compare::RgbaImageData;
use std::fs::{create_dir_all, read};
use std::path::{Path, PathBuf};

use crate::artifacts::write_png_rgba_if_changed;

/// File-backed store of accepted baseline screenshots.
#[derive(Debug, Clone)]
pub struct BaselineStore {
    root: PathBuf,
}

impl BaselineStore {
    /// Creates a store rooted at `root`. The directory is created lazily on
    /// first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves the on-disk path for a key, enforcing that both components
    /// are plain names (no separators, no traversal).
    ///
    /// # Errors
    ///
    /// Returns an error for empty or path-like name components.
    pub fn entry_path(&self, test_name: &str, screenshot_name: &str) -> Result<PathBuf> {
        validate_component(test_name, "test name")?;
        validate_component(screenshot_name, "screenshot name")?;

        let file_name = if Path::new(screenshot_name)
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        {
            screenshot_name.to_string()
        } else {
            format!("{screenshot_name}.png")
        };
        Ok(self.root.join(test_name).join(file_name))
    }

    /// Fetches the baseline for a key, decoded to RGBA.
    ///
    /// Returns `Ok(None)` when no baseline exists (first run).
    ///
    /// # Errors
    ///
    /// Returns an error for invalid keys, unreadable files, or corrupt
    /// image data.
    pub fn get(&self, test_name: &str, screenshot_name: &str) -> Result<Option<RgbaImageData>> {
        let path = self.entry_path(test_name, screenshot_name)?;
        if !path.exists() {
            return Ok(None);
        }
        let bytes =
            read(&path).with_context(|| format!("Failed to read baseline {}", path.display()))?;
        let img = load_from_memory(&bytes)
            .with_context(|| format!("Corrupt baseline image {}", path.display()))?
            .to_rgba8();
        Ok(Some(img.into()))
    }

    /// Stores a baseline for a key, overwriting any previous one.
    ///
    /// Returns whether the file content actually changed.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid keys, malformed image buffers, or I/O
    /// failures.
    pub fn put(
        &self,
        test_name: &str,
        screenshot_name: &str,
        image: &RgbaImageData,
    ) -> Result<bool> {
        let path = self.entry_path(test_name, screenshot_name)?;
        if let Some(parent) = path.parent() {
            create_dir_all(parent)?;
        }
        write_png_rgba_if_changed(&path, image)
    }
}

fn validate_component(component: &str, role: &str) -> Result<()> {
    if component.is_empty() {
        return Err(anyhow!("Empty {role}"));
    }
    if component == "." || component == ".." {
        return Err(anyhow!("Path traversal in {role}: {component:?}"));
    }
    if component.contains(['/', '\\']) {
        return Err(anyhow!("Path separator in {role}: {component:?}"));
    }
    Ok(())
}

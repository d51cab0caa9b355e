//! Browser-side collaborators for visual regression checks: Chrome
//! discovery and lifecycle, page navigation, element visibility waiting,
//! and screenshot capture decoded to raw RGBA.
//!
//! Everything here is infrastructure around the pure comparator in
//! `pixel_compare`; errors are `anyhow` with context rather than a typed
//! taxonomy.

pub mod capture;
pub mod chrome;

use anyhow::{Result, anyhow};
use std::path::Path;
use url::Url;

/// Converts a local file path to a `file://` URL.
///
/// # Errors
///
/// Returns an error if the path cannot be expressed as a file URL.
pub fn to_file_url(path: &Path) -> Result<Url> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    Url::from_file_path(&canonical)
        .map_err(|()| anyhow!("Invalid file path for URL: {}", canonical.display()))
}

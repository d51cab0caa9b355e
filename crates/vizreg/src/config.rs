//! Runtime configuration for the visual regression gate.
//!
//! Configuration can be loaded from environment variables or constructed
//! programmatically; nothing here reads the environment after construction.

use crate::baseline::BaselineStore;
use crate::check::{CheckRequest, MissingBaselinePolicy};
use pixel_compare::RgbaImageData;
use std::env;
use std::path::PathBuf;
use url::Url;

/// Runtime configuration for visual regression runs.
#[derive(Clone, Debug)]
pub struct VizregConfig {
    /// Base URL test pages are resolved against, if any.
    pub base_url: Option<Url>,
    /// Root directory of the baseline store. `None` means the caller picks.
    pub baseline_dir: Option<PathBuf>,
    /// Overwrite stored baselines with fresh captures (the explicit
    /// "update baselines" action).
    pub update_baselines: bool,
    /// What to do when no baseline exists for a key.
    pub missing_baseline: MissingBaselinePolicy,
    /// Default maximum tolerated fraction of differing pixels.
    pub max_diff_pixel_ratio: f64,
    /// Viewport width in pixels.
    pub viewport_width: u32,
    /// Viewport height in pixels.
    pub viewport_height: u32,
}

impl Default for VizregConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            baseline_dir: None,
            update_baselines: false,
            missing_baseline: MissingBaselinePolicy::Fail,
            max_diff_pixel_ratio: 0.0,
            viewport_width: 1280,
            viewport_height: 720,
        }
    }
}

impl VizregConfig {
    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `VIZREG_BASE_URL`: base URL for page navigation
    /// - `VIZREG_BASELINE_DIR`: root directory of the baseline store
    /// - `VIZREG_UPDATE_BASELINES`: set to "1" to overwrite stored baselines
    /// - `VIZREG_MISSING_BASELINE`: "create" to auto-create absent baselines
    ///   (default: fail)
    /// - `VIZREG_MAX_DIFF_RATIO`: default diff-pixel ratio threshold
    ///   (default: 0.0)
    /// - `VIZREG_VIEWPORT_WIDTH` / `VIZREG_VIEWPORT_HEIGHT`: viewport size
    ///   (default: 1280x720)
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let base_url = env::var("VIZREG_BASE_URL")
            .ok()
            .and_then(|val| Url::parse(&val).ok());
        let baseline_dir = env::var("VIZREG_BASELINE_DIR").ok().map(PathBuf::from);
        let update_baselines = env::var("VIZREG_UPDATE_BASELINES").ok().as_deref() == Some("1");
        let missing_baseline =
            if env::var("VIZREG_MISSING_BASELINE").ok().as_deref() == Some("create") {
                MissingBaselinePolicy::Create
            } else {
                defaults.missing_baseline
            };
        let max_diff_pixel_ratio = env::var("VIZREG_MAX_DIFF_RATIO")
            .ok()
            .and_then(|val| val.parse::<f64>().ok())
            .map_or(defaults.max_diff_pixel_ratio, |ratio| {
                ratio.clamp(0.0, 1.0)
            });
        let viewport_width = env::var("VIZREG_VIEWPORT_WIDTH")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(defaults.viewport_width)
            .max(1);
        let viewport_height = env::var("VIZREG_VIEWPORT_HEIGHT")
            .ok()
            .and_then(|val| val.parse::<u32>().ok())
            .unwrap_or(defaults.viewport_height)
            .max(1);

        Self {
            base_url,
            baseline_dir,
            update_baselines,
            missing_baseline,
            max_diff_pixel_ratio,
            viewport_width,
            viewport_height,
        }
    }

    /// Builds a check request for one screenshot, carrying this
    /// configuration's threshold, missing-baseline policy, and update flag.
    #[must_use]
    pub fn check_request<'check>(
        &self,
        test_name: &'check str,
        screenshot_name: &'check str,
        candidate: &'check RgbaImageData,
    ) -> CheckRequest<'check> {
        CheckRequest {
            test_name,
            screenshot_name,
            candidate,
            max_diff_pixel_ratio: self.max_diff_pixel_ratio,
            missing_baseline: self.missing_baseline,
            update_baselines: self.update_baselines,
        }
    }

    /// Opens the baseline store at the configured directory, if one is set.
    #[must_use]
    pub fn baseline_store(&self) -> Option<BaselineStore> {
        self.baseline_dir
            .as_ref()
            .map(|dir| BaselineStore::new(dir.clone()))
    }

    /// Resolves a page path against the configured base URL, if one is set.
    #[must_use]
    pub fn page_url(&self, page: &str) -> Option<Url> {
        self.base_url
            .as_ref()
            .and_then(|base| base.join(page).ok())
    }
}

//! The gate operation: compare a captured screenshot against its stored
//! baseline and decide pass/fail.

use anyhow::{Error, Result};
use pixel_compare::{CompareError, ComparisonReport, RgbaImageData, Verdict, compare};
use std::path::{Path, PathBuf};

use crate::artifacts::FailureArtifacts;
use crate::baseline::BaselineStore;

/// What to do when no baseline exists for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingBaselinePolicy {
    /// Hard error: surface [`CompareError::BaselineMissing`].
    Fail,
    /// Accept the candidate as the new baseline and pass.
    Create,
}

/// One screenshot check against the baseline store.
pub struct CheckRequest<'check> {
    /// Logical test case the screenshot belongs to.
    pub test_name: &'check str,
    /// Screenshot name, unique within the test.
    pub screenshot_name: &'check str,
    /// The freshly captured image.
    pub candidate: &'check RgbaImageData,
    /// Maximum tolerated fraction of differing pixels.
    pub max_diff_pixel_ratio: f64,
    /// Policy for absent baselines.
    pub missing_baseline: MissingBaselinePolicy,
    /// Overwrite the stored baseline with the candidate instead of
    /// comparing (the explicit update action).
    pub update_baselines: bool,
}

/// Result of one check. Transient: recomputed on every run.
#[derive(Debug)]
pub struct CheckOutcome {
    /// Whether the check passed.
    pub passed: bool,
    /// Whether this run created or overwrote the baseline.
    pub wrote_baseline: bool,
    /// Comparison metrics, when a comparison actually ran.
    pub report: Option<ComparisonReport>,
    /// Where failure artifacts were written, on a failed verdict.
    pub artifacts_dir: Option<PathBuf>,
}

/// Checks a captured screenshot against its stored baseline.
///
/// A candidate that differs beyond the threshold is a failed outcome, not
/// an error; hard errors (missing baseline under the `Fail` policy,
/// dimension mismatch, invalid buffers, store I/O) abort the check.
///
/// # Errors
///
/// Returns an error for store failures and for every [`CompareError`]
/// except the threshold-exceeded case, which is reported through
/// `CheckOutcome::passed`.
pub fn check_screenshot(
    store: &BaselineStore,
    artifacts_root: &Path,
    request: &CheckRequest<'_>,
) -> Result<CheckOutcome> {
    if request.update_baselines {
        let changed = store.put(request.test_name, request.screenshot_name, request.candidate)?;
        log::info!(
            "Updated baseline {}/{} (changed: {changed})",
            request.test_name,
            request.screenshot_name
        );
        return Ok(CheckOutcome {
            passed: true,
            wrote_baseline: true,
            report: None,
            artifacts_dir: None,
        });
    }

    let baseline = store.get(request.test_name, request.screenshot_name)?;
    let Some(baseline) = baseline else {
        return match request.missing_baseline {
            MissingBaselinePolicy::Fail => Err(Error::new(CompareError::BaselineMissing(
                format!("{}/{}", request.test_name, request.screenshot_name),
            ))),
            MissingBaselinePolicy::Create => {
                store.put(request.test_name, request.screenshot_name, request.candidate)?;
                log::info!(
                    "Created baseline {}/{}",
                    request.test_name,
                    request.screenshot_name
                );
                Ok(CheckOutcome {
                    passed: true,
                    wrote_baseline: true,
                    report: None,
                    artifacts_dir: None,
                })
            }
        };
    };

    let report = compare(request.candidate, &baseline, request.max_diff_pixel_ratio)
        .map_err(Error::new)?;

    if report.verdict == Verdict::Pass {
        log::debug!(
            "{}/{} passed: {}/{} pixels differ (ratio {:.6})",
            request.test_name,
            request.screenshot_name,
            report.differing_pixels,
            report.total_pixels,
            report.diff_ratio
        );
        return Ok(CheckOutcome {
            passed: true,
            wrote_baseline: false,
            report: Some(report),
            artifacts_dir: None,
        });
    }

    let artifacts = FailureArtifacts {
        test_name: request.test_name,
        screenshot_name: request.screenshot_name,
        baseline: &baseline,
        candidate: request.candidate,
    };
    let dir = artifacts.write(artifacts_root)?;
    log::warn!(
        "{}/{} failed: ratio {:.6} exceeds {:.6}; artifacts in {}",
        request.test_name,
        request.screenshot_name,
        report.diff_ratio,
        report.max_diff_pixel_ratio,
        dir.display()
    );

    Ok(CheckOutcome {
        passed: false,
        wrote_baseline: false,
        report: Some(report),
        artifacts_dir: Some(dir),
    })
}

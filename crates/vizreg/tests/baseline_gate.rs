//! Store and gate behavior without a browser: baseline lifecycle, policy
//! handling, verdicts, and failure artifacts.

use anyhow::Result;
use pixel_compare::{CompareError, RgbaImageData, Verdict};
use vizreg::baseline::BaselineStore;
use vizreg::config::VizregConfig;
use vizreg::{CheckRequest, MissingBaselinePolicy, check_screenshot};

fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImageData {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for _ in 0..width * height {
        pixels.extend_from_slice(&rgba);
    }
    RgbaImageData::new(width, height, pixels)
}

fn request<'check>(
    candidate: &'check RgbaImageData,
    max_diff_pixel_ratio: f64,
    missing_baseline: MissingBaselinePolicy,
) -> CheckRequest<'check> {
    CheckRequest {
        test_name: "homepage",
        screenshot_name: "hero",
        candidate,
        max_diff_pixel_ratio,
        missing_baseline,
        update_baselines: false,
    }
}

#[test]
fn store_roundtrips_png() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = BaselineStore::new(dir.path());

    let img = solid(5, 3, [12, 200, 9, 255]);
    let changed = store.put("homepage", "hero", &img)?;
    assert!(changed);
    // Same content again: no rewrite.
    assert!(!store.put("homepage", "hero", &img)?);

    let fetched = store.get("homepage", "hero")?;
    assert_eq!(fetched.as_ref(), Some(&img));

    // The name gets a .png extension exactly once.
    let path = store.entry_path("homepage", "hero")?;
    assert!(path.ends_with("homepage/hero.png"));
    let explicit = store.entry_path("homepage", "hero.png")?;
    assert_eq!(path, explicit);
    Ok(())
}

#[test]
fn store_rejects_path_like_names() {
    let store = BaselineStore::new("/tmp/unused");
    assert!(store.entry_path("a/b", "shot").is_err());
    assert!(store.entry_path("test", "..").is_err());
    assert!(store.entry_path("", "shot").is_err());
    assert!(store.entry_path("test", "shots\\x").is_err());
}

#[test]
fn missing_baseline_fails_under_fail_policy() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = BaselineStore::new(dir.path());
    let candidate = solid(2, 2, [0, 0, 0, 255]);

    let result = check_screenshot(
        &store,
        dir.path(),
        &request(&candidate, 0.0, MissingBaselinePolicy::Fail),
    );
    let err = result.err().map(|error| error.downcast::<CompareError>());
    assert!(matches!(err, Some(Ok(CompareError::BaselineMissing(_)))));
    Ok(())
}

#[test]
fn missing_baseline_created_under_create_policy() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = BaselineStore::new(dir.path().join("baselines"));
    let candidate = solid(2, 2, [7, 7, 7, 255]);

    let outcome = check_screenshot(
        &store,
        dir.path(),
        &request(&candidate, 0.0, MissingBaselinePolicy::Create),
    )?;
    assert!(outcome.passed);
    assert!(outcome.wrote_baseline);
    assert!(outcome.report.is_none());

    // Second run compares against the baseline just created and passes.
    let outcome = check_screenshot(
        &store,
        dir.path(),
        &request(&candidate, 0.0, MissingBaselinePolicy::Fail),
    )?;
    assert!(outcome.passed);
    assert!(!outcome.wrote_baseline);
    let report = outcome.report.ok_or_else(|| anyhow::anyhow!("no report"))?;
    assert_eq!(report.verdict, Verdict::Pass);
    assert_eq!(report.differing_pixels, 0);
    Ok(())
}

#[test]
fn failed_verdict_writes_artifacts() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = BaselineStore::new(dir.path().join("baselines"));
    let artifacts_root = dir.path().join("failing");

    let baseline = solid(4, 4, [0, 0, 0, 255]);
    store.put("homepage", "hero", &baseline)?;

    let candidate = solid(4, 4, [255, 255, 255, 255]);
    let outcome = check_screenshot(
        &store,
        &artifacts_root,
        &request(&candidate, 0.5, MissingBaselinePolicy::Fail),
    )?;

    assert!(!outcome.passed);
    let report = outcome.report.ok_or_else(|| anyhow::anyhow!("no report"))?;
    assert_eq!(report.verdict, Verdict::Fail);
    assert!((report.diff_ratio - 1.0).abs() < f64::EPSILON);

    let artifacts_dir = outcome
        .artifacts_dir
        .ok_or_else(|| anyhow::anyhow!("no artifacts dir"))?;
    for suffix in ["baseline", "candidate", "diff"] {
        let path = artifacts_dir.join(format!("hero.{suffix}.png"));
        assert!(path.exists(), "missing artifact {}", path.display());
    }
    Ok(())
}

#[test]
fn dimension_mismatch_is_a_hard_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = BaselineStore::new(dir.path());

    store.put("homepage", "hero", &solid(4, 4, [0, 0, 0, 255]))?;
    let candidate = solid(2, 2, [0, 0, 0, 255]);

    let result = check_screenshot(
        &store,
        dir.path(),
        &request(&candidate, 1.0, MissingBaselinePolicy::Fail),
    );
    let err = result.err().map(|error| error.downcast::<CompareError>());
    assert!(matches!(
        err,
        Some(Ok(CompareError::DimensionMismatch { .. }))
    ));
    Ok(())
}

#[test]
fn update_flag_overwrites_stale_baseline() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = BaselineStore::new(dir.path());

    store.put("homepage", "hero", &solid(2, 2, [0, 0, 0, 255]))?;
    let fresh = solid(2, 2, [250, 250, 250, 255]);

    let outcome = check_screenshot(
        &store,
        dir.path(),
        &CheckRequest {
            test_name: "homepage",
            screenshot_name: "hero",
            candidate: &fresh,
            max_diff_pixel_ratio: 0.0,
            missing_baseline: MissingBaselinePolicy::Fail,
            update_baselines: true,
        },
    )?;
    assert!(outcome.passed);
    assert!(outcome.wrote_baseline);

    assert_eq!(store.get("homepage", "hero")?.as_ref(), Some(&fresh));
    Ok(())
}

#[test]
fn config_policy_and_update_flag_drive_the_gate() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let candidate = solid(2, 2, [40, 40, 40, 255]);

    // Create-on-missing via configuration, as VIZREG_MISSING_BASELINE=create
    // would set it.
    let config = VizregConfig {
        baseline_dir: Some(dir.path().join("baselines")),
        missing_baseline: MissingBaselinePolicy::Create,
        ..VizregConfig::default()
    };
    let store = config
        .baseline_store()
        .ok_or_else(|| anyhow::anyhow!("no baseline dir configured"))?;

    let outcome = check_screenshot(
        &store,
        dir.path(),
        &config.check_request("homepage", "hero", &candidate),
    )?;
    assert!(outcome.passed);
    assert!(outcome.wrote_baseline);

    // Overwrite via configuration, as VIZREG_UPDATE_BASELINES=1 would set it.
    let updating = VizregConfig {
        update_baselines: true,
        ..config
    };
    let fresh = solid(2, 2, [200, 200, 200, 255]);
    let outcome = check_screenshot(
        &store,
        dir.path(),
        &updating.check_request("homepage", "hero", &fresh),
    )?;
    assert!(outcome.passed);
    assert!(outcome.wrote_baseline);
    assert_eq!(store.get("homepage", "hero")?.as_ref(), Some(&fresh));
    Ok(())
}

#[test]
fn corrupt_baseline_surfaces_an_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let store = BaselineStore::new(dir.path());

    let path = store.entry_path("homepage", "hero")?;
    std::fs::create_dir_all(path.parent().ok_or_else(|| anyhow::anyhow!("no parent"))?)?;
    std::fs::write(&path, b"not a png")?;

    assert!(store.get("homepage", "hero").is_err());
    Ok(())
}

//! Visual regression gate: ties the pure comparator in `pixel_compare` to
//! a file-backed baseline store, environment-driven configuration, and
//! failure artifacts for debugging.
//!
//! The gate's single operation is [`check::check_screenshot`]: look up the
//! baseline for a (test, screenshot) key, compare the captured candidate
//! against it, and either pass, fail with artifacts on disk, or create the
//! baseline when policy allows. Browser capture itself lives in
//! `page_capture`; this crate never drives a browser.

pub mod artifacts;
pub mod baseline;
pub mod check;
pub mod config;

use env_logger::Builder as LogBuilder;
use env_logger::Env as EnvLoggerEnv;

pub use check::{CheckOutcome, CheckRequest, MissingBaselinePolicy, check_screenshot};

/// Initializes logging for tests and binaries.
///
/// Filters at the `error` level unless `RUST_LOG` overrides it; safe to
/// call more than once.
pub fn init_logger() {
    let _ignore_result = LogBuilder::from_env(EnvLoggerEnv::default().filter_or("RUST_LOG", "error"))
        .is_test(false)
        .try_init();
}

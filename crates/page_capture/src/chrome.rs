//! Headless Chrome lifecycle: discovery, launch with deterministic
//! rendering flags, CDP connection, and cleanup on drop.

use anyhow::{Result, anyhow};
use chromiumoxide::Browser;
use futures::StreamExt as _;
use std::env;
use std::fs::{create_dir_all, remove_dir_all};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};
use tokio::spawn;
use tokio::task::JoinHandle;
use tokio::time::sleep;

/// Debugging port for the managed Chrome instance.
const CHROME_PORT: u16 = 19223;

/// Browser with its handler task and Chrome process handle.
pub struct BrowserWithHandler {
    pub browser: Browser,
    _handler_task: JoinHandle<()>,
    chrome_process: Option<Child>,
    user_data_dir: Option<PathBuf>,
}

impl Drop for BrowserWithHandler {
    fn drop(&mut self) {
        if let Some(mut process) = self.chrome_process.take() {
            let _ignore_result = process.kill();
        }
        if let Some(dir) = self.user_data_dir.take() {
            let _ignore_result = remove_dir_all(&dir);
        }
    }
}

/// Finds the Chrome executable on the system.
///
/// Checks the `CHROME_BIN` environment variable first, then well-known
/// binary names on `PATH`.
///
/// # Errors
///
/// Returns an error if no Chrome or Chromium executable can be found.
pub fn find_chrome_executable() -> Result<PathBuf> {
    if let Ok(chrome_bin) = env::var("CHROME_BIN") {
        let path = PathBuf::from(&chrome_bin);
        if path.exists() {
            return Ok(path);
        }
    }

    let path_candidates = ["google-chrome", "chromium", "chromium-browser"];
    for candidate in path_candidates {
        if let Ok(output) = Command::new(candidate).arg("--version").output() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            if stdout.contains("Chrome") || stdout.contains("Chromium") {
                return Ok(PathBuf::from(candidate));
            }
        }
    }

    Err(anyhow!(
        "Chrome/Chromium executable not found. Install Chrome or set the CHROME_BIN environment variable."
    ))
}

/// Checks whether something is already listening on the debugging port.
fn is_chrome_running(port: u16) -> bool {
    TcpStream::connect(format!("127.0.0.1:{port}")).is_ok()
}

/// Refuses to proceed when the debugging port is already taken, so the
/// readiness poll cannot attach to an endpoint this gate does not own.
fn ensure_port_free(port: u16) -> Result<()> {
    if is_chrome_running(port) {
        return Err(anyhow!(
            "Port {port} is already in use; close the process listening on it before starting Chrome"
        ));
    }
    Ok(())
}

/// Flags that pin rendering output so captures are stable across runs.
fn chrome_args(user_data_dir: &Path, viewport_width: u32, viewport_height: u32) -> Vec<String> {
    vec![
        format!("--remote-debugging-port={CHROME_PORT}"),
        format!("--user-data-dir={}", user_data_dir.display()),
        "--headless=new".to_string(),
        "--disable-gpu".to_string(),
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-extensions".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-sync".to_string(),
        "--force-device-scale-factor=1".to_string(),
        "--hide-scrollbars".to_string(),
        "--disable-features=OverlayScrollbar".to_string(),
        "--allow-file-access-from-files".to_string(),
        "--force-color-profile=sRGB".to_string(),
        format!("--window-size={viewport_width},{viewport_height}"),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-default-apps".to_string(),
        "--disable-popup-blocking".to_string(),
        "--metrics-recording-only".to_string(),
        "--mute-audio".to_string(),
        "--enable-automation".to_string(),
    ]
}

/// Starts a Chrome instance in headless mode.
///
/// # Errors
///
/// Returns an error if Chrome cannot be found, fails to spawn, or does not
/// open its debugging port within the startup timeout.
async fn start_chrome_process(
    target_dir: &Path,
    viewport_width: u32,
    viewport_height: u32,
) -> Result<(Child, PathBuf)> {
    let chrome_bin = find_chrome_executable()?;
    ensure_port_free(CHROME_PORT)?;

    create_dir_all(target_dir)?;
    let user_data_dir = target_dir.join("vizreg_chrome_profile");
    if user_data_dir.exists() {
        let _ignore_result = remove_dir_all(&user_data_dir);
    }
    create_dir_all(&user_data_dir)?;

    let args = chrome_args(&user_data_dir, viewport_width, viewport_height);
    log::info!("Starting Chrome: {} {:?}", chrome_bin.display(), args);

    let mut process = Command::new(&chrome_bin)
        .args(&args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|err| anyhow!("Failed to start Chrome: {err}"))?;

    let max_wait = Duration::from_secs(10);
    let start = Instant::now();

    while start.elapsed() < max_wait {
        if is_chrome_running(CHROME_PORT) {
            log::info!("Chrome started on port {CHROME_PORT}");
            return Ok((process, user_data_dir));
        }

        if let Ok(Some(status)) = process.try_wait() {
            return Err(anyhow!(
                "Chrome process exited unexpectedly with status: {status}"
            ));
        }

        sleep(Duration::from_millis(100)).await;
    }

    let _ignore_result = process.kill();
    Err(anyhow!("Chrome failed to start within {max_wait:?}"))
}

/// Starts Chrome and connects to it over CDP.
///
/// The returned handle owns the Chrome process and its profile directory;
/// both are cleaned up when the handle is dropped.
///
/// # Errors
///
/// Returns an error if Chrome fails to start or the CDP connection fails.
pub async fn start_and_connect_chrome(
    target_dir: &Path,
    viewport_width: u32,
    viewport_height: u32,
) -> Result<BrowserWithHandler> {
    let (chrome_process, user_data_dir) =
        start_chrome_process(target_dir, viewport_width, viewport_height).await?;

    let ws_url = format!("http://localhost:{CHROME_PORT}");
    let (browser, mut handler) = Browser::connect(&ws_url)
        .await
        .map_err(|err| anyhow!("Failed to connect to Chrome on {ws_url}: {err}"))?;

    let handler_task = spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(err) = event {
                log::debug!("Browser handler error: {err}");
            }
        }
        log::debug!("Browser handler stream ended");
    });

    Ok(BrowserWithHandler {
        browser,
        _handler_task: handler_task,
        chrome_process: Some(chrome_process),
        user_data_dir: Some(user_data_dir),
    })
}

//! Page-level capture operations: navigation, visibility waiting, script
//! evaluation, and full-page or element screenshots decoded to RGBA.

use anyhow::{Result, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, Viewport,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use image::load_from_memory;
use pixel_compare::RgbaImageData;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use url::Url;

/// Navigates a page and waits for the load event.
///
/// # Errors
///
/// Returns an error if navigation fails.
pub async fn navigate(page: &Page, url: &Url) -> Result<()> {
    page.goto(url.as_str())
        .await
        .map_err(|err| anyhow!("Navigation to {url} failed: {err}"))?;
    Ok(())
}

/// Evaluates a script on the page, discarding the result.
///
/// # Errors
///
/// Returns an error if script evaluation fails.
pub async fn evaluate(page: &Page, script: &str) -> Result<()> {
    page.evaluate(script)
        .await
        .map_err(|err| anyhow!("Script evaluation failed: {err}"))?;
    Ok(())
}

fn visibility_predicate(selector: &str) -> String {
    let quoted = serde_json::Value::String(selector.to_string()).to_string();
    format!(
        "(() => {{
            const el = document.querySelector({quoted});
            if (!el) {{ return false; }}
            const rect = el.getBoundingClientRect();
            const style = window.getComputedStyle(el);
            return rect.width > 0 && rect.height > 0
                && style.visibility !== 'hidden' && style.display !== 'none';
        }})()"
    )
}

/// Waits until the element matching `selector` is attached and visible.
///
/// Polls a visibility predicate in-page every 50ms until it holds or the
/// timeout elapses.
///
/// # Errors
///
/// Returns an error if evaluation fails or the element does not become
/// visible within `timeout`.
pub async fn wait_for_visible(page: &Page, selector: &str, timeout: Duration) -> Result<()> {
    let predicate = visibility_predicate(selector);
    let start = Instant::now();

    loop {
        let result = page
            .evaluate(predicate.as_str())
            .await
            .map_err(|err| anyhow!("Visibility check for {selector:?} failed: {err}"))?;
        let visible = result.value().and_then(serde_json::Value::as_bool);
        if visible == Some(true) {
            return Ok(());
        }
        if start.elapsed() >= timeout {
            return Err(anyhow!(
                "Element {selector:?} not visible after {timeout:?}"
            ));
        }
        sleep(Duration::from_millis(50)).await;
    }
}

/// Captures a screenshot of the page, decoded to RGBA.
///
/// With `full_page` the capture covers the whole document rather than just
/// the viewport.
///
/// # Errors
///
/// Returns an error if capture or PNG decoding fails.
pub async fn capture_page(page: &Page, full_page: bool) -> Result<RgbaImageData> {
    let params = ScreenshotParams::builder()
        .format(CaptureScreenshotFormat::Png)
        .full_page(full_page)
        .build();
    let png_bytes = page
        .screenshot(params)
        .await
        .map_err(|err| anyhow!("Screenshot capture failed: {err}"))?;
    decode_png(&png_bytes)
}

#[derive(Debug, Deserialize)]
struct ElementRect {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
}

/// Reads the bounding client rect of the first element matching `selector`.
async fn bounding_rect(page: &Page, selector: &str) -> Result<ElementRect> {
    let quoted = serde_json::Value::String(selector.to_string()).to_string();
    let script = format!(
        "(() => {{
            const el = document.querySelector({quoted});
            return el ? JSON.stringify(el.getBoundingClientRect()) : '';
        }})()"
    );

    let result = page
        .evaluate(script.as_str())
        .await
        .map_err(|err| anyhow!("Bounding rect lookup for {selector:?} failed: {err}"))?;
    let json_string = result
        .value()
        .and_then(serde_json::Value::as_str)
        .ok_or_else(|| anyhow!("Bounding rect lookup returned no value for {selector:?}"))?;
    if json_string.is_empty() {
        return Err(anyhow!("No element matches selector {selector:?}"));
    }

    let rect: ElementRect = serde_json::from_str(json_string)?;
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return Err(anyhow!(
            "Element {selector:?} has an empty box ({}x{})",
            rect.width,
            rect.height
        ));
    }
    Ok(rect)
}

/// Captures a screenshot clipped to the first element matching `selector`.
///
/// The clip uses the element's border box in CSS pixels; the device scale
/// factor is pinned to 1 at browser launch so CSS and device pixels agree.
///
/// # Errors
///
/// Returns an error if the element is missing or empty, or if capture or
/// decoding fails.
pub async fn capture_element(page: &Page, selector: &str) -> Result<RgbaImageData> {
    let rect = bounding_rect(page, selector).await?;

    let clip = Viewport::builder()
        .x(rect.x)
        .y(rect.y)
        .width(rect.width)
        .height(rect.height)
        .scale(1.0)
        .build()
        .map_err(|err| anyhow!("Failed to build clip viewport: {err}"))?;

    let params = CaptureScreenshotParams::builder()
        .format(CaptureScreenshotFormat::Png)
        .clip(clip)
        .from_surface(true)
        .build();
    let response = page
        .execute(params)
        .await
        .map_err(|err| anyhow!("Element screenshot failed: {err}"))?;
    let base64_str: &str = response.data.as_ref();
    let png_bytes = BASE64_STANDARD
        .decode(base64_str)
        .map_err(|err| anyhow!("Failed to decode base64 screenshot: {err}"))?;
    decode_png(&png_bytes)
}

fn decode_png(png_bytes: &[u8]) -> Result<RgbaImageData> {
    let img = load_from_memory(png_bytes)?.to_rgba8();
    Ok(img.into())
}

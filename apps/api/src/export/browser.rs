//! Headless Browser Driver: owns one Chrome process per export call and
//! turns the rendered HTML into per-page PDF buffers.
//!
//! The driver sits behind the `BrowserLauncher`/`PageSession` trait seam so
//! the pipeline can be exercised against a mock session in tests. The Chrome
//! implementation drives a locally installed (or `CHROME_PATH`-pinned)
//! browser via the `headless_chrome` crate, with the sandbox disabled for
//! container compatibility. DOM introspection goes through `Runtime.evaluate`
//! exclusively, which keeps the driver independent of CDP struct details.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::Deserialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use tracing::warn;

use crate::export::assembler::CaptureOutcome;
use crate::export::ExportError;
use crate::models::artboard::ArtboardMetadata;

/// Fixed logical viewport for deterministic layout before capture.
pub const VIEWPORT_WIDTH: u32 = 1200;
pub const VIEWPORT_HEIGHT: u32 = 1600;

/// 2x device pixels for crisp rasterized content inside captures.
const DEVICE_SCALE_ARG: &str = "--force-device-scale-factor=2";

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const CSS_PX_PER_INCH: f64 = 96.0;

/// Bounding box of one page-marker element, in device-independent px.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PageMeasurement {
    pub width: f64,
    pub height: f64,
}

/// Launches a browser process for exactly one export call.
pub trait BrowserLauncher: Send + Sync {
    fn launch(&self) -> Result<Box<dyn PageSession>, ExportError>;
}

/// One loaded document inside one browser process. Methods are strictly
/// sequential: the isolation step mutates the live DOM, so a capture must
/// restore before the next page begins.
pub trait PageSession {
    /// Navigates to the HTML content and waits for load. Fatal on timeout.
    fn load(&mut self, html: &str, timeout: Duration) -> Result<(), ExportError>;

    /// Best-effort wait for `<img>` elements to settle. Never fatal; on
    /// timeout a warning is logged and capture proceeds.
    fn wait_for_images(&mut self, timeout: Duration);

    /// Polls the body-level readiness flag. Fatal on timeout.
    fn wait_for_pagination_ready(&mut self, timeout: Duration) -> Result<(), ExportError>;

    /// Number of page-marker elements present in the document.
    fn count_page_markers(&mut self) -> Result<u32, ExportError>;

    /// Bounding box of the Nth page marker, or None if it does not exist.
    fn measure_page(&mut self, index: u32) -> Result<Option<PageMeasurement>, ExportError>;

    /// Replaces the document body with a clone of the Nth page and captures a
    /// PDF sized exactly to `measurement` (rounded up), zero margins,
    /// backgrounds on. Head styles (including custom CSS) survive isolation.
    fn isolate_and_capture(
        &mut self,
        index: u32,
        measurement: &PageMeasurement,
    ) -> Result<Vec<u8>, ExportError>;

    /// Restores the original full-document body after an isolation.
    fn restore(&mut self) -> Result<(), ExportError>;

    /// Captures the whole document as one PDF at the resolved page format.
    /// Returns the buffer plus the total rendered height in px, which the
    /// assembler uses to estimate a page count when no markers exist.
    fn capture_full_document(
        &mut self,
        metadata: &ArtboardMetadata,
    ) -> Result<(Vec<u8>, f64), ExportError>;

    /// Tears down the browser process. Idempotent; called on every exit path.
    fn close(&mut self);
}

/// Captures one PDF buffer per page marker, in order.
///
/// Zero markers is not an error: it yields `CaptureOutcome::NoMarkers` so the
/// assembler can decide on the single-pass fallback explicitly.
pub fn capture_page_buffers(
    session: &mut dyn PageSession,
) -> Result<CaptureOutcome, ExportError> {
    let count = session.count_page_markers()?;
    if count == 0 {
        return Ok(CaptureOutcome::NoMarkers);
    }

    let mut buffers = Vec::with_capacity(count as usize);
    for index in 0..count {
        let measurement = session.measure_page(index)?.ok_or_else(|| {
            ExportError::Capture(format!("page marker {index} disappeared before capture"))
        })?;
        let buffer = session.isolate_and_capture(index, &measurement)?;
        // Restore before the next iteration so every capture starts from the
        // clean full document.
        session.restore()?;
        buffers.push(buffer);
    }
    Ok(CaptureOutcome::PerPage(buffers))
}

// ────────────────────────────────────────────────────────────────────────────
// Chrome implementation
// ────────────────────────────────────────────────────────────────────────────

pub struct ChromeLauncher {
    chrome_path: Option<PathBuf>,
}

impl ChromeLauncher {
    pub fn new(chrome_path: Option<PathBuf>) -> Self {
        Self { chrome_path }
    }
}

impl BrowserLauncher for ChromeLauncher {
    fn launch(&self) -> Result<Box<dyn PageSession>, ExportError> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            // Containers commonly lack the user namespace the sandbox needs.
            .sandbox(false)
            .window_size(Some((VIEWPORT_WIDTH, VIEWPORT_HEIGHT)))
            .path(self.chrome_path.clone())
            .args(vec![
                OsStr::new(DEVICE_SCALE_ARG),
                OsStr::new("--hide-scrollbars"),
            ])
            .idle_browser_timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ExportError::Launch(e.to_string()))?;

        let browser = Browser::new(options).map_err(|e| ExportError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| ExportError::Launch(e.to_string()))?;

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab,
            html_file: None,
        }))
    }
}

struct ChromeSession {
    /// Present until `close`; dropping the handle kills the Chrome process.
    browser: Option<Browser>,
    tab: Arc<Tab>,
    /// Keeps the rendered HTML on disk for the lifetime of the session.
    html_file: Option<NamedTempFile>,
}

impl ChromeSession {
    fn eval(&self, expression: &str) -> Result<Value, ExportError> {
        let remote = self
            .tab
            .evaluate(expression, false)
            .map_err(|e| ExportError::Browser(e.to_string()))?;
        Ok(remote.value.unwrap_or(Value::Null))
    }
}

impl PageSession for ChromeSession {
    fn load(&mut self, html: &str, timeout: Duration) -> Result<(), ExportError> {
        let file = tempfile::Builder::new()
            .prefix("artboard-")
            .suffix(".html")
            .tempfile()
            .map_err(|e| ExportError::Navigation(e.to_string()))?;
        std::fs::write(file.path(), html)
            .map_err(|e| ExportError::Navigation(e.to_string()))?;

        let url = format!("file://{}", file.path().display());
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(&url)
            .map_err(|e| ExportError::Navigation(e.to_string()))?;
        self.tab
            .wait_until_navigated()
            .map_err(|e| ExportError::Navigation(e.to_string()))?;

        self.html_file = Some(file);
        Ok(())
    }

    fn wait_for_images(&mut self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        loop {
            match self.eval(IMAGES_SETTLED_JS) {
                Ok(Value::Bool(true)) => return,
                Ok(_) => {}
                Err(e) => {
                    warn!("Image settle check failed: {e}");
                    return;
                }
            }
            if Instant::now() >= deadline {
                warn!(
                    "Images still loading after {}ms, proceeding with capture",
                    timeout.as_millis()
                );
                return;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn wait_for_pagination_ready(&mut self, timeout: Duration) -> Result<(), ExportError> {
        let deadline = Instant::now() + timeout;
        loop {
            if self.eval(PAGINATION_READY_JS)? == Value::Bool(true) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(ExportError::PaginationTimeout(timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    fn count_page_markers(&mut self) -> Result<u32, ExportError> {
        match self.eval("document.querySelectorAll('[data-page]').length")? {
            Value::Number(n) => Ok(n.as_u64().unwrap_or(0) as u32),
            other => Err(ExportError::Browser(format!(
                "unexpected marker count result: {other}"
            ))),
        }
    }

    fn measure_page(&mut self, index: u32) -> Result<Option<PageMeasurement>, ExportError> {
        match self.eval(&measure_js(index))? {
            Value::Null => Ok(None),
            Value::String(json) => serde_json::from_str(&json).map(Some).map_err(|e| {
                ExportError::Browser(format!("unparseable page measurement: {e}"))
            }),
            other => Err(ExportError::Browser(format!(
                "unexpected measurement result: {other}"
            ))),
        }
    }

    fn isolate_and_capture(
        &mut self,
        index: u32,
        measurement: &PageMeasurement,
    ) -> Result<Vec<u8>, ExportError> {
        if self.eval(&isolate_js(index))? != Value::Bool(true) {
            return Err(ExportError::Capture(format!(
                "failed to isolate page {index}"
            )));
        }

        self.tab
            .print_to_pdf(Some(page_print_options(measurement)))
            .map_err(|e| ExportError::Capture(e.to_string()))
    }

    fn restore(&mut self) -> Result<(), ExportError> {
        self.eval(RESTORE_JS)?;
        Ok(())
    }

    fn capture_full_document(
        &mut self,
        metadata: &ArtboardMetadata,
    ) -> Result<(Vec<u8>, f64), ExportError> {
        // The fallback may run after a failed merge; always start from the
        // unmodified document.
        self.restore()?;

        let total_height = self
            .eval("document.body.scrollHeight")?
            .as_f64()
            .unwrap_or(0.0);

        let buffer = self
            .tab
            .print_to_pdf(Some(full_document_print_options(metadata)))
            .map_err(|e| ExportError::Capture(e.to_string()))?;

        Ok((buffer, total_height))
    }

    fn close(&mut self) {
        self.html_file.take();
        if let Some(browser) = self.browser.take() {
            drop(browser);
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.close();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Injected scripts and print options
// ────────────────────────────────────────────────────────────────────────────

const IMAGES_SETTLED_JS: &str =
    "Array.from(document.images).every(function (img) { return img.complete; })";

const PAGINATION_READY_JS: &str =
    "document.body.getAttribute('data-pagination-ready') === 'true'";

const RESTORE_JS: &str = r#"(function () {
  if (window.__artboardOriginalBody !== undefined) {
    document.body.innerHTML = window.__artboardOriginalBody;
  }
  return true;
})()"#;

fn measure_js(index: u32) -> String {
    format!(
        r#"(function () {{
  var el = document.querySelector('[data-page="{index}"]');
  if (!el) return null;
  var rect = el.getBoundingClientRect();
  return JSON.stringify({{ width: rect.width, height: rect.height }});
}})()"#
    )
}

fn isolate_js(index: u32) -> String {
    format!(
        r#"(function () {{
  var el = document.querySelector('[data-page="{index}"]');
  if (!el) return false;
  if (window.__artboardOriginalBody === undefined) {{
    window.__artboardOriginalBody = document.body.innerHTML;
  }}
  var clone = el.cloneNode(true);
  document.body.innerHTML = '';
  document.body.appendChild(clone);
  return true;
}})()"#
    )
}

/// Exact-size options for one isolated page. Margin is zero because the page
/// element carries its own padding. `prefer_css_page_size` is off: the
/// isolated body has no `@page` rule, and the measured CSS box converted to
/// paper dimensions is the authoritative size, so Chrome must not substitute
/// its own.
fn page_print_options(measurement: &PageMeasurement) -> PrintToPdfOptions {
    PrintToPdfOptions {
        print_background: Some(true),
        prefer_css_page_size: Some(false),
        paper_width: Some(px_to_inches(measurement.width)),
        paper_height: Some(px_to_inches(measurement.height)),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        ..Default::default()
    }
}

fn full_document_print_options(metadata: &ArtboardMetadata) -> PrintToPdfOptions {
    PrintToPdfOptions {
        print_background: Some(true),
        prefer_css_page_size: Some(true),
        paper_width: Some(metadata.format.width_in()),
        paper_height: Some(metadata.format.height_in()),
        margin_top: Some(0.0),
        margin_bottom: Some(0.0),
        margin_left: Some(0.0),
        margin_right: Some(0.0),
        ..Default::default()
    }
}

/// Rounds a CSS-px dimension up before converting, so captures never clip.
fn px_to_inches(px: f64) -> f64 {
    px.ceil().max(1.0) / CSS_PX_PER_INCH
}

//! Print-accurate PDF export pipeline.
//!
//! One export call flows through four stages: the mapper turns a validated
//! document into a renderer-neutral artboard, the renderer serializes it to
//! HTML with sequential page markers, the browser driver captures each marked
//! page as its own exactly-sized PDF, and the assembler merges the captures
//! into the final document. When markers are absent or the merge fails the
//! pipeline degrades to a single-pass capture of the whole document rather
//! than failing the export.
//!
//! The pipeline is synchronous by design; route handlers run it inside
//! `spawn_blocking`.

pub mod assembler;
pub mod browser;
pub mod filename;
pub mod mapper;
pub mod renderer;

use std::time::{Duration, Instant};

use bytes::Bytes;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::export::browser::{BrowserLauncher, PageSession};
use crate::models::artboard::ArtboardDocument;
use crate::models::cover_letter::CoverLetterData;
use crate::models::resume::ResumeData;

const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
const IMAGE_WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const PAGINATION_READY_TIMEOUT: Duration = Duration::from_secs(30);

/// Backoff between generation attempts: quick first retry, then a longer
/// pause to let a wedged Chrome process clear.
const RETRY_SCHEDULE: [Duration; 2] = [Duration::from_secs(1), Duration::from_secs(5)];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("invalid artboard: {0}")]
    InvalidArtboard(String),
    #[error("failed to launch browser: {0}")]
    Launch(String),
    #[error("page navigation failed: {0}")]
    Navigation(String),
    #[error("browser evaluation failed: {0}")]
    Browser(String),
    #[error("pagination not ready after {}ms", .0.as_millis())]
    PaginationTimeout(Duration),
    #[error("page capture failed: {0}")]
    Capture(String),
    #[error("PDF merge failed: {0}")]
    Merge(String),
    #[error("PDF generation failed: {0}")]
    Generation(String),
}

impl ExportError {
    /// Whether a fresh browser session could plausibly succeed. Structural
    /// problems with the document itself are never retried.
    fn is_transient(&self) -> bool {
        !matches!(self, ExportError::InvalidArtboard(_))
    }
}

/// Output fidelity requested by the caller. Both levels currently render at
/// 2x device scale; the distinction is carried for request logging and
/// future per-quality tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Standard,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    Resume,
    CoverLetter,
}

#[derive(Debug, Clone, Default)]
pub struct PdfGenerationOptions {
    pub quality: Quality,
    pub document_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
}

#[derive(Debug)]
pub struct PdfGenerationResult {
    pub buffer: Bytes,
    pub page_count: u32,
    pub file_size: usize,
}

// ────────────────────────────────────────────────────────────────────────────
// Entry points
// ────────────────────────────────────────────────────────────────────────────

pub fn generate_resume_pdf_with_retry(
    launcher: &dyn BrowserLauncher,
    data: &ResumeData,
    options: &PdfGenerationOptions,
) -> Result<PdfGenerationResult, ExportError> {
    with_retry("resume export", || generate_resume_pdf(launcher, data, options))
}

pub fn generate_cover_letter_pdf_with_retry(
    launcher: &dyn BrowserLauncher,
    data: &CoverLetterData,
    options: &PdfGenerationOptions,
) -> Result<PdfGenerationResult, ExportError> {
    with_retry("cover letter export", || {
        generate_cover_letter_pdf(launcher, data, options)
    })
}

pub fn generate_resume_pdf(
    launcher: &dyn BrowserLauncher,
    data: &ResumeData,
    options: &PdfGenerationOptions,
) -> Result<PdfGenerationResult, ExportError> {
    let artboard = mapper::map_resume(data);
    generate_pdf(launcher, &artboard, options)
}

pub fn generate_cover_letter_pdf(
    launcher: &dyn BrowserLauncher,
    data: &CoverLetterData,
    options: &PdfGenerationOptions,
) -> Result<PdfGenerationResult, ExportError> {
    let artboard = mapper::map_cover_letter(data);
    generate_pdf(launcher, &artboard, options)
}

/// Runs the full pipeline against one fresh browser session.
///
/// The session is closed exactly once, on every exit path, before the result
/// is propagated.
pub fn generate_pdf(
    launcher: &dyn BrowserLauncher,
    artboard: &ArtboardDocument,
    options: &PdfGenerationOptions,
) -> Result<PdfGenerationResult, ExportError> {
    let started = Instant::now();
    let html = renderer::render(artboard)?;

    let mut session = launcher.launch()?;
    let assembled = drive_session(session.as_mut(), &html, artboard);
    session.close();
    let assembled = assembled?;

    let file_size = assembled.buffer.len();
    info!(
        quality = ?options.quality,
        document_id = ?options.document_id,
        user_id = ?options.user_id,
        page_count = assembled.page_count,
        file_size,
        strategy = ?assembled.strategy,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "PDF generated"
    );

    Ok(PdfGenerationResult {
        buffer: Bytes::from(assembled.buffer),
        page_count: assembled.page_count,
        file_size,
    })
}

fn drive_session(
    session: &mut dyn PageSession,
    html: &str,
    artboard: &ArtboardDocument,
) -> Result<assembler::AssembledPdf, ExportError> {
    session.load(html, NAVIGATION_TIMEOUT)?;
    session.wait_for_images(IMAGE_WAIT_TIMEOUT);
    session.wait_for_pagination_ready(PAGINATION_READY_TIMEOUT)?;

    let outcome = browser::capture_page_buffers(session)?;
    let page_height_px = artboard.metadata.format.height_px();
    assembler::assemble(outcome, page_height_px, || {
        session.capture_full_document(&artboard.metadata)
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Retry wrapper
// ────────────────────────────────────────────────────────────────────────────

/// Retries a generation closure on transient failures, up to three attempts
/// total, sleeping per `RETRY_SCHEDULE` between them.
pub fn with_retry<T, F>(operation: &str, f: F) -> Result<T, ExportError>
where
    F: FnMut() -> Result<T, ExportError>,
{
    retry_with_schedule(operation, &RETRY_SCHEDULE, f)
}

fn retry_with_schedule<T, F>(
    operation: &str,
    schedule: &[Duration],
    mut f: F,
) -> Result<T, ExportError>
where
    F: FnMut() -> Result<T, ExportError>,
{
    let attempts = schedule.len() + 1;
    let mut last_error = None;
    for (attempt, delay) in (1..=attempts).zip(schedule.iter().map(Some).chain([None])) {
        match f() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                warn!("{operation} attempt {attempt}/{attempts} failed: {e}");
                last_error = Some(e);
                if let Some(delay) = delay {
                    std::thread::sleep(*delay);
                }
            }
            Err(e) => return Err(e),
        }
    }
    // schedule.len() + 1 attempts all failed; last_error is always set here.
    let last = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "retry loop exhausted".to_string());
    Err(ExportError::Generation(last))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::browser::PageMeasurement;
    use crate::models::artboard::{
        ArtboardBlock, ArtboardMetadata, ArtboardPage, PageFormat,
    };
    use lopdf::Document;
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Default)]
    struct MockStats {
        launches: usize,
        loads: usize,
        captures: Vec<u32>,
        restores: usize,
        full_captures: usize,
        closes: usize,
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum FailPoint {
        None,
        PaginationReady,
        MarkerVanishes,
        CorruptCaptures,
    }

    struct MockLauncher {
        marker_count: u32,
        fail: FailPoint,
        stats: Arc<Mutex<MockStats>>,
    }

    impl MockLauncher {
        fn new(marker_count: u32, fail: FailPoint) -> Self {
            Self {
                marker_count,
                fail,
                stats: Arc::new(Mutex::new(MockStats::default())),
            }
        }

        fn stats(&self) -> MockStats {
            std::mem::take(&mut *self.stats.lock().unwrap())
        }
    }

    impl BrowserLauncher for MockLauncher {
        fn launch(&self) -> Result<Box<dyn PageSession>, ExportError> {
            self.stats.lock().unwrap().launches += 1;
            Ok(Box::new(MockSession {
                marker_count: self.marker_count,
                fail: self.fail,
                stats: Arc::clone(&self.stats),
            }))
        }
    }

    struct MockSession {
        marker_count: u32,
        fail: FailPoint,
        stats: Arc<Mutex<MockStats>>,
    }

    impl PageSession for MockSession {
        fn load(&mut self, _html: &str, _timeout: Duration) -> Result<(), ExportError> {
            self.stats.lock().unwrap().loads += 1;
            Ok(())
        }

        fn wait_for_images(&mut self, _timeout: Duration) {}

        fn wait_for_pagination_ready(&mut self, timeout: Duration) -> Result<(), ExportError> {
            if self.fail == FailPoint::PaginationReady {
                return Err(ExportError::PaginationTimeout(timeout));
            }
            Ok(())
        }

        fn count_page_markers(&mut self) -> Result<u32, ExportError> {
            Ok(self.marker_count)
        }

        fn measure_page(&mut self, index: u32) -> Result<Option<PageMeasurement>, ExportError> {
            if self.fail == FailPoint::MarkerVanishes && index == 1 {
                return Ok(None);
            }
            Ok(Some(PageMeasurement {
                width: 816.0,
                height: 1056.0,
            }))
        }

        fn isolate_and_capture(
            &mut self,
            index: u32,
            _measurement: &PageMeasurement,
        ) -> Result<Vec<u8>, ExportError> {
            self.stats.lock().unwrap().captures.push(index);
            if self.fail == FailPoint::CorruptCaptures {
                return Ok(b"not a pdf".to_vec());
            }
            Ok(assembler::minimal_pdf(&format!("page-{index}")))
        }

        fn restore(&mut self) -> Result<(), ExportError> {
            self.stats.lock().unwrap().restores += 1;
            Ok(())
        }

        fn capture_full_document(
            &mut self,
            _metadata: &ArtboardMetadata,
        ) -> Result<(Vec<u8>, f64), ExportError> {
            self.stats.lock().unwrap().full_captures += 1;
            Ok((assembler::minimal_pdf("full-document"), 2200.0))
        }

        fn close(&mut self) {
            self.stats.lock().unwrap().closes += 1;
        }
    }

    fn artboard(pages: usize) -> ArtboardDocument {
        ArtboardDocument {
            metadata: ArtboardMetadata {
                format: PageFormat::Letter,
                margin_px: 48,
                custom_css: None,
                show_page_numbers: false,
            },
            pages: (0..pages)
                .map(|i| ArtboardPage {
                    blocks: vec![ArtboardBlock::Paragraph {
                        text: format!("content {i}"),
                    }],
                })
                .collect(),
        }
    }

    #[test]
    fn test_per_page_capture_produces_merged_document() {
        let launcher = MockLauncher::new(3, FailPoint::None);
        let result = generate_pdf(&launcher, &artboard(3), &PdfGenerationOptions::default())
            .unwrap();

        assert_eq!(result.page_count, 3);
        assert_eq!(result.file_size, result.buffer.len());
        let doc = Document::load_mem(&result.buffer).unwrap();
        assert_eq!(doc.get_pages().len(), 3);

        let stats = launcher.stats();
        // Pages captured in order, each followed by a restore.
        assert_eq!(stats.captures, vec![0, 1, 2]);
        assert_eq!(stats.restores, 3);
        assert_eq!(stats.full_captures, 0);
    }

    #[test]
    fn test_session_closed_exactly_once_on_success() {
        let launcher = MockLauncher::new(1, FailPoint::None);
        generate_pdf(&launcher, &artboard(1), &PdfGenerationOptions::default()).unwrap();

        let stats = launcher.stats();
        assert_eq!(stats.launches, 1);
        assert_eq!(stats.closes, 1);
    }

    #[test]
    fn test_session_closed_exactly_once_on_failure() {
        let launcher = MockLauncher::new(1, FailPoint::PaginationReady);
        let result = generate_pdf(&launcher, &artboard(1), &PdfGenerationOptions::default());

        assert!(matches!(result, Err(ExportError::PaginationTimeout(_))));
        let stats = launcher.stats();
        assert_eq!(stats.launches, 1);
        assert_eq!(stats.closes, 1);
    }

    #[test]
    fn test_missing_markers_fall_back_to_single_pass() {
        let launcher = MockLauncher::new(0, FailPoint::None);
        let result = generate_pdf(&launcher, &artboard(2), &PdfGenerationOptions::default())
            .unwrap();

        let stats = launcher.stats();
        assert_eq!(stats.full_captures, 1);
        assert!(stats.captures.is_empty());
        // ceil(2200 / 1056) pages estimated from rendered height.
        assert_eq!(result.page_count, 3);
    }

    #[test]
    fn test_corrupt_captures_fall_back_to_single_pass() {
        let launcher = MockLauncher::new(2, FailPoint::CorruptCaptures);
        let result = generate_pdf(&launcher, &artboard(2), &PdfGenerationOptions::default())
            .unwrap();

        let stats = launcher.stats();
        assert_eq!(stats.captures, vec![0, 1]);
        assert_eq!(stats.full_captures, 1);
        assert_eq!(stats.closes, 1);
        let doc = Document::load_mem(&result.buffer).unwrap();
        assert!(doc.extract_text(&[1]).unwrap().contains("full-document"));
    }

    #[test]
    fn test_vanished_marker_is_an_error() {
        let launcher = MockLauncher::new(3, FailPoint::MarkerVanishes);
        let result = generate_pdf(&launcher, &artboard(3), &PdfGenerationOptions::default());

        assert!(matches!(result, Err(ExportError::Capture(_))));
        let stats = launcher.stats();
        assert_eq!(stats.closes, 1);
    }

    #[test]
    fn test_resume_entry_point_runs_end_to_end() {
        let launcher = MockLauncher::new(1, FailPoint::None);
        let data: ResumeData = serde_json::from_value(serde_json::json!({
            "profile": { "name": "Jane Doe" },
            "sections": {},
            "settings": {}
        }))
        .unwrap();

        let result =
            generate_resume_pdf(&launcher, &data, &PdfGenerationOptions::default()).unwrap();
        assert_eq!(result.page_count, 1);
        assert!(result.file_size > 0);
    }

    #[test]
    fn test_flaky_launch_recovers_within_retry_budget() {
        struct FlakyLauncher {
            inner: MockLauncher,
            failures_left: Mutex<u32>,
        }

        impl BrowserLauncher for FlakyLauncher {
            fn launch(&self) -> Result<Box<dyn PageSession>, ExportError> {
                let mut left = self.failures_left.lock().unwrap();
                if *left > 0 {
                    *left -= 1;
                    return Err(ExportError::Launch("no usable browser".to_string()));
                }
                self.inner.launch()
            }
        }

        let launcher = FlakyLauncher {
            inner: MockLauncher::new(1, FailPoint::None),
            failures_left: Mutex::new(2),
        };
        let doc = artboard(1);
        let options = PdfGenerationOptions::default();

        let result = retry_with_schedule("test", &[Duration::ZERO, Duration::ZERO], || {
            generate_pdf(&launcher, &doc, &options)
        })
        .unwrap();
        assert_eq!(result.page_count, 1);

        // Two failed launches, then one full successful session.
        let stats = launcher.inner.stats();
        assert_eq!(stats.launches, 1);
        assert_eq!(stats.closes, 1);
    }

    #[test]
    fn test_retry_recovers_after_transient_failures() {
        let mut attempts = 0;
        let result = retry_with_schedule(
            "test",
            &[Duration::ZERO, Duration::ZERO],
            || {
                attempts += 1;
                if attempts < 3 {
                    Err(ExportError::Launch("boom".to_string()))
                } else {
                    Ok(attempts)
                }
            },
        );
        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn test_retry_gives_up_after_all_attempts() {
        let mut attempts = 0;
        let result: Result<(), _> = retry_with_schedule(
            "test",
            &[Duration::ZERO, Duration::ZERO],
            || {
                attempts += 1;
                Err(ExportError::Launch("boom".to_string()))
            },
        );
        assert_eq!(attempts, 3);
        match result {
            Err(ExportError::Generation(message)) => {
                assert!(message.contains("boom"));
            }
            other => panic!("expected wrapped generation error, got {other:?}"),
        }
    }

    #[test]
    fn test_structural_errors_are_not_retried() {
        let mut attempts = 0;
        let result: Result<(), _> = retry_with_schedule(
            "test",
            &[Duration::ZERO, Duration::ZERO],
            || {
                attempts += 1;
                Err(ExportError::InvalidArtboard("no pages".to_string()))
            },
        );
        assert_eq!(attempts, 1);
        assert!(matches!(result, Err(ExportError::InvalidArtboard(_))));
    }
}

//! Run entry points: walk the book page by page.
//!
//! One page is fully rendered, saved, OCR'd and appended before the next
//! one starts. That keeps output files in page order without any
//! reassembly step, and keeps at most one raster in memory.

use crate::config::ExtractionConfig;
use crate::detector::{TextDetector, VisionDetector};
use crate::error::{BookscanError, PageError};
use crate::pipeline::extract::extract_page_text;
use crate::pipeline::{input, render, write};
use crate::report::{DocumentMetadata, ExtractionReport, ExtractionStats, PageOutcome, PageStatus};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub use crate::pipeline::write::prepare_output;
pub use crate::ranges::resolve_range;

/// Extract every selected page of `config.pdf_path`.
///
/// # Returns
/// `Ok(ExtractionReport)` once every selected page was attempted, even if
/// some pages failed (check `report.stats.failed_pages`, or call
/// [`ExtractionReport::into_result`]).
///
/// # Errors
/// Returns `Err(BookscanError)` only for fatal errors, all raised before
/// the first page:
/// - empty range table
/// - PDF missing, unreadable or not a PDF
/// - OCR credentials missing or invalid
/// - the PDF cannot be opened, or no page is selected
/// - output folders or files cannot be created
///
/// Output files are only truncated once every other check has passed.
pub async fn extract(config: &ExtractionConfig) -> Result<ExtractionReport, BookscanError> {
    let total_start = Instant::now();
    info!("Starting extraction: {}", config.pdf_path.display());

    if config.ranges.is_empty() {
        return Err(BookscanError::InvalidConfig(
            "at least one page range is required".into(),
        ));
    }

    // ── Step 1: Validate input ───────────────────────────────────────────
    let resolved = input::resolve_local(&config.pdf_path)?;

    // ── Step 2: Resolve OCR backend ──────────────────────────────────────
    let detector = resolve_detector(config)?;
    debug!("OCR backend: {}", detector.name());

    // ── Step 3: Page count and selection ─────────────────────────────────
    let renderer = resolve_renderer(config, resolved.path());
    let total_pages = render::page_count(&renderer).await?;
    info!("PDF has {} pages", total_pages);

    let pages = config.pages.to_pages(total_pages);
    if pages.is_empty() {
        return Err(BookscanError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }
    debug!("Selected {} pages for extraction", pages.len());

    // ── Step 4: Prepare output folders and files ─────────────────────────
    write::create_dir(&config.images_dir).await?;
    let outputs = prepare_output(&config.ranges, &config.text_dir).await?;
    info!(
        "Prepared {} output file(s) in {}",
        outputs.len(),
        config.text_dir.display()
    );

    let uncovered: Vec<usize> = config
        .ranges
        .uncovered(total_pages)
        .into_iter()
        .filter(|p| pages.binary_search(p).is_ok())
        .collect();
    if !uncovered.is_empty() {
        warn!(
            "{} selected page(s) fall outside every range and will only be rendered: {:?}",
            uncovered.len(),
            uncovered
        );
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_start(pages.len());
    }

    // ── Step 5: Walk the pages in order ──────────────────────────────────
    let mut stats = ExtractionStats {
        total_pages,
        selected_pages: pages.len(),
        ..Default::default()
    };
    let mut outcomes = Vec::with_capacity(pages.len());

    for &page_num in &pages {
        if let Some(ref cb) = config.progress_callback {
            cb.on_page_start(page_num, pages.len());
        }

        let outcome = process_page(&renderer, &detector, page_num, config, &mut stats).await;

        match outcome.status {
            PageStatus::Extracted => stats.extracted_pages += 1,
            PageStatus::NoText => stats.empty_pages += 1,
            PageStatus::Unmapped => stats.unmapped_pages += 1,
            PageStatus::Failed => stats.failed_pages += 1,
        }

        if let Some(ref cb) = config.progress_callback {
            match &outcome.error {
                None => cb.on_page_complete(page_num, pages.len(), outcome.chars),
                Some(e) => cb.on_page_error(page_num, pages.len(), &e.to_string()),
            }
        }
        outcomes.push(outcome);
    }

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Extraction complete: {} with text, {} empty, {} unmapped, {} failed, {}ms total",
        stats.extracted_pages,
        stats.empty_pages,
        stats.unmapped_pages,
        stats.failed_pages,
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(pages.len(), stats.failed_pages);
    }

    Ok(ExtractionReport {
        pages: outcomes,
        outputs,
        stats,
    })
}

/// Read document metadata without rendering or OCR.
///
/// Needs neither credentials nor output folders.
pub async fn inspect(
    pdf_path: impl AsRef<Path>,
    pdfium_lib: Option<&Path>,
) -> Result<DocumentMetadata, BookscanError> {
    let resolved = input::resolve_local(pdf_path.as_ref())?;
    render::extract_metadata(resolved.path(), None, pdfium_lib).await
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Render → save → resolve → OCR/append for one page. Never fails the run.
async fn process_page(
    renderer: &Arc<dyn render::PageRenderer>,
    detector: &Arc<dyn TextDetector>,
    page_num: usize,
    config: &ExtractionConfig,
    stats: &mut ExtractionStats,
) -> PageOutcome {
    let start = Instant::now();
    let mut outcome = PageOutcome::new(page_num);

    let render_start = Instant::now();
    let rendered = render::render_page(renderer, page_num, config.dpi, &config.images_dir).await;
    stats.render_duration_ms += render_start.elapsed().as_millis() as u64;

    let image_path = match rendered {
        Ok(path) => path,
        Err(e) => {
            warn!("{}", e);
            outcome.status = PageStatus::Failed;
            outcome.error = Some(e);
            outcome.duration_ms = start.elapsed().as_millis() as u64;
            return outcome;
        }
    };
    outcome.image_path = Some(image_path.clone());

    let Some(output) = resolve_range(page_num, &config.ranges) else {
        debug!("Page {}: no range, image only", page_num);
        outcome.duration_ms = start.elapsed().as_millis() as u64;
        return outcome;
    };
    let output_file = config.text_dir.join(output);
    outcome.output = Some(output_file.clone());

    let ocr_start = Instant::now();
    let result = extract_page_text(detector, page_num, &image_path, &output_file, config).await;
    stats.ocr_duration_ms += ocr_start.elapsed().as_millis() as u64;

    match result {
        Ok(page) => {
            outcome.retries = page.retries;
            outcome.chars = page.written;
            outcome.status = if page.text.is_some() {
                PageStatus::Extracted
            } else {
                PageStatus::NoText
            };
        }
        Err(e) => {
            warn!("{}", e);
            if let PageError::OcrFailed { retries, .. } = &e {
                outcome.retries = *retries;
            }
            outcome.status = PageStatus::Failed;
            outcome.error = Some(e);
        }
    }

    outcome.duration_ms = start.elapsed().as_millis() as u64;
    outcome
}

/// The configured detector, else Google Vision from the environment.
fn resolve_detector(config: &ExtractionConfig) -> Result<Arc<dyn TextDetector>, BookscanError> {
    if let Some(ref detector) = config.detector {
        return Ok(Arc::clone(detector));
    }
    let vision = VisionDetector::from_env(config.api_timeout_secs)?;
    Ok(Arc::new(vision))
}

/// The configured renderer, else pdfium over `pdf_path`.
pub(crate) fn resolve_renderer(config: &ExtractionConfig, pdf_path: &Path) -> Arc<dyn render::PageRenderer> {
    if let Some(ref renderer) = config.renderer {
        return Arc::clone(renderer);
    }
    Arc::new(render::PdfiumRenderer::new(
        pdf_path,
        config.password.clone(),
        config.pdfium_lib_path.clone(),
    ))
}

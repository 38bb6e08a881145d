//! Per-page text bundle: one `page_<N>.txt` per page, zipped.
//!
//! Reuses [`crate::extract::extract`] with a single-page range per selected
//! page, run inside a temporary work directory. Pages without text still
//! get an (empty) entry so the archive always lists every selected page.

use crate::config::ExtractionConfig;
use crate::error::BookscanError;
use crate::extract::{extract, resolve_renderer};
use crate::pipeline::{input, render};
use crate::ranges::RangeTable;
use crate::report::ExtractionReport;
use std::io::{Cursor, ErrorKind, Write};
use std::path::Path;
use tempfile::TempDir;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Extract `pdf_path` page by page and write the text files to `zip_path`.
///
/// `config.pdf_path`, `images_dir`, `text_dir` and `ranges` are replaced;
/// every other setting (DPI, page selection, OCR backend, cleanup) applies.
pub async fn extract_to_zip(
    pdf_path: impl AsRef<Path>,
    zip_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionReport, BookscanError> {
    let zip_path = zip_path.as_ref();
    let (bytes, report) = bundle(pdf_path.as_ref(), config).await?;

    if let Some(parent) = zip_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        crate::pipeline::write::create_dir(parent).await?;
    }
    tokio::fs::write(zip_path, &bytes)
        .await
        .map_err(|e| BookscanError::OutputWriteFailed {
            path: zip_path.to_path_buf(),
            source: e,
        })?;

    info!("Wrote {} ({} bytes)", zip_path.display(), bytes.len());
    Ok(report)
}

/// An in-memory zip archive and the run that produced it.
#[derive(Debug)]
pub struct ZipBundle {
    /// Zip archive with one `page_<N>.txt` per selected page.
    pub bytes: Vec<u8>,
    /// Per-page outcomes; tells a failed page from a blank one.
    pub report: ExtractionReport,
}

/// Extract uploaded PDF bytes and return the zip archive in memory.
pub async fn extract_bytes_to_zip(
    bytes: &[u8],
    config: &ExtractionConfig,
) -> Result<ZipBundle, BookscanError> {
    let resolved = input::spill_bytes(bytes)?;
    let (bytes, report) = bundle(resolved.path(), config).await?;
    Ok(ZipBundle { bytes, report })
}

async fn bundle(
    pdf_path: &Path,
    config: &ExtractionConfig,
) -> Result<(Vec<u8>, ExtractionReport), BookscanError> {
    let resolved = input::resolve_local(pdf_path)?;
    let work = TempDir::new().map_err(|e| BookscanError::Internal(format!("tempdir: {e}")))?;

    let renderer = resolve_renderer(config, resolved.path());
    let total_pages = render::page_count(&renderer).await?;
    let pages = config.pages.to_pages(total_pages);
    if pages.is_empty() {
        return Err(BookscanError::PageOutOfRange {
            page: 0,
            total: total_pages,
        });
    }

    let page_config = ExtractionConfig {
        pdf_path: resolved.path().to_path_buf(),
        images_dir: work.path().join("images"),
        text_dir: work.path().join("text"),
        ranges: RangeTable::per_page(&pages)?,
        renderer: Some(renderer),
        ..config.clone()
    };

    let report = extract(&page_config).await?;
    let zip = zip_text_files(&page_config.text_dir, &pages)?;
    debug!("Bundled {} page file(s)", pages.len());
    Ok((zip, report))
}

/// Zip `page_<N>.txt` for every page, in page order.
///
/// A page file that was never written is an empty entry.
fn zip_text_files(text_dir: &Path, pages: &[usize]) -> Result<Vec<u8>, BookscanError> {
    let zip_err = |detail: String| BookscanError::ZipFailed {
        path: text_dir.to_path_buf(),
        detail,
    };

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for page in pages {
        let name = format!("page_{page}.txt");
        let text = match std::fs::read(text_dir.join(&name)) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(zip_err(format!("{name}: {e}"))),
        };
        writer
            .start_file(name.as_str(), options)
            .map_err(|e| zip_err(format!("{name}: {e}")))?;
        writer
            .write_all(&text)
            .map_err(|e| zip_err(format!("{name}: {e}")))?;
    }

    let cursor = writer.finish().map_err(|e| zip_err(e.to_string()))?;
    Ok(cursor.into_inner())
}

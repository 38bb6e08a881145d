//! # bookscan
//!
//! Turn a scanned book PDF into per-chapter text files with OCR.
//!
//! ## Why this crate?
//!
//! Scanned books have no usable text layer, and the chapters a reader cares
//! about are page ranges, not the whole document. This crate renders every
//! page to a PNG at a fixed DPI, sends each image to an OCR service, and
//! appends the recognised text to the output file of the page range the
//! page belongs to. The PNGs stay on disk next to the text, so any page can
//! be checked against what the OCR read.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate the path and %PDF magic
//!  ├─ 2. Prepare  create folders, truncate every range output file
//!  ├─ 3. Render   page → <images>/<N>.png via pdfium (spawn_blocking)
//!  ├─ 4. Resolve  page → range → output file (binary search)
//!  ├─ 5. OCR      PNG → Google Vision TEXT_DETECTION, retry on 429/5xx
//!  ├─ 6. Clean    line endings, invisible chars, optional script filter
//!  └─ 7. Append   text + page marker → <text>/<output>
//! ```
//!
//! Pages run strictly one after another. A page that fails to render, OCR
//! or append is logged and recorded in the [`ExtractionReport`]; the run
//! carries on with the next page.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bookscan::{extract, ExtractionConfig, PageRange, RangeTable};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Credentials from GOOGLE_VISION_API_KEY or GOOGLE_APPLICATION_CREDENTIALS
//!     let config = ExtractionConfig::builder()
//!         .pdf_path("uploads/book.pdf")
//!         .ranges(RangeTable::new(vec![
//!             PageRange::new(1, 3, "intro.md"),
//!             PageRange::new(4, 120, "part_one.md"),
//!         ])?)
//!         .build()?;
//!     let report = extract(&config).await?;
//!     eprintln!(
//!         "{} pages with text, {} failed",
//!         report.stats.extracted_pages, report.stats.failed_pages
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `bookscan` binary (clap + indicatif + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! bookscan = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod bundle;
pub mod config;
pub mod detector;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod progress;
pub mod ranges;
pub mod report;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use bundle::{extract_bytes_to_zip, extract_to_zip, ZipBundle};
pub use config::{
    ExtractionConfig, ExtractionConfigBuilder, PageSelection, PageSeparator,
    ARABIC_SCRIPT_PATTERN, DEFAULT_DPI, MAX_RETRIES_LIMIT,
};
pub use detector::{TextAnnotation, TextDetector, VisionCredentials, VisionDetector};
pub use error::{BookscanError, DetectionError, PageError};
pub use extract::{extract, inspect, prepare_output, resolve_range};
pub use pipeline::extract::extract_text;
pub use pipeline::render::{render_page, PageRenderer, PdfiumRenderer};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use ranges::{PageRange, RangeTable};
pub use report::{DocumentMetadata, ExtractionReport, ExtractionStats, PageOutcome, PageStatus};

//! Progress-callback trait for per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events while the pipeline walks the book. Pages are processed strictly in
//! order, so events for page `n + 1` never arrive before page `n` finished.
//!
//! # Example
//!
//! ```rust
//! use bookscan::{ExtractionProgressCallback, ExtractionConfig, PageRange, RangeTable};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CharCounter {
//!     chars: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for CharCounter {
//!     fn on_page_complete(&self, _page_num: usize, _total_pages: usize, text_len: usize) {
//!         self.chars.fetch_add(text_len, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(CharCounter { chars: AtomicUsize::new(0) });
//!
//! let config = ExtractionConfig::builder()
//!     .ranges(RangeTable::new(vec![PageRange::new(1, 10, "book.md")]).unwrap())
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes each page.
///
/// All methods default to no-ops so implementors only override what they
/// need. Implementations must be `Send + Sync` because the config that
/// carries them is shared across tasks.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once, after the page count is known and before page 1.
    ///
    /// * `total_pages` — number of pages selected for this run
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page is rendered.
    fn on_page_start(&self, page_num: usize, total_pages: usize) {
        let _ = (page_num, total_pages);
    }

    /// Called when a page finished without error.
    ///
    /// * `text_len` — bytes appended to the output file; `0` for pages
    ///   outside every range or with no detected text
    fn on_page_complete(&self, page_num: usize, total_pages: usize, text_len: usize) {
        let _ = (page_num, total_pages, text_len);
    }

    /// Called when a page failed (render, OCR after retries, or write).
    fn on_page_error(&self, page_num: usize, total_pages: usize, error: &str) {
        let _ = (page_num, total_pages, error);
    }

    /// Called once after every selected page was attempted.
    fn on_extraction_complete(&self, total_pages: usize, failed_pages: usize) {
        let _ = (total_pages, failed_pages);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

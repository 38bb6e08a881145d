//! Results of an extraction run.

use crate::error::{BookscanError, PageError};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Document information read by [`crate::extract::inspect`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub page_count: usize,
    pub pdf_version: String,
}

/// What happened to one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStatus {
    /// Text was appended to the range's output file.
    Extracted,
    /// The page is ranged but the OCR found no text.
    NoText,
    /// No range covers the page; only the image was written.
    Unmapped,
    /// Rendering, OCR or writing failed; see [`PageOutcome::error`].
    Failed,
}

/// Per-page record of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageOutcome {
    /// 1-indexed page number.
    pub page_num: usize,
    pub status: PageStatus,
    /// Rendered PNG, when rendering succeeded.
    pub image_path: Option<PathBuf>,
    /// Output file of the page's range, when it has one.
    pub output: Option<PathBuf>,
    /// Bytes of text appended for this page.
    pub chars: usize,
    /// OCR retries spent on this page.
    pub retries: u32,
    pub duration_ms: u64,
    pub error: Option<PageError>,
}

impl PageOutcome {
    pub(crate) fn new(page_num: usize) -> Self {
        Self {
            page_num,
            status: PageStatus::Unmapped,
            image_path: None,
            output: None,
            chars: 0,
            retries: 0,
            duration_ms: 0,
            error: None,
        }
    }
}

/// Aggregate counters for a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Pages in the PDF.
    pub total_pages: usize,
    /// Pages selected for this run.
    pub selected_pages: usize,
    pub extracted_pages: usize,
    pub empty_pages: usize,
    pub unmapped_pages: usize,
    pub failed_pages: usize,
    pub render_duration_ms: u64,
    pub ocr_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// Everything a run produced, in page order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionReport {
    pub pages: Vec<PageOutcome>,
    /// Output files prepared (truncated) at run start.
    pub outputs: Vec<PathBuf>,
    pub stats: ExtractionStats,
}

impl ExtractionReport {
    /// Treat any failed page as an error.
    pub fn into_result(self) -> Result<Self, BookscanError> {
        if self.stats.failed_pages > 0 {
            return Err(BookscanError::PartialFailure {
                failed: self.stats.failed_pages,
                total: self.stats.selected_pages,
            });
        }
        Ok(self)
    }

    pub fn page(&self, page_num: usize) -> Option<&PageOutcome> {
        self.pages.iter().find(|p| p.page_num == page_num)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PageError> {
        self.pages.iter().filter_map(|p| p.error.as_ref())
    }
}

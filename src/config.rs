//! Configuration for an extraction run.
//!
//! Every input of a run lives in one explicit [`ExtractionConfig`]: the PDF
//! path, the two output folders, the DPI and the range table. Nothing in the
//! library reads process environment while a run is in progress, so two runs
//! with different configs can execute side by side in the same process (and
//! in the same test binary).
//!
//! Build it with [`ExtractionConfig::builder()`]; `build()` validates the
//! values that would otherwise fail half-way through a book.

use crate::detector::TextDetector;
use crate::error::BookscanError;
use crate::pipeline::render::PageRenderer;
use crate::progress::ProgressCallback;
use crate::ranges::RangeTable;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Rendering resolution used when none is configured.
///
/// Keep it fixed across runs of the same book: image sizes, and any tooling
/// that refers to rendered pages by pixel or line position, depend on it.
pub const DEFAULT_DPI: u32 = 300;

/// Keeps only lines containing at least one Arabic-script character.
///
/// Useful for Urdu/Arabic/Persian scans where the OCR also returns
/// Latin-looking noise from page furniture.
pub const ARABIC_SCRIPT_PATTERN: &str = r"[؀-ۿ]";

/// Upper bound accepted for [`ExtractionConfig::max_retries`].
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Configuration for one extraction run.
///
/// # Example
/// ```rust
/// use bookscan::{ExtractionConfig, PageRange, RangeTable};
///
/// let ranges = RangeTable::new(vec![
///     PageRange::new(1, 3, "intro.md"),
///     PageRange::new(4, 10, "body.md"),
/// ])
/// .unwrap();
///
/// let config = ExtractionConfig::builder()
///     .pdf_path("uploads/book.pdf")
///     .images_dir("book/images")
///     .text_dir("book/content")
///     .ranges(ranges)
///     .build()
///     .unwrap();
/// assert_eq!(config.dpi, 300);
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Source PDF.
    pub pdf_path: PathBuf,

    /// Folder receiving one `<page>.png` per rendered page.
    pub images_dir: PathBuf,

    /// Folder receiving the range output files.
    pub text_dir: PathBuf,

    /// Rasterisation DPI. Range: 72–600. Default: 300.
    pub dpi: u32,

    /// Page ranges and their output files.
    pub ranges: RangeTable,

    /// Which pages of the PDF to process. Default: all.
    pub pages: PageSelection,

    /// Marker written between two pages' text in the same file.
    /// Default: [`PageSeparator::Comment`].
    pub page_separator: PageSeparator,

    /// Retry attempts for a retryable OCR failure. Default: 2.
    pub max_retries: u32,

    /// Initial retry delay; doubles after each attempt. Default: 500 ms.
    pub retry_backoff_ms: u64,

    /// Longest single wait between attempts, including server
    /// `Retry-After` hints. Default: 60 s.
    pub max_retry_wait_ms: u64,

    /// Per-request OCR timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// BCP-47 language hints forwarded to the OCR service, e.g. `["ur"]`.
    pub language_hints: Vec<String>,

    /// Keep only text lines matching this pattern. Default: keep everything.
    pub line_filter: Option<Regex>,

    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Explicit libpdfium location. Falls back to the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Pre-constructed OCR backend. When `None` a Google Vision detector is
    /// built from the environment at run start.
    pub detector: Option<Arc<dyn TextDetector>>,

    /// Pre-constructed page renderer. When `None` pdfium is used.
    pub renderer: Option<Arc<dyn PageRenderer>>,

    /// Per-page progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            pdf_path: PathBuf::from("uploads/book.pdf"),
            images_dir: PathBuf::from("images"),
            text_dir: PathBuf::from("text"),
            dpi: DEFAULT_DPI,
            ranges: RangeTable::default(),
            pages: PageSelection::default(),
            page_separator: PageSeparator::default(),
            max_retries: 2,
            retry_backoff_ms: 500,
            max_retry_wait_ms: 60_000,
            api_timeout_secs: 60,
            language_hints: Vec::new(),
            line_filter: None,
            password: None,
            pdfium_lib_path: None,
            detector: None,
            renderer: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("pdf_path", &self.pdf_path)
            .field("images_dir", &self.images_dir)
            .field("text_dir", &self.text_dir)
            .field("dpi", &self.dpi)
            .field("ranges", &self.ranges.len())
            .field("pages", &self.pages)
            .field("page_separator", &self.page_separator)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("max_retry_wait_ms", &self.max_retry_wait_ms)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("language_hints", &self.language_hints)
            .field("line_filter", &self.line_filter.as_ref().map(Regex::as_str))
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("detector", &self.detector.as_ref().map(|d| d.name()))
            .field("renderer", &self.renderer.as_ref().map(|_| "<dyn PageRenderer>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
            line_filter: None,
        }
    }
}

/// Builder for [`ExtractionConfig`].
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
    line_filter: Option<String>,
}

impl fmt::Debug for ExtractionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfigBuilder")
            .field("config", &self.config)
            .field("line_filter", &self.line_filter)
            .finish()
    }
}

impl ExtractionConfigBuilder {
    pub fn pdf_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdf_path = path.into();
        self
    }

    pub fn images_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.images_dir = dir.into();
        self
    }

    pub fn text_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.text_dir = dir.into();
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi;
        self
    }

    pub fn ranges(mut self, ranges: RangeTable) -> Self {
        self.config.ranges = ranges;
        self
    }

    pub fn pages(mut self, selection: PageSelection) -> Self {
        self.config.pages = selection;
        self
    }

    pub fn page_separator(mut self, sep: PageSeparator) -> Self {
        self.config.page_separator = sep;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn max_retry_wait_ms(mut self, ms: u64) -> Self {
        self.config.max_retry_wait_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn language_hints<I, S>(mut self, hints: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.language_hints = hints.into_iter().map(Into::into).collect();
        self
    }

    /// Keep only lines matching `pattern` (compiled in [`Self::build`]).
    pub fn line_filter(mut self, pattern: impl Into<String>) -> Self {
        self.line_filter = Some(pattern.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn detector(mut self, detector: Arc<dyn TextDetector>) -> Self {
        self.config.detector = Some(detector);
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(mut self) -> Result<ExtractionConfig, BookscanError> {
        let c = &self.config;
        if c.dpi < 72 || c.dpi > 600 {
            return Err(BookscanError::InvalidConfig(format!(
                "DPI must be 72–600, got {}",
                c.dpi
            )));
        }
        if c.max_retries > MAX_RETRIES_LIMIT {
            return Err(BookscanError::InvalidConfig(format!(
                "max retries must be at most {}, got {}",
                MAX_RETRIES_LIMIT, c.max_retries
            )));
        }
        if c.images_dir == c.text_dir {
            return Err(BookscanError::InvalidConfig(format!(
                "images and text folders must differ (both are {:?})",
                c.images_dir
            )));
        }
        if let Some(pattern) = self.line_filter.take() {
            let re = Regex::new(&pattern).map_err(|e| {
                BookscanError::InvalidConfig(format!("invalid line filter '{pattern}': {e}"))
            })?;
            self.config.line_filter = Some(re);
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Specifies which pages of the PDF to process.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSelection {
    /// Every page (default).
    #[default]
    All,
    /// A single page (1-indexed).
    Single(usize),
    /// A contiguous range of pages (1-indexed, inclusive).
    Range(usize, usize),
    /// Specific pages (1-indexed, deduplicated).
    Set(Vec<usize>),
}

impl PageSelection {
    /// Expand the selection into sorted, deduplicated 1-based page numbers
    /// that exist in a document of `total_pages` pages.
    pub fn to_pages(&self, total_pages: usize) -> Vec<usize> {
        let in_doc = |p: &usize| *p >= 1 && *p <= total_pages;
        let mut pages: Vec<usize> = match self {
            PageSelection::All => (1..=total_pages).collect(),
            PageSelection::Single(p) => std::iter::once(*p).filter(in_doc).collect(),
            PageSelection::Range(start, end) => ((*start).max(1)..=(*end).min(total_pages)).collect(),
            PageSelection::Set(pages) => pages.iter().copied().filter(in_doc).collect(),
        };
        pages.sort_unstable();
        pages.dedup();
        pages
    }
}

/// Marker written between consecutive pages appended to the same file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageSeparator {
    /// Blank line only: "\n\n".
    None,
    /// Horizontal rule: "\n\n---\n\n"
    HorizontalRule,
    /// HTML comment with page number: "<!-- page N -->" (default)
    #[default]
    Comment,
    /// Custom string; `{page}` is replaced by the page number.
    Custom(String),
}

impl PageSeparator {
    /// Render the separator placed before page `page_num` (1-indexed).
    pub fn render(&self, page_num: usize) -> String {
        match self {
            PageSeparator::None => "\n\n".to_string(),
            PageSeparator::HorizontalRule => "\n\n---\n\n".to_string(),
            PageSeparator::Comment => format!("\n\n<!-- page {} -->\n\n", page_num),
            PageSeparator::Custom(s) => {
                format!("\n\n{}\n\n", s.replace("{page}", &page_num.to_string()))
            }
        }
    }
}

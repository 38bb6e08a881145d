//! Error types for the bookscan library.
//!
//! Three error types map onto three failure scopes:
//!
//! * [`BookscanError`] — **Fatal**: the run cannot start or cannot continue
//!   at all (missing PDF, bad credentials, overlapping ranges). Returned as
//!   `Err(BookscanError)` from [`crate::extract::extract`] and friends.
//!
//! * [`PageError`] — **Per page**: one page could not be rendered, read or
//!   written. Stored in [`crate::report::PageOutcome`]; the run moves on to
//!   the next page.
//!
//! * [`DetectionError`] — returned by a [`crate::detector::TextDetector`].
//!   The pipeline retries the retryable variants and folds the final
//!   failure into [`PageError::OcrFailed`].

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the bookscan library.
#[derive(Debug, Error)]
pub enum BookscanError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck UPLOAD_FOLDER / PDF_FILENAME or pass --pdf.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    /// The page selection matched no page of the document.
    #[error("Page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    // ── Range table errors ────────────────────────────────────────────────
    /// A single range is malformed (zero page, start after end, bad file name).
    #[error("Invalid page range '{range}': {reason}")]
    InvalidRange { range: String, reason: String },

    /// Two ranges share at least one page.
    #[error("Page ranges {first} and {second} overlap; every page may belong to at most one range")]
    OverlappingRanges { first: String, second: String },

    // ── OCR credential errors ─────────────────────────────────────────────
    /// No usable credentials were found for the OCR service.
    #[error("OCR credentials are not configured.\n{hint}")]
    CredentialsMissing { hint: String },

    /// A credentials file was found but could not be used.
    #[error("Invalid OCR credentials in '{path}': {reason}")]
    InvalidCredentials { path: PathBuf, reason: String },

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Install libpdfium system-wide, or set PDFIUM_LIB_PATH=/path/to/libpdfium.\n\
Prebuilt binaries: https://github.com/bblanchon/pdfium-binaries/releases\n"
    )]
    PdfiumBindingFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create, truncate or write an output file or folder.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Building the per-page zip archive failed.
    #[error("Failed to build zip archive '{path}': {detail}")]
    ZipFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Some pages succeeded but at least one failed.
    ///
    /// Returned by [`crate::report::ExtractionReport::into_result`] when
    /// the caller wants to treat any page failure as an error.
    #[error("{failed}/{total} pages failed during extraction")]
    PartialFailure { failed: usize, total: usize },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single page.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
pub enum PageError {
    /// Page rasterisation or image saving failed.
    #[error("Page {page}: rasterisation failed: {detail}")]
    RenderFailed { page: usize, detail: String },

    /// OCR call failed after retries.
    #[error("Page {page}: OCR failed after {retries} retries: {detail}")]
    OcrFailed {
        page: usize,
        retries: u32,
        detail: String,
    },

    /// Extracted text could not be appended to its output file.
    #[error("Page {page}: could not append to '{path}': {detail}")]
    WriteFailed {
        page: usize,
        path: PathBuf,
        detail: String,
    },
}

/// Failure reported by a [`crate::detector::TextDetector`] for one image.
#[derive(Debug, Clone, Error)]
pub enum DetectionError {
    /// HTTP 429; `retry_after_secs` carries the server hint when present.
    #[error("rate limit exceeded by '{service}'")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    /// HTTP 401/403 — retrying will not help.
    #[error("authentication rejected by '{service}': {detail}")]
    Auth { service: String, detail: String },

    /// HTTP 5xx.
    #[error("server error {status} from '{service}': {detail}")]
    Server {
        service: String,
        status: u16,
        detail: String,
    },

    /// The service answered but reported an error for this image.
    #[error("OCR API error {code}: {message}")]
    Api { code: i32, message: String },

    /// The request did not complete within the configured timeout.
    #[error("OCR request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// Connection-level failure.
    #[error("OCR transport error: {0}")]
    Transport(String),

    /// The response body could not be understood.
    #[error("unexpected OCR response: {0}")]
    InvalidResponse(String),
}

impl DetectionError {
    /// Whether a later attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DetectionError::RateLimited { .. }
                | DetectionError::Server { .. }
                | DetectionError::Timeout { .. }
                | DetectionError::Transport(_)
        )
    }

    /// Server-requested delay before the next attempt, if any.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            DetectionError::RateLimited {
                retry_after_secs, ..
            } => *retry_after_secs,
            _ => None,
        }
    }
}

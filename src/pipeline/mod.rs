//! Pipeline stages for page-range OCR extraction.
//!
//! Each submodule implements exactly one step, and the orchestration in
//! [`crate::extract`] chains them page by page.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ (range lookup) ──▶ extract ──▶ postprocess ──▶ write
//! (path)    (pdfium)                      (OCR)        (cleanup)      (append)
//! ```
//!
//! 1. [`input`]  — validate the PDF path and magic bytes
//! 2. [`render`] — rasterise one page and save `<page>.png`; pdfium runs in
//!    `spawn_blocking` because it is not async-safe
//! 3. [`extract`] — read the PNG back, call the OCR backend with
//!    retry/backoff; the only stage with network I/O
//! 4. [`postprocess`] — deterministic cleanup of OCR text
//! 5. [`write`] — truncate outputs at run start, then append page by page

pub mod extract;
pub mod input;
pub mod postprocess;
pub mod render;
pub mod write;

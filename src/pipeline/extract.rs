//! OCR stage: send a page PNG to the detector and append the text.
//!
//! ## Retry Strategy
//!
//! Rate limiting, 5xx answers and dropped connections are transient.
//! They are retried with exponential backoff
//! (`retry_backoff_ms * 2^(attempt-1)`): with 500 ms base and 2 retries
//! the waits are 500 ms then 1 s. A `Retry-After` hint from the service
//! wins when it asks for a longer wait. No single wait exceeds
//! `max_retry_wait_ms`. Auth and API errors fail at once.

use crate::config::ExtractionConfig;
use crate::detector::{full_text, TextAnnotation, TextDetector};
use crate::error::{DetectionError, PageError};
use crate::pipeline::postprocess::clean_text;
use crate::pipeline::write::append_page;
use std::path::Path;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Annotations for one page plus the retries it took to get them.
#[derive(Debug, Clone)]
pub struct Detected {
    pub annotations: Vec<TextAnnotation>,
    pub retries: u32,
}

/// Text appended for one page.
#[derive(Debug, Clone, Default)]
pub struct PageText {
    /// Cleaned text as appended, `None` when the page had no text.
    pub text: Option<String>,
    /// Bytes written to the output file, page marker included.
    pub written: usize,
    pub retries: u32,
}

/// OCR one rendered page and append its text to `output_file`.
///
/// Zero annotations, or text that is empty after cleanup, append nothing
/// and return `Ok(None)`.
pub async fn extract_text(
    detector: &Arc<dyn TextDetector>,
    page_num: usize,
    image_path: &Path,
    output_file: &Path,
    config: &ExtractionConfig,
) -> Result<Option<String>, PageError> {
    extract_page_text(detector, page_num, image_path, output_file, config)
        .await
        .map(|page| page.text)
}

/// [`extract_text`] with write and retry accounting for the run report.
pub(crate) async fn extract_page_text(
    detector: &Arc<dyn TextDetector>,
    page_num: usize,
    image_path: &Path,
    output_file: &Path,
    config: &ExtractionConfig,
) -> Result<PageText, PageError> {
    let png = tokio::fs::read(image_path)
        .await
        .map_err(|e| PageError::OcrFailed {
            page: page_num,
            retries: 0,
            detail: format!("reading {}: {e}", image_path.display()),
        })?;

    let detected = detect_with_retry(detector, page_num, &png, config).await?;

    let raw = match full_text(&detected.annotations) {
        Some(t) => t,
        None => {
            debug!("Page {}: no text detected", page_num);
            return Ok(PageText {
                retries: detected.retries,
                ..Default::default()
            });
        }
    };

    let cleaned = clean_text(raw, config.line_filter.as_ref());
    if cleaned.is_empty() {
        debug!("Page {}: text empty after cleanup", page_num);
        return Ok(PageText {
            retries: detected.retries,
            ..Default::default()
        });
    }

    let written = append_page(output_file, page_num, &cleaned, &config.page_separator).await?;
    debug!(
        "Page {}: appended {} bytes to {}",
        page_num,
        written,
        output_file.display()
    );

    Ok(PageText {
        text: Some(cleaned),
        written,
        retries: detected.retries,
    })
}

/// Call the detector, retrying transient failures.
pub async fn detect_with_retry(
    detector: &Arc<dyn TextDetector>,
    page_num: usize,
    png: &[u8],
    config: &ExtractionConfig,
) -> Result<Detected, PageError> {
    let mut attempt: u32 = 0;
    loop {
        match detector.detect_text(png, &config.language_hints).await {
            Ok(annotations) => {
                return Ok(Detected {
                    annotations,
                    retries: attempt,
                })
            }
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                attempt += 1;
                let wait = retry_wait(config, attempt, &e);
                warn!(
                    "Page {}: {} ({}); retry {}/{} after {}ms",
                    page_num,
                    e,
                    detector.name(),
                    attempt,
                    config.max_retries,
                    wait
                );
                sleep(Duration::from_millis(wait)).await;
            }
            Err(e) => {
                return Err(PageError::OcrFailed {
                    page: page_num,
                    retries: attempt,
                    detail: e.to_string(),
                })
            }
        }
    }
}

/// Delay before retry `attempt` (1-based): exponential backoff, or the
/// server's `Retry-After` hint when longer, never above `max_retry_wait_ms`.
fn retry_wait(config: &ExtractionConfig, attempt: u32, err: &DetectionError) -> u64 {
    let backoff = config
        .retry_backoff_ms
        .saturating_mul(2u64.saturating_pow(attempt.saturating_sub(1)));
    let hinted = err.retry_after_secs().unwrap_or(0).saturating_mul(1000);
    backoff.max(hinted).min(config.max_retry_wait_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails `failures` times with `error`, then returns `text`.
    struct Flaky {
        failures: u32,
        error: DetectionError,
        text: &'static str,
        calls: AtomicU32,
    }

    impl Flaky {
        fn new(failures: u32, error: DetectionError, text: &'static str) -> Arc<dyn TextDetector> {
            Arc::new(Self {
                failures,
                error,
                text,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl TextDetector for Flaky {
        async fn detect_text(
            &self,
            _png: &[u8],
            _hints: &[String],
        ) -> Result<Vec<TextAnnotation>, DetectionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(self.error.clone());
            }
            if self.text.is_empty() {
                return Ok(vec![]);
            }
            Ok(vec![TextAnnotation::new(self.text), TextAnnotation::new("word")])
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn config(max_retries: u32) -> ExtractionConfig {
        ExtractionConfig {
            max_retries,
            retry_backoff_ms: 1,
            ..Default::default()
        }
    }

    fn server_error() -> DetectionError {
        DetectionError::Server {
            service: "test".into(),
            status: 503,
            detail: "unavailable".into(),
        }
    }

    #[tokio::test]
    async fn retries_transient_errors() {
        let detector = Flaky::new(2, server_error(), "hello");
        let detected = detect_with_retry(&detector, 1, b"png", &config(2))
            .await
            .unwrap();
        assert_eq!(detected.retries, 2);
        assert_eq!(detected.annotations[0].description, "hello");
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let detector = Flaky::new(5, server_error(), "hello");
        let err = detect_with_retry(&detector, 3, b"png", &config(1))
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::OcrFailed { page: 3, retries: 1, .. }));
    }

    #[tokio::test]
    async fn huge_retry_after_is_capped() {
        let limited = DetectionError::RateLimited {
            service: "test".into(),
            retry_after_secs: Some(u64::MAX / 100),
        };
        let detector = Flaky::new(1, limited, "hello");
        let config = ExtractionConfig {
            max_retry_wait_ms: 1,
            ..config(1)
        };
        let detected = detect_with_retry(&detector, 4, b"png", &config)
            .await
            .unwrap();
        assert_eq!(detected.retries, 1);
    }

    #[test]
    fn retry_wait_saturates_and_caps() {
        let config = ExtractionConfig {
            retry_backoff_ms: u64::MAX / 2,
            max_retry_wait_ms: 60_000,
            ..Default::default()
        };
        assert_eq!(retry_wait(&config, 40, &server_error()), 60_000);

        let config = ExtractionConfig::default();
        assert_eq!(retry_wait(&config, 1, &server_error()), 500);
        assert_eq!(retry_wait(&config, 2, &server_error()), 1_000);
        let limited = DetectionError::RateLimited {
            service: "test".into(),
            retry_after_secs: Some(3),
        };
        assert_eq!(retry_wait(&config, 1, &limited), 3_000);
        let limited = DetectionError::RateLimited {
            service: "test".into(),
            retry_after_secs: Some(86_400),
        };
        assert_eq!(retry_wait(&config, 1, &limited), 60_000);
    }

    #[tokio::test]
    async fn auth_errors_are_not_retried() {
        let auth = DetectionError::Auth {
            service: "test".into(),
            detail: "bad key".into(),
        };
        let detector = Flaky::new(1, auth, "hello");
        let err = detect_with_retry(&detector, 2, b"png", &config(3))
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::OcrFailed { retries: 0, .. }));
    }

    #[tokio::test]
    async fn appends_first_annotation_only() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("1.png");
        let out = dir.path().join("ch.md");
        std::fs::write(&image, b"png").unwrap();
        std::fs::write(&out, "").unwrap();

        let detector = Flaky::new(0, server_error(), "full page text  ");
        let text = extract_text(&detector, 1, &image, &out, &config(0))
            .await
            .unwrap();

        assert_eq!(text.as_deref(), Some("full page text\n"));
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "full page text\n");
    }

    #[tokio::test]
    async fn no_annotations_appends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("1.png");
        let out = dir.path().join("ch.md");
        std::fs::write(&image, b"png").unwrap();
        std::fs::write(&out, "earlier\n").unwrap();

        let detector = Flaky::new(0, server_error(), "");
        let text = extract_text(&detector, 2, &image, &out, &config(0))
            .await
            .unwrap();

        assert!(text.is_none());
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "earlier\n");
    }

    #[tokio::test]
    async fn missing_image_is_ocr_failure() {
        let dir = tempfile::tempdir().unwrap();
        let detector = Flaky::new(0, server_error(), "x");
        let err = extract_text(
            &detector,
            9,
            &dir.path().join("9.png"),
            &dir.path().join("ch.md"),
            &config(0),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PageError::OcrFailed { page: 9, .. }));
    }
}

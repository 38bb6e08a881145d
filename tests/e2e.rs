//! End-to-end tests against real PDFs, pdfium and Google Cloud Vision.
//!
//! These tests use PDF files in `./test_cases/` and make live OCR calls.
//! They are gated behind the `E2E_ENABLED` environment variable so they do
//! not run in CI unless explicitly requested.
//!
//! Run with:
//!   E2E_ENABLED=1 GOOGLE_VISION_API_KEY=... \
//!   PDFIUM_LIB_PATH=. cargo test --test e2e -- --nocapture
//!
//! To restrict to a specific test:
//!   E2E_ENABLED=1 cargo test --test e2e test_inspect -- --nocapture

use bookscan::{
    extract, extract_to_zip, inspect, BookscanError, ExtractionConfig, PageRange, PageSelection,
    PageStatus, RangeTable, ARABIC_SCRIPT_PATTERN,
};
use std::path::PathBuf;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn test_cases_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("test_cases")
}

fn output_dir(name: &str) -> PathBuf {
    let d = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_cases/output")
        .join(name);
    std::fs::create_dir_all(&d).ok();
    d
}

fn pdfium_lib() -> Option<PathBuf> {
    std::env::var("PDFIUM_LIB_PATH").ok().map(PathBuf::from)
}

/// Skip this test if E2E_ENABLED is not set *or* no PDF file at `path`.
macro_rules! e2e_skip_unless_ready {
    ($path:expr) => {{
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run e2e tests");
            return;
        }
        let p: PathBuf = $path;
        if !p.exists() {
            println!("SKIP — test file not found: {}", p.display());
            return;
        }
        p
    }};
}

/// Skip this test unless Vision credentials are configured.
macro_rules! e2e_skip_without_credentials {
    () => {
        if std::env::var("GOOGLE_VISION_API_KEY").is_err()
            && std::env::var("GOOGLE_APPLICATION_CREDENTIALS").is_err()
        {
            println!("SKIP — set GOOGLE_VISION_API_KEY or GOOGLE_APPLICATION_CREDENTIALS");
            return;
        }
    };
}

/// Assert OCR output passes basic cleanup checks.
fn assert_text_quality(text: &str, context: &str) {
    assert!(!text.trim().is_empty(), "[{context}] text is empty");
    assert!(
        text.ends_with('\n'),
        "[{context}] text must end with a newline"
    );
    assert!(
        !text.contains("\n\n\n\n"),
        "[{context}] text has more than 3 consecutive newlines"
    );
    assert!(!text.contains('\r'), "[{context}] text contains CR");

    let invisible = ['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'];
    for ch in invisible {
        assert!(
            !text.contains(ch),
            "[{context}] text contains invisible char U+{:04X}",
            ch as u32
        );
    }

    println!("[{context}] ✓  {} bytes, quality checks passed", text.len());
}

// ── Inspect tests (no OCR) ───────────────────────────────────────────────────

#[tokio::test]
async fn test_inspect_sample_book() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample_book.pdf"));

    let meta = inspect(&path, pdfium_lib().as_deref())
        .await
        .expect("inspect() should succeed");

    assert!(meta.page_count > 0);
    assert!(!meta.pdf_version.is_empty());
    println!("Metadata: {:?}", meta);
}

#[tokio::test]
async fn test_inspect_nonexistent() {
    if std::env::var("E2E_ENABLED").is_err() {
        println!("SKIP");
        return;
    }

    let result = inspect("/definitely/not/a/real/file.pdf", pdfium_lib().as_deref()).await;
    assert!(matches!(result, Err(BookscanError::FileNotFound { .. })));
}

// ── Extraction tests (need Vision credentials) ──────────────────────────────

/// Two ranges over the first pages of the sample book.
#[tokio::test]
async fn test_extract_first_pages() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample_book.pdf"));
    e2e_skip_without_credentials!();
    let out = output_dir("first_pages");

    let mut builder = ExtractionConfig::builder()
        .pdf_path(&path)
        .images_dir(out.join("images"))
        .text_dir(out.join("text"))
        .pages(PageSelection::Range(1, 3))
        .ranges(
            RangeTable::new(vec![
                PageRange::new(1, 1, "first.md"),
                PageRange::new(2, 3, "rest.md"),
            ])
            .unwrap(),
        );
    if let Some(lib) = pdfium_lib() {
        builder = builder.pdfium_lib_path(lib);
    }
    let config = builder.build().expect("valid config");

    let report = extract(&config).await.expect("extraction should succeed");

    assert_eq!(report.stats.selected_pages, 3);
    assert_eq!(report.stats.failed_pages, 0, "{:?}", report.failures().collect::<Vec<_>>());
    for page in 1..=3 {
        assert!(out.join(format!("images/{page}.png")).exists());
    }

    let first = std::fs::read_to_string(out.join("text/first.md")).unwrap();
    if report.page(1).map(|p| p.status) == Some(PageStatus::Extracted) {
        assert_text_quality(&first, "first_pages");
    }
    println!("--- BEGIN first.md ---\n{first}\n--- END first.md ---");
}

/// Urdu sample: keep Arabic-script lines only.
#[tokio::test]
async fn test_extract_urdu_page() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("urdu_sample.pdf"));
    e2e_skip_without_credentials!();
    let out = output_dir("urdu");

    let mut builder = ExtractionConfig::builder()
        .pdf_path(&path)
        .images_dir(out.join("images"))
        .text_dir(out.join("text"))
        .pages(PageSelection::Single(1))
        .language_hints(["ur"])
        .line_filter(ARABIC_SCRIPT_PATTERN)
        .ranges(RangeTable::new(vec![PageRange::with_default_output(1, 1)]).unwrap());
    if let Some(lib) = pdfium_lib() {
        builder = builder.pdfium_lib_path(lib);
    }
    let config = builder.build().expect("valid config");

    let report = extract(&config).await.expect("extraction should succeed");
    assert_eq!(report.stats.failed_pages, 0);

    let text = std::fs::read_to_string(out.join("text/range_1_1.md")).unwrap();
    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        assert!(
            line.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c)),
            "non-Arabic-script line survived: {line:?}"
        );
    }
    println!("--- BEGIN urdu ---\n{text}\n--- END urdu ---");
}

/// Per-page zip bundle of the first two pages.
#[tokio::test]
async fn test_bundle_first_pages() {
    let path = e2e_skip_unless_ready!(test_cases_dir().join("sample_book.pdf"));
    e2e_skip_without_credentials!();
    let zip_path = output_dir("bundle").join("pages.zip");

    let mut builder = ExtractionConfig::builder().pages(PageSelection::Range(1, 2));
    if let Some(lib) = pdfium_lib() {
        builder = builder.pdfium_lib_path(lib);
    }
    let config = builder.build().expect("valid config");

    let report = extract_to_zip(&path, &zip_path, &config)
        .await
        .expect("bundle should succeed");

    assert_eq!(report.stats.selected_pages, 2);
    assert!(zip_path.exists());
    println!("[bundle] Saved to {}", zip_path.display());
}

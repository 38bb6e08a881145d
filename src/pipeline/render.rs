//! PDF rasterisation: render one page to a PNG in the images folder.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and is not safe to drive from async contexts. Every pdfium call is
//! moved onto tokio's blocking pool so the runtime threads never stall on
//! CPU-heavy rendering.
//!
//! ## Why DPI, not a pixel cap?
//!
//! Book pages share one trim size, so a fixed DPI gives every page the same
//! pixel dimensions across runs. Target size is `points × dpi / 72`.

use crate::error::{BookscanError, PageError};
use crate::report::DocumentMetadata;
use image::{DynamicImage, ImageFormat};
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Source of page rasters.
///
/// The pipeline only needs a page count and one image per page; tests swap
/// in a synthetic renderer so the full flow runs without libpdfium.
pub trait PageRenderer: Send + Sync {
    /// Number of pages in the document.
    fn page_count(&self) -> Result<usize, BookscanError>;

    /// Rasterise page `page_num` (1-indexed) at `dpi`.
    fn render(&self, page_num: usize, dpi: u32) -> Result<DynamicImage, BookscanError>;
}

/// Renders pages of one PDF file with pdfium.
///
/// The library is bound and the document opened per call: pages are
/// processed one at a time and the raster dominates the cost.
#[derive(Debug, Clone)]
pub struct PdfiumRenderer {
    pdf_path: PathBuf,
    password: Option<String>,
    lib_path: Option<PathBuf>,
}

impl PdfiumRenderer {
    pub fn new(
        pdf_path: impl Into<PathBuf>,
        password: Option<String>,
        lib_path: Option<PathBuf>,
    ) -> Self {
        Self {
            pdf_path: pdf_path.into(),
            password,
            lib_path,
        }
    }

    fn with_document<T>(
        &self,
        f: impl FnOnce(&PdfDocument<'_>) -> Result<T, BookscanError>,
    ) -> Result<T, BookscanError> {
        let pdfium = bind_pdfium(self.lib_path.as_deref())?;
        let document = open_document(&pdfium, &self.pdf_path, self.password.as_deref())?;
        f(&document)
    }
}

impl PageRenderer for PdfiumRenderer {
    fn page_count(&self) -> Result<usize, BookscanError> {
        self.with_document(|doc| Ok(doc.pages().len() as usize))
    }

    fn render(&self, page_num: usize, dpi: u32) -> Result<DynamicImage, BookscanError> {
        self.with_document(|doc| {
            let pages = doc.pages();
            let total = pages.len() as usize;
            if page_num == 0 || page_num > total {
                return Err(BookscanError::PageOutOfRange {
                    page: page_num,
                    total,
                });
            }

            let page = pages
                .get((page_num - 1) as u16)
                .map_err(|e| BookscanError::Internal(format!("page {page_num}: {e:?}")))?;

            let scale = dpi as f32 / 72.0;
            let target_width = (page.width().value * scale).round() as i32;
            let target_height = (page.height().value * scale).round() as i32;

            let render_config = PdfRenderConfig::new()
                .set_target_width(target_width)
                .set_target_height(target_height);

            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| BookscanError::Internal(format!("page {page_num}: {e:?}")))?;

            Ok(bitmap.as_image())
        })
    }
}

/// Bind libpdfium: an explicit file or directory first, then the system
/// library.
pub fn bind_pdfium(lib_path: Option<&Path>) -> Result<Pdfium, BookscanError> {
    if let Some(path) = lib_path {
        let lib = if path.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(path)
        } else {
            path.to_path_buf()
        };
        debug!("Binding pdfium from {}", lib.display());
        return Pdfium::bind_to_library(&lib)
            .map(Pdfium::new)
            .map_err(|e| BookscanError::PdfiumBindingFailed(format!("{}: {e:?}", lib.display())));
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| BookscanError::PdfiumBindingFailed(format!("{e:?}")))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
    password: Option<&'a str>,
) -> Result<PdfDocument<'a>, BookscanError> {
    pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            if password.is_some() {
                BookscanError::WrongPassword {
                    path: pdf_path.to_path_buf(),
                }
            } else {
                BookscanError::PasswordRequired {
                    path: pdf_path.to_path_buf(),
                }
            }
        } else {
            BookscanError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

/// Path of the PNG for `page_num` inside `images_dir`.
pub fn image_path(images_dir: &Path, page_num: usize) -> PathBuf {
    images_dir.join(format!("{page_num}.png"))
}

/// Page count via the blocking pool.
pub async fn page_count(renderer: &Arc<dyn PageRenderer>) -> Result<usize, BookscanError> {
    let renderer = Arc::clone(renderer);
    tokio::task::spawn_blocking(move || renderer.page_count())
        .await
        .map_err(|e| BookscanError::Internal(format!("Page-count task panicked: {}", e)))?
}

/// Rasterise one page and save it as `<images_dir>/<page_num>.png`.
///
/// The raster is dropped as soon as it is on disk; the OCR stage reads the
/// PNG back.
pub async fn render_page(
    renderer: &Arc<dyn PageRenderer>,
    page_num: usize,
    dpi: u32,
    images_dir: &Path,
) -> Result<PathBuf, PageError> {
    let renderer = Arc::clone(renderer);
    let path = image_path(images_dir, page_num);
    let target = path.clone();

    let result = tokio::task::spawn_blocking(move || -> Result<(), String> {
        let image = renderer.render(page_num, dpi).map_err(|e| e.to_string())?;
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );
        DynamicImage::ImageRgb8(image.into_rgb8())
            .save_with_format(&target, ImageFormat::Png)
            .map_err(|e| format!("saving {}: {e}", target.display()))
    })
    .await
    .map_err(|e| format!("render task panicked: {e}"))
    .and_then(|r| r);

    result.map(|()| path).map_err(|detail| PageError::RenderFailed {
        page: page_num,
        detail,
    })
}

/// Extract document metadata without rendering pages.
pub async fn extract_metadata(
    pdf_path: &Path,
    password: Option<&str>,
    lib_path: Option<&Path>,
) -> Result<DocumentMetadata, BookscanError> {
    let path = pdf_path.to_path_buf();
    let pwd = password.map(|s| s.to_string());
    let lib = lib_path.map(Path::to_path_buf);

    tokio::task::spawn_blocking(move || {
        extract_metadata_blocking(&path, pwd.as_deref(), lib.as_deref())
    })
    .await
    .map_err(|e| BookscanError::Internal(format!("Metadata task panicked: {}", e)))?
}

fn extract_metadata_blocking(
    pdf_path: &Path,
    password: Option<&str>,
    lib_path: Option<&Path>,
) -> Result<DocumentMetadata, BookscanError> {
    let pdfium = bind_pdfium(lib_path)?;
    let document = open_document(&pdfium, pdf_path, password)?;

    let metadata = document.metadata();
    let get_meta = |tag: PdfDocumentMetadataTagType| -> Option<String> {
        metadata
            .get(tag)
            .map(|t| t.value().trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let page_count = document.pages().len() as usize;
    info!("PDF loaded: {} pages", page_count);

    Ok(DocumentMetadata {
        title: get_meta(PdfDocumentMetadataTagType::Title),
        author: get_meta(PdfDocumentMetadataTagType::Author),
        subject: get_meta(PdfDocumentMetadataTagType::Subject),
        creator: get_meta(PdfDocumentMetadataTagType::Creator),
        producer: get_meta(PdfDocumentMetadataTagType::Producer),
        page_count,
        pdf_version: format!("{:?}", document.version()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Solid {
        pages: usize,
    }

    impl PageRenderer for Solid {
        fn page_count(&self) -> Result<usize, BookscanError> {
            Ok(self.pages)
        }

        fn render(&self, page_num: usize, dpi: u32) -> Result<DynamicImage, BookscanError> {
            if page_num > self.pages {
                return Err(BookscanError::PageOutOfRange {
                    page: page_num,
                    total: self.pages,
                });
            }
            Ok(DynamicImage::new_rgba8(dpi / 72, 2))
        }
    }

    #[test]
    fn image_path_is_named_by_page() {
        assert_eq!(
            image_path(Path::new("/book/images"), 12),
            PathBuf::from("/book/images/12.png")
        );
    }

    #[tokio::test]
    async fn render_page_writes_png() {
        let dir = tempfile::tempdir().unwrap();
        let renderer: Arc<dyn PageRenderer> = Arc::new(Solid { pages: 2 });

        let path = render_page(&renderer, 2, 300, dir.path()).await.unwrap();
        assert_eq!(path, dir.path().join("2.png"));

        let img = image::open(&path).unwrap();
        assert_eq!(img.width(), 4);
    }

    #[tokio::test]
    async fn render_page_out_of_bounds_is_page_error() {
        let dir = tempfile::tempdir().unwrap();
        let renderer: Arc<dyn PageRenderer> = Arc::new(Solid { pages: 2 });

        let err = render_page(&renderer, 3, 300, dir.path()).await.unwrap_err();
        assert!(matches!(err, PageError::RenderFailed { page: 3, .. }));
        assert!(!dir.path().join("3.png").exists());
    }

    #[test]
    fn page_count_on_blocking_pool() {
        let renderer: Arc<dyn PageRenderer> = Arc::new(Solid { pages: 7 });
        assert_eq!(tokio_test::block_on(page_count(&renderer)).unwrap(), 7);
    }
}

//! Output files: truncate once per run, then append page by page.

use crate::config::PageSeparator;
use crate::error::{BookscanError, PageError};
use crate::ranges::RangeTable;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Create or truncate every distinct output file of `ranges` under
/// `text_dir`.
///
/// Runs before the first page so a re-run never duplicates text from the
/// previous one. Returns the prepared paths in page order.
pub async fn prepare_output(
    ranges: &RangeTable,
    text_dir: &Path,
) -> Result<Vec<PathBuf>, BookscanError> {
    create_dir(text_dir).await?;

    let mut prepared = Vec::new();
    for output in ranges.output_files() {
        let path = text_dir.join(output);
        if let Some(parent) = path.parent() {
            create_dir(parent).await?;
        }
        tokio::fs::File::create(&path)
            .await
            .map_err(|e| BookscanError::OutputWriteFailed {
                path: path.clone(),
                source: e,
            })?;
        debug!("Prepared {}", path.display());
        prepared.push(path);
    }
    Ok(prepared)
}

/// `create_dir_all` with the path in the error.
pub async fn create_dir(dir: &Path) -> Result<(), BookscanError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| BookscanError::OutputWriteFailed {
            path: dir.to_path_buf(),
            source: e,
        })
}

/// Append one page's text to `path`.
///
/// When the file already holds text from an earlier page, the page
/// boundary marker for `page_num` goes in front. Returns the number of
/// bytes written, marker included.
pub async fn append_page(
    path: &Path,
    page_num: usize,
    text: &str,
    separator: &PageSeparator,
) -> Result<usize, PageError> {
    let write_err = |e: std::io::Error| PageError::WriteFailed {
        page: page_num,
        path: path.to_path_buf(),
        detail: e.to_string(),
    };

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .map_err(write_err)?;

    let existing = file.metadata().await.map_err(write_err)?.len();

    let mut chunk = String::with_capacity(text.len() + 32);
    if existing > 0 {
        // Cleaned page text already ends with one newline.
        let marker = separator.render(page_num);
        chunk.push_str(marker.strip_prefix('\n').unwrap_or(&marker));
    }
    chunk.push_str(text);

    file.write_all(chunk.as_bytes()).await.map_err(write_err)?;
    file.flush().await.map_err(write_err)?;

    Ok(chunk.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ranges::PageRange;

    #[tokio::test]
    async fn prepare_truncates_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        let ranges = RangeTable::new(vec![
            PageRange::new(1, 2, "a.md"),
            PageRange::new(3, 4, "nested/b.md"),
            PageRange::new(5, 6, "a.md"),
        ])
        .unwrap();
        std::fs::write(dir.path().join("a.md"), "stale").unwrap();

        let prepared = prepare_output(&ranges, dir.path()).await.unwrap();
        assert_eq!(prepared.len(), 2);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.md")).unwrap(), "");
        assert!(dir.path().join("nested/b.md").exists());
    }

    #[test]
    fn append_inserts_marker_between_pages() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ch.md");
        std::fs::write(&path, "").unwrap();

        tokio_test::block_on(async {
            append_page(&path, 4, "first\n", &PageSeparator::Comment)
                .await
                .unwrap();
            append_page(&path, 5, "second\n", &PageSeparator::Comment)
                .await
                .unwrap();
        });

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "first\n\n<!-- page 5 -->\n\nsecond\n"
        );
    }

    #[tokio::test]
    async fn append_to_missing_directory_is_page_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing/ch.md");
        let err = append_page(&path, 2, "x", &PageSeparator::None)
            .await
            .unwrap_err();
        assert!(matches!(err, PageError::WriteFailed { page: 2, .. }));
    }
}

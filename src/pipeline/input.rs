//! Input resolution: make sure the configured PDF is really there.
//!
//! A missing or non-PDF input is a startup failure: it is reported before
//! any output file is truncated, so a typo in `PDF_FILENAME` never wipes the
//! previous run's chapters. Uploaded bytes are spilled to a `TempDir` since
//! pdfium needs a file-system path.

use crate::error::BookscanError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

/// A PDF ready for pdfium: either the caller's file or a temporary copy.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input came as bytes; the `TempDir` lives as long as this value.
    Spilled { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Path to the PDF regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Spilled { path, .. } => path,
        }
    }
}

/// Validate a local PDF: it exists, is readable and starts with `%PDF`.
pub fn resolve_local(path: &Path) -> Result<ResolvedInput, BookscanError> {
    let path = path.to_path_buf();

    if !path.is_file() {
        return Err(BookscanError::FileNotFound { path });
    }

    let mut file = match std::fs::File::open(&path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(BookscanError::PermissionDenied { path });
        }
        Err(_) => return Err(BookscanError::FileNotFound { path }),
    };

    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() || &magic != b"%PDF" {
        return Err(BookscanError::NotAPdf { path, magic });
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Write uploaded PDF bytes to a temporary file and validate them.
pub fn spill_bytes(bytes: &[u8]) -> Result<ResolvedInput, BookscanError> {
    let path_hint = PathBuf::from("<upload>");
    if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
        let mut magic = [0u8; 4];
        let n = bytes.len().min(4);
        magic[..n].copy_from_slice(&bytes[..n]);
        return Err(BookscanError::NotAPdf {
            path: path_hint,
            magic,
        });
    }

    let temp_dir = TempDir::new().map_err(|e| BookscanError::Internal(format!("tempdir: {e}")))?;
    let path = temp_dir.path().join("input.pdf");
    std::fs::write(&path, bytes).map_err(|e| BookscanError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    })?;

    debug!("Spilled {} uploaded bytes to {}", bytes.len(), path.display());
    Ok(ResolvedInput::Spilled {
        path,
        _temp_dir: temp_dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_not_found() {
        let err = resolve_local(Path::new("/no/such/book.pdf")).unwrap_err();
        assert!(matches!(err, BookscanError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic_is_not_a_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.pdf");
        std::fs::write(&path, b"GIF89a").unwrap();
        match resolve_local(&path).unwrap_err() {
            BookscanError::NotAPdf { magic, .. } => assert_eq!(&magic, b"GIF8"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn pdf_magic_accepted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ok.pdf");
        std::fs::write(&path, b"%PDF-1.7\n").unwrap();
        let resolved = resolve_local(&path).unwrap();
        assert_eq!(resolved.path(), path.as_path());
    }

    #[test]
    fn spilled_bytes_live_with_value() {
        let resolved = spill_bytes(b"%PDF-1.4\n%%EOF").unwrap();
        let path = resolved.path().to_path_buf();
        assert!(path.exists());
        drop(resolved);
        assert!(!path.exists());
    }

    #[test]
    fn spill_rejects_non_pdf() {
        assert!(matches!(
            spill_bytes(b"PK"),
            Err(BookscanError::NotAPdf { .. })
        ));
    }
}

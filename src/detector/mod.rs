//! OCR capability: turn one page image into text annotations.
//!
//! The pipeline only needs `detect_text(image) -> annotations`; everything
//! service-specific (auth, request shape, error mapping) stays behind the
//! [`TextDetector`] trait. The production backend is
//! [`vision::VisionDetector`] (Google Cloud Vision `TEXT_DETECTION`); tests
//! plug in a detector returning canned text.

pub mod vision;

use crate::error::DetectionError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use vision::{VisionCredentials, VisionDetector};

/// One unit of detected text.
///
/// By OCR convention the first annotation of a response holds the full text
/// of the image and the following ones hold individual words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAnnotation {
    pub description: String,
    /// Detected locale of the text, when the service reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl TextAnnotation {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            locale: None,
        }
    }
}

/// An OCR backend.
///
/// Implementations must be `Send + Sync`; the pipeline holds them as
/// `Arc<dyn TextDetector>`.
#[async_trait]
pub trait TextDetector: Send + Sync {
    /// Detect text in a PNG-encoded image.
    ///
    /// An empty vector means the image contains no detectable text; that is
    /// not an error.
    async fn detect_text(
        &self,
        png: &[u8],
        language_hints: &[String],
    ) -> Result<Vec<TextAnnotation>, DetectionError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Full page text from a detector response: the first annotation.
pub fn full_text(annotations: &[TextAnnotation]) -> Option<&str> {
    annotations.first().map(|a| a.description.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_text_takes_first_annotation() {
        let anns = vec![
            TextAnnotation::new("hello world"),
            TextAnnotation::new("hello"),
            TextAnnotation::new("world"),
        ];
        assert_eq!(full_text(&anns), Some("hello world"));
        assert_eq!(full_text(&[]), None);
    }
}

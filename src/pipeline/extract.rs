//! Text extraction: image → raw recognised text.

use crate::config::Language;
use crate::error::{IngestError, RecognitionError};
use crate::output::ExtractedText;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// An optical character recognition engine.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognise the text in the image at `image` in `language`.
    async fn recognize(&self, image: &Path, language: Language) -> Result<String, RecognitionError>;
}

/// Runs a [`Recognizer`] and wraps its output.
///
/// Engine errors become [`IngestError::RecognitionFailure`]; there is no
/// retry.
#[derive(Clone)]
pub struct TextExtractor {
    recognizer: Arc<dyn Recognizer>,
}

impl TextExtractor {
    pub fn new(recognizer: Arc<dyn Recognizer>) -> Self {
        Self { recognizer }
    }

    pub async fn extract(&self, image: &Path, language: Language) -> Result<ExtractedText, IngestError> {
        let start = Instant::now();
        let raw_text = self
            .recognizer
            .recognize(image, language)
            .await
            .map_err(|e| IngestError::RecognitionFailure {
                path: image.to_path_buf(),
                detail: e.to_string(),
            })?;
        debug!(
            "Recognised {} chars from {} in {}ms",
            raw_text.chars().count(),
            image.display(),
            start.elapsed().as_millis()
        );
        Ok(ExtractedText {
            source_path: image.to_path_buf(),
            raw_text,
            language,
        })
    }
}

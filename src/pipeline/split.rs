//! Page splitting: one multi-page PDF → one single-page PDF per page.
//!
//! Each page is copied (not flattened) into a fresh document, so the
//! rendering surface sees exactly the content of the source page. The
//! page's declared size travels with it; the renderer sizes its viewport
//! from that geometry.

use crate::error::{IngestError, PdfModelError};
use std::sync::Arc;
use tracing::debug;

/// Smallest width/height a page can shrink to after the margin is applied.
const MIN_PAGE_POINTS: f32 = 1.0;

/// One page of a source document, ready to render on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct PageUnit {
    /// 1-based position in the source document.
    pub index: usize,
    /// A complete single-page PDF.
    pub document_bytes: Vec<u8>,
    /// Declared width in PDF points.
    pub width: f32,
    /// Declared height in PDF points.
    pub height: f32,
}

/// A PDF object model that can open a document from memory.
pub trait PdfModel: Send + Sync {
    fn load<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn LoadedPdf + 'a>, PdfModelError>;
}

/// An opened document.
pub trait LoadedPdf {
    fn page_count(&self) -> usize;

    /// `(width, height)` of the 0-based page, in PDF points.
    fn page_dimensions(&self, index: usize) -> Result<(f32, f32), PdfModelError>;

    /// A new document containing only the 0-based page, serialised.
    fn extract_page(&self, index: usize) -> Result<Vec<u8>, PdfModelError>;
}

/// Splits documents into [`PageUnit`]s.
#[derive(Clone)]
pub struct PageSplitter {
    model: Arc<dyn PdfModel>,
    margin: f32,
}

impl PageSplitter {
    /// `margin` points are subtracted from every page's width and height.
    pub fn new(model: Arc<dyn PdfModel>, margin: f32) -> Self {
        Self {
            model,
            margin: margin.max(0.0),
        }
    }

    /// Split `bytes` into pages, in document order.
    pub fn split(&self, bytes: &[u8]) -> Result<Vec<PageUnit>, IngestError> {
        split_with(self.model.as_ref(), bytes, self.margin)
    }

    /// [`Self::split`] on the blocking thread pool; PDF parsing is CPU-bound.
    pub async fn split_async(&self, bytes: Vec<u8>) -> Result<Vec<PageUnit>, IngestError> {
        let model = Arc::clone(&self.model);
        let margin = self.margin;
        tokio::task::spawn_blocking(move || split_with(model.as_ref(), &bytes, margin))
            .await
            .map_err(|e| IngestError::Internal(format!("Split task panicked: {}", e)))?
    }
}

fn split_with(model: &dyn PdfModel, bytes: &[u8], margin: f32) -> Result<Vec<PageUnit>, IngestError> {
    let malformed = |e: PdfModelError| IngestError::MalformedDocument {
        detail: e.to_string(),
    };

    let document = model.load(bytes).map_err(malformed)?;
    let page_count = document.page_count();
    debug!("Splitting document of {} pages", page_count);

    let mut units = Vec::with_capacity(page_count);
    for i in 0..page_count {
        let (width, height) = document.page_dimensions(i).map_err(malformed)?;
        let document_bytes = document.extract_page(i).map_err(malformed)?;
        units.push(PageUnit {
            index: i + 1,
            document_bytes,
            width: (width - margin).max(MIN_PAGE_POINTS),
            height: (height - margin).max(MIN_PAGE_POINTS),
        });
    }
    Ok(units)
}

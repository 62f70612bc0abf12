//! Progress-callback trait for per-document and per-page ingestion events.
//!
//! Inject an [`Arc<dyn IngestProgressCallback>`] via
//! [`crate::config::IngestConfigBuilder::progress_callback`] to receive
//! events as documents are split, pages are rendered, and images are
//! recognised.
//!
//! # Example
//!
//! ```rust
//! use docingest::{IngestConfig, IngestProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     rendered: AtomicUsize,
//! }
//!
//! impl IngestProgressCallback for CountingCallback {
//!     fn on_page_rendered(&self, document: &str, page: usize, total_pages: usize) {
//!         self.rendered.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{document}: page {page}/{total_pages} rendered");
//!     }
//! }
//!
//! let cb = Arc::new(CountingCallback { rendered: AtomicUsize::new(0) });
//! let config = IngestConfig::builder()
//!     .progress_callback(cb as Arc<dyn IngestProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the pipeline as it processes documents and pages.
///
/// Pages of one document render concurrently, and several documents can
/// render at once, so every method may be called from different tasks at the
/// same time. All methods default to no-ops.
pub trait IngestProgressCallback: Send + Sync {
    /// Called once per PDF after it has been split into pages.
    fn on_document_start(&self, document: &str, total_pages: usize) {
        let _ = (document, total_pages);
    }

    /// Called when a page image has been selected.
    fn on_page_rendered(&self, document: &str, page: usize, total_pages: usize) {
        let _ = (document, page, total_pages);
    }

    /// Called when every render round of a page has failed.
    fn on_page_failed(&self, document: &str, page: usize, total_pages: usize, error: &str) {
        let _ = (document, page, total_pages, error);
    }

    /// Called once per PDF after all its pages have settled.
    fn on_document_complete(&self, document: &str, total_pages: usize, rendered: usize) {
        let _ = (document, total_pages, rendered);
    }

    /// Called after the recognizer has returned text for an image.
    fn on_text_extracted(&self, image: &str, chars: usize) {
        let _ = (image, chars);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl IngestProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::IngestConfig`].
pub type ProgressCallback = Arc<dyn IngestProgressCallback>;

//! Error types for the docingest library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`IngestError`] is **fatal**: the request cannot proceed (file missing,
//!   unsupported type, unparsable PDF, recognition engine failure). Returned
//!   as `Err(IngestError)` from [`crate::Ingestor::ingest`] and mapped to a
//!   single `"error"` response.
//!
//! * [`PageError`] is **non-fatal**: every render round of a single page
//!   failed, but the other pages of the document are fine. Stored inside
//!   [`crate::output::PageOutcome::Failed`] so callers see which pages are
//!   unresolved instead of losing the whole document to one bad page.
//!
//! Capability errors ([`SurfaceError`], [`RecognitionError`]) are what the
//! pluggable backends return; the pipeline converts them into one of the two
//! types above.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docingest library.
#[derive(Debug, Error)]
pub enum IngestError {
    // ── Upload errors ─────────────────────────────────────────────────────
    /// Uploaded file was not found at its storage path.
    #[error("Uploaded file not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the stored file.
    #[error("Permission denied reading '{path}'")]
    PermissionDenied { path: PathBuf },

    /// MIME type or extension is not on the allow-list.
    #[error("Unsupported file type for '{name}' ({mime}): only images, PDFs, and docx files are allowed")]
    UnsupportedFileType { name: String, mime: String },

    /// Stored file exceeds the configured upload limit.
    #[error("File '{name}' is {size} bytes, limit is {limit} bytes")]
    FileTooLarge { name: String, size: u64, limit: u64 },

    /// More files than the configured per-request limit.
    #[error("Too many files: {count} uploaded, limit is {limit}")]
    TooManyFiles { count: usize, limit: usize },

    // ── Document errors ───────────────────────────────────────────────────
    /// The byte buffer could not be parsed as a PDF.
    #[error("Malformed document: {detail}")]
    MalformedDocument { detail: String },

    /// A page failed to render and the failure policy is `Abort`.
    #[error("Rendering failed for page {page} of '{path}': {detail}")]
    RenderFailure {
        path: PathBuf,
        page: usize,
        detail: String,
    },

    /// The rendering surface process could not be started.
    #[error("Rendering surface failed to launch: {0}")]
    SurfaceLaunchFailed(String),

    // ── Recognition errors ────────────────────────────────────────────────
    /// The text-recognition engine failed on an image.
    #[error("Text recognition failed for '{path}': {detail}")]
    RecognitionFailure { path: PathBuf, detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Reading or writing an intermediate artifact failed.
    #[error("Artifact I/O failed for '{path}': {source}")]
    ArtifactIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium or place the library next to the executable."
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which side of a request a failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorClass {
    /// The request itself was invalid (HTTP 4xx equivalent).
    Client,
    /// Processing failed on our side (HTTP 5xx equivalent).
    Server,
}

impl ErrorClass {
    /// The HTTP status code conventionally used for this class.
    pub fn status_code(self) -> u16 {
        match self {
            ErrorClass::Client => 400,
            ErrorClass::Server => 500,
        }
    }
}

impl IngestError {
    /// True for failures caused by what was uploaded rather than by processing it.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            IngestError::FileNotFound { .. }
                | IngestError::PermissionDenied { .. }
                | IngestError::UnsupportedFileType { .. }
                | IngestError::FileTooLarge { .. }
                | IngestError::TooManyFiles { .. }
        )
    }

    /// Classify the error for the response contract.
    ///
    /// Validation failures are always client errors. Processing failures are
    /// client errors too unless `processing_is_server` is set.
    pub fn class(&self, processing_is_server: bool) -> ErrorClass {
        if self.is_validation() || !processing_is_server {
            ErrorClass::Client
        } else {
            ErrorClass::Server
        }
    }
}

/// A non-fatal error for a single page.
///
/// The document keeps rendering; the page is reported as unresolved.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq)]
pub enum PageError {
    /// Every render round of the page failed.
    #[error("Page {page}: all {rounds} render round(s) failed: {detail}")]
    RenderFailed {
        page: usize,
        rounds: usize,
        detail: String,
    },
}

impl PageError {
    /// 1-based index of the page this error belongs to.
    pub fn page(&self) -> usize {
        match self {
            PageError::RenderFailed { page, .. } => *page,
        }
    }
}

/// Errors reported by a PDF object model.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PdfModelError(pub String);

/// Errors reported by a rendering surface.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("surface launch failed: {0}")]
    Launch(String),

    #[error("loading page artifact failed: {0}")]
    Load(String),

    #[error("capture failed: {0}")]
    Capture(String),

    /// A single surface step exceeded the render timeout.
    #[error("{step} timed out after {millis}ms")]
    Timeout { step: &'static str, millis: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors reported by a text-recognition engine.
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// The engine could not be started at all.
    #[error("cannot run recognition engine: {0}")]
    Spawn(#[source] std::io::Error),

    /// The engine ran but reported failure.
    #[error("recognition engine exited with {status}: {stderr}")]
    Engine { status: String, stderr: String },

    #[error("{0}")]
    Other(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_always_client_class() {
        let e = IngestError::UnsupportedFileType {
            name: "notes.txt".into(),
            mime: "text/plain".into(),
        };
        assert_eq!(e.class(true), ErrorClass::Client);
        assert_eq!(e.class(false), ErrorClass::Client);
    }

    #[test]
    fn processing_errors_follow_the_flag() {
        let e = IngestError::RecognitionFailure {
            path: "page-1.png".into(),
            detail: "engine crashed".into(),
        };
        assert_eq!(e.class(false), ErrorClass::Client);
        assert_eq!(e.class(true), ErrorClass::Server);
        assert_eq!(e.class(true).status_code(), 500);
    }

    #[test]
    fn page_error_display() {
        let e = PageError::RenderFailed {
            page: 2,
            rounds: 3,
            detail: "capture failed: boom".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("Page 2"), "got: {msg}");
        assert!(msg.contains("3 render round"), "got: {msg}");
        assert_eq!(e.page(), 2);
    }

    #[test]
    fn surface_timeout_display() {
        let e = SurfaceError::Timeout {
            step: "capture",
            millis: 1500,
        };
        assert_eq!(e.to_string(), "capture timed out after 1500ms");
    }

    #[test]
    fn too_large_display() {
        let e = IngestError::FileTooLarge {
            name: "scan.pdf".into(),
            size: 20,
            limit: 10,
        };
        assert!(e.to_string().contains("scan.pdf"));
    }
}

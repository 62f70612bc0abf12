//! Result types produced by the ingestion pipeline.
//!
//! Rasterisation yields a [`DocumentRender`] per PDF (one [`PageOutcome`] per
//! page, in page order); recognition and correction yield one
//! [`ExtractedText`] and one [`NormalizedResult`] per image. The request as a
//! whole is summarised by [`IngestionReport`], which converts into the
//! wire-level [`IngestionResponse`].

use crate::config::{Language, LanguageCodes};
use crate::error::{IngestError, PageError};
use crate::upload::UploadedFile;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// The selected bitmap for one page of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageImage {
    /// Identifier of the source document (its sanitized file name).
    pub document_id: String,
    /// 1-based page index in the source document.
    pub page_index: usize,
    /// Path of the PNG file.
    pub path: PathBuf,
}

/// What happened to a single page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PageOutcome {
    Rendered(PageImage),
    Failed(PageError),
}

impl PageOutcome {
    /// 1-based index of the page.
    pub fn page_index(&self) -> usize {
        match self {
            PageOutcome::Rendered(image) => image.page_index,
            PageOutcome::Failed(err) => err.page(),
        }
    }

    pub fn image(&self) -> Option<&PageImage> {
        match self {
            PageOutcome::Rendered(image) => Some(image),
            PageOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&PageError> {
        match self {
            PageOutcome::Rendered(_) => None,
            PageOutcome::Failed(err) => Some(err),
        }
    }
}

/// Rasterisation report for one PDF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRender {
    pub document_id: String,
    /// The PDF the pages were split from.
    pub source: PathBuf,
    /// Directory holding the page images.
    pub output_dir: PathBuf,
    /// One outcome per page, ascending by page index.
    pub pages: Vec<PageOutcome>,
}

impl DocumentRender {
    /// Successfully rendered pages, in page order.
    pub fn images(&self) -> impl Iterator<Item = &PageImage> {
        self.pages.iter().filter_map(PageOutcome::image)
    }

    /// Pages whose rendering failed, in page order.
    pub fn failures(&self) -> impl Iterator<Item = &PageError> {
        self.pages.iter().filter_map(PageOutcome::error)
    }

    pub fn rendered_count(&self) -> usize {
        self.images().count()
    }

    pub fn unresolved_pages(&self) -> Vec<usize> {
        self.failures().map(PageError::page).collect()
    }
}

/// Raw recognizer output for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub source_path: PathBuf,
    pub raw_text: String,
    pub language: Language,
}

/// Spell-corrected text for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub source_path: PathBuf,
    pub corrected_text: String,
    pub language: Language,
}

/// Per-file part of an [`IngestionReport`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub file: UploadedFile,
    /// Page images for PDFs; `None` for files recognised directly.
    pub images: Option<Vec<PageImage>>,
    /// Pages of a PDF that could not be rendered.
    pub unresolved_pages: Vec<usize>,
}

/// Everything one request produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    /// One entry per uploaded file, in upload order.
    pub files: Vec<FileReport>,
    /// Corrected text, one entry per recognised image.
    pub texts: Vec<NormalizedResult>,
}

impl IngestionReport {
    /// Build the success response for this report.
    pub fn to_response(&self, codes: &LanguageCodes) -> IngestionResponse {
        IngestionResponse {
            status: ResponseStatus::Success,
            message: format!("{} file(s) uploaded successfully!", self.files.len()),
            files: self
                .files
                .iter()
                .map(|report| FileSummary {
                    file_name: report.file.sanitized_name.clone(),
                    file_path: report.file.stored_path.clone(),
                    images: report
                        .images
                        .as_ref()
                        .map(|images| images.iter().map(|i| i.path.clone()).collect()),
                    language: report.file.declared_language.code(codes).to_string(),
                    unresolved_pages: report.unresolved_pages.clone(),
                })
                .collect(),
            error: None,
            status_code: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Error,
}

/// Response contract handed back to the upload boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionResponse {
    pub status: ResponseStatus,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<FileSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// HTTP-equivalent status code; not part of the body.
    #[serde(skip)]
    pub status_code: u16,
}

impl IngestionResponse {
    /// Build the failure response for a fatal error.
    pub fn from_error(err: &IngestError, processing_is_server: bool) -> Self {
        let class = err.class(processing_is_server);
        let message = if err.is_validation() {
            err.to_string()
        } else {
            "File upload failed!".to_string()
        };
        Self {
            status: ResponseStatus::Error,
            message,
            files: Vec::new(),
            error: Some(err.to_string()),
            status_code: class.status_code(),
        }
    }
}

/// One file in an [`IngestionResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSummary {
    pub file_name: String,
    pub file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<PathBuf>>,
    pub language: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved_pages: Vec<usize>,
}

//! # docingest
//!
//! Turn uploaded documents into spell-corrected text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! upload (PDF / image / docx)
//!  │
//!  ├─ 1. Intake     validate type, size, count; resolve language per file
//!  ├─ 2. Split      one PDF → single-page PDFs (pdfium, spawn_blocking)
//!  ├─ 3. Render     each page on a shared surface, K pages at a time;
//!  │                N rounds per page, largest PNG wins
//!  ├─ 4. Recognise  OCR per image in the file's language (tesseract)
//!  └─ 5. Correct    dictionary pass, then digit/punctuation pass
//! ```
//!
//! Every external engine sits behind a trait ([`PdfModel`],
//! [`SurfaceLauncher`], [`Recognizer`], [`SpellEngine`]); the [`backend`]
//! module provides the default implementations.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docingest::backend::dictionary::WordListDictionary;
//! use docingest::backend::pdfium::{locate_pdfium, pdfium_backends};
//! use docingest::backend::tesseract::TesseractRecognizer;
//! use docingest::{Engines, IngestConfig, Ingestor};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = IngestConfig::default();
//!     let (pdf, surface) = pdfium_backends(locate_pdfium()?);
//!     let engines = Engines {
//!         pdf,
//!         surface,
//!         recognizer: Arc::new(TesseractRecognizer::new("tesseract", config.languages.clone())),
//!         primary_dictionary: Arc::new(WordListDictionary::from_path("dict/en_US.dic")?),
//!         secondary_dictionary: Arc::new(WordListDictionary::from_path("dict/de_DE.dic")?),
//!     };
//!     let ingestor = Ingestor::new(config, engines);
//!
//!     let result = ingestor
//!         .ingest_paths(&[("uploads/report.pdf", Some("deu".to_string()))])
//!         .await;
//!     println!("{}", serde_json::to_string_pretty(&ingestor.respond(&result))?);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docingest` binary (clap + anyhow + tracing-subscriber + indicatif) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod upload;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{
    IngestConfig, IngestConfigBuilder, Language, LanguageCodes, PageFailurePolicy, ReplacementMode,
};
pub use error::{ErrorClass, IngestError, PageError, RecognitionError, SurfaceError};
pub use ingest::{Engines, Ingestor};
pub use output::{
    DocumentRender, ExtractedText, IngestionReport, IngestionResponse, NormalizedResult, PageImage,
    PageOutcome,
};
pub use pipeline::extract::{Recognizer, TextExtractor};
pub use pipeline::normalize::{SpellEngine, TextNormalizer};
pub use pipeline::render::PageRenderer;
pub use pipeline::schedule::RenderScheduler;
pub use pipeline::split::{PageSplitter, PageUnit, PdfModel};
pub use pipeline::surface::{RenderSurface, SurfaceContext, SurfaceLauncher, Viewport};
pub use progress::{IngestProgressCallback, NoopProgressCallback, ProgressCallback};
pub use upload::{FileKind, UploadedFile};

//! Request orchestration: uploaded files → images → corrected text.
//!
//! ```text
//! files ─┬─ PDF   ──▶ RenderScheduler ──▶ page images ─┐
//!        ├─ image ─────────────────────────────────────┤
//!        └─ docx  (stored, not recognised)             │
//!                                                      ▼
//!                              TextExtractor (recognition_concurrency)
//!                                                      │
//!                                                      ▼
//!                                               TextNormalizer
//! ```
//!
//! All PDFs of a request are rasterised concurrently; each one owns its own
//! surface. Every rasterisation runs to completion, closing its surface,
//! before the request moves on. The first fatal error in file order
//! (malformed PDF, surface launch failure, recognition failure) fails the
//! whole request, and the images of the documents that did render are
//! removed.

use crate::config::{IngestConfig, Language};
use crate::error::IngestError;
use crate::output::{
    DocumentRender, FileReport, IngestionReport, IngestionResponse, NormalizedResult,
};
use crate::pipeline::extract::{Recognizer, TextExtractor};
use crate::pipeline::normalize::{SpellEngine, TextNormalizer};
use crate::pipeline::schedule::{discard, RenderScheduler};
use crate::pipeline::split::PdfModel;
use crate::pipeline::surface::SurfaceLauncher;
use crate::upload::{accept_paths, FileKind, UploadedFile};
use futures::future;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// The pluggable collaborators of an [`Ingestor`].
#[derive(Clone)]
pub struct Engines {
    pub pdf: Arc<dyn PdfModel>,
    pub surface: Arc<dyn SurfaceLauncher>,
    pub recognizer: Arc<dyn Recognizer>,
    pub primary_dictionary: Arc<dyn SpellEngine>,
    pub secondary_dictionary: Arc<dyn SpellEngine>,
}

/// What rasterisation produced for one file.
enum Rasterised {
    Document(DocumentRender),
    Direct,
    Skipped,
}

/// Runs whole ingestion requests.
pub struct Ingestor {
    config: IngestConfig,
    scheduler: RenderScheduler,
    extractor: TextExtractor,
    normalizer: TextNormalizer,
}

impl Ingestor {
    pub fn new(config: IngestConfig, engines: Engines) -> Self {
        let scheduler = RenderScheduler::new(&config, engines.pdf, engines.surface);
        let extractor = TextExtractor::new(engines.recognizer);
        let normalizer = TextNormalizer::new(
            engines.primary_dictionary,
            engines.secondary_dictionary,
            config.replacement_mode,
        );
        Self {
            config,
            scheduler,
            extractor,
            normalizer,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &RenderScheduler {
        &self.scheduler
    }

    /// Validate local files and ingest them.
    ///
    /// `files` holds `(path, language tag)` pairs in upload order.
    pub async fn ingest_paths<P: AsRef<Path>>(
        &self,
        files: &[(P, Option<String>)],
    ) -> Result<IngestionReport, IngestError> {
        let accepted = accept_paths(files, &self.config)?;
        self.ingest(accepted).await
    }

    /// Process one request's files.
    pub async fn ingest(&self, files: Vec<UploadedFile>) -> Result<IngestionReport, IngestError> {
        let start = Instant::now();
        if files.len() > self.config.max_files {
            return Err(IngestError::TooManyFiles {
                count: files.len(),
                limit: self.config.max_files,
            });
        }
        info!("Ingesting {} file(s)", files.len());

        // ── Step 1: Rasterise PDFs ───────────────────────────────────────
        let settled = future::join_all(files.iter().map(|file| self.rasterise(file))).await;
        if settled.iter().any(Result::is_err) {
            return Err(discard_rendered(settled).await);
        }
        let rasterised: Vec<Rasterised> = settled.into_iter().flatten().collect();

        // ── Step 2: Collect images to recognise ──────────────────────────
        let mut reports = Vec::with_capacity(files.len());
        let mut work: Vec<(PathBuf, Language)> = Vec::new();
        for (file, outcome) in files.into_iter().zip(rasterised) {
            let language = file.declared_language;
            let report = match outcome {
                Rasterised::Document(render) => {
                    work.extend(render.images().map(|i| (i.path.clone(), language)));
                    FileReport {
                        images: Some(render.images().cloned().collect()),
                        unresolved_pages: render.unresolved_pages(),
                        file,
                    }
                }
                Rasterised::Direct => {
                    work.push((file.stored_path.clone(), language));
                    FileReport {
                        file,
                        images: None,
                        unresolved_pages: Vec::new(),
                    }
                }
                Rasterised::Skipped => FileReport {
                    file,
                    images: None,
                    unresolved_pages: Vec::new(),
                },
            };
            reports.push(report);
        }

        // ── Step 3: Recognise ────────────────────────────────────────────
        let progress = self.config.progress_callback.as_ref();
        let extracted: Vec<_> = stream::iter(work.into_iter().map(|(path, language)| async move {
            let text = self.extractor.extract(&path, language).await?;
            if let Some(cb) = progress {
                cb.on_text_extracted(&path.display().to_string(), text.raw_text.chars().count());
            }
            Ok::<_, IngestError>(text)
        }))
        .buffered(self.config.recognition_concurrency.max(1))
        .try_collect()
        .await?;

        // ── Step 4: Normalise ────────────────────────────────────────────
        let texts: Vec<NormalizedResult> = extracted
            .into_iter()
            .map(|text| {
                let corrected_text = self.normalizer.normalize(&text.raw_text, text.language);
                debug!(
                    "Corrected text for {}:\n{}",
                    text.source_path.display(),
                    corrected_text
                );
                NormalizedResult {
                    source_path: text.source_path,
                    corrected_text,
                    language: text.language,
                }
            })
            .collect();

        info!(
            "Ingested {} file(s), {} text(s) in {}ms",
            reports.len(),
            texts.len(),
            start.elapsed().as_millis()
        );
        Ok(IngestionReport {
            files: reports,
            texts,
        })
    }

    /// Map a request outcome onto the response contract.
    pub fn respond(&self, result: &Result<IngestionReport, IngestError>) -> IngestionResponse {
        match result {
            Ok(report) => report.to_response(&self.config.languages),
            Err(e) => {
                error!("Ingestion failed: {}", e);
                IngestionResponse::from_error(e, self.config.processing_errors_are_server_errors)
            }
        }
    }

    async fn rasterise(&self, file: &UploadedFile) -> Result<Rasterised, IngestError> {
        match file.kind {
            FileKind::Pdf => self
                .scheduler
                .render_all(&file.stored_path, &file.sanitized_name)
                .await
                .map(Rasterised::Document),
            FileKind::Image => Ok(Rasterised::Direct),
            FileKind::WordProcessor => {
                warn!(
                    "'{}' is a word-processor document; stored without text extraction",
                    file.sanitized_name
                );
                Ok(Rasterised::Skipped)
            }
        }
    }
}

/// Remove what the successful rasterisations produced and return the first
/// error.
async fn discard_rendered(settled: Vec<Result<Rasterised, IngestError>>) -> IngestError {
    let mut first_error = None;
    for outcome in settled {
        match outcome {
            Ok(Rasterised::Document(render)) => discard(&render).await,
            Ok(_) => {}
            Err(e) => {
                if first_error.is_none() {
                    first_error = Some(e);
                } else {
                    warn!("Also failed: {}", e);
                }
            }
        }
    }
    first_error.unwrap_or_else(|| IngestError::Internal("rasterisation failed without an error".into()))
}

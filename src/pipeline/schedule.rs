//! Document rasterisation: fan the pages of one PDF out over a shared surface.
//!
//! ## Concurrency model
//!
//! ```text
//! read ──▶ split ──▶ [mkdir] ──▶ launch surface
//!                                    │
//!            ┌───────────────────────┤  buffer_unordered(K)
//!            ▼        ▼        ▼     ▼
//!         page 1   page 2   page 3  …   (each: artifact → rounds → select)
//!            └────────┴────────┴─────┘
//!                         │ sort by page index
//!                         ▼
//!                   DocumentRender
//! ```
//!
//! At most `concurrency` pages are in flight; completion order is arbitrary
//! but the result is always sorted. The output directory is created only
//! after a successful split, so malformed input leaves nothing on disk, and
//! it is removed again if the surface fails to launch.

use crate::config::{IngestConfig, PageFailurePolicy};
use crate::error::IngestError;
use crate::output::{DocumentRender, PageOutcome};
use crate::pipeline::render::{PageRenderer, RenderSettings};
use crate::pipeline::split::{PageSplitter, PdfModel};
use crate::pipeline::surface::{with_surface, SurfaceLauncher};
use crate::progress::ProgressCallback;
use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// `<dir>/<stem>.pdf` → `<dir>/<stem>_images`.
pub fn output_dir_for(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    let dir_name = format!("{}_images", stem);
    match source.parent() {
        Some(parent) => parent.join(dir_name),
        None => PathBuf::from(dir_name),
    }
}

/// Rasterises whole documents.
#[derive(Clone)]
pub struct RenderScheduler {
    splitter: PageSplitter,
    launcher: Arc<dyn SurfaceLauncher>,
    settings: RenderSettings,
    concurrency: usize,
    policy: PageFailurePolicy,
    progress: Option<ProgressCallback>,
}

impl RenderScheduler {
    pub fn new(
        config: &IngestConfig,
        model: Arc<dyn PdfModel>,
        launcher: Arc<dyn SurfaceLauncher>,
    ) -> Self {
        Self {
            splitter: PageSplitter::new(model, config.page_margin),
            launcher,
            settings: RenderSettings::from(config),
            concurrency: config.concurrency.max(1),
            policy: config.page_failure_policy,
            progress: config.progress_callback.clone(),
        }
    }

    /// Render every page of the PDF at `source`.
    ///
    /// Page failures are recorded in the result under
    /// [`PageFailurePolicy::Continue`]; under [`PageFailurePolicy::Abort`]
    /// the first one (by page index) fails the document and its rendered
    /// images are removed.
    pub async fn render_all(
        &self,
        source: &Path,
        document_id: &str,
    ) -> Result<DocumentRender, IngestError> {
        let start = Instant::now();
        let bytes = tokio::fs::read(source)
            .await
            .map_err(|e| IngestError::ArtifactIo {
                path: source.to_path_buf(),
                source: e,
            })?;

        let units = self.splitter.split_async(bytes).await?;
        let total = units.len();
        info!("'{}': {} page(s) to render", document_id, total);
        if let Some(cb) = &self.progress {
            cb.on_document_start(document_id, total);
        }

        let output_dir = output_dir_for(source);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| IngestError::ArtifactIo {
                path: output_dir.clone(),
                source: e,
            })?;

        let renderer = PageRenderer::new(self.settings.clone(), &output_dir, document_id);
        let renderer = &renderer;
        let progress = self.progress.as_ref();
        let concurrency = self.concurrency;

        let outcome = with_surface(self.launcher.as_ref(), |surface| async move {
            stream::iter(units.into_iter().map(|unit| {
                let surface = Arc::clone(&surface);
                async move {
                    match renderer.render(surface.as_ref(), &unit).await {
                        Ok(image) => {
                            if let Some(cb) = progress {
                                cb.on_page_rendered(document_id, unit.index, total);
                            }
                            PageOutcome::Rendered(image)
                        }
                        Err(e) => {
                            warn!("'{}': {}", document_id, e);
                            if let Some(cb) = progress {
                                cb.on_page_failed(document_id, unit.index, total, &e.to_string());
                            }
                            PageOutcome::Failed(e)
                        }
                    }
                }
            }))
            .buffer_unordered(concurrency)
            .collect::<Vec<PageOutcome>>()
            .await
        })
        .await;
        let mut pages = match outcome {
            Ok(pages) => pages,
            Err(e) => {
                remove_output_dir(&output_dir).await;
                return Err(e);
            }
        };

        pages.sort_by_key(PageOutcome::page_index);

        let render = DocumentRender {
            document_id: document_id.to_string(),
            source: source.to_path_buf(),
            output_dir,
            pages,
        };
        let rendered = render.rendered_count();
        if let Some(cb) = &self.progress {
            cb.on_document_complete(document_id, total, rendered);
        }

        if self.policy == PageFailurePolicy::Abort {
            if let Some(err) = render.failures().next() {
                let err = IngestError::RenderFailure {
                    path: source.to_path_buf(),
                    page: err.page(),
                    detail: err.to_string(),
                };
                discard(&render).await;
                return Err(err);
            }
        }

        info!(
            "'{}': rendered {}/{} page(s) in {}ms",
            document_id,
            rendered,
            total,
            start.elapsed().as_millis()
        );
        Ok(render)
    }
}

/// Delete a document's rendered images and, if then empty, its directory.
pub(crate) async fn discard(render: &DocumentRender) {
    for image in render.images() {
        if let Err(e) = tokio::fs::remove_file(&image.path).await {
            warn!("Could not remove {}: {}", image.path.display(), e);
        }
    }
    remove_output_dir(&render.output_dir).await;
}

// Leaves the directory alone if anything else lives there.
async fn remove_output_dir(dir: &Path) {
    if tokio::fs::remove_dir(dir).await.is_ok() {
        debug!("Removed {}", dir.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_dir_sits_next_to_source() {
        assert_eq!(
            output_dir_for(Path::new("uploads/annual-report.pdf")),
            PathBuf::from("uploads/annual-report_images")
        );
        assert_eq!(
            output_dir_for(Path::new("scan.pdf")),
            PathBuf::from("scan_images")
        );
    }
}

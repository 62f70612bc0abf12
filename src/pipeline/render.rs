//! Page rasterisation: one [`PageUnit`] → one selected PNG.
//!
//! ## Rounds and selection
//!
//! Some surfaces occasionally capture a page before every font or image has
//! been painted. With `sample_count > 1` the page is rendered that many
//! times in fresh contexts and the **largest** PNG by byte size is kept; a
//! fully painted page compresses to more bytes than a partially painted one.
//! Ties keep the earliest round. Losing candidates are deleted.
//!
//! ## Artifacts
//!
//! The single-page PDF is written to a uniquely named temporary file inside
//! the document's output directory so the surface can load it by path. The
//! file is removed when rendering of the page ends, whatever the outcome.
//!
//! Every surface step runs under the per-step timeout, and each round's
//! context is closed regardless of how the round went.

use crate::config::IngestConfig;
use crate::error::{PageError, SurfaceError};
use crate::output::PageImage;
use crate::pipeline::split::PageUnit;
use crate::pipeline::surface::{RenderSurface, Viewport};
use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Per-page rendering knobs, taken from [`IngestConfig`].
#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub sample_count: usize,
    pub scale_factor: f32,
    pub settle_delay: Duration,
    pub step_timeout: Duration,
}

impl From<&IngestConfig> for RenderSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            sample_count: config.sample_count.max(1),
            scale_factor: config.scale_factor,
            settle_delay: config.settle_delay(),
            step_timeout: config.render_timeout(),
        }
    }
}

/// One captured bitmap awaiting selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderCandidate {
    pub path: PathBuf,
    pub byte_size: u64,
}

/// Pick the largest candidate; ties keep the first seen.
///
/// Returns the winner and the losers, or `None` if there were no candidates.
pub fn select_largest(
    candidates: Vec<RenderCandidate>,
) -> Option<(RenderCandidate, Vec<RenderCandidate>)> {
    let mut iter = candidates.into_iter();
    let mut winner = iter.next()?;
    let mut losers = Vec::new();
    for candidate in iter {
        if candidate.byte_size > winner.byte_size {
            losers.push(std::mem::replace(&mut winner, candidate));
        } else {
            losers.push(candidate);
        }
    }
    Some((winner, losers))
}

/// Renders single pages of one document into its output directory.
#[derive(Debug, Clone)]
pub struct PageRenderer {
    settings: RenderSettings,
    output_dir: PathBuf,
    document_id: String,
}

impl PageRenderer {
    pub fn new(settings: RenderSettings, output_dir: impl Into<PathBuf>, document_id: &str) -> Self {
        Self {
            settings,
            output_dir: output_dir.into(),
            document_id: document_id.to_string(),
        }
    }

    /// Final location of a page's selected image.
    pub fn page_path(&self, page: usize) -> PathBuf {
        self.output_dir.join(format!("page-{}.png", page))
    }

    fn round_path(&self, page: usize, round: usize) -> PathBuf {
        if self.settings.sample_count == 1 {
            self.page_path(page)
        } else {
            self.output_dir
                .join(format!("page-{}-round-{}.png", page, round))
        }
    }

    /// Render `unit` on `surface` and return the selected image.
    ///
    /// Fails only when every round failed; the caller decides whether that
    /// fails the document.
    pub async fn render(
        &self,
        surface: &dyn RenderSurface,
        unit: &PageUnit,
    ) -> Result<PageImage, PageError> {
        let rounds = self.settings.sample_count;
        let failed = |detail: String| PageError::RenderFailed {
            page: unit.index,
            rounds,
            detail,
        };

        let artifact = self
            .persist_artifact(unit)
            .map_err(|e| failed(format!("writing page artifact: {}", e)))?;
        let viewport =
            Viewport::for_page(unit.width, unit.height, self.settings.scale_factor);

        let mut candidates = Vec::with_capacity(rounds);
        let mut last_error = String::new();
        for round in 1..=rounds {
            let output = self.round_path(unit.index, round);
            match self
                .render_round(surface, viewport, artifact.path(), &output)
                .await
            {
                Ok(()) => match tokio::fs::metadata(&output).await {
                    Ok(meta) => candidates.push(RenderCandidate {
                        path: output,
                        byte_size: meta.len(),
                    }),
                    Err(e) => {
                        warn!("Page {} round {}: no capture on disk: {}", unit.index, round, e);
                        last_error = format!("capture missing: {}", e);
                    }
                },
                Err(e) => {
                    warn!("Page {} round {} failed: {}", unit.index, round, e);
                    remove_if_exists(&output).await;
                    last_error = e.to_string();
                }
            }
        }
        drop(artifact);

        let (winner, losers) = select_largest(candidates).ok_or_else(|| failed(last_error))?;
        for loser in &losers {
            remove_if_exists(&loser.path).await;
        }

        let final_path = self.page_path(unit.index);
        if winner.path != final_path {
            if let Err(e) = tokio::fs::rename(&winner.path, &final_path).await {
                remove_if_exists(&winner.path).await;
                return Err(failed(format!("moving selected capture: {}", e)));
            }
        }
        debug!(
            "Page {} → {} ({} bytes, {} round(s))",
            unit.index,
            final_path.display(),
            winner.byte_size,
            rounds
        );

        Ok(PageImage {
            document_id: self.document_id.clone(),
            page_index: unit.index,
            path: final_path,
        })
    }

    fn persist_artifact(&self, unit: &PageUnit) -> std::io::Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("page-{}-", unit.index))
            .suffix(".pdf")
            .tempfile_in(&self.output_dir)?;
        file.write_all(&unit.document_bytes)?;
        file.flush()?;
        Ok(file)
    }

    async fn render_round(
        &self,
        surface: &dyn RenderSurface,
        viewport: Viewport,
        artifact: &Path,
        output: &Path,
    ) -> Result<(), SurfaceError> {
        let mut context = self.step("open", surface.open_context(viewport)).await?;

        let result = async {
            self.step("load", context.load(artifact)).await?;
            self.step("wait for idle", context.wait_until_idle()).await?;
            if !self.settings.settle_delay.is_zero() {
                tokio::time::sleep(self.settings.settle_delay).await;
            }
            self.step("capture", context.capture(output)).await
        }
        .await;

        if let Err(e) = self.step("close", context.close()).await {
            warn!("Closing page context failed: {}", e);
        }
        result
    }

    async fn step<T>(
        &self,
        step: &'static str,
        fut: impl Future<Output = Result<T, SurfaceError>>,
    ) -> Result<T, SurfaceError> {
        match tokio::time::timeout(self.settings.step_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(SurfaceError::Timeout {
                step,
                millis: self.settings.step_timeout.as_millis() as u64,
            }),
        }
    }
}

async fn remove_if_exists(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Could not remove {}: {}", path.display(), e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::surface::SurfaceContext;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    fn candidate(name: &str, size: u64) -> RenderCandidate {
        RenderCandidate {
            path: PathBuf::from(name),
            byte_size: size,
        }
    }

    #[test]
    fn largest_wins() {
        let (winner, losers) = select_largest(vec![
            candidate("a", 10),
            candidate("b", 30),
            candidate("c", 20),
        ])
        .unwrap();
        assert_eq!(winner.path, PathBuf::from("b"));
        assert_eq!(losers.len(), 2);
    }

    #[test]
    fn ties_keep_first_seen() {
        let (winner, _) =
            select_largest(vec![candidate("a", 10), candidate("b", 10)]).unwrap();
        assert_eq!(winner.path, PathBuf::from("a"));
        assert!(select_largest(Vec::new()).is_none());
    }

    /// Writes captures whose size comes from a per-round script.
    struct ScriptedSurface {
        sizes: Mutex<Vec<Option<usize>>>,
        opened: AtomicUsize,
        closed: Arc<AtomicUsize>,
    }

    struct ScriptedContext {
        size: Option<usize>,
        loaded: bool,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RenderSurface for ScriptedSurface {
        async fn open_context(
            &self,
            _viewport: Viewport,
        ) -> Result<Box<dyn SurfaceContext>, SurfaceError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let size = self.sizes.lock().unwrap().remove(0);
            Ok(Box::new(ScriptedContext {
                size,
                loaded: false,
                closed: self.closed.clone(),
            }))
        }

        async fn close(&self) -> Result<(), SurfaceError> {
            Ok(())
        }
    }

    #[async_trait]
    impl SurfaceContext for ScriptedContext {
        async fn load(&mut self, artifact: &Path) -> Result<(), SurfaceError> {
            assert!(artifact.exists());
            self.loaded = true;
            Ok(())
        }

        async fn wait_until_idle(&mut self) -> Result<(), SurfaceError> {
            Ok(())
        }

        async fn capture(&mut self, output: &Path) -> Result<(), SurfaceError> {
            assert!(self.loaded);
            match self.size {
                Some(n) => Ok(std::fs::write(output, vec![0u8; n])?),
                None => Err(SurfaceError::Capture("blank frame".into())),
            }
        }

        async fn close(&mut self) -> Result<(), SurfaceError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn unit(index: usize) -> PageUnit {
        PageUnit {
            index,
            document_bytes: b"%PDF single".to_vec(),
            width: 612.0,
            height: 792.0,
        }
    }

    fn settings(rounds: usize) -> RenderSettings {
        RenderSettings {
            sample_count: rounds,
            scale_factor: 2.0,
            settle_delay: Duration::ZERO,
            step_timeout: Duration::from_secs(5),
        }
    }

    fn dir_entries(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn keeps_largest_round_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let surface = ScriptedSurface {
            sizes: Mutex::new(vec![Some(100), Some(300), Some(200)]),
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        };
        let renderer = PageRenderer::new(settings(3), dir.path(), "doc.pdf");

        let image = renderer.render(&surface, &unit(4)).await.unwrap();

        assert_eq!(image.page_index, 4);
        assert_eq!(image.path, dir.path().join("page-4.png"));
        assert_eq!(std::fs::metadata(&image.path).unwrap().len(), 300);
        assert_eq!(dir_entries(dir.path()), vec!["page-4.png"]);
        assert_eq!(surface.opened.load(Ordering::SeqCst), 3);
        assert_eq!(surface.closed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn failed_rounds_do_not_win() {
        let dir = TempDir::new().unwrap();
        let surface = ScriptedSurface {
            sizes: Mutex::new(vec![None, Some(50)]),
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        };
        let renderer = PageRenderer::new(settings(2), dir.path(), "doc.pdf");

        let image = renderer.render(&surface, &unit(1)).await.unwrap();
        assert_eq!(std::fs::metadata(&image.path).unwrap().len(), 50);
        assert_eq!(surface.closed.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn all_rounds_failing_is_a_page_error() {
        let dir = TempDir::new().unwrap();
        let surface = ScriptedSurface {
            sizes: Mutex::new(vec![None]),
            opened: AtomicUsize::new(0),
            closed: Arc::new(AtomicUsize::new(0)),
        };
        let renderer = PageRenderer::new(settings(1), dir.path(), "doc.pdf");

        let err = renderer.render(&surface, &unit(2)).await.unwrap_err();
        assert_eq!(err.page(), 2);
        assert!(err.to_string().contains("blank frame"), "got: {err}");
        assert!(dir_entries(dir.path()).is_empty());
        assert_eq!(surface.closed.load(Ordering::SeqCst), 1);
    }

    struct StuckSurface;
    struct StuckContext;

    #[async_trait]
    impl RenderSurface for StuckSurface {
        async fn open_context(
            &self,
            _viewport: Viewport,
        ) -> Result<Box<dyn SurfaceContext>, SurfaceError> {
            Ok(Box::new(StuckContext))
        }

        async fn close(&self) -> Result<(), SurfaceError> {
            Ok(())
        }
    }

    #[async_trait]
    impl SurfaceContext for StuckContext {
        async fn load(&mut self, _artifact: &Path) -> Result<(), SurfaceError> {
            Ok(())
        }

        async fn wait_until_idle(&mut self) -> Result<(), SurfaceError> {
            futures::future::pending::<()>().await;
            Ok(())
        }

        async fn capture(&mut self, _output: &Path) -> Result<(), SurfaceError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SurfaceError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn stuck_step_times_out() {
        let dir = TempDir::new().unwrap();
        let mut s = settings(1);
        s.step_timeout = Duration::from_millis(50);
        let renderer = PageRenderer::new(s, dir.path(), "doc.pdf");

        let err = renderer.render(&StuckSurface, &unit(1)).await.unwrap_err();
        assert!(err.to_string().contains("wait for idle timed out"), "got: {err}");
    }
}

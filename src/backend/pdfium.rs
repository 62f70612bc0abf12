//! pdfium-backed PDF model and rendering surface.
//!
//! A bound `Pdfium` instance cannot cross threads, so the backends only
//! share a [`PdfiumBinding`] (where the library lives) and bind a fresh
//! instance on the blocking thread that does the work. Documents are opened
//! and dropped on that same thread.
//!
//! ## Library lookup
//!
//! [`locate_pdfium`] tries, in order:
//!
//! 1. `PDFIUM_LIB_PATH` (a library file or the directory containing it)
//! 2. the executable's directory and its `libs/` subdirectory
//! 3. the current directory
//! 4. the system library search path

use crate::error::{IngestError, PdfModelError, SurfaceError};
use crate::pipeline::split::{LoadedPdf, PdfModel};
use crate::pipeline::surface::{RenderSurface, SurfaceContext, SurfaceLauncher, Viewport};
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Where to find the pdfium shared library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfiumBinding {
    /// A specific library file.
    Library(PathBuf),
    /// The platform's library search path.
    System,
}

impl PdfiumBinding {
    /// Bind a new `Pdfium` instance on the calling thread.
    pub fn bind(&self) -> Result<Pdfium, String> {
        let bindings = match self {
            PdfiumBinding::Library(path) => Pdfium::bind_to_library(path)
                .map_err(|e| format!("{}: {:?}", path.display(), e))?,
            PdfiumBinding::System => {
                Pdfium::bind_to_system_library().map_err(|e| format!("{:?}", e))?
            }
        };
        Ok(Pdfium::new(bindings))
    }
}

fn search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.to_path_buf());
            paths.push(exe_dir.join("libs"));
        }
    }
    paths.push(PathBuf::from("./"));
    paths
}

fn library_at(dir: &Path) -> PathBuf {
    PathBuf::from(Pdfium::pdfium_platform_library_name_at_path(dir))
}

/// Find a pdfium library that binds.
pub fn locate_pdfium() -> Result<PdfiumBinding, IngestError> {
    if let Some(configured) = std::env::var_os("PDFIUM_LIB_PATH").filter(|v| !v.is_empty()) {
        let configured = PathBuf::from(configured);
        let binding = PdfiumBinding::Library(if configured.is_dir() {
            library_at(&configured)
        } else {
            configured
        });
        binding.bind().map_err(IngestError::PdfiumBindingFailed)?;
        return Ok(binding);
    }

    for dir in search_paths() {
        let binding = PdfiumBinding::Library(library_at(&dir));
        debug!("Trying pdfium at {:?}", binding);
        if binding.bind().is_ok() {
            info!("Using pdfium from {}", dir.display());
            return Ok(binding);
        }
    }

    PdfiumBinding::System
        .bind()
        .map(|_| PdfiumBinding::System)
        .map_err(IngestError::PdfiumBindingFailed)
}

/// Build the model and launcher for one library location.
pub fn pdfium_backends(binding: PdfiumBinding) -> (Arc<PdfiumModel>, Arc<PdfiumLauncher>) {
    (
        Arc::new(PdfiumModel {
            binding: binding.clone(),
        }),
        Arc::new(PdfiumLauncher { binding }),
    )
}

fn model_err(e: PdfiumError) -> PdfModelError {
    PdfModelError(format!("{:?}", e))
}

// ── PDF model ────────────────────────────────────────────────────────────────

pub struct PdfiumModel {
    binding: PdfiumBinding,
}

/// A document already split into single-page PDFs.
struct SplitDocument {
    pages: Vec<((f32, f32), Vec<u8>)>,
}

impl PdfModel for PdfiumModel {
    /// Opens the document and copies out every page before the bound
    /// instance is dropped.
    fn load<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn LoadedPdf + 'a>, PdfModelError> {
        let pdfium = self.binding.bind().map_err(PdfModelError)?;
        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(model_err)?;

        let count = document.pages().len();
        let mut pages = Vec::with_capacity(count as usize);
        for i in 0..count {
            let page = document.pages().get(i).map_err(model_err)?;
            let size = (page.width().value, page.height().value);

            let mut single = pdfium.create_new_pdf().map_err(model_err)?;
            single
                .pages_mut()
                .copy_page_from_document(&document, i, 0)
                .map_err(model_err)?;
            pages.push((size, single.save_to_bytes().map_err(model_err)?));
        }
        Ok(Box::new(SplitDocument { pages }))
    }
}

impl LoadedPdf for SplitDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_dimensions(&self, index: usize) -> Result<(f32, f32), PdfModelError> {
        self.pages
            .get(index)
            .map(|(size, _)| *size)
            .ok_or_else(|| PdfModelError(format!("no page {}", index)))
    }

    fn extract_page(&self, index: usize) -> Result<Vec<u8>, PdfModelError> {
        self.pages
            .get(index)
            .map(|(_, bytes)| bytes.clone())
            .ok_or_else(|| PdfModelError(format!("no page {}", index)))
    }
}

// ── Rendering surface ────────────────────────────────────────────────────────

pub struct PdfiumLauncher {
    binding: PdfiumBinding,
}

#[async_trait]
impl SurfaceLauncher for PdfiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn RenderSurface>, SurfaceError> {
        Ok(Arc::new(PdfiumSurface {
            binding: self.binding.clone(),
        }))
    }
}

pub struct PdfiumSurface {
    binding: PdfiumBinding,
}

#[async_trait]
impl RenderSurface for PdfiumSurface {
    async fn open_context(&self, viewport: Viewport) -> Result<Box<dyn SurfaceContext>, SurfaceError> {
        Ok(Box::new(PdfiumContext {
            binding: self.binding.clone(),
            viewport,
            document: None,
        }))
    }

    async fn close(&self) -> Result<(), SurfaceError> {
        Ok(())
    }
}

struct PdfiumContext {
    binding: PdfiumBinding,
    viewport: Viewport,
    document: Option<Vec<u8>>,
}

#[async_trait]
impl SurfaceContext for PdfiumContext {
    async fn load(&mut self, artifact: &Path) -> Result<(), SurfaceError> {
        let bytes = tokio::fs::read(artifact)
            .await
            .map_err(|e| SurfaceError::Load(format!("{}: {}", artifact.display(), e)))?;
        self.document = Some(bytes);
        Ok(())
    }

    // Rendering is synchronous; once loaded there is nothing pending.
    async fn wait_until_idle(&mut self) -> Result<(), SurfaceError> {
        Ok(())
    }

    async fn capture(&mut self, output: &Path) -> Result<(), SurfaceError> {
        let bytes = self
            .document
            .clone()
            .ok_or_else(|| SurfaceError::Capture("no document loaded".into()))?;
        let binding = self.binding.clone();
        let (width, height) = self.viewport.pixel_size();
        let output = output.to_path_buf();

        tokio::task::spawn_blocking(move || capture_blocking(&binding, &bytes, width, height, &output))
            .await
            .map_err(|e| SurfaceError::Capture(format!("capture task panicked: {}", e)))?
    }

    async fn close(&mut self) -> Result<(), SurfaceError> {
        self.document = None;
        Ok(())
    }
}

fn capture_blocking(
    binding: &PdfiumBinding,
    bytes: &[u8],
    width: u32,
    height: u32,
    output: &Path,
) -> Result<(), SurfaceError> {
    let pdfium = binding.bind().map_err(SurfaceError::Launch)?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, None)
        .map_err(|e| SurfaceError::Load(format!("{:?}", e)))?;
    let page = document
        .pages()
        .get(0)
        .map_err(|e| SurfaceError::Load(format!("{:?}", e)))?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(width as i32)
        .set_target_height(height as i32);
    let bitmap = page
        .render_with_config(&render_config)
        .map_err(|e| SurfaceError::Capture(format!("{:?}", e)))?;

    bitmap
        .as_image()
        .save_with_format(output, image::ImageFormat::Png)
        .map_err(|e| SurfaceError::Capture(format!("{}: {}", output.display(), e)))?;
    debug!("Captured {}x{} px → {}", width, height, output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn backends_are_send_and_sync() {
        assert_send_sync::<PdfiumBinding>();
        assert_send_sync::<PdfiumModel>();
        assert_send_sync::<PdfiumLauncher>();
        assert_send_sync::<PdfiumSurface>();
    }

    #[test]
    fn missing_library_fails_to_bind() {
        let binding = PdfiumBinding::Library(PathBuf::from("/nonexistent/libpdfium.so"));
        match binding.bind() {
            Ok(_) => panic!("bound a library that does not exist"),
            Err(err) => assert!(err.contains("/nonexistent/libpdfium.so"), "got: {err}"),
        }
    }

    #[test]
    fn backends_share_one_binding() {
        let binding = PdfiumBinding::Library(PathBuf::from("libs/libpdfium.so"));
        let (model, launcher) = pdfium_backends(binding.clone());
        assert_eq!(model.binding, binding);
        assert_eq!(launcher.binding, binding);
    }
}

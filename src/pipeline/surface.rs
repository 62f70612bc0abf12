//! Rendering-surface capability and its scoped lifetime.
//!
//! A surface is an expensive, long-lived renderer (a headless browser, a
//! pdfium instance, ...). One surface is launched per document and shared by
//! every page task of that document; each render round opens its own
//! short-lived [`SurfaceContext`] sized to the page.
//!
//! [`with_surface`] owns the surface lifetime: it launches, runs the body,
//! and closes the surface exactly once, whether the body returns normally
//! or panics.

use crate::error::{IngestError, SurfaceError};
use async_trait::async_trait;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Page geometry handed to a context: CSS-pixel size plus device scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    pub scale: f32,
}

impl Viewport {
    /// Viewport for a page of `width` x `height` points, rounded up.
    pub fn for_page(width: f32, height: f32, scale: f32) -> Self {
        Self {
            width: width.ceil().max(1.0) as u32,
            height: height.ceil().max(1.0) as u32,
            scale,
        }
    }

    /// Size of the captured bitmap in device pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width as f32 * self.scale).round().max(1.0) as u32,
            (self.height as f32 * self.scale).round().max(1.0) as u32,
        )
    }
}

/// Starts rendering surfaces.
#[async_trait]
pub trait SurfaceLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn RenderSurface>, SurfaceError>;
}

/// A running surface, shared by all page tasks of one document.
#[async_trait]
pub trait RenderSurface: Send + Sync {
    async fn open_context(
        &self,
        viewport: Viewport,
    ) -> Result<Box<dyn SurfaceContext>, SurfaceError>;

    async fn close(&self) -> Result<(), SurfaceError>;
}

/// One render round: load an artifact, let it settle, capture it.
#[async_trait]
pub trait SurfaceContext: Send {
    async fn load(&mut self, artifact: &Path) -> Result<(), SurfaceError>;

    /// Resolve once the surface reports no outstanding activity.
    async fn wait_until_idle(&mut self) -> Result<(), SurfaceError>;

    /// Write a full-viewport PNG to `output`.
    async fn capture(&mut self, output: &Path) -> Result<(), SurfaceError>;

    async fn close(&mut self) -> Result<(), SurfaceError>;
}

/// Launch a surface, run `body` with it, then close it.
///
/// The surface is closed before this returns, including when `body`
/// panics; the panic is resumed after the close.
pub async fn with_surface<F, Fut, T>(launcher: &dyn SurfaceLauncher, body: F) -> Result<T, IngestError>
where
    F: FnOnce(Arc<dyn RenderSurface>) -> Fut,
    Fut: Future<Output = T>,
{
    let surface = launcher
        .launch()
        .await
        .map_err(|e| IngestError::SurfaceLaunchFailed(e.to_string()))?;
    debug!("Rendering surface launched");

    let outcome = AssertUnwindSafe(body(Arc::clone(&surface)))
        .catch_unwind()
        .await;

    if let Err(e) = surface.close().await {
        warn!("Closing rendering surface failed: {}", e);
    } else {
        debug!("Rendering surface closed");
    }

    match outcome {
        Ok(value) => Ok(value),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

//! Render surface facade
//!
//! One interface, two backends. The backend is picked once when the
//! controller attaches and never changes afterwards.

mod raster;
mod vector;

pub use raster::RasterSurface;
pub use vector::VectorSurface;

use log::info;

use super::error::PreviewError;
use super::geometry::{ContainerState, DocumentSize, ScaleState};
use super::host::HostElement;
use super::options::PreviewOptions;
use super::session::RenderSession;
use super::types::{CursorPosition, PageColor, RenderMode};

/// Everything a surface needs for one redraw cycle
#[derive(Debug, Clone, PartialEq)]
pub struct RedrawContext {
    pub container: ContainerState,
    pub scale: ScaleState,
    pub doc_size: DocumentSize,
    pub page_color: PageColor,
    pub cursor: Option<CursorPosition>,
    /// Page (0-indexed) to restrict rendering to
    pub partial_page: Option<usize>,
    /// Session revision, bumped on every merge/reset
    pub revision: u64,
    pub page_count: usize,
}

/// Backend-specific drawing operations invoked by the controller
pub trait RenderSurface {
    fn mode(&self) -> RenderMode;

    /// Fit the hosted output to the computed scale
    fn resize_to_fit(&mut self, host: &mut dyn HostElement, ctx: &RedrawContext);

    /// Draw the session's current state
    fn redraw(
        &mut self,
        session: &dyn RenderSession,
        host: &mut dyn HostElement,
        ctx: &RedrawContext,
    ) -> Result<(), PreviewError>;

    /// Collect finished background work. Returns true while work is pending.
    fn poll(&mut self) -> Result<bool, PreviewError>;

    /// Post-process once the cycle is over
    fn after_redraw(&mut self, host: &mut dyn HostElement, ctx: &RedrawContext);

    /// Drop pending work of a failed cycle. Nothing from it reaches the host.
    fn abort(&mut self);

    /// Stop background work and free resources. Idempotent.
    fn release(&mut self);
}

/// Build the surface for `mode`, failing fast when the host cannot present it
pub fn create(
    mode: RenderMode,
    options: &PreviewOptions,
    host: &dyn HostElement,
) -> Result<Box<dyn RenderSurface>, PreviewError> {
    if !host.supports(mode) {
        return Err(PreviewError::UnsupportedMode(mode));
    }

    info!("Creating {mode} render surface");
    let surface: Box<dyn RenderSurface> = match mode {
        RenderMode::Vector => Box::new(VectorSurface::new(options)),
        RenderMode::Raster => Box::new(RasterSurface::new(options)?),
    };
    Ok(surface)
}

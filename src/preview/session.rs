//! Render session capability consumed by the preview
//!
//! The session owns the compiled document state. The preview never looks
//! inside patch payloads; bytes are handed to [`RenderSession::merge`] as-is.

use std::sync::Arc;

use super::error::SessionError;
use super::geometry::DocumentSize;
use super::types::{PageColor, Tile};

/// Options forwarded to the session when producing vector markup
#[derive(Debug, Clone, PartialEq)]
pub struct VectorParams {
    pub page_color: PageColor,
    /// Restrict output to a single page (0-indexed)
    pub partial_page: Option<usize>,
    /// Emit source-mapping attributes for jump-to-source
    pub source_mapping: bool,
    /// Content-only preview: no page frames or shadows
    pub is_content_preview: bool,
}

/// Immutable snapshot of the document, safe to rasterize off-thread
pub trait RasterScene: Send + Sync {
    /// Logical size of the scene in points
    fn size(&self) -> DocumentSize;

    /// Draw one band of the output into `out` (RGBA rows of `tile.width`).
    ///
    /// `out` is pre-filled with the page color.
    fn render_tile(&self, tile: &Tile, scale: f32, out: &mut [u8]) -> Result<(), SessionError>;
}

/// Compiled document state, exclusively owned by one controller
pub trait RenderSession {
    /// Apply a diff or a full snapshot
    fn merge(&mut self, payload: &[u8]) -> Result<(), SessionError>;

    /// Discard all document state
    fn reset(&mut self);

    fn page_count(&self) -> usize;

    /// Logical size of the rendered document, if anything has been merged
    fn document_size(&self) -> Option<DocumentSize>;

    /// Vector markup for the current state
    fn render_vector(&self, params: &VectorParams) -> Result<String, SessionError>;

    /// Snapshot for the raster worker
    fn raster_scene(&self) -> Result<Arc<dyn RasterScene>, SessionError>;
}

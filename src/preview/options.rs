//! Options recognized by `DocumentController::attach`

use std::time::Duration;

use super::geometry::Topology;
use super::patch::DEFAULT_DEBOUNCE;
use super::types::{PageColor, RenderMode};

/// Default number of finished bitmaps kept around
pub const DEFAULT_RASTER_CACHE_SIZE: usize = 8;
/// Default rows rendered between cancellation checkpoints
pub const DEFAULT_TILE_HEIGHT: u32 = 64;

#[derive(Debug, Clone, PartialEq)]
pub struct PreviewOptions {
    pub topology: Topology,
    /// Content-only preview without page frames
    pub is_content_preview: bool,
    /// Install jump-to-source hooks after every redraw
    pub source_mapping: bool,
    pub initial_render_mode: RenderMode,
    /// Device pixels per CSS pixel for raster output
    pub pixel_ratio: f32,
    pub tile_height: u32,
    pub raster_cache_size: usize,
    /// Debounce interval used before the first redraw is measured
    pub default_debounce: Duration,
    pub page_color: PageColor,
}

impl Default for PreviewOptions {
    fn default() -> Self {
        Self {
            topology: Topology::Continuous,
            is_content_preview: false,
            source_mapping: false,
            initial_render_mode: RenderMode::Vector,
            pixel_ratio: 1.0,
            tile_height: DEFAULT_TILE_HEIGHT,
            raster_cache_size: DEFAULT_RASTER_CACHE_SIZE,
            default_debounce: DEFAULT_DEBOUNCE,
            page_color: PageColor::WHITE,
        }
    }
}

impl PreviewOptions {
    #[must_use]
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    #[must_use]
    pub fn with_render_mode(mut self, mode: RenderMode) -> Self {
        self.initial_render_mode = mode;
        self
    }

    #[must_use]
    pub fn with_source_mapping(mut self, enabled: bool) -> Self {
        self.source_mapping = enabled;
        self
    }
}

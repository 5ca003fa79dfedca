//! Raster request and response types

use std::fmt;
use std::sync::Arc;

use super::cache::CacheKey;
use super::cancel::CancellationToken;
use super::error::SessionError;
use super::session::RasterScene;
use super::types::{Bitmap, PageColor};

/// Unique identifier for raster requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Parameters for rasterizing a scene
#[derive(Clone, Debug, PartialEq)]
pub struct RasterParams {
    /// Effective document scale (CSS pixels per point)
    pub scale: f32,
    /// Device pixels per CSS pixel
    pub pixel_ratio: f32,
    /// Background the bitmap is cleared to
    pub page_color: PageColor,
    /// Rows rendered between cancellation checkpoints
    pub tile_height: u32,
}

impl RasterParams {
    /// Device pixels per point
    #[must_use]
    pub fn density(&self) -> f32 {
        self.scale * self.pixel_ratio
    }
}

/// Request sent to the raster worker
pub enum RasterRequest {
    Render {
        id: RequestId,
        key: CacheKey,
        scene: Arc<dyn RasterScene>,
        params: RasterParams,
        token: CancellationToken,
    },

    /// Shutdown the worker
    Shutdown,
}

impl fmt::Debug for RasterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RasterRequest::Render { id, params, .. } => f
                .debug_struct("Render")
                .field("id", id)
                .field("params", params)
                .finish_non_exhaustive(),
            RasterRequest::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Errors from the raster worker
#[derive(Debug, thiserror::Error)]
pub enum WorkerFault {
    #[error("scene: {0}")]
    Scene(#[from] SessionError),

    #[error("{detail}")]
    Generic { detail: String },
}

impl WorkerFault {
    pub fn generic(msg: impl Into<String>) -> Self {
        Self::Generic { detail: msg.into() }
    }
}

/// Response from the raster worker
#[derive(Debug)]
pub enum RasterResponse {
    /// Finished bitmap
    Rendered {
        id: RequestId,
        key: CacheKey,
        bitmap: Arc<Bitmap>,
    },

    /// Render observed its token and stopped without output
    Cancelled(RequestId),

    /// Error during rendering
    Error { id: RequestId, error: WorkerFault },
}

impl RasterResponse {
    #[must_use]
    pub fn id(&self) -> RequestId {
        match self {
            RasterResponse::Rendered { id, .. }
            | RasterResponse::Cancelled(id)
            | RasterResponse::Error { id, .. } => *id,
        }
    }
}

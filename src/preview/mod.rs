//! Incremental preview engine

mod cache;
mod cancel;
mod controller;
mod error;
mod geometry;
mod host;
mod options;
mod patch;
mod request;
mod session;
pub mod surface;
mod types;
mod worker;
mod zoom;

pub use cache::{BitmapCache, CacheKey};
pub use cancel::{CancellationToken, FinishGuard};
pub use controller::{ControllerState, DocumentController, RenderStats};
pub use error::{PreviewError, SessionError};
pub use geometry::*;
pub use host::*;
pub use options::{DEFAULT_RASTER_CACHE_SIZE, DEFAULT_TILE_HEIGHT, PreviewOptions};
pub use patch::{DEFAULT_DEBOUNCE, Enqueued, Patch, PatchKind, PatchQueue};
pub use request::{RasterParams, RasterRequest, RasterResponse, RequestId, WorkerFault};
pub use session::{RasterScene, RenderSession, VectorParams};
pub use surface::{RasterSurface, RedrawContext, RenderSurface, VectorSurface};
pub use types::*;
pub use worker::{MAX_RASTER_DIMENSION, RasterSpec, RasterWorker};
pub use zoom::*;

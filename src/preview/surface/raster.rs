use std::sync::Arc;

use log::debug;

use super::{RedrawContext, RenderSurface};
use crate::preview::cache::{BitmapCache, CacheKey};
use crate::preview::cancel::CancellationToken;
use crate::preview::error::PreviewError;
use crate::preview::host::HostElement;
use crate::preview::options::PreviewOptions;
use crate::preview::request::{RasterParams, RasterResponse, RequestId};
use crate::preview::session::RenderSession;
use crate::preview::types::{Bitmap, RenderMode};
use crate::preview::worker::{RasterSpec, RasterWorker};

/// The one render the surface is waiting for
#[derive(Debug)]
struct ActiveRender {
    id: RequestId,
    token: CancellationToken,
}

/// Rasterizes off-thread and blits finished bitmaps into the host buffer.
///
/// At most one render is outstanding. Starting a new one cancels the
/// previous render and waits for it to unwind first.
pub struct RasterSurface {
    worker: RasterWorker,
    cache: BitmapCache,
    active: Option<ActiveRender>,
    /// Finished bitmap waiting for `after_redraw`
    ready: Option<Arc<Bitmap>>,
    pixel_ratio: f32,
    tile_height: u32,
    released: bool,
}

impl RasterSurface {
    pub fn new(options: &PreviewOptions) -> Result<Self, PreviewError> {
        let worker = RasterWorker::spawn().map_err(|e| {
            PreviewError::configuration(format!("cannot start raster worker: {e}"))
        })?;

        Ok(Self {
            worker,
            cache: BitmapCache::new(options.raster_cache_size),
            active: None,
            ready: None,
            pixel_ratio: options.pixel_ratio,
            tile_height: options.tile_height,
            released: false,
        })
    }

    fn params(&self, ctx: &RedrawContext) -> RasterParams {
        RasterParams {
            scale: ctx.scale.effective(),
            pixel_ratio: self.pixel_ratio,
            page_color: ctx.page_color,
            tile_height: self.tile_height,
        }
    }

    /// Cancel the outstanding render and wait until it has stopped
    fn cancel_active(&mut self) {
        if let Some(active) = self.active.take() {
            debug!("cancelling raster request {}", active.id.0);
            active.token.cancel_and_wait();
        }
    }

    /// Number of cached bitmaps
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

impl RenderSurface for RasterSurface {
    fn mode(&self) -> RenderMode {
        RenderMode::Raster
    }

    fn resize_to_fit(&mut self, host: &mut dyn HostElement, ctx: &RedrawContext) {
        let spec = RasterSpec::compute(ctx.doc_size, &self.params(ctx));
        host.resize_pixel_buffer(spec.width, spec.height);
    }

    fn redraw(
        &mut self,
        session: &dyn RenderSession,
        _host: &mut dyn HostElement,
        ctx: &RedrawContext,
    ) -> Result<(), PreviewError> {
        if self.released {
            return Err(PreviewError::Disposed);
        }

        self.cancel_active();
        self.ready = None;
        self.cache.retain_revision(ctx.revision);

        let params = self.params(ctx);
        let key = CacheKey::from_params(ctx.revision, &params);
        if let Some(bitmap) = self.cache.get(&key) {
            debug!("raster cache hit for revision {}", ctx.revision);
            self.ready = Some(bitmap);
            return Ok(());
        }

        let scene = session.raster_scene()?;
        let token = CancellationToken::new();
        let id = self.worker.submit(key, scene, params, token.clone())?;
        self.active = Some(ActiveRender { id, token });
        Ok(())
    }

    fn poll(&mut self) -> Result<bool, PreviewError> {
        for response in self.worker.poll_responses() {
            let current = self.active.as_ref().map(|a| a.id);
            if current != Some(response.id()) {
                // Superseded render; its output must never reach the host
                debug!("dropping stale raster response {}", response.id().0);
                continue;
            }

            self.active = None;
            match response {
                RasterResponse::Rendered { key, bitmap, .. } => {
                    self.cache.insert(key, bitmap.clone());
                    self.ready = Some(bitmap);
                }
                RasterResponse::Error { error, .. } => return Err(error.into()),
                // The current render is only ever cancelled after `active` is cleared
                RasterResponse::Cancelled(_) => {}
            }
        }
        Ok(self.active.is_some())
    }

    fn after_redraw(&mut self, host: &mut dyn HostElement, ctx: &RedrawContext) {
        if let Some(bitmap) = self.ready.take() {
            host.blit(&bitmap);
        }
        host.show_cursor(ctx.cursor);
    }

    fn abort(&mut self) {
        self.cancel_active();
        self.ready = None;
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.cancel_active();
        self.ready = None;
        self.cache.clear();
        self.worker.shutdown();
    }
}

impl Drop for RasterSurface {
    fn drop(&mut self) {
        self.release();
    }
}

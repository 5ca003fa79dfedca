//! Raster worker - runs in a dedicated thread

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::debug;

use super::cancel::CancellationToken;
use super::geometry::{DocumentSize, pixel_extent};
use super::request::{RasterParams, RasterRequest, RasterResponse, RequestId, WorkerFault};
use super::session::RasterScene;
use super::types::Bitmap;

/// Largest bitmap side we are willing to allocate
pub const MAX_RASTER_DIMENSION: f32 = 16_384.0;

/// Pre-computed rasterization parameters for a scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterSpec {
    pub width: u32,
    pub height: u32,
    /// Device pixels per point after clamping
    pub density: f32,
}

impl RasterSpec {
    #[must_use]
    pub fn compute(size: DocumentSize, params: &RasterParams) -> Self {
        let mut density = params.density();

        let max_dim = size.width.max(size.height) * density;
        if max_dim > MAX_RASTER_DIMENSION {
            density *= MAX_RASTER_DIMENSION / max_dim;
        }

        let (width, height) = pixel_extent(size, density, 1.0);
        Self {
            width,
            height,
            density,
        }
    }
}

/// Why a render produced no bitmap
enum Outcome {
    Done(Bitmap),
    Cancelled,
}

/// Main worker function - runs in a dedicated thread
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn raster_worker(requests: Receiver<RasterRequest>, responses: Sender<RasterResponse>) {
    for request in requests {
        match request {
            RasterRequest::Render {
                id,
                key,
                scene,
                params,
                token,
            } => {
                // Finishes the token after the response is sent
                let _guard = token.finish_guard();

                let response = match render_scene(&scene, &params, &token) {
                    Ok(Outcome::Done(bitmap)) => RasterResponse::Rendered {
                        id,
                        key,
                        bitmap: Arc::new(bitmap),
                    },
                    Ok(Outcome::Cancelled) => {
                        debug!("raster request {} cancelled", id.0);
                        RasterResponse::Cancelled(id)
                    }
                    Err(error) => RasterResponse::Error { id, error },
                };
                let _ = responses.send(response);
            }

            RasterRequest::Shutdown => break,
        }
    }
}

/// Rasterize a scene tile by tile, checking the token between tiles
fn render_scene(
    scene: &Arc<dyn RasterScene>,
    params: &RasterParams,
    token: &CancellationToken,
) -> Result<Outcome, WorkerFault> {
    if token.is_cancelled() {
        return Ok(Outcome::Cancelled);
    }

    let size = scene.size();
    if size.is_degenerate() {
        return Err(WorkerFault::generic("scene has no extent"));
    }

    let spec = RasterSpec::compute(size, params);
    if spec.width == 0 || spec.height == 0 {
        return Err(WorkerFault::generic(format!(
            "raster target {}x{} is empty",
            spec.width, spec.height
        )));
    }

    let mut bitmap = Bitmap::filled(spec.width, spec.height, params.page_color);
    for tile in bitmap.tiles(params.tile_height) {
        if token.is_cancelled() {
            return Ok(Outcome::Cancelled);
        }
        scene.render_tile(&tile, spec.density, bitmap.tile_mut(&tile))?;
    }

    // A cancel that raced the last tile still wins
    if token.is_cancelled() {
        return Ok(Outcome::Cancelled);
    }
    Ok(Outcome::Done(bitmap))
}

/// Handle to the worker thread; shuts it down on drop
pub struct RasterWorker {
    request_tx: Sender<RasterRequest>,
    response_rx: Receiver<RasterResponse>,
    next_request_id: u64,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl RasterWorker {
    /// Spawn the worker thread
    pub fn spawn() -> std::io::Result<Self> {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let thread = std::thread::Builder::new()
            .name("raster-worker".to_string())
            .spawn(move || raster_worker(request_rx, response_tx))?;

        Ok(Self {
            request_tx,
            response_rx,
            next_request_id: 1,
            thread: Some(thread),
        })
    }

    /// Queue a render; the caller keeps the token
    pub fn submit(
        &mut self,
        key: super::cache::CacheKey,
        scene: Arc<dyn RasterScene>,
        params: RasterParams,
        token: CancellationToken,
    ) -> Result<RequestId, WorkerFault> {
        let id = self.next_id();
        self.request_tx
            .send(RasterRequest::Render {
                id,
                key,
                scene,
                params,
                token: token.clone(),
            })
            .map_err(|_| {
                // Nobody will ever finish it
                token.finish();
                WorkerFault::generic("raster worker has stopped")
            })?;
        Ok(id)
    }

    /// Non-blocking poll for finished renders
    pub fn poll_responses(&self) -> Vec<RasterResponse> {
        self.response_rx.try_iter().collect()
    }

    /// Stop the thread and wait for it
    pub fn shutdown(&mut self) {
        let _ = self.request_tx.send(RasterRequest::Shutdown);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RasterWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::super::cache::CacheKey;
    use super::super::error::SessionError;
    use super::super::types::{PageColor, Tile};
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct StripeScene {
        size: DocumentSize,
        tiles_drawn: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl RasterScene for StripeScene {
        fn size(&self) -> DocumentSize {
            self.size
        }

        fn render_tile(&self, _tile: &Tile, _scale: f32, out: &mut [u8]) -> Result<(), SessionError> {
            std::thread::sleep(self.delay);
            out.fill(0x10);
            self.tiles_drawn.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn params() -> RasterParams {
        RasterParams {
            scale: 1.0,
            pixel_ratio: 1.0,
            page_color: PageColor::WHITE,
            tile_height: 4,
        }
    }

    fn scene(delay: Duration) -> (Arc<dyn RasterScene>, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let scene: Arc<dyn RasterScene> = Arc::new(StripeScene {
            size: DocumentSize::new(8.0, 16.0),
            tiles_drawn: counter.clone(),
            delay,
        });
        (scene, counter)
    }

    fn recv_one(worker: &RasterWorker) -> RasterResponse {
        for _ in 0..500 {
            if let Some(response) = worker.poll_responses().into_iter().next() {
                return response;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        panic!("no response from raster worker");
    }

    #[test]
    fn spec_caps_huge_targets() {
        let spec = RasterSpec::compute(DocumentSize::new(100_000.0, 10.0), &params());
        assert!(spec.width as f32 <= MAX_RASTER_DIMENSION + 1.0);
        assert!(spec.density < 1.0);
    }

    #[test]
    fn renders_every_tile() {
        let mut worker = RasterWorker::spawn().unwrap();
        let (scene, drawn) = scene(Duration::ZERO);
        let token = CancellationToken::new();
        let key = CacheKey::from_params(1, &params());

        let id = worker.submit(key, scene, params(), token.clone()).unwrap();
        token.wait();

        match recv_one(&worker) {
            RasterResponse::Rendered { id: got, bitmap, .. } => {
                assert_eq!(got, id);
                assert_eq!((bitmap.width, bitmap.height), (8, 16));
                assert!(bitmap.pixels.iter().all(|b| *b == 0x10));
            }
            other => panic!("unexpected response {other:?}"),
        }
        assert_eq!(drawn.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn cancelled_render_commits_nothing() {
        let mut worker = RasterWorker::spawn().unwrap();
        let (scene, drawn) = scene(Duration::from_millis(20));
        let token = CancellationToken::new();
        let key = CacheKey::from_params(1, &params());

        let id = worker.submit(key, scene, params(), token.clone()).unwrap();
        token.cancel_and_wait();

        match recv_one(&worker) {
            RasterResponse::Cancelled(got) => assert_eq!(got, id),
            other => panic!("unexpected response {other:?}"),
        }
        assert!(drawn.load(Ordering::SeqCst) < 4);
    }

    #[test]
    fn submit_after_shutdown_fails_and_finishes_token() {
        let mut worker = RasterWorker::spawn().unwrap();
        worker.shutdown();

        let (scene, _) = scene(Duration::ZERO);
        let token = CancellationToken::new();
        let result = worker.submit(CacheKey::from_params(1, &params()), scene, params(), token.clone());
        assert!(result.is_err());
        assert!(token.is_finished());
    }
}

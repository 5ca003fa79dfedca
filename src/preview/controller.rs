//! Document controller
//!
//! Owns the render session, the patch queue, the active surface and the
//! scale/zoom state. The host calls [`DocumentController::on_animation_frame`]
//! once per frame; each frame applies at most one patch and redraws.

use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use super::error::PreviewError;
use super::geometry::{ContainerState, ScaleState, Topology, compute_scale};
use super::host::{EventDisposition, HostElement, HostEvent, ListenerId, ListenerKind, WheelEvent};
use super::options::PreviewOptions;
use super::patch::{Enqueued, Patch, PatchKind, PatchQueue};
use super::session::RenderSession;
use super::surface::{self, RedrawContext, RenderSurface};
use super::types::{CursorPosition, PageColor, RenderMode};
use super::zoom::{Zoom, ZoomStep, compensate_scroll};

/// Upper bound on frames `drain` will run before giving up
const MAX_DRAIN_FRAMES: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// Queue empty, no outstanding raster render
    Idle,
    /// Draining the queue or waiting for the surface
    Rendering,
}

/// Counters describing what the controller has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub patches_applied: u64,
    pub redraws: u64,
    pub skipped_redraws: u64,
    pub failed_cycles: u64,
    pub last_redraw: Option<Duration>,
}

/// Live preview bound to one host element and one render session
pub struct DocumentController {
    host: Box<dyn HostElement>,
    session: Option<Box<dyn RenderSession>>,
    surface: Box<dyn RenderSurface>,
    queue: PatchQueue,
    state: ControllerState,
    topology: Topology,
    zoom: Zoom,
    scale: ScaleState,
    /// Geometry captured for the cycle currently being drawn
    container: ContainerState,
    page_color: PageColor,
    cursor: Option<CursorPosition>,
    partial_page: Option<usize>,
    revision: u64,
    listeners: Vec<ListenerId>,
    /// Context of the last successful redraw, replayed into `after_redraw`
    last_ctx: Option<RedrawContext>,
    last_error: Option<PreviewError>,
    stats: RenderStats,
    disposed: bool,
}

impl DocumentController {
    /// Bind a session to a host element.
    ///
    /// Fails without side effects when the render mode is unsupported.
    pub fn attach(
        mut host: Box<dyn HostElement>,
        session: Box<dyn RenderSession>,
        options: PreviewOptions,
    ) -> Result<Self, PreviewError> {
        let surface = surface::create(options.initial_render_mode, &options, host.as_ref())?;

        let listeners = vec![
            host.add_listener(ListenerKind::Wheel),
            host.add_listener(ListenerKind::Resize),
        ];

        info!(
            "Attached {} preview ({} topology)",
            surface.mode(),
            options.topology.as_str()
        );

        Ok(Self {
            host,
            session: Some(session),
            surface,
            queue: PatchQueue::new(options.default_debounce),
            state: ControllerState::Idle,
            topology: options.topology,
            zoom: Zoom::default(),
            scale: ScaleState::not_ready(1.0),
            container: ContainerState::default(),
            page_color: options.page_color,
            cursor: None,
            partial_page: None,
            revision: 0,
            listeners,
            last_ctx: None,
            last_error: None,
            stats: RenderStats::default(),
            disposed: false,
        })
    }

    /// Queue a patch for the driving loop
    pub fn submit_patch(&mut self, patch: Patch, now: Instant) {
        if self.disposed {
            warn!("Ignoring {} patch after dispose", patch.kind.as_str());
            return;
        }

        let in_flight = self.state == ControllerState::Rendering;
        match self.queue.enqueue(patch, now, in_flight) {
            Enqueued::Deferred(due) => {
                debug!("viewport change deferred by {:?}", due.saturating_duration_since(now));
            }
            Enqueued::Queued | Enqueued::Reset => {}
        }

        if self.state == ControllerState::Idle && !self.queue.is_empty() {
            self.state = ControllerState::Rendering;
        }
    }

    /// One iteration of the driving loop
    pub fn on_animation_frame(&mut self, now: Instant) {
        if self.disposed {
            return;
        }

        if self.queue.fire_due(now) && self.state == ControllerState::Idle {
            self.state = ControllerState::Rendering;
        }
        if self.state == ControllerState::Idle {
            return;
        }

        if let Err(e) = self.step() {
            self.fail_cycle(e);
        }
    }

    /// Run frames until the queue is empty and the surface is done.
    ///
    /// Meant for hosts without a frame clock. A deferred viewport change
    /// that is not yet due is left in its slot.
    pub fn drain(&mut self, now: Instant) {
        for _ in 0..MAX_DRAIN_FRAMES {
            self.on_animation_frame(now);
            if self.state == ControllerState::Idle || self.disposed {
                return;
            }
            if self.queue.is_empty() {
                // Only background raster work left
                std::thread::sleep(Duration::from_millis(1));
            }
        }
        warn!("drain gave up after {MAX_DRAIN_FRAMES} frames");
    }

    fn step(&mut self) -> Result<(), PreviewError> {
        if let Some(patch) = self.queue.pop_front() {
            self.apply(&patch)?;
            self.redraw()?;
        }

        if !self.queue.is_empty() {
            return Ok(());
        }

        if self.surface.poll()? {
            return Ok(());
        }

        self.finish_cycle();
        Ok(())
    }

    fn apply(&mut self, patch: &Patch) -> Result<(), PreviewError> {
        let session = self.session.as_mut().ok_or(PreviewError::Disposed)?;
        let kind = patch.kind.as_str();
        let apply_err = |source| PreviewError::Apply { kind, source };

        match patch.kind {
            PatchKind::FullSnapshot => {
                session.reset();
                self.revision += 1;
                session.merge(&patch.payload).map_err(apply_err)?;
            }
            PatchKind::IncrementalDiff => {
                self.revision += 1;
                session.merge(&patch.payload).map_err(apply_err)?;
            }
            PatchKind::ViewportChanged => {}
        }

        if patch.kind != PatchKind::ViewportChanged {
            self.revalidate_pages();
        }
        self.stats.patches_applied += 1;
        Ok(())
    }

    /// Drop cursor and partial page when the document no longer has that page
    fn revalidate_pages(&mut self) {
        let page_count = self.page_count();
        if self.cursor.is_some_and(|c| c.page >= page_count) {
            debug!("cursor page out of range after merge, clearing");
            self.cursor = None;
        }
        if self.partial_page.is_some_and(|p| p >= page_count) {
            debug!("partial page out of range after merge, showing all pages");
            self.partial_page = None;
        }
    }

    fn redraw(&mut self) -> Result<(), PreviewError> {
        let session = self.session.as_deref().ok_or(PreviewError::Disposed)?;

        // Geometry is read once per cycle, never lazily mid-draw
        self.container = self.host.container_state();
        let doc_size = session.document_size();
        self.scale = compute_scale(&self.container, doc_size, self.topology, self.zoom.ratio());

        let (Some(doc_size), true) = (doc_size, self.scale.is_ready()) else {
            debug!(
                "skipping redraw: container {}x{}, document {:?}",
                self.container.width, self.container.height, doc_size
            );
            self.stats.skipped_redraws += 1;
            return Ok(());
        };

        let ctx = RedrawContext {
            container: self.container,
            scale: self.scale,
            doc_size,
            page_color: self.page_color,
            cursor: self.cursor,
            partial_page: self.partial_page,
            revision: self.revision,
            page_count: session.page_count(),
        };

        let started = Instant::now();
        self.surface.resize_to_fit(self.host.as_mut(), &ctx);
        self.surface.redraw(session, self.host.as_mut(), &ctx)?;
        let elapsed = started.elapsed();

        self.queue.record_redraw(elapsed);
        self.stats.redraws += 1;
        self.stats.last_redraw = Some(elapsed);
        self.last_ctx = Some(ctx);
        Ok(())
    }

    fn finish_cycle(&mut self) {
        if let Some(ctx) = self.last_ctx.take() {
            self.surface.after_redraw(self.host.as_mut(), &ctx);
            if self.topology == Topology::Paginated {
                self.host.set_page_indicator(ctx.page_count);
            }
        }
        self.state = ControllerState::Idle;
    }

    fn fail_cycle(&mut self, e: PreviewError) {
        let dropped = self.queue.discard();
        self.surface.abort();
        // A rejected snapshot leaves the session reset
        self.revalidate_pages();
        error!("Render cycle failed ({dropped} queued patch(es) dropped): {e}");
        self.stats.failed_cycles += 1;
        self.last_ctx = None;
        self.last_error = Some(e);
        self.state = ControllerState::Idle;
    }

    /// Route an event from one of the listeners registered in `attach`
    pub fn handle_event(&mut self, event: HostEvent, now: Instant) -> EventDisposition {
        if self.disposed {
            return EventDisposition::Ignored;
        }
        match event {
            HostEvent::Wheel(wheel) => self.on_wheel(wheel, now),
            HostEvent::Resize => {
                self.submit_patch(Patch::viewport_changed(), now);
                EventDisposition::Ignored
            }
        }
    }

    fn on_wheel(&mut self, event: WheelEvent, now: Instant) -> EventDisposition {
        if !(event.modifiers.ctrl || event.modifiers.meta) {
            return EventDisposition::Ignored;
        }
        let Some(direction) = ZoomStep::from_wheel_delta(event.delta_y) else {
            return EventDisposition::Consumed;
        };
        let Some(prev) = self.zoom.step(direction) else {
            // Already at the end of the ladder; still swallow native zoom
            return EventDisposition::Consumed;
        };

        let origin = self.host.container_state().origin;
        let anchor = (
            event.client_x - f64::from(origin.0),
            event.client_y - f64::from(origin.1),
        );
        let (x, y) = compensate_scroll(
            self.host.scroll_position(),
            anchor,
            prev,
            self.zoom.ratio(),
        );
        self.host.set_scroll_position(x, y);

        debug!("zoom {prev} -> {}", self.zoom.ratio());
        self.submit_patch(Patch::viewport_changed(), now);
        EventDisposition::Consumed
    }

    /// Change the page background and redraw
    pub fn set_page_color(&mut self, color: PageColor, now: Instant) {
        if self.page_color != color {
            self.page_color = color;
            self.submit_patch(Patch::viewport_changed(), now);
        }
    }

    /// Set the user zoom ratio (snapped to the ladder) and redraw
    pub fn set_zoom_ratio(&mut self, ratio: f32, now: Instant) {
        let prev = self.zoom.ratio();
        self.zoom.set(ratio);
        if (self.zoom.ratio() - prev).abs() > f32::EPSILON {
            self.submit_patch(Patch::viewport_changed(), now);
        }
    }

    /// Move the highlighted cursor. Returns false when the page is out of range.
    pub fn set_cursor(&mut self, page: usize, x: f32, y: f32) -> bool {
        if self.disposed || page >= self.page_count() {
            return false;
        }
        let cursor = CursorPosition { page, x, y };
        self.cursor = Some(cursor);
        // Shown right away; the next redraw re-applies it
        if self.state == ControllerState::Idle {
            self.host.show_cursor(self.cursor);
        }
        true
    }

    pub fn clear_cursor(&mut self) {
        self.cursor = None;
        if !self.disposed {
            self.host.show_cursor(None);
        }
    }

    /// Restrict rendering to one page (1-based).
    ///
    /// Returns false and leaves state untouched when `page_number` is not in
    /// `[1, page_count]`.
    pub fn set_partial_page(&mut self, page_number: usize, now: Instant) -> bool {
        if self.disposed || page_number == 0 || page_number > self.page_count() {
            return false;
        }
        let page = Some(page_number - 1);
        if self.partial_page != page {
            self.partial_page = page;
            self.submit_patch(Patch::viewport_changed(), now);
        }
        true
    }

    /// Render all pages again
    pub fn clear_partial_page(&mut self, now: Instant) {
        if self.partial_page.take().is_some() {
            self.submit_patch(Patch::viewport_changed(), now);
        }
    }

    /// Tear down listeners, stop the surface and drop the session.
    ///
    /// Runs once; later calls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;

        for id in self.listeners.drain(..) {
            self.host.remove_listener(id);
        }
        self.surface.release();
        self.queue.clear_all();
        self.session = None;
        self.last_ctx = None;
        self.state = ControllerState::Idle;
        info!("Disposed preview after {} redraw(s)", self.stats.redraws);
    }

    #[must_use]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Whether the host should schedule another animation frame
    #[must_use]
    pub fn needs_frame(&self) -> bool {
        !self.disposed && (self.state == ControllerState::Rendering || !self.queue.is_idle())
    }

    #[must_use]
    pub fn scale(&self) -> ScaleState {
        self.scale
    }

    #[must_use]
    pub fn zoom_ratio(&self) -> f32 {
        self.zoom.ratio()
    }

    #[must_use]
    pub fn render_mode(&self) -> RenderMode {
        self.surface.mode()
    }

    #[must_use]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.page_count())
    }

    #[must_use]
    pub fn page_color(&self) -> PageColor {
        self.page_color
    }

    #[must_use]
    pub fn cursor(&self) -> Option<CursorPosition> {
        self.cursor
    }

    #[must_use]
    pub fn partial_page(&self) -> Option<usize> {
        self.partial_page
    }

    #[must_use]
    pub fn queue(&self) -> &PatchQueue {
        &self.queue
    }

    #[must_use]
    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&PreviewError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    #[must_use]
    pub fn host(&self) -> &dyn HostElement {
        self.host.as_ref()
    }
}

impl Drop for DocumentController {
    fn drop(&mut self) {
        self.dispose();
    }
}

//! Headless replay of recorded preview traces
//!
//! A trace is a YAML file listing the patches and viewport events a live
//! preview received. Replaying it against a [`DocumentController`] with an
//! in-memory host reproduces the drain/redraw behavior without a browser.

use std::cell::RefCell;
use std::fmt::Write as _;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::preview::{
    Bitmap, ContainerState, CursorPosition, DocumentController, DocumentSize, HostElement,
    HostEvent, ListenerId, ListenerKind, Modifiers, PageColor, Patch, PreviewOptions, RasterScene,
    RenderMode, RenderSession, RenderStats, SessionError, Tile, VectorParams, WheelEvent,
};

/// Gap between stacked pages, in points
const PAGE_GAP: f32 = 8.0;
/// Frames run after the last step before giving up on reaching idle
const MAX_SETTLE_FRAMES: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub width: f32,
    pub height: f32,
}

/// One recorded event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    /// Full document, base64 payload
    Snapshot(String),
    /// Incremental diff, base64 payload
    Diff(String),
    Resize(Extent),
    Wheel {
        delta_y: f64,
        x: f64,
        y: f64,
        #[serde(default = "default_true")]
        ctrl: bool,
    },
    Zoom(f32),
    PageColor(String),
    Cursor {
        page: usize,
        x: f32,
        y: f32,
    },
    PartialPage(usize),
    WaitMs(u64),
}

fn default_true() -> bool {
    true
}

fn default_frame_ms() -> u64 {
    16
}

/// A recorded preview session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Size of one page in points
    pub page: Extent,
    pub pages: usize,
    pub container: Extent,
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub steps: Vec<Step>,
}

impl Trace {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("parsing trace")
    }
}

/// What the headless host ended up showing
#[derive(Debug, Default)]
pub struct HeadlessOutput {
    pub container: ContainerState,
    pub scroll: (f64, f64),
    pub transform: f32,
    pub markup: Option<String>,
    pub buffer_size: (u32, u32),
    pub bitmap: Option<Bitmap>,
    pub cursor: Option<CursorPosition>,
    pub page_indicator: Option<usize>,
    pub listeners: Vec<ListenerId>,
    next_listener: u64,
}

/// In-memory host element
pub struct HeadlessHost {
    output: Rc<RefCell<HeadlessOutput>>,
}

impl HeadlessHost {
    pub fn new(container: ContainerState) -> (Self, Rc<RefCell<HeadlessOutput>>) {
        let output = Rc::new(RefCell::new(HeadlessOutput {
            container,
            transform: 1.0,
            ..HeadlessOutput::default()
        }));
        (
            Self {
                output: output.clone(),
            },
            output,
        )
    }
}

impl HostElement for HeadlessHost {
    fn container_state(&self) -> ContainerState {
        self.output.borrow().container
    }

    fn scroll_position(&self) -> (f64, f64) {
        self.output.borrow().scroll
    }

    fn set_scroll_position(&mut self, x: f64, y: f64) {
        self.output.borrow_mut().scroll = (x, y);
    }

    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId {
        let mut output = self.output.borrow_mut();
        output.next_listener += 1;
        let id = ListenerId(output.next_listener);
        output.listeners.push(id);
        debug!("listener {kind:?} registered as {}", id.0);
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.output.borrow_mut().listeners.retain(|l| *l != id);
    }

    fn replace_markup(&mut self, markup: String) {
        self.output.borrow_mut().markup = Some(markup);
    }

    fn set_transform(&mut self, scale: f32) {
        self.output.borrow_mut().transform = scale;
    }

    fn resize_pixel_buffer(&mut self, width: u32, height: u32) {
        self.output.borrow_mut().buffer_size = (width, height);
    }

    fn blit(&mut self, bitmap: &Bitmap) {
        self.output.borrow_mut().bitmap = Some(bitmap.clone());
    }

    fn show_cursor(&mut self, cursor: Option<CursorPosition>) {
        self.output.borrow_mut().cursor = cursor;
    }

    fn set_page_indicator(&mut self, page_count: usize) {
        self.output.borrow_mut().page_indicator = Some(page_count);
    }
}

/// Session stand-in: payloads are opaque and only counted.
///
/// Pages of a fixed size are stacked vertically once anything has been
/// merged. An empty payload is rejected as malformed.
pub struct TraceSession {
    page: DocumentSize,
    pages: usize,
    revision: u64,
    bytes_merged: usize,
}

impl TraceSession {
    #[must_use]
    pub fn new(page: DocumentSize, pages: usize) -> Self {
        Self {
            page,
            pages,
            revision: 0,
            bytes_merged: 0,
        }
    }

    fn stacked_size(&self, pages: usize) -> DocumentSize {
        let n = pages.max(1) as f32;
        DocumentSize::new(self.page.width, self.page.height * n + PAGE_GAP * (n - 1.0))
    }
}

impl RenderSession for TraceSession {
    fn merge(&mut self, payload: &[u8]) -> Result<(), SessionError> {
        if payload.is_empty() {
            return Err(SessionError::Malformed("empty payload".to_string()));
        }
        self.revision += 1;
        self.bytes_merged += payload.len();
        Ok(())
    }

    fn reset(&mut self) {
        self.revision = 0;
        self.bytes_merged = 0;
    }

    fn page_count(&self) -> usize {
        if self.revision == 0 { 0 } else { self.pages }
    }

    fn document_size(&self) -> Option<DocumentSize> {
        (self.revision > 0).then(|| self.stacked_size(self.pages))
    }

    fn render_vector(&self, params: &VectorParams) -> Result<String, SessionError> {
        if self.revision == 0 {
            return Err(SessionError::Empty);
        }

        let pages: Vec<usize> = match params.partial_page {
            Some(page) => vec![page],
            None => (0..self.pages).collect(),
        };
        let size = self.stacked_size(pages.len());

        let mut svg = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{}\" height=\"{}\" data-revision=\"{}\">",
            size.width, size.height, self.revision
        );
        for (slot, page) in pages.iter().enumerate() {
            let y = slot as f32 * (self.page.height + PAGE_GAP);
            let _ = write!(
                svg,
                "<rect data-page=\"{page}\" y=\"{y}\" width=\"{}\" height=\"{}\" fill=\"{}\"/>",
                self.page.width, self.page.height, params.page_color
            );
            if params.source_mapping {
                let _ = write!(svg, "<g data-span=\"{page:x}\"/>");
            }
        }
        svg.push_str("</svg>");
        Ok(svg)
    }

    fn raster_scene(&self) -> Result<Arc<dyn RasterScene>, SessionError> {
        if self.revision == 0 {
            return Err(SessionError::Empty);
        }
        Ok(Arc::new(TraceScene {
            page: self.page,
            size: self.stacked_size(self.pages),
        }))
    }
}

/// Draws the gaps between pages; page bodies keep the page color
struct TraceScene {
    page: DocumentSize,
    size: DocumentSize,
}

impl RasterScene for TraceScene {
    fn size(&self) -> DocumentSize {
        self.size
    }

    fn render_tile(&self, tile: &Tile, scale: f32, out: &mut [u8]) -> Result<(), SessionError> {
        let stride = tile.width as usize * 4;
        let pitch = (self.page.height + PAGE_GAP) * scale;
        for (row, pixels) in out.chunks_exact_mut(stride).enumerate() {
            let y = (tile.y as usize + row) as f32;
            if y % pitch >= self.page.height * scale {
                for px in pixels.chunks_exact_mut(4) {
                    px.copy_from_slice(&[0x80, 0x80, 0x80, 0xFF]);
                }
            }
        }
        Ok(())
    }
}

/// Outcome of a replay
#[derive(Debug)]
pub struct ReplayReport {
    pub mode: RenderMode,
    pub stats: RenderStats,
    pub zoom_ratio: f32,
    pub effective_scale: f32,
    pub idle: bool,
    pub last_error: Option<String>,
    pub markup: Option<String>,
    pub bitmap: Option<Bitmap>,
}

fn decode(payload: &str) -> Result<Vec<u8>> {
    STANDARD
        .decode(payload.trim())
        .context("decoding base64 payload")
}

/// Replay `trace` against a fresh controller
pub fn run_trace(trace: &Trace, options: PreviewOptions) -> Result<ReplayReport> {
    let container = ContainerState::new(trace.container.width, trace.container.height);
    let (host, output) = HeadlessHost::new(container);
    let session = TraceSession::new(
        DocumentSize::new(trace.page.width, trace.page.height),
        trace.pages,
    );

    let mut controller = DocumentController::attach(Box::new(host), Box::new(session), options)
        .context("attaching preview")?;
    info!(
        "Replaying {} step(s) in {} mode",
        trace.steps.len(),
        controller.render_mode()
    );

    let frame = Duration::from_millis(trace.frame_ms.max(1));
    let mut now = Instant::now();

    for (index, step) in trace.steps.iter().enumerate() {
        debug!("step {index}: {step:?}");
        match step {
            Step::Snapshot(payload) => controller.submit_patch(Patch::full_snapshot(decode(payload)?), now),
            Step::Diff(payload) => controller.submit_patch(Patch::diff(decode(payload)?), now),
            Step::Resize(extent) => {
                output.borrow_mut().container = ContainerState::new(extent.width, extent.height);
                controller.handle_event(HostEvent::Resize, now);
            }
            Step::Wheel { delta_y, x, y, ctrl } => {
                let event = WheelEvent {
                    delta_y: *delta_y,
                    client_x: *x,
                    client_y: *y,
                    modifiers: Modifiers {
                        ctrl: *ctrl,
                        ..Modifiers::default()
                    },
                };
                controller.handle_event(HostEvent::Wheel(event), now);
            }
            Step::Zoom(ratio) => controller.set_zoom_ratio(*ratio, now),
            Step::PageColor(raw) => {
                let color: PageColor = raw
                    .parse()
                    .map_err(|e: String| anyhow::anyhow!("step {index}: {e}"))?;
                controller.set_page_color(color, now);
            }
            Step::Cursor { page, x, y } => {
                if !controller.set_cursor(*page, *x, *y) {
                    info!("step {index}: cursor page {page} out of range");
                }
            }
            Step::PartialPage(page) => {
                if !controller.set_partial_page(*page, now) {
                    info!("step {index}: partial page {page} out of range");
                }
            }
            Step::WaitMs(ms) => {
                let until = now + Duration::from_millis(*ms);
                while now < until {
                    now += frame;
                    controller.on_animation_frame(now);
                }
                continue;
            }
        }

        now += frame;
        controller.on_animation_frame(now);
    }

    // Let deferred viewport changes and raster work settle
    for _ in 0..MAX_SETTLE_FRAMES {
        if !controller.needs_frame() {
            break;
        }
        now += frame;
        controller.on_animation_frame(now);
        if controller.queue().is_empty() {
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    let report = ReplayReport {
        mode: controller.render_mode(),
        stats: controller.stats(),
        zoom_ratio: controller.zoom_ratio(),
        effective_scale: controller.scale().effective(),
        idle: !controller.needs_frame(),
        last_error: controller.last_error().map(ToString::to_string),
        markup: output.borrow().markup.clone(),
        bitmap: output.borrow().bitmap.clone(),
    };
    controller.dispose();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRACE: &str = r##"
page: { width: 200, height: 100 }
pages: 2
container: { width: 100, height: 300 }
steps:
  - snapshot: "AAEC"
  - diff: "AwQ="
  - page_color: "#242424"
  - wheel: { delta_y: -120, x: 10, y: 10 }
  - wait_ms: 300
"##;

    #[test]
    fn parses_trace() {
        let trace = Trace::from_yaml(TRACE).unwrap();
        assert_eq!(trace.pages, 2);
        assert_eq!(trace.frame_ms, 16);
        assert_eq!(trace.steps.len(), 5);
        assert_eq!(trace.steps[0], Step::Snapshot("AAEC".to_string()));
        assert!(matches!(trace.steps[3], Step::Wheel { ctrl: true, .. }));
    }

    #[test]
    fn vector_replay_reaches_idle() {
        let trace = Trace::from_yaml(TRACE).unwrap();
        let report = run_trace(&trace, PreviewOptions::default()).unwrap();

        assert!(report.idle);
        assert!(report.last_error.is_none());
        assert_eq!(report.zoom_ratio, 1.1);
        // 100 / 200 fit width, times one zoom step
        assert!((report.effective_scale - 0.55).abs() < 1e-6);
        let markup = report.markup.unwrap();
        assert!(markup.contains("fill=\"#242424\""));
        assert!(markup.contains("data-revision=\"2\""));
    }

    #[test]
    fn raster_replay_blits_bitmap() {
        let trace = Trace::from_yaml(TRACE).unwrap();
        let options = PreviewOptions::default().with_render_mode(RenderMode::Raster);
        let report = run_trace(&trace, options).unwrap();

        assert!(report.idle);
        let bitmap = report.bitmap.expect("raster output");
        // 200pt wide page at 0.55
        assert_eq!(bitmap.width, 110);
        assert_eq!(&bitmap.pixels[0..4], &[0x24, 0x24, 0x24, 0xFF]);
    }

    #[test]
    fn empty_diff_is_reported_not_fatal() {
        let trace = Trace {
            page: Extent {
                width: 100.0,
                height: 100.0,
            },
            pages: 1,
            container: Extent {
                width: 100.0,
                height: 100.0,
            },
            frame_ms: 16,
            steps: vec![Step::Snapshot("AA==".to_string()), Step::Diff(String::new())],
        };
        let report = run_trace(&trace, PreviewOptions::default()).unwrap();
        assert_eq!(report.stats.failed_cycles, 1);
        assert!(report.last_error.unwrap().contains("malformed"));
    }

    #[test]
    fn bad_base64_is_an_error() {
        let mut trace = Trace::from_yaml(TRACE).unwrap();
        trace.steps = vec![Step::Snapshot("not base64!".to_string())];
        assert!(run_trace(&trace, PreviewOptions::default()).is_err());
    }
}

//! Hosting element abstraction
//!
//! The host is whatever actually shows the preview: a DOM node behind a
//! wasm binding, a native widget, or a headless buffer in tests. It supplies
//! container geometry on demand and receives markup or pixels.

use super::geometry::ContainerState;
use super::types::{Bitmap, CursorPosition, RenderMode};

/// Opaque handle returned by [`HostElement::add_listener`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

/// Events the controller subscribes to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    Wheel,
    Resize,
}

/// Modifier keys held during an input event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
    pub shift: bool,
}

/// Wheel / trackpad scroll event
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    /// Vertical scroll amount in pixels (positive = down)
    pub delta_y: f64,
    /// Pointer position in client coordinates
    pub client_x: f64,
    pub client_y: f64,
    pub modifiers: Modifiers,
}

/// Events delivered by the host to the listeners registered in `attach`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostEvent {
    Wheel(WheelEvent),
    Resize,
}

impl HostEvent {
    #[must_use]
    pub fn kind(&self) -> ListenerKind {
        match self {
            HostEvent::Wheel(_) => ListenerKind::Wheel,
            HostEvent::Resize => ListenerKind::Resize,
        }
    }
}

/// What the host should do with the native default of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventDisposition {
    /// Event handled; suppress the native behavior (e.g. page zoom)
    Consumed,
    /// Let the host handle it normally
    Ignored,
}

/// The element a preview is attached to
pub trait HostElement {
    /// Current on-screen geometry of the container
    fn container_state(&self) -> ContainerState;

    fn scroll_position(&self) -> (f64, f64);

    fn set_scroll_position(&mut self, x: f64, y: f64);

    /// Whether this host can present the given mode
    fn supports(&self, _mode: RenderMode) -> bool {
        true
    }

    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId;

    fn remove_listener(&mut self, id: ListenerId);

    /// Replace the hosted vector markup
    fn replace_markup(&mut self, markup: String);

    /// Scale applied to the hosted content (CSS-level transform)
    fn set_transform(&mut self, scale: f32);

    /// Resize the backing pixel buffer
    fn resize_pixel_buffer(&mut self, width: u32, height: u32);

    /// Copy a finished bitmap into the pixel buffer
    fn blit(&mut self, bitmap: &Bitmap);

    /// Re-attach jump-to-source regions after the markup was replaced
    fn install_source_hooks(&mut self) {}

    fn show_cursor(&mut self, _cursor: Option<CursorPosition>) {}

    /// Refresh the page-count indicator (paginated topology)
    fn set_page_indicator(&mut self, _page_count: usize) {}
}

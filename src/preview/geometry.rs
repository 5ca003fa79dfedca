//! Scale and geometry math
//!
//! Relates the logical document size reported by the render session to the
//! physical size of the hosting container. All functions here are pure.

use serde::{Deserialize, Serialize};

/// How the document is presented inside the container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// One continuous scrolling surface, fit to width
    #[default]
    Continuous,
    /// Discrete fixed-aspect pages (slides), fit to width and height
    Paginated,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Topology::Continuous => "Continuous",
            Topology::Paginated => "Paginated",
        }
    }
}

/// Logical size of the rendered document in points
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DocumentSize {
    pub width: f32,
    pub height: f32,
}

impl DocumentSize {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// A size is degenerate when either side is zero, negative or not finite
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }
}

/// Snapshot of the hosting element's on-screen geometry.
///
/// Captured once at the start of every redraw cycle.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ContainerState {
    pub width: f32,
    pub height: f32,
    /// Top-left corner of the bounding rect in client coordinates
    pub origin: (f32, f32),
}

impl ContainerState {
    #[must_use]
    pub const fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            origin: (0.0, 0.0),
        }
    }

    #[must_use]
    pub const fn with_origin(mut self, x: f32, y: f32) -> Self {
        self.origin = (x, y);
        self
    }

    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite() && self.width > 0.0 && self.height > 0.0)
    }
}

/// Fit scale plus the user-controlled zoom ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleState {
    /// Document-to-container fit ratio; `0.0` means "not ready"
    pub real_scale: f32,
    /// User zoom ratio (1.0 = fit)
    pub zoom_ratio: f32,
}

impl ScaleState {
    /// Sentinel for "nothing to draw yet"
    #[must_use]
    pub const fn not_ready(zoom_ratio: f32) -> Self {
        Self {
            real_scale: 0.0,
            zoom_ratio,
        }
    }

    /// Scale actually applied to the surface
    #[must_use]
    pub fn effective(&self) -> f32 {
        self.real_scale * self.zoom_ratio
    }

    /// Returns false when the redraw should be skipped
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.effective() > 0.0 && self.effective().is_finite()
    }
}

/// Compute the scale for a document inside a container.
///
/// `Continuous` fits width only, `Paginated` fits both sides. Returns the
/// zero sentinel when the document size is unknown or either size is
/// degenerate.
#[must_use]
pub fn compute_scale(
    container: &ContainerState,
    doc: Option<DocumentSize>,
    topology: Topology,
    zoom_ratio: f32,
) -> ScaleState {
    let Some(doc) = doc else {
        return ScaleState::not_ready(zoom_ratio);
    };
    if doc.is_degenerate() || container.is_degenerate() {
        return ScaleState::not_ready(zoom_ratio);
    }

    let width_ratio = container.width / doc.width;
    let real_scale = match topology {
        Topology::Continuous => width_ratio,
        Topology::Paginated => width_ratio.min(container.height / doc.height),
    };

    ScaleState {
        real_scale,
        zoom_ratio,
    }
}

/// Pixel dimensions of a document drawn at `scale` with `pixel_ratio`
/// device pixels per CSS pixel.
#[must_use]
pub fn pixel_extent(doc: DocumentSize, scale: f32, pixel_ratio: f32) -> (u32, u32) {
    let density = scale * pixel_ratio.max(f32::EPSILON);
    let width = (doc.width * density).ceil().max(0.0) as u32;
    let height = (doc.height * density).ceil().max(0.0) as u32;
    (width, height)
}

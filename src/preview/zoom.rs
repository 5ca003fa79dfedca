//! Zoom state for the preview
//!
//! The user zoom ratio moves along a fixed ladder of factors (the same steps
//! pdf viewers use), and scroll position is compensated on every step so the
//! point under the cursor stays put.

/// Direction of a single zoom step
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ZoomStep {
    Enlarge,
    Reduce,
}

impl ZoomStep {
    /// Wheel up (negative delta) enlarges, wheel down reduces
    #[must_use]
    pub fn from_wheel_delta(delta_y: f64) -> Option<Self> {
        if delta_y < 0.0 {
            Some(Self::Enlarge)
        } else if delta_y > 0.0 {
            Some(Self::Reduce)
        } else {
            None
        }
    }
}

/// Zoom ratio constrained to the factor ladder
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zoom {
    /// Current zoom ratio (1.0 = fit)
    pub ratio: f32,
}

impl Default for Zoom {
    fn default() -> Self {
        Self { ratio: 1.0 }
    }
}

impl Zoom {
    /// Discrete zoom factors, ascending
    pub const FACTORS: [f32; 31] = [
        0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 1.1, 1.3, 1.5, 1.7, 1.9, 2.1, 2.4, 2.7,
        3.0, 3.3, 3.7, 4.1, 4.6, 5.1, 5.7, 6.3, 7.0, 7.7, 8.5, 9.4, 10.0,
    ];
    /// Minimum allowed zoom ratio
    pub const MIN_RATIO: f32 = 0.1;
    /// Maximum allowed zoom ratio
    pub const MAX_RATIO: f32 = 10.0;

    const EPSILON: f32 = 1e-4;

    #[must_use]
    pub fn new(ratio: f32) -> Self {
        Self {
            ratio: Self::snap(ratio),
        }
    }

    #[must_use]
    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    /// Set the ratio to the ladder rung nearest `ratio`
    pub fn set(&mut self, ratio: f32) {
        self.ratio = Self::snap(ratio);
    }

    /// Move one rung along the ladder. Returns the previous ratio, or `None`
    /// when already at the end of the ladder.
    pub fn step(&mut self, step: ZoomStep) -> Option<f32> {
        let prev = self.ratio;
        let next = match step {
            ZoomStep::Enlarge => Self::FACTORS
                .iter()
                .copied()
                .find(|f| *f > prev + Self::EPSILON)?,
            ZoomStep::Reduce => Self::FACTORS
                .iter()
                .rev()
                .copied()
                .find(|f| *f < prev - Self::EPSILON)?,
        };
        self.ratio = next;
        Some(prev)
    }

    /// Zoom in by one rung
    pub fn step_in(&mut self) -> Option<f32> {
        self.step(ZoomStep::Enlarge)
    }

    /// Zoom out by one rung
    pub fn step_out(&mut self) -> Option<f32> {
        self.step(ZoomStep::Reduce)
    }

    /// Nearest ladder factor; ties go to the smaller one
    #[must_use]
    pub fn snap(ratio: f32) -> f32 {
        let ratio = Self::clamp_ratio(ratio);
        Self::FACTORS
            .iter()
            .copied()
            .min_by(|a, b| (a - ratio).abs().total_cmp(&(b - ratio).abs()))
            .unwrap_or(ratio)
    }

    /// Clamp ratio to the ladder range, handling NaN/Inf
    #[must_use]
    pub fn clamp_ratio(ratio: f32) -> f32 {
        if !ratio.is_finite() {
            1.0
        } else {
            ratio.clamp(Self::MIN_RATIO, Self::MAX_RATIO)
        }
    }
}

/// New scroll offset that keeps `anchor` fixed when the content is scaled
/// from `prev_ratio` to `next_ratio`.
///
/// `scroll` and `anchor` are in container pixels; `anchor` is relative to the
/// container's top-left corner.
#[must_use]
pub fn compensate_scroll(
    scroll: (f64, f64),
    anchor: (f64, f64),
    prev_ratio: f32,
    next_ratio: f32,
) -> (f64, f64) {
    if prev_ratio <= 0.0 || !prev_ratio.is_finite() || !next_ratio.is_finite() {
        return scroll;
    }
    let factor = f64::from(next_ratio) / f64::from(prev_ratio);
    let axis = |s: f64, a: f64| ((s + a) * factor - a).max(0.0);
    (axis(scroll.0, anchor.0), axis(scroll.1, anchor.1))
}

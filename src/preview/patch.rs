//! Ordered patch queue with coalescing
//!
//! Patches are applied strictly in arrival order. A full snapshot drops
//! everything queued before it, and viewport changes that arrive while a
//! render is in flight are folded into a single debounce slot.

use std::collections::VecDeque;
use std::fmt;
use std::time::{Duration, Instant};

use log::debug;

/// Debounce interval used until a redraw has been measured
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(100);

/// Kind of mutation a patch carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchKind {
    /// Replaces the whole document state
    FullSnapshot,
    /// Merges a partial change into the existing state
    IncrementalDiff,
    /// Only the framing changed (zoom, resize, color)
    ViewportChanged,
}

impl PatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchKind::FullSnapshot => "full-snapshot",
            PatchKind::IncrementalDiff => "incremental-diff",
            PatchKind::ViewportChanged => "viewport-changed",
        }
    }
}

/// One mutation of the document or its viewport
#[derive(Clone, PartialEq, Eq)]
pub struct Patch {
    pub kind: PatchKind,
    pub payload: Vec<u8>,
}

impl Patch {
    #[must_use]
    pub fn full_snapshot(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: PatchKind::FullSnapshot,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn diff(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: PatchKind::IncrementalDiff,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn viewport_changed() -> Self {
        Self {
            kind: PatchKind::ViewportChanged,
            payload: Vec::new(),
        }
    }
}

impl fmt::Debug for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patch")
            .field("kind", &self.kind)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

/// What `enqueue` did with a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    /// Appended to the tail
    Queued,
    /// Queue cleared, then appended
    Reset,
    /// Parked in the debounce slot until the given instant
    Deferred(Instant),
}

/// FIFO of pending patches plus one debounce slot
#[derive(Debug)]
pub struct PatchQueue {
    items: VecDeque<Patch>,
    /// Due time of the deferred viewport change, if any
    pending_viewport: Option<Instant>,
    /// Duration of the last redraw, used as the debounce interval
    debounce: Duration,
}

impl Default for PatchQueue {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE)
    }
}

impl PatchQueue {
    #[must_use]
    pub fn new(default_debounce: Duration) -> Self {
        Self {
            items: VecDeque::new(),
            pending_viewport: None,
            debounce: default_debounce,
        }
    }

    /// Add a patch following the coalescing rules.
    ///
    /// `render_in_flight` is whether the controller is currently drawing.
    pub fn enqueue(&mut self, patch: Patch, now: Instant, render_in_flight: bool) -> Enqueued {
        match patch.kind {
            PatchKind::FullSnapshot => {
                if !self.items.is_empty() {
                    debug!("full snapshot drops {} queued patch(es)", self.items.len());
                }
                self.items.clear();
                self.items.push_back(patch);
                Enqueued::Reset
            }
            PatchKind::ViewportChanged if render_in_flight => {
                let due = now + self.debounce;
                if self.pending_viewport.replace(due).is_some() {
                    debug!("viewport change re-armed, due in {:?}", self.debounce);
                }
                Enqueued::Deferred(due)
            }
            PatchKind::IncrementalDiff | PatchKind::ViewportChanged => {
                self.items.push_back(patch);
                Enqueued::Queued
            }
        }
    }

    /// Move a due deferred viewport change to the tail. Returns true if one
    /// was released.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.pending_viewport {
            Some(due) if due <= now => {
                self.pending_viewport = None;
                self.items.push_back(Patch::viewport_changed());
                true
            }
            _ => false,
        }
    }

    pub fn pop_front(&mut self) -> Option<Patch> {
        self.items.pop_front()
    }

    /// Drop every queued patch. The debounce slot is kept so a pending
    /// viewport change still lands.
    pub fn discard(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        dropped
    }

    /// Drop queued patches and the debounce slot
    pub fn clear_all(&mut self) {
        self.items.clear();
        self.pending_viewport = None;
    }

    /// Remember how long the last redraw took
    pub fn record_redraw(&mut self, elapsed: Duration) {
        self.debounce = elapsed;
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.debounce
    }

    #[must_use]
    pub fn pending_viewport(&self) -> Option<Instant> {
        self.pending_viewport
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Nothing queued and nothing deferred
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.items.is_empty() && self.pending_viewport.is_none()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Patch> {
        self.items.iter()
    }
}

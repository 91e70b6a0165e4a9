use std::fmt;
use std::time::{Duration, Instant};

use crate::math::Mat4;

/// Edge reported by the settle debounce.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SettleEdge {
    /// An interaction started (`is_updating` went false → true).
    Started,
    /// The quiet window elapsed with no further change (`is_updating` went true → false).
    Ended,
}

/// Debounced boolean with an explicit deadline.
///
/// Rising edges are immediate. Falling edges are delayed until `window` has
/// passed since the last raw `true → false` transition, so a burst of changes
/// separated by short gaps reads as one interaction.
#[derive(Debug, Clone)]
pub struct Settle {
    window: Duration,
    raw: bool,
    active: bool,
    deadline: Option<Instant>,
}

impl Settle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            raw: false,
            active: false,
            deadline: None,
        }
    }

    #[inline]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Debounced value.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Pending end-of-interaction deadline, if any.
    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Feeds the raw value for this tick.
    pub fn set(&mut self, value: bool, now: Instant) -> Option<SettleEdge> {
        let was_raw = self.raw;
        self.raw = value;

        if value {
            self.deadline = None;
            if !self.active {
                self.active = true;
                return Some(SettleEdge::Started);
            }
            return None;
        }

        if was_raw {
            // Replaces any pending deadline.
            self.deadline = Some(now + self.window);
        }
        None
    }

    /// Fires `Ended` once the deadline has passed and the raw value stayed false.
    pub fn poll(&mut self, now: Instant) -> Option<SettleEdge> {
        match self.deadline {
            Some(deadline) if !self.raw && now >= deadline => {
                self.deadline = None;
                if self.active {
                    self.active = false;
                    Some(SettleEdge::Ended)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

type Listener = Box<dyn FnMut()>;

/// Shared view state written by [`super::PanZoomController`].
///
/// Everything outside the controller reads it; the only public mutation is
/// listener registration.
pub struct PanZoomState {
    matrix: Mat4,
    origin_at: [f32; 3],
    settle: Settle,
    action_start: Vec<Listener>,
    action_end: Vec<Listener>,
}

impl fmt::Debug for PanZoomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanZoomState")
            .field("matrix", &self.matrix)
            .field("origin_at", &self.origin_at)
            .field("settle", &self.settle)
            .field("action_start", &self.action_start.len())
            .field("action_end", &self.action_end.len())
            .finish()
    }
}

impl PanZoomState {
    pub fn new(settle_window: Duration) -> Self {
        Self {
            matrix: Mat4::identity(),
            origin_at: [0.0, 0.0, 1.0],
            settle: Settle::new(settle_window),
            action_start: Vec::new(),
            action_end: Vec::new(),
        }
    }

    /// Current pan/zoom matrix (device pixels).
    #[inline]
    pub fn matrix(&self) -> &Mat4 {
        &self.matrix
    }

    /// `[x, y, zoom]`: where the scene origin lands on screen, and the matrix scale.
    #[inline]
    pub fn origin_at(&self) -> [f32; 3] {
        self.origin_at
    }

    /// Debounced "an interaction is in progress".
    #[inline]
    pub fn is_updating(&self) -> bool {
        self.settle.is_active()
    }

    #[inline]
    pub fn settle(&self) -> &Settle {
        &self.settle
    }

    /// Called on every `false → true` edge of [`Self::is_updating`].
    pub fn on_action_start(&mut self, f: impl FnMut() + 'static) {
        self.action_start.push(Box::new(f));
    }

    /// Called once the settle window elapses after an interaction.
    pub fn on_action_end(&mut self, f: impl FnMut() + 'static) {
        self.action_end.push(Box::new(f));
    }

    pub(crate) fn set_matrix(&mut self, matrix: Mat4) {
        self.matrix = matrix;
    }

    pub(crate) fn set_origin_at(&mut self, origin_at: [f32; 3]) {
        self.origin_at = origin_at;
    }

    pub(crate) fn set_updating(&mut self, value: bool, now: Instant) -> Option<SettleEdge> {
        let edge = self.settle.set(value, now);
        self.dispatch(edge);
        edge
    }

    pub(crate) fn poll_settle(&mut self, now: Instant) -> Option<SettleEdge> {
        let edge = self.settle.poll(now);
        self.dispatch(edge);
        edge
    }

    fn dispatch(&mut self, edge: Option<SettleEdge>) {
        let listeners = match edge {
            Some(SettleEdge::Started) => &mut self.action_start,
            Some(SettleEdge::Ended) => &mut self.action_end,
            None => return,
        };
        log::trace!("pan/zoom settle edge: {edge:?}");
        for f in listeners.iter_mut() {
            f();
        }
    }
}

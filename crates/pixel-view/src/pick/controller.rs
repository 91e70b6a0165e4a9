use std::cell::Cell;
use std::rc::Rc;

use crate::pan_zoom::PanZoomState;

use super::buffer::{PickBuffer, PickSample};

/// The hovered cell changed. `current` is `None` once the pointer is over background.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HoverChanged {
    pub previous: Option<(i32, i32)>,
    pub current: Option<(i32, i32)>,
}

/// Pointer went down over a cell.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct CellActivated {
    pub x: i32,
    pub y: i32,
}

/// Resolves pointer positions to grid cells through the last pick readback.
///
/// Readbacks are requested when a pan/zoom interaction settles (see [`Self::attach`]);
/// between readbacks the last buffer stays authoritative.
#[derive(Debug)]
pub struct PickController {
    dpr: f32,
    buffer: Option<PickBuffer>,
    hover: Option<(i32, i32)>,
    readback_requested: Rc<Cell<bool>>,
}

impl PickController {
    pub fn new(dpr: f32) -> Self {
        Self {
            dpr,
            buffer: None,
            hover: None,
            readback_requested: Rc::new(Cell::new(false)),
        }
    }

    /// Requests a readback every time `state` settles.
    pub fn attach(&mut self, state: &mut PanZoomState) {
        let flag = Rc::clone(&self.readback_requested);
        state.on_action_end(move || flag.set(true));
    }

    /// Requests a readback outside of the settle cycle (first frame, document edits).
    pub fn request_readback(&self) {
        self.readback_requested.set(true);
    }

    /// Consumes a pending request. Never fires while an interaction is running.
    pub fn take_readback_request(&self, is_updating: bool) -> bool {
        if is_updating {
            return false;
        }
        self.readback_requested.replace(false)
    }

    /// Installs a completed readback, replacing the previous one.
    pub fn set_buffer(&mut self, buffer: PickBuffer) {
        log::trace!("pick buffer {}x{} installed", buffer.width(), buffer.height());
        self.buffer = Some(buffer);
    }

    #[inline]
    pub fn has_buffer(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn set_dpr(&mut self, dpr: f32) {
        self.dpr = dpr;
    }

    /// Pointer moved to `(x, y)` in logical pixels.
    ///
    /// Over background the hover is cleared. Without a buffer or outside it the
    /// hover is left as is.
    pub fn on_pointer_move(&mut self, x: f32, y: f32) -> Option<HoverChanged> {
        let buffer = self.buffer.as_ref()?;

        let px = (x * self.dpr).floor();
        let py = (y * self.dpr).floor();
        if !(px >= 0.0 && py >= 0.0) {
            return None;
        }

        let current = match buffer.sample(px as u32, py as u32)? {
            PickSample::Cell(cx, cy) => Some((cx, cy)),
            PickSample::Background => None,
        };
        if self.hover == current {
            return None;
        }

        let previous = std::mem::replace(&mut self.hover, current);
        Some(HoverChanged { previous, current })
    }

    pub fn on_pointer_down(&self) -> Option<CellActivated> {
        self.hover.map(|(x, y)| CellActivated { x, y })
    }

    #[inline]
    pub fn hover(&self) -> Option<(i32, i32)> {
        self.hover
    }

    #[inline]
    pub fn hover_x(&self) -> Option<i32> {
        self.hover.map(|(x, _)| x)
    }

    #[inline]
    pub fn hover_y(&self) -> Option<i32> {
        self.hover.map(|(_, y)| y)
    }
}

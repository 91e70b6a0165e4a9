//! Pan/zoom transform engine.
//!
//! Input handlers only touch scalar state (pan, zoom, pointer). The matrix is
//! rebuilt once per frame in [`PanZoomController::on_frame`], which also drives
//! the settle debounce behind [`PanZoomState::is_updating`].

mod controller;
mod input;
mod state;

pub use controller::{FrameOutcome, PanZoomConfig, PanZoomController};
pub use input::{ContactInput, ContactPhase, GestureInput, GesturePhase, WheelInput};
pub use state::{PanZoomState, Settle, SettleEdge};

//! Platform-agnostic input consumed by the pan/zoom controller.
//!
//! Positions are logical (CSS-style) pixels relative to the viewport's top-left.
//! The platform layer converts its native events into these.

/// Scroll wheel / trackpad scroll.
///
/// Browser sign convention: positive `delta_y` scrolls down (away from the user).
#[derive(Debug, Copy, Clone, Default, PartialEq)]
pub struct WheelInput {
    pub delta_x: f32,
    pub delta_y: f32,
    /// Zoom instead of pan (ctrl held, or a trackpad pinch reported as wheel).
    pub zoom_modifier: bool,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum GesturePhase {
    Start,
    Change,
    End,
}

/// Native pinch/rotate gesture.
///
/// `scale` and `rotation` are cumulative since the gesture started
/// (`scale == 1.0`, `rotation == 0.0` at `Start`).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GestureInput {
    pub phase: GesturePhase,
    pub scale: f32,
    pub rotation: f32,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ContactPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// One touch contact.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ContactInput {
    pub id: u64,
    pub phase: ContactPhase,
    pub x: f32,
    pub y: f32,
}

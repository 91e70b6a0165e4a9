use std::f32::consts::PI;
use std::time::{Duration, Instant};

use crate::math::Mat4;

use super::input::{ContactInput, ContactPhase, GestureInput, GesturePhase, WheelInput};
use super::state::{PanZoomState, SettleEdge};

/// Tuning for [`PanZoomController`].
#[derive(Debug, Clone)]
pub struct PanZoomConfig {
    /// Zoom after `initialize` / `reset`.
    pub initial_zoom: f32,
    /// Lower clamp for wheel and pinch zoom.
    pub min_zoom: f32,
    /// Zoom change per wheel delta unit while the zoom modifier is held.
    pub wheel_zoom_step: f32,
    /// Pan change per wheel delta unit, multiplied by the current zoom.
    pub wheel_pan_scale: f32,
    /// Quiet time before `is_updating` falls back to false.
    pub settle_window: Duration,
}

impl Default for PanZoomConfig {
    fn default() -> Self {
        Self {
            initial_zoom: 3.0,
            min_zoom: 0.1,
            wheel_zoom_step: 0.1,
            wheel_pan_scale: 2.0,
            settle_window: Duration::from_millis(60),
        }
    }
}

/// Result of one [`PanZoomController::on_frame`] tick.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    /// The matrix changed this tick.
    pub updated: bool,
    /// Settle edge fired this tick, if any.
    pub edge: Option<SettleEdge>,
}

#[derive(Debug, Copy, Clone, Default)]
struct GestureBaseline {
    start_x: f32,
    start_y: f32,
    zoom: f32,
    rotation: f32,
}

#[derive(Debug, Copy, Clone)]
struct Contact {
    id: u64,
    x: f32,
    y: f32,
}

#[derive(Debug, Copy, Clone)]
struct Pinch {
    start_distance: f32,
    baseline_zoom: f32,
}

/// Turns wheel, gesture and touch input into the shared [`PanZoomState`].
#[derive(Debug)]
pub struct PanZoomController {
    config: PanZoomConfig,
    state: PanZoomState,
    dpr: f32,

    pan_x: f32,
    pan_y: f32,
    zoom: f32,
    zoom_sign: f32,
    rotation: f32,
    mouse_x: f32,
    mouse_y: f32,

    old_pan_x: f32,
    old_pan_y: f32,
    old_zoom: f32,

    gesture: GestureBaseline,
    contacts: Vec<Contact>,
    pinch: Option<Pinch>,

    first_frame: bool,
    listening: bool,
}

impl PanZoomController {
    pub fn new(config: PanZoomConfig) -> Self {
        let state = PanZoomState::new(config.settle_window);
        let mut c = Self {
            config,
            state,
            dpr: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            zoom: 0.0,
            zoom_sign: 1.0,
            rotation: 0.0,
            mouse_x: -1.0,
            mouse_y: -1.0,
            old_pan_x: 0.0,
            old_pan_y: 0.0,
            old_zoom: 0.0,
            gesture: GestureBaseline::default(),
            contacts: Vec::new(),
            pinch: None,
            first_frame: true,
            listening: false,
        };
        c.reset(1.0);
        c
    }

    pub fn initialize(&mut self, dpr: f32) {
        self.reset(dpr);
        log::debug!("pan/zoom initialized (dpr={dpr}, zoom={})", self.zoom);
    }

    /// Back to the initial view. Listeners and the listening flag are kept.
    pub fn reset(&mut self, dpr: f32) {
        let z = self.config.initial_zoom;

        self.dpr = dpr;
        self.pan_x = 0.0;
        self.pan_y = 0.0;
        self.zoom = z;
        self.zoom_sign = 1.0;
        self.rotation = 0.0;
        self.mouse_x = -1.0;
        self.mouse_y = -1.0;

        self.old_pan_x = 0.0;
        self.old_pan_y = 0.0;
        self.old_zoom = z;

        self.gesture = GestureBaseline::default();
        self.contacts.clear();
        self.pinch = None;

        self.state.set_matrix(Mat4::identity().scale([z, z, 1.0]));
        self.state.set_origin_at([0.0, 0.0, z]);
        self.first_frame = true;
    }

    pub fn start_event_listeners(&mut self) {
        if self.listening {
            log::warn!("pan/zoom: start_event_listeners called while already listening");
            return;
        }
        self.listening = true;
    }

    pub fn stop_event_listeners(&mut self) {
        if !self.listening {
            log::warn!("pan/zoom: stop_event_listeners called while not listening");
            return;
        }
        self.listening = false;
        self.contacts.clear();
        self.pinch = None;
    }

    #[inline]
    pub fn is_listening(&self) -> bool {
        self.listening
    }

    #[inline]
    pub fn state(&self) -> &PanZoomState {
        &self.state
    }

    /// Mutable access for listener registration.
    #[inline]
    pub fn state_mut(&mut self) -> &mut PanZoomState {
        &mut self.state
    }

    #[inline]
    pub fn config(&self) -> &PanZoomConfig {
        &self.config
    }

    #[inline]
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    #[inline]
    pub fn pan(&self) -> (f32, f32) {
        (self.pan_x, self.pan_y)
    }

    /// Accumulated gesture rotation in degrees. Tracked only; the matrix ignores it.
    #[inline]
    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    /// Last recorded zoom pivot (logical pixels).
    #[inline]
    pub fn pointer(&self) -> (f32, f32) {
        (self.mouse_x, self.mouse_y)
    }

    #[inline]
    pub fn dpr(&self) -> f32 {
        self.dpr
    }

    pub fn set_dpr(&mut self, dpr: f32) {
        self.dpr = dpr;
    }

    // ── input ─────────────────────────────────────────────────────────────

    pub fn handle_wheel(&mut self, e: WheelInput) {
        if !self.listening {
            return;
        }

        if e.zoom_modifier {
            self.zoom = (self.zoom - e.delta_y * self.config.wheel_zoom_step).max(self.config.min_zoom);
            self.zoom_sign = sign(e.delta_y);
        } else {
            let k = self.zoom * self.config.wheel_pan_scale;
            self.pan_x -= e.delta_x * k;
            self.pan_y -= e.delta_y * k;
        }

        self.mouse_x = e.x;
        self.mouse_y = e.y;
    }

    pub fn handle_gesture(&mut self, e: GestureInput) {
        if !self.listening {
            return;
        }

        match e.phase {
            GesturePhase::Start => {
                self.gesture = GestureBaseline {
                    start_x: e.x - self.pan_x,
                    start_y: e.y - self.pan_y,
                    zoom: self.zoom,
                    rotation: self.rotation,
                };
                self.mouse_x = e.x;
                self.mouse_y = e.y;
            }
            GesturePhase::Change => {
                self.rotation = self.gesture.rotation + e.rotation;
                self.zoom = self.gesture.zoom * e.scale;
                self.zoom_sign = sign(self.old_zoom - self.zoom);
                self.pan_x = e.x - self.gesture.start_x;
                self.pan_y = e.y - self.gesture.start_y;
                self.mouse_x = e.x;
                self.mouse_y = e.y;
            }
            GesturePhase::End => {}
        }
    }

    pub fn handle_contact(&mut self, e: ContactInput) {
        if !self.listening {
            return;
        }

        match e.phase {
            ContactPhase::Down => {
                if let Some(c) = self.contacts.iter_mut().find(|c| c.id == e.id) {
                    c.x = e.x;
                    c.y = e.y;
                } else {
                    self.contacts.push(Contact { id: e.id, x: e.x, y: e.y });
                }
                if self.contacts.len() == 2 {
                    self.begin_pinch();
                }
            }
            ContactPhase::Move => {
                let Some(c) = self.contacts.iter_mut().find(|c| c.id == e.id) else {
                    log::debug!("pan/zoom: move for unknown contact {}", e.id);
                    return;
                };
                c.x = e.x;
                c.y = e.y;

                if self.contacts.len() < 2 {
                    log::trace!("pan/zoom: single-contact drag ignored");
                    return;
                }
                self.update_pinch();
            }
            ContactPhase::Up | ContactPhase::Cancel => {
                let Some(idx) = self.contacts.iter().position(|c| c.id == e.id) else {
                    log::debug!("pan/zoom: release for unknown contact {}", e.id);
                    return;
                };
                self.contacts.remove(idx);
                if self.contacts.len() >= 2 {
                    self.begin_pinch();
                } else {
                    self.pinch = None;
                }
            }
        }
    }

    fn begin_pinch(&mut self) {
        let (a, b) = (self.contacts[0], self.contacts[1]);
        self.pinch = Some(Pinch {
            start_distance: (a.x - b.x).hypot(a.y - b.y),
            baseline_zoom: self.zoom,
        });
    }

    fn update_pinch(&mut self) {
        let Some(pinch) = self.pinch else {
            return;
        };
        if pinch.start_distance == 0.0 {
            return;
        }

        let (a, b) = (self.contacts[0], self.contacts[1]);
        let ratio = (a.x - b.x).hypot(a.y - b.y) / pinch.start_distance;

        self.zoom = (pinch.baseline_zoom * ratio).max(self.config.min_zoom);
        self.zoom_sign = sign(self.old_zoom - self.zoom);
        self.mouse_x = (a.x + b.x) * 0.5;
        self.mouse_y = (a.y + b.y) * 0.5;
    }

    // ── frame ─────────────────────────────────────────────────────────────

    /// Rebuilds the matrix from the scalar state and advances the settle debounce.
    pub fn on_frame(&mut self, now: Instant) -> FrameOutcome {
        let mut dirty = false;

        if self.first_frame || self.zoom != self.old_zoom {
            let px = self.mouse_x * self.dpr;
            let py = self.mouse_y * self.dpr;
            let zoom_delta = ((self.zoom - self.old_zoom).abs() * -self.zoom_sign).exp();

            let step = Mat4::identity()
                .translate([px, py, 0.0])
                .scale([zoom_delta, zoom_delta, 1.0])
                .translate([-px, -py, 0.0]);
            let matrix = step * *self.state.matrix();
            self.state.set_matrix(matrix);

            self.old_zoom = self.zoom;
            self.first_frame = false;
            dirty = true;
        }

        if self.pan_x != self.old_pan_x || self.pan_y != self.old_pan_y {
            let factor = PI / self.zoom.exp();
            let dx = (self.pan_x - self.old_pan_x) * factor;
            let dy = (self.pan_y - self.old_pan_y) * factor;

            let matrix = self.state.matrix().translate([dx, dy, 0.0]);
            self.state.set_matrix(matrix);

            self.old_pan_x = self.pan_x;
            self.old_pan_y = self.pan_y;
            dirty = true;
        }

        if dirty {
            let m = self.state.matrix();
            let p = m.transform_point([0.0, 0.0, 0.0]);
            let origin = [p[0], p[1], m.scale_x()];
            self.state.set_origin_at(origin);
        }

        let started = self.state.set_updating(dirty, now);
        let ended = self.state.poll_settle(now);

        FrameOutcome {
            updated: dirty,
            edge: started.or(ended),
        }
    }
}

/// `sign(0) == 0`, unlike `f32::signum`.
#[inline]
fn sign(v: f32) -> f32 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-4 * (1.0 + a.abs().max(b.abs()))
    }

    fn controller() -> PanZoomController {
        let mut c = PanZoomController::new(PanZoomConfig::default());
        c.initialize(1.0);
        c.start_event_listeners();
        c
    }

    fn wheel_zoom(delta_y: f32) -> WheelInput {
        WheelInput {
            delta_x: 0.0,
            delta_y,
            zoom_modifier: true,
            x: 100.0,
            y: 80.0,
        }
    }

    fn gesture(phase: GesturePhase, scale: f32, x: f32, y: f32) -> GestureInput {
        GestureInput {
            phase,
            scale,
            rotation: 0.0,
            x,
            y,
        }
    }

    fn contact(id: u64, phase: ContactPhase, x: f32, y: f32) -> ContactInput {
        ContactInput { id, phase, x, y }
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn reset_restores_initial_view() {
        let mut c = controller();
        c.handle_wheel(wheel_zoom(5.0));
        c.on_frame(Instant::now());
        c.reset(2.0);

        assert_eq!(c.zoom(), 3.0);
        assert_eq!(c.pan(), (0.0, 0.0));
        assert_eq!(c.pointer(), (-1.0, -1.0));
        assert_eq!(c.dpr(), 2.0);
        assert_eq!(*c.state().matrix(), Mat4::identity().scale([3.0, 3.0, 1.0]));
    }

    #[test]
    fn listener_toggles_are_idempotent() {
        let mut c = PanZoomController::new(PanZoomConfig::default());
        assert!(!c.is_listening());
        c.stop_event_listeners();
        assert!(!c.is_listening());

        c.start_event_listeners();
        c.start_event_listeners();
        assert!(c.is_listening());

        c.stop_event_listeners();
        c.stop_event_listeners();
        assert!(!c.is_listening());
    }

    #[test]
    fn input_is_ignored_while_not_listening() {
        let mut c = controller();
        c.stop_event_listeners();
        c.handle_wheel(wheel_zoom(5.0));
        c.handle_gesture(gesture(GesturePhase::Start, 1.0, 10.0, 10.0));
        assert_eq!(c.zoom(), 3.0);
        assert_eq!(c.pointer(), (-1.0, -1.0));
    }

    // ── frame tick ────────────────────────────────────────────────────────

    #[test]
    fn first_tick_publishes_origin() {
        let mut c = controller();
        let out = c.on_frame(Instant::now());
        assert!(out.updated);
        assert_eq!(out.edge, Some(SettleEdge::Started));
        assert_eq!(c.state().origin_at(), [0.0, 0.0, 3.0]);
    }

    #[test]
    fn idle_ticks_are_idempotent() {
        let mut c = controller();
        let t0 = Instant::now();
        c.on_frame(t0);
        let before = c.state().origin_at();

        let a = c.on_frame(t0 + Duration::from_millis(16));
        let b = c.on_frame(t0 + Duration::from_millis(32));
        assert!(!a.updated && !b.updated);
        assert_eq!(c.state().origin_at(), before);
    }

    #[test]
    fn settles_after_quiet_window() {
        let ended = Rc::new(Cell::new(0));
        let mut c = controller();
        {
            let ended = ended.clone();
            c.state_mut().on_action_end(move || ended.set(ended.get() + 1));
        }

        let t0 = Instant::now();
        c.on_frame(t0);
        assert!(c.state().is_updating());

        c.on_frame(t0 + Duration::from_millis(16));
        c.on_frame(t0 + Duration::from_millis(50));
        assert!(c.state().is_updating());

        let out = c.on_frame(t0 + Duration::from_millis(80));
        assert_eq!(out.edge, Some(SettleEdge::Ended));
        assert!(!c.state().is_updating());
        assert_eq!(ended.get(), 1);

        c.on_frame(t0 + Duration::from_millis(200));
        assert_eq!(ended.get(), 1);
    }

    // ── wheel ─────────────────────────────────────────────────────────────

    #[test]
    fn wheel_zoom_out_is_monotonic_and_clamped() {
        let mut c = controller();
        let mut t = Instant::now();
        c.on_frame(t);

        let mut last_scale = c.state().origin_at()[2];
        for _ in 0..10 {
            c.handle_wheel(wheel_zoom(10.0));
            t += Duration::from_millis(16);
            c.on_frame(t);

            assert!(c.zoom() >= 0.1);
            let scale = c.state().origin_at()[2];
            assert!(scale <= last_scale);
            last_scale = scale;
        }
        assert!(approx(c.zoom(), 0.1));
    }

    #[test]
    fn wheel_zoom_in_grows_scale_around_pivot() {
        let mut c = controller();
        let t = Instant::now();
        c.on_frame(t);

        c.handle_wheel(wheel_zoom(-5.0));
        assert_eq!(c.zoom(), 3.5);
        c.on_frame(t + Duration::from_millis(16));

        let m = c.state().matrix();
        assert!(m.scale_x() > 3.0);

        // The pivot (100, 80) is a fixed point of the zoom step.
        let scene = Mat4::identity().scale([3.0, 3.0, 1.0]).invert().unwrap().transform_point([100.0, 80.0, 0.0]);
        let screen = m.transform_point(scene);
        assert!(approx(screen[0], 100.0) && approx(screen[1], 80.0));
    }

    #[test]
    fn wheel_zoom_in_is_strictly_monotonic() {
        let mut c = controller();
        let mut t = Instant::now();
        c.on_frame(t);

        let mut last_scale = c.state().origin_at()[2];
        for _ in 0..10 {
            c.handle_wheel(wheel_zoom(-1.0));
            t += Duration::from_millis(16);
            let out = c.on_frame(t);
            assert!(out.updated);

            assert!(c.zoom() >= 0.1);
            let scale = c.state().origin_at()[2];
            assert!(scale > last_scale, "{scale} <= {last_scale}");
            last_scale = scale;
        }
        assert!(approx(c.zoom(), 4.0));
    }

    #[test]
    fn wheel_without_modifier_pans() {
        let mut c = controller();
        c.handle_wheel(WheelInput {
            delta_x: 1.0,
            delta_y: -2.0,
            zoom_modifier: false,
            x: 0.0,
            y: 0.0,
        });
        assert_eq!(c.pan(), (-6.0, 12.0));
        assert_eq!(c.zoom(), 3.0);
    }

    #[test]
    fn zero_wheel_delta_does_not_flip_zoom_direction() {
        let mut c = controller();
        c.handle_wheel(wheel_zoom(0.0));
        assert_eq!(c.zoom(), 3.0);
        let out = c.on_frame(Instant::now());
        assert_eq!(c.state().origin_at()[2], 3.0);
        assert!(out.updated);
    }

    // ── pan sensitivity ───────────────────────────────────────────────────

    fn scene_pan_at_zoom(scale: f32) -> f32 {
        let mut c = controller();
        let t = Instant::now();
        c.on_frame(t);

        c.handle_gesture(gesture(GesturePhase::Start, 1.0, 0.0, 0.0));
        c.handle_gesture(gesture(GesturePhase::Change, scale, 0.0, 0.0));
        c.on_frame(t + Duration::from_millis(16));

        let before = *c.state().matrix();
        c.handle_gesture(gesture(GesturePhase::Change, scale, 10.0, 0.0));
        c.on_frame(t + Duration::from_millis(32));
        let after = *c.state().matrix();

        (after.translation()[0] - before.translation()[0]) / after.scale_x()
    }

    #[test]
    fn pan_sensitivity_shrinks_with_zoom() {
        let near = scene_pan_at_zoom(1.0);
        let far = scene_pan_at_zoom(5.0 / 3.0);

        assert!(approx(near, 10.0 * PI / 3.0f32.exp()));
        assert!(approx(far, 10.0 * PI / 5.0f32.exp()));
        assert!(far < near);
    }

    // ── gesture ───────────────────────────────────────────────────────────

    #[test]
    fn gesture_scales_from_baseline() {
        let mut c = controller();
        c.handle_gesture(gesture(GesturePhase::Start, 1.0, 50.0, 40.0));
        c.handle_gesture(GestureInput {
            phase: GesturePhase::Change,
            scale: 2.0,
            rotation: 15.0,
            x: 60.0,
            y: 40.0,
        });
        assert_eq!(c.zoom(), 6.0);
        assert_eq!(c.rotation(), 15.0);
        assert_eq!(c.pan(), (10.0, 0.0));

        c.handle_gesture(gesture(GesturePhase::End, 2.0, 60.0, 40.0));
        assert_eq!(c.zoom(), 6.0);

        c.on_frame(Instant::now());
        assert!(c.state().origin_at()[2] > 3.0);
    }

    // ── contacts ──────────────────────────────────────────────────────────

    #[test]
    fn two_contact_pinch_zooms_by_distance_ratio() {
        let mut c = controller();
        c.handle_contact(contact(1, ContactPhase::Down, 0.0, 0.0));
        c.handle_contact(contact(2, ContactPhase::Down, 100.0, 0.0));
        c.handle_contact(contact(2, ContactPhase::Move, 200.0, 0.0));

        assert!(approx(c.zoom(), 6.0));
        assert_eq!(c.pointer(), (100.0, 0.0));

        c.handle_contact(contact(2, ContactPhase::Move, 1.0, 0.0));
        assert!(approx(c.zoom(), 0.1));
    }

    #[test]
    fn single_contact_drag_is_ignored() {
        let mut c = controller();
        c.handle_contact(contact(7, ContactPhase::Down, 10.0, 10.0));
        c.handle_contact(contact(7, ContactPhase::Move, 50.0, 90.0));
        assert_eq!(c.zoom(), 3.0);
        assert_eq!(c.pan(), (0.0, 0.0));
    }

    #[test]
    fn coincident_contacts_skip_pinch() {
        let mut c = controller();
        c.handle_contact(contact(1, ContactPhase::Down, 20.0, 20.0));
        c.handle_contact(contact(2, ContactPhase::Down, 20.0, 20.0));
        c.handle_contact(contact(2, ContactPhase::Move, 80.0, 20.0));
        assert_eq!(c.zoom(), 3.0);
    }

    #[test]
    fn lifting_a_contact_ends_pinch() {
        let mut c = controller();
        c.handle_contact(contact(1, ContactPhase::Down, 0.0, 0.0));
        c.handle_contact(contact(2, ContactPhase::Down, 100.0, 0.0));
        c.handle_contact(contact(2, ContactPhase::Up, 100.0, 0.0));
        c.handle_contact(contact(9, ContactPhase::Cancel, 0.0, 0.0));
        c.handle_contact(contact(1, ContactPhase::Move, 300.0, 0.0));
        assert_eq!(c.zoom(), 3.0);
    }
}

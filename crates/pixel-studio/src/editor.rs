//! The grid editor app: wires input, the pan/zoom controller, the grid
//! streamer and GPU picking into the engine's frame loop.

use winit::window::WindowId;

use pixel_engine::core::{App, AppControl, FrameCtx};
use pixel_engine::input::{
    GesturePhase as EngineGesturePhase, GestureSample, InputEvent, Key, Modifiers, MouseButton,
    MouseButtonState, MouseWheelDelta, TouchEvent, TouchPhase,
};
use pixel_engine::paint::Color;
use pixel_engine::render::{GridRenderer, GridStyle, GridView, PickReadback};
use pixel_view::grid::{FillId, GridConfig, GridStreamer, GridViewport, SparseGrid};
use pixel_view::pan_zoom::{
    ContactInput, ContactPhase, GestureInput, GesturePhase, PanZoomConfig, PanZoomController,
    WheelInput,
};
use pixel_view::pick::PickController;

#[derive(Debug, Clone)]
pub struct StudioConfig {
    pub pan_zoom: PanZoomConfig,
    pub grid: GridConfig,
    pub style: GridStyle,
    pub clear: Color,
    /// Logical pixels per wheel "line".
    pub wheel_line_px: f32,
    /// Fill written by a click on a cell.
    pub paint_fill: FillId,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            pan_zoom: PanZoomConfig::default(),
            grid: GridConfig::default(),
            style: GridStyle::default(),
            clear: Color::from_straight(0.07, 0.07, 0.09, 1.0),
            wheel_line_px: 10.0,
            paint_fill: 3,
        }
    }
}

/// Small fixed document to look at.
pub fn demo_grid() -> SparseGrid {
    const CELLS: [((i32, i32), FillId); 10] = [
        ((0, 0), 5),
        ((1, 1), 1),
        ((1, 2), 2),
        ((-1, -1), 3),
        ((2, 2), 4),
        ((5, 2), 1),
        ((5, 0), 3),
        ((10, 2), 2),
        ((31, 2), 5),
        ((0, 29), 5),
    ];
    CELLS.into_iter().collect()
}

pub struct GridEditor {
    config: StudioConfig,
    grid: SparseGrid,

    controller: PanZoomController,
    streamer: GridStreamer,
    pick: PickController,

    renderer: GridRenderer,
    readback: PickReadback,

    initialized: bool,
    needs_upload: bool,
}

impl GridEditor {
    pub fn new(config: StudioConfig, grid: SparseGrid) -> Self {
        Self {
            controller: PanZoomController::new(config.pan_zoom.clone()),
            streamer: GridStreamer::new(config.grid.clone()),
            pick: PickController::new(1.0),
            renderer: GridRenderer::new(config.style.clone()),
            readback: PickReadback::new(),
            config,
            grid,
            initialized: false,
            needs_upload: false,
        }
    }

    fn initialize(&mut self, dpr: f32, (width, height): (u32, u32)) -> anyhow::Result<()> {
        self.controller.initialize(dpr);
        self.controller.start_event_listeners();
        self.pick.set_dpr(dpr);
        self.pick.attach(self.controller.state_mut());

        self.streamer.initialize(GridViewport {
            dpr,
            width: width as f32,
            height: height as f32,
        })?;

        // Nothing has been read back yet.
        self.pick.request_readback();
        self.initialized = true;
        log::info!("grid editor ready ({width}x{height} @{dpr}, {} cells)", self.grid.len());
        Ok(())
    }

    fn handle_input(&mut self, ctx: &FrameCtx<'_, '_>) -> AppControl {
        let pointer = ctx.input.pointer_pos.unwrap_or((0.0, 0.0));

        for event in &ctx.input_frame.events {
            match event {
                InputEvent::MouseWheel { .. } => {
                    if let Some(wheel) = wheel_from_event(event, self.config.wheel_line_px) {
                        self.controller.handle_wheel(wheel);
                    }
                }
                InputEvent::Touch(touch) => self.controller.handle_contact(contact_input(*touch)),
                InputEvent::PointerMoved(p) => {
                    if let Some(change) = self.pick.on_pointer_move(p.x, p.y) {
                        log::debug!("hover {:?} -> {:?}", change.previous, change.current);
                    }
                }
                InputEvent::PointerButton(b)
                    if b.button == MouseButton::Left && b.state == MouseButtonState::Pressed =>
                {
                    self.activate_hovered();
                }
                _ => {}
            }
        }

        for sample in &ctx.input_frame.gestures {
            self.controller.handle_gesture(gesture_input(sample));
        }

        let pressed = |key: Key| ctx.input_frame.keys_pressed.contains(&key);
        if pressed(Key::Escape) {
            return AppControl::Exit;
        }
        if pressed(Key::R) || pressed(Key::Digit0) {
            self.controller.reset(self.controller.dpr());
            self.streamer.invalidate();
            self.pick.request_readback();
            log::info!("view reset");
        }
        if pressed(Key::Enter) || pressed(Key::Space) {
            self.activate_hovered();
        }

        // Arrow keys pan like one wheel line.
        for (key, dx, dy) in ARROW_PAN {
            if ctx.input.key_down(key) {
                let step = self.config.wheel_line_px;
                self.controller.handle_wheel(WheelInput {
                    delta_x: dx * step,
                    delta_y: dy * step,
                    zoom_modifier: false,
                    x: pointer.0,
                    y: pointer.1,
                });
            }
        }

        AppControl::Continue
    }

    fn activate_hovered(&mut self) {
        let Some(cell) = self.pick.on_pointer_down() else {
            return;
        };
        let previous = self.grid.set(cell.x, cell.y, self.config.paint_fill);
        log::info!(
            "cell ({}, {}) painted {} (was {:?})",
            cell.x,
            cell.y,
            self.config.paint_fill,
            previous
        );
        self.streamer.invalidate();
    }

    /// Installs the newest finished readback and re-resolves the hovered cell.
    fn poll_readback(&mut self, ctx: &FrameCtx<'_, '_>) {
        let Some(buffer) = self.readback.try_read(ctx.gpu.device()) else {
            return;
        };
        self.pick.set_buffer(buffer);
        if let Some((x, y)) = ctx.input.pointer_pos {
            self.pick.on_pointer_move(x, y);
        }
    }
}

impl App for GridEditor {
    fn on_resized(&mut self, _window_id: WindowId, width: u32, height: u32, scale_factor: f64) {
        if !self.initialized {
            return;
        }
        let dpr = scale_factor as f32;
        self.controller.set_dpr(dpr);
        self.pick.set_dpr(dpr);
        self.streamer.resize(GridViewport {
            dpr,
            width: width as f32,
            height: height as f32,
        });
        self.pick.request_readback();
    }

    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        if !self.initialized {
            if let Err(e) = self.initialize(ctx.window.scale_factor(), ctx.gpu.surface_size()) {
                log::error!("grid editor initialization failed: {e:#}");
                return AppControl::Exit;
            }
        }

        if self.handle_input(ctx) == AppControl::Exit {
            return AppControl::Exit;
        }

        // ── transform + stream ────────────────────────────────────────────
        let outcome = self.controller.on_frame(ctx.time.now);
        if let Some(edge) = outcome.edge {
            log::trace!("interaction {edge:?}");
        }
        if self.streamer.fill(self.controller.state(), &self.grid) {
            self.needs_upload = true;
        }

        // ── picking ───────────────────────────────────────────────────────
        self.poll_readback(ctx);
        let wants_readback = self
            .pick
            .take_readback_request(self.controller.state().is_updating());

        // ── render ────────────────────────────────────────────────────────
        let state = self.controller.state();
        let view = GridView {
            pan_zoom: *state.matrix(),
            origin_at: state.origin_at(),
            cell_size: self.streamer.dpr_size(),
            hover: self.pick.hover(),
        };
        let upload = std::mem::take(&mut self.needs_upload);
        let instances = self.streamer.instances();
        let renderer = &mut self.renderer;
        let readback = &mut self.readback;
        let mut drawn = false;

        let control = ctx.render(self.config.clear, |rctx, target| {
            if upload {
                renderer.upload_instances(rctx, instances);
            }
            renderer.render(rctx, target, &view);
            if wants_readback {
                if let Some((texture, size)) = renderer.pick_target() {
                    readback.encode_copy(rctx.device, &mut *target.encoder, texture, size);
                }
            }
            drawn = true;
        });

        if drawn {
            self.readback.submit_map();
        } else {
            // Frame skipped; retry both next frame.
            self.needs_upload |= upload;
            if wants_readback {
                self.pick.request_readback();
            }
        }

        control
    }
}

// ── input mapping ─────────────────────────────────────────────────────────

/// Key, wheel-style x / y direction (positive = scroll right / down).
const ARROW_PAN: [(Key, f32, f32); 4] = [
    (Key::ArrowLeft, -1.0, 0.0),
    (Key::ArrowRight, 1.0, 0.0),
    (Key::ArrowUp, 0.0, -1.0),
    (Key::ArrowDown, 0.0, 1.0),
];

/// winit wheel deltas are positive when content should move down; the
/// controller takes browser-style deltas (positive = scroll down).
fn wheel_input(
    delta: MouseWheelDelta,
    modifiers: Modifiers,
    (x, y): (f32, f32),
    line_px: f32,
) -> WheelInput {
    let (dx, dy) = match delta {
        MouseWheelDelta::Line { x, y } => (x * line_px, y * line_px),
        MouseWheelDelta::Pixel { x, y } => (x, y),
    };
    WheelInput {
        delta_x: -dx,
        delta_y: -dy,
        zoom_modifier: modifiers.zoom(),
        x,
        y,
    }
}

/// Wheel input pivoting on the pointer position recorded with the event.
fn wheel_from_event(event: &InputEvent, line_px: f32) -> Option<WheelInput> {
    match *event {
        InputEvent::MouseWheel { delta, x, y, modifiers } => {
            Some(wheel_input(delta, modifiers, (x, y), line_px))
        }
        _ => None,
    }
}

fn gesture_input(sample: &GestureSample) -> GestureInput {
    let phase = match sample.phase {
        EngineGesturePhase::Started => GesturePhase::Start,
        EngineGesturePhase::Changed => GesturePhase::Change,
        EngineGesturePhase::Ended | EngineGesturePhase::Cancelled => GesturePhase::End,
    };
    GestureInput {
        phase,
        scale: sample.scale,
        rotation: sample.rotation,
        x: sample.x,
        y: sample.y,
    }
}

fn contact_input(touch: TouchEvent) -> ContactInput {
    let phase = match touch.phase {
        TouchPhase::Started => ContactPhase::Down,
        TouchPhase::Moved => ContactPhase::Move,
        TouchPhase::Ended => ContactPhase::Up,
        TouchPhase::Cancelled => ContactPhase::Cancel,
    };
    ContactInput {
        id: touch.id,
        phase,
        x: touch.x,
        y: touch.y,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pixel_engine::input::PointerMoveEvent;
    use pixel_view::grid::FillLookup;

    #[test]
    fn demo_grid_has_ten_cells() {
        let grid = demo_grid();
        assert_eq!(grid.len(), 10);
        assert_eq!(grid.fill_at(0, 0), Some(5));
        assert_eq!(grid.fill_at(-1, -1), Some(3));
        assert_eq!(grid.fill_at(3, 3), None);
    }

    #[test]
    fn line_wheel_is_scaled_and_flipped() {
        let w = wheel_input(
            MouseWheelDelta::Line { x: 0.0, y: 1.0 },
            Modifiers::default(),
            (4.0, 5.0),
            10.0,
        );
        assert_eq!((w.delta_x, w.delta_y), (0.0, -10.0));
        assert_eq!((w.x, w.y), (4.0, 5.0));
        assert!(!w.zoom_modifier);
    }

    #[test]
    fn ctrl_or_meta_wheel_zooms() {
        let ctrl = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        let meta = Modifiers {
            meta: true,
            ..Modifiers::default()
        };
        let delta = MouseWheelDelta::Pixel { x: 0.0, y: -3.0 };
        assert!(wheel_input(delta, ctrl, (0.0, 0.0), 10.0).zoom_modifier);
        let w = wheel_input(delta, meta, (0.0, 0.0), 10.0);
        assert!(w.zoom_modifier);
        assert_eq!(w.delta_y, 3.0);
    }

    #[test]
    fn wheel_pivots_on_its_own_pointer_position() {
        let zoom = Modifiers {
            ctrl: true,
            ..Modifiers::default()
        };
        let events = [
            InputEvent::MouseWheel {
                delta: MouseWheelDelta::Line { x: 0.0, y: 1.0 },
                x: 40.0,
                y: 30.0,
                modifiers: zoom,
            },
            InputEvent::PointerMoved(PointerMoveEvent { x: 300.0, y: 200.0 }),
        ];

        let wheels: Vec<_> = events.iter().filter_map(|e| wheel_from_event(e, 10.0)).collect();
        assert_eq!(wheels.len(), 1);
        assert_eq!((wheels[0].x, wheels[0].y), (40.0, 30.0));
        assert!(wheels[0].zoom_modifier);
    }

    #[test]
    fn cancelled_gesture_ends() {
        let sample = GestureSample {
            phase: EngineGesturePhase::Cancelled,
            scale: 1.2,
            rotation: 0.0,
            x: 1.0,
            y: 2.0,
        };
        assert_eq!(gesture_input(&sample).phase, GesturePhase::End);
    }

    #[test]
    fn touch_phases_map_to_contacts() {
        let touch = |phase| TouchEvent {
            id: 7,
            phase,
            x: 0.0,
            y: 0.0,
        };
        assert_eq!(contact_input(touch(TouchPhase::Started)).phase, ContactPhase::Down);
        assert_eq!(contact_input(touch(TouchPhase::Moved)).phase, ContactPhase::Move);
        assert_eq!(contact_input(touch(TouchPhase::Ended)).phase, ContactPhase::Up);
        assert_eq!(contact_input(touch(TouchPhase::Cancelled)).phase, ContactPhase::Cancel);
        assert_eq!(contact_input(touch(TouchPhase::Moved)).id, 7);
    }
}

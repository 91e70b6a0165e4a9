use std::collections::{HashMap, HashSet};

use super::frame::InputFrame;
use super::types::{
    GesturePhase, GestureSample, InputEvent, Key, KeyState, Modifiers, MouseButton,
    MouseButtonState, PointerButtonEvent, PointerMoveEvent, TouchEvent, TouchPhase,
};

/// Gesture totals since the current gesture started.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct GestureState {
    pub scale: f32,
    pub rotation: f32,
}

impl Default for GestureState {
    fn default() -> Self {
        Self {
            scale: 1.0,
            rotation: 0.0,
        }
    }
}

/// Current input state for a single window.
#[derive(Debug, Default)]
pub struct InputState {
    pub modifiers: Modifiers,
    pub focused: bool,

    /// Pointer position in logical pixels.
    pub pointer_pos: Option<(f32, f32)>,

    pub keys_down: HashSet<Key>,
    pub buttons_down: HashSet<MouseButton>,

    /// Active touch contacts by id.
    pub touches: HashMap<u64, (f32, f32)>,

    /// Running trackpad gesture, if any.
    pub gesture: Option<GestureState>,
}

impl InputState {
    /// Applies an event to the current state and records deltas into `frame`.
    pub fn apply_event(&mut self, frame: &mut InputFrame, ev: InputEvent) {
        match &ev {
            InputEvent::ModifiersChanged(m) => {
                self.modifiers = *m;
            }

            InputEvent::Focused(f) => {
                self.focused = *f;
                if !*f {
                    // Avoid stuck keys / contacts when focus changes mid-press.
                    self.keys_down.clear();
                    self.buttons_down.clear();
                    self.touches.clear();
                    self.end_gesture(frame);
                }
            }

            InputEvent::PointerMoved(PointerMoveEvent { x, y }) => {
                self.pointer_pos = Some((*x, *y));
            }

            InputEvent::PointerLeft => {
                self.pointer_pos = None;
            }

            InputEvent::Key {
                key,
                state,
                modifiers,
                ..
            } => {
                self.modifiers = *modifiers;
                match state {
                    KeyState::Pressed => {
                        if self.keys_down.insert(*key) {
                            frame.keys_pressed.insert(*key);
                        }
                    }
                    KeyState::Released => {
                        if self.keys_down.remove(key) {
                            frame.keys_released.insert(*key);
                        }
                    }
                }
            }

            InputEvent::PointerButton(PointerButtonEvent {
                button,
                state,
                x,
                y,
                modifiers,
            }) => {
                self.pointer_pos = Some((*x, *y));
                self.modifiers = *modifiers;
                match state {
                    MouseButtonState::Pressed => {
                        if self.buttons_down.insert(*button) {
                            frame.buttons_pressed.insert(*button);
                        }
                    }
                    MouseButtonState::Released => {
                        if self.buttons_down.remove(button) {
                            frame.buttons_released.insert(*button);
                        }
                    }
                }
            }

            InputEvent::MouseWheel { modifiers, .. } => {
                self.modifiers = *modifiers;
            }

            InputEvent::Touch(TouchEvent { id, phase, x, y }) => match phase {
                TouchPhase::Started | TouchPhase::Moved => {
                    self.touches.insert(*id, (*x, *y));
                }
                TouchPhase::Ended | TouchPhase::Cancelled => {
                    self.touches.remove(id);
                }
            },

            InputEvent::PinchGesture { delta, phase } => {
                let delta = *delta;
                self.apply_gesture(frame, *phase, |g| g.scale = (g.scale + delta).max(0.0));
            }

            InputEvent::RotationGesture { delta, phase } => {
                let delta = *delta;
                self.apply_gesture(frame, *phase, |g| g.rotation += delta);
            }
        }

        frame.push_event(ev);
    }

    fn apply_gesture(
        &mut self,
        frame: &mut InputFrame,
        phase: GesturePhase,
        update: impl FnOnce(&mut GestureState),
    ) {
        let (x, y) = self.pointer_pos.unwrap_or((0.0, 0.0));

        match phase {
            GesturePhase::Started | GesturePhase::Changed => {
                let fresh = self.gesture.is_none();
                let g = self.gesture.get_or_insert_with(GestureState::default);
                if fresh {
                    frame.gestures.push(GestureSample {
                        phase: GesturePhase::Started,
                        scale: g.scale,
                        rotation: g.rotation,
                        x,
                        y,
                    });
                }

                update(g);
                if phase == GesturePhase::Changed {
                    frame.gestures.push(GestureSample {
                        phase: GesturePhase::Changed,
                        scale: g.scale,
                        rotation: g.rotation,
                        x,
                        y,
                    });
                }
            }
            GesturePhase::Ended | GesturePhase::Cancelled => self.end_gesture(frame),
        }
    }

    fn end_gesture(&mut self, frame: &mut InputFrame) {
        let Some(g) = self.gesture.take() else {
            return;
        };
        let (x, y) = self.pointer_pos.unwrap_or((0.0, 0.0));
        frame.gestures.push(GestureSample {
            phase: GesturePhase::Ended,
            scale: g.scale,
            rotation: g.rotation,
            x,
            y,
        });
    }

    pub fn key_down(&self, key: Key) -> bool {
        self.keys_down.contains(&key)
    }

    pub fn button_down(&self, btn: MouseButton) -> bool {
        self.buttons_down.contains(&btn)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(state: &mut InputState, frame: &mut InputFrame, ev: InputEvent) {
        state.apply_event(frame, ev);
    }

    // ── gestures ──────────────────────────────────────────────────────────

    #[test]
    fn pinch_accumulates_scale_since_start() {
        let mut s = InputState::default();
        let mut f = InputFrame::default();
        apply(&mut s, &mut f, InputEvent::PointerMoved(PointerMoveEvent { x: 40.0, y: 30.0 }));

        apply(&mut s, &mut f, InputEvent::PinchGesture { delta: 0.0, phase: GesturePhase::Started });
        apply(&mut s, &mut f, InputEvent::PinchGesture { delta: 0.25, phase: GesturePhase::Changed });
        apply(&mut s, &mut f, InputEvent::PinchGesture { delta: 0.25, phase: GesturePhase::Changed });

        let phases: Vec<_> = f.gestures.iter().map(|g| g.phase).collect();
        assert_eq!(phases, vec![GesturePhase::Started, GesturePhase::Changed, GesturePhase::Changed]);
        let last = f.gestures[2];
        assert_eq!((last.scale, last.x, last.y), (1.5, 40.0, 30.0));

        apply(&mut s, &mut f, InputEvent::PinchGesture { delta: 0.0, phase: GesturePhase::Ended });
        assert_eq!(f.gestures.last().map(|g| g.phase), Some(GesturePhase::Ended));
        assert!(s.gesture.is_none());
    }

    #[test]
    fn rotation_and_pinch_share_one_gesture() {
        let mut s = InputState::default();
        let mut f = InputFrame::default();
        apply(&mut s, &mut f, InputEvent::PinchGesture { delta: 0.1, phase: GesturePhase::Changed });
        apply(&mut s, &mut f, InputEvent::RotationGesture { delta: 12.0, phase: GesturePhase::Changed });

        let starts = f.gestures.iter().filter(|g| g.phase == GesturePhase::Started).count();
        assert_eq!(starts, 1);
        assert_eq!(s.gesture, Some(GestureState { scale: 1.1, rotation: 12.0 }));
    }

    #[test]
    fn gesture_end_without_start_is_ignored() {
        let mut s = InputState::default();
        let mut f = InputFrame::default();
        apply(&mut s, &mut f, InputEvent::RotationGesture { delta: 0.0, phase: GesturePhase::Ended });
        assert!(f.gestures.is_empty());
        assert_eq!(f.events.len(), 1);
    }

    // ── touches / focus ───────────────────────────────────────────────────

    #[test]
    fn touches_track_active_contacts() {
        let mut s = InputState::default();
        let mut f = InputFrame::default();
        let t = |id, phase| InputEvent::Touch(TouchEvent { id, phase, x: 1.0, y: 2.0 });

        apply(&mut s, &mut f, t(1, TouchPhase::Started));
        apply(&mut s, &mut f, t(2, TouchPhase::Started));
        apply(&mut s, &mut f, t(1, TouchPhase::Ended));
        assert_eq!(s.touches.len(), 1);
        assert!(s.touches.contains_key(&2));
    }

    #[test]
    fn focus_loss_clears_held_state() {
        let mut s = InputState::default();
        let mut f = InputFrame::default();
        apply(&mut s, &mut f, InputEvent::PointerButton(PointerButtonEvent {
            button: MouseButton::Left,
            state: MouseButtonState::Pressed,
            x: 0.0,
            y: 0.0,
            modifiers: Modifiers::default(),
        }));
        apply(&mut s, &mut f, InputEvent::PinchGesture { delta: 0.2, phase: GesturePhase::Started });
        assert!(s.button_down(MouseButton::Left));

        apply(&mut s, &mut f, InputEvent::Focused(false));
        assert!(!s.button_down(MouseButton::Left));
        assert!(s.gesture.is_none());
        assert_eq!(f.gestures.last().map(|g| g.phase), Some(GesturePhase::Ended));
    }

    #[test]
    fn frame_clear_drops_deltas() {
        let mut s = InputState::default();
        let mut f = InputFrame::default();
        apply(&mut s, &mut f, InputEvent::PinchGesture { delta: 0.0, phase: GesturePhase::Started });
        f.clear();
        assert!(f.events.is_empty() && f.gestures.is_empty());
        assert!(s.gesture.is_some());
    }
}

// Input state tracking for keyboard and mouse
// Abstracts winit events into a queryable per-frame snapshot

use std::collections::HashSet;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

pub struct InputState {
    // Keyboard
    keys_held: HashSet<KeyCode>,
    // Keys that went down since the last end_frame(); used for toggles.
    keys_pressed: HashSet<KeyCode>,

    // Mouse
    pub mouse_position: (f32, f32),
    // Cursor position of a left click this frame, if any
    pub click: Option<(f32, f32)>,

    // Scroll: accumulated vertical scroll this frame, reset in end_frame()
    pub scroll_delta: f32,

    pub window_size: (u32, u32),
}

impl Default for InputState {
    fn default() -> Self {
        Self::new()
    }
}

impl InputState {
    pub fn new() -> Self {
        Self {
            keys_held: HashSet::new(),
            keys_pressed: HashSet::new(),
            mouse_position: (0.0, 0.0),
            click: None,
            scroll_delta: 0.0,
            window_size: (0, 0),
        }
    }

    /// Feed a winit WindowEvent into the input state.
    /// Events egui already consumed should not be fed here.
    pub fn process_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if let PhysicalKey::Code(key) = event.physical_key {
                    match event.state {
                        ElementState::Pressed => {
                            if !event.repeat {
                                self.keys_pressed.insert(key);
                            }
                            self.keys_held.insert(key);
                        }
                        ElementState::Released => {
                            self.keys_held.remove(&key);
                        }
                    }
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.mouse_position = (position.x as f32, position.y as f32);
            }
            WindowEvent::MouseInput {
                state: ElementState::Pressed,
                button: MouseButton::Left,
                ..
            } => {
                self.click = Some(self.mouse_position);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let y = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 100.0,
                };
                self.scroll_delta += y;
            }
            WindowEvent::Resized(size) => {
                self.window_size = (size.width, size.height);
            }
            _ => {}
        }
    }

    /// Call once per frame after update() and render() have consumed input.
    /// Resets per-frame accumulators.
    pub fn end_frame(&mut self) {
        self.scroll_delta = 0.0;
        self.click = None;
        self.keys_pressed.clear();
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.keys_held.contains(&key)
    }

    /// True only on the frame the key went down.
    pub fn was_pressed(&self, key: KeyCode) -> bool {
        self.keys_pressed.contains(&key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::{PhysicalPosition, PhysicalSize};
    use winit::event::{DeviceId, TouchPhase};

    fn device() -> DeviceId {
        // SAFETY: only compared for equality, never passed back to winit.
        unsafe { DeviceId::dummy() }
    }

    #[test]
    fn click_lands_at_cursor_and_clears_at_frame_end() {
        let mut input = InputState::new();
        input.process_event(&WindowEvent::CursorMoved {
            device_id: device(),
            position: PhysicalPosition::new(120.0, 80.0),
        });
        input.process_event(&WindowEvent::MouseInput {
            device_id: device(),
            state: ElementState::Pressed,
            button: MouseButton::Left,
        });
        assert_eq!(input.click, Some((120.0, 80.0)));
        input.end_frame();
        assert_eq!(input.click, None);
    }

    #[test]
    fn scroll_accumulates_until_frame_end() {
        let mut input = InputState::new();
        for _ in 0..2 {
            input.process_event(&WindowEvent::MouseWheel {
                device_id: device(),
                delta: MouseScrollDelta::LineDelta(0.0, 1.5),
                phase: TouchPhase::Moved,
            });
        }
        assert_eq!(input.scroll_delta, 3.0);
        input.end_frame();
        assert_eq!(input.scroll_delta, 0.0);
    }

    #[test]
    fn resize_is_tracked() {
        let mut input = InputState::new();
        input.process_event(&WindowEvent::Resized(PhysicalSize::new(800, 600)));
        assert_eq!(input.window_size, (800, 600));
        assert!(!input.was_pressed(KeyCode::Space));
    }
}

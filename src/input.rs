use serde::Deserialize;
use std::fs;
use std::path::Path;
use winit::event::{DeviceEvent, ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::Key;

/// Discrete car-control actions. The wire identifiers are the ones the
/// showcase has always used: `rotate`, `lights`, `doors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarControl {
    ToggleRotate,
    ToggleLights,
    ToggleDriving,
}

impl CarControl {
    pub fn from_action(id: &str) -> Option<Self> {
        match id {
            "rotate" => Some(CarControl::ToggleRotate),
            "lights" => Some(CarControl::ToggleLights),
            "doors" => Some(CarControl::ToggleDriving),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputBindings {
    #[serde(default = "InputBindings::default_rotate")]
    pub rotate: String,
    #[serde(default = "InputBindings::default_lights")]
    pub lights: String,
    #[serde(default = "InputBindings::default_driving")]
    pub driving: String,
}

impl InputBindings {
    fn default_rotate() -> String {
        "r".to_string()
    }

    fn default_lights() -> String {
        "l".to_string()
    }

    fn default_driving() -> String {
        "d".to_string()
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(bindings) => bindings,
                Err(err) => {
                    eprintln!("[input] failed to parse {}: {err:?}. Using defaults.", path.display());
                    Self::default()
                }
            },
            Err(_) => Self::default(),
        }
    }

    fn control_for_key(&self, key: &str) -> Option<CarControl> {
        if key.eq_ignore_ascii_case(&self.rotate) {
            Some(CarControl::ToggleRotate)
        } else if key.eq_ignore_ascii_case(&self.lights) {
            Some(CarControl::ToggleLights)
        } else if key.eq_ignore_ascii_case(&self.driving) {
            Some(CarControl::ToggleDriving)
        } else {
            None
        }
    }
}

impl Default for InputBindings {
    fn default() -> Self {
        Self {
            rotate: Self::default_rotate(),
            lights: Self::default_lights(),
            driving: Self::default_driving(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum InputEvent {
    Key { text: String, pressed: bool },
    MouseMove { dx: f32, dy: f32 },
    Wheel { delta: f32 },
    MouseButton { button: MouseButton, pressed: bool },
    CursorPos { x: f32, y: f32 },
    PointerEntered,
    PointerLeft,
    Other,
}

impl InputEvent {
    pub fn from_window_event(event: &WindowEvent) -> Self {
        match event {
            WindowEvent::KeyboardInput { event, .. } => match &event.logical_key {
                Key::Character(text) => InputEvent::Key {
                    text: text.to_string(),
                    pressed: event.state == ElementState::Pressed,
                },
                _ => InputEvent::Other,
            },
            WindowEvent::MouseInput { button, state, .. } => InputEvent::MouseButton {
                button: *button,
                pressed: *state == ElementState::Pressed,
            },
            WindowEvent::MouseWheel { delta, .. } => {
                let amount = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 40.0,
                };
                InputEvent::Wheel { delta: amount }
            }
            WindowEvent::CursorMoved { position, .. } => {
                InputEvent::CursorPos { x: position.x as f32, y: position.y as f32 }
            }
            WindowEvent::CursorEntered { .. } => InputEvent::PointerEntered,
            WindowEvent::CursorLeft { .. } => InputEvent::PointerLeft,
            _ => InputEvent::Other,
        }
    }

    pub fn from_device_event(event: &DeviceEvent) -> Self {
        match event {
            DeviceEvent::MouseMotion { delta } => {
                InputEvent::MouseMove { dx: delta.0 as f32, dy: delta.1 as f32 }
            }
            _ => InputEvent::Other,
        }
    }
}

/// Per-frame input aggregation: push events as they arrive, take what the
/// frame needs, clear at the end.
pub struct Input {
    bindings: InputBindings,
    pub mouse_delta: (f32, f32),
    wheel: f32,
    cursor_pos: Option<(f32, f32)>,
    left_pressed: bool,
    pending_controls: Vec<CarControl>,
    hover_change: Option<bool>,
}

impl Input {
    pub fn new() -> Self {
        Self::with_bindings(InputBindings::default())
    }

    pub fn from_config(path: impl AsRef<Path>) -> Self {
        Self::with_bindings(InputBindings::load_or_default(path))
    }

    fn with_bindings(bindings: InputBindings) -> Self {
        Self {
            bindings,
            mouse_delta: (0.0, 0.0),
            wheel: 0.0,
            cursor_pos: None,
            left_pressed: false,
            pending_controls: Vec::new(),
            hover_change: None,
        }
    }

    pub fn push(&mut self, event: InputEvent) {
        match &event {
            InputEvent::Key { text, pressed } => {
                if *pressed {
                    if let Some(control) = self.bindings.control_for_key(text) {
                        self.pending_controls.push(control);
                    }
                }
            }
            InputEvent::MouseMove { dx, dy } => {
                self.mouse_delta.0 += *dx;
                self.mouse_delta.1 += *dy;
            }
            InputEvent::Wheel { delta } => {
                self.wheel += *delta;
            }
            InputEvent::MouseButton { button, pressed } => {
                if *button == MouseButton::Left {
                    self.left_pressed = *pressed;
                }
            }
            InputEvent::CursorPos { x, y } => {
                self.cursor_pos = Some((*x, *y));
            }
            InputEvent::PointerEntered => {
                self.hover_change = Some(true);
            }
            InputEvent::PointerLeft => {
                self.hover_change = Some(false);
            }
            InputEvent::Other => {}
        }
    }

    pub fn queue_control(&mut self, control: CarControl) {
        self.pending_controls.push(control);
    }

    pub fn take_controls(&mut self) -> Vec<CarControl> {
        std::mem::take(&mut self.pending_controls)
    }

    /// Latest pointer enter/leave this frame, if any.
    pub fn take_hover_change(&mut self) -> Option<bool> {
        self.hover_change.take()
    }

    pub fn consume_wheel_delta(&mut self) -> Option<f32> {
        if self.wheel.abs() > 0.0 {
            let delta = self.wheel;
            self.wheel = 0.0;
            Some(delta)
        } else {
            None
        }
    }

    pub fn left_held(&self) -> bool {
        self.left_pressed
    }

    pub fn cursor_position(&self) -> Option<(f32, f32)> {
        self.cursor_pos
    }

    pub fn clear_frame(&mut self) {
        self.mouse_delta = (0.0, 0.0);
        self.wheel = 0.0;
    }
}

impl Default for Input {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_identifiers_map_to_controls() {
        assert_eq!(CarControl::from_action("rotate"), Some(CarControl::ToggleRotate));
        assert_eq!(CarControl::from_action("lights"), Some(CarControl::ToggleLights));
        assert_eq!(CarControl::from_action("doors"), Some(CarControl::ToggleDriving));
        assert_eq!(CarControl::from_action("horn"), None);
    }

    #[test]
    fn key_presses_queue_controls_once() {
        let mut input = Input::new();
        input.push(InputEvent::Key { text: "r".to_string(), pressed: true });
        input.push(InputEvent::Key { text: "r".to_string(), pressed: false });
        input.push(InputEvent::Key { text: "L".to_string(), pressed: true });
        let controls = input.take_controls();
        assert_eq!(controls, vec![CarControl::ToggleRotate, CarControl::ToggleLights]);
        assert!(input.take_controls().is_empty(), "controls drain once");
    }

    #[test]
    fn hover_change_reports_latest() {
        let mut input = Input::new();
        input.push(InputEvent::PointerEntered);
        input.push(InputEvent::PointerLeft);
        assert_eq!(input.take_hover_change(), Some(false));
        assert_eq!(input.take_hover_change(), None);
    }

    #[test]
    fn wheel_accumulates_until_consumed() {
        let mut input = Input::new();
        input.push(InputEvent::Wheel { delta: 1.0 });
        input.push(InputEvent::Wheel { delta: 0.5 });
        assert_eq!(input.consume_wheel_delta(), Some(1.5));
        assert_eq!(input.consume_wheel_delta(), None);
    }
}

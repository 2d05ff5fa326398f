//! Input state management for pointer/keyboard events.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Modifier keys state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
}

/// Pointer event type for unified mouse/touch handling.
///
/// Positions are in logical screen pixels; the input state applies the
/// device-pixel-ratio scale factor before anything downstream converts to
/// world space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PointerEvent {
    Down {
        position: Point,
        button: MouseButton,
    },
    Up {
        position: Point,
        button: MouseButton,
    },
    Move {
        position: Point,
    },
    Scroll {
        position: Point,
        delta: Vec2,
    },
}

/// Keyboard event type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum KeyEvent {
    Pressed(String),
    Released(String),
}

/// Tracks the current input state across events.
#[derive(Debug, Clone)]
pub struct InputState {
    /// Current pointer position in physical screen pixels.
    pub pointer_position: Point,
    /// Currently pressed mouse buttons.
    pressed_buttons: HashSet<MouseButton>,
    /// Current modifier keys state.
    pub modifiers: Modifiers,
    /// Currently pressed keys.
    pressed_keys: HashSet<String>,
    /// Device pixel ratio applied to incoming positions.
    scale_factor: f64,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            pointer_position: Point::ZERO,
            pressed_buttons: HashSet::new(),
            modifiers: Modifiers::default(),
            pressed_keys: HashSet::new(),
            scale_factor: 1.0,
        }
    }
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the device pixel ratio used to scale incoming positions.
    pub fn set_scale_factor(&mut self, scale_factor: f64) {
        if scale_factor > 0.0 && scale_factor.is_finite() {
            self.scale_factor = scale_factor;
        }
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Scale a logical position into physical pixels.
    pub fn to_physical(&self, position: Point) -> Point {
        Point::new(position.x * self.scale_factor, position.y * self.scale_factor)
    }

    /// Process a pointer event, returning it with positions scaled to
    /// physical pixels.
    pub fn ingest_pointer_event(&mut self, event: PointerEvent) -> PointerEvent {
        let scaled = match event {
            PointerEvent::Down { position, button } => {
                self.pressed_buttons.insert(button);
                PointerEvent::Down {
                    position: self.to_physical(position),
                    button,
                }
            }
            PointerEvent::Up { position, button } => {
                self.pressed_buttons.remove(&button);
                PointerEvent::Up {
                    position: self.to_physical(position),
                    button,
                }
            }
            PointerEvent::Move { position } => PointerEvent::Move {
                position: self.to_physical(position),
            },
            PointerEvent::Scroll { position, delta } => PointerEvent::Scroll {
                position: self.to_physical(position),
                delta,
            },
        };

        self.pointer_position = match &scaled {
            PointerEvent::Down { position, .. }
            | PointerEvent::Up { position, .. }
            | PointerEvent::Move { position }
            | PointerEvent::Scroll { position, .. } => *position,
        };
        scaled
    }

    /// Process a key event.
    pub fn handle_key_event(&mut self, event: &KeyEvent) {
        match event {
            KeyEvent::Pressed(key) => {
                self.pressed_keys.insert(key.clone());
            }
            KeyEvent::Released(key) => {
                self.pressed_keys.remove(key);
            }
        }
    }

    /// Update modifier keys state.
    pub fn set_modifiers(&mut self, modifiers: Modifiers) {
        self.modifiers = modifiers;
    }

    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    pub fn is_key_pressed(&self, key: &str) -> bool {
        self.pressed_keys.contains(key)
    }
}

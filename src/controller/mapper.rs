//! # Gamepad Button Mapper
//!
//! Turns raw evdev events from a DualSense controller into press and release
//! edges for named buttons. Analog sticks and triggers are not used; only
//! digital inputs drive robot controls.
//!
//! ## Button Codes (EV_KEY)
//!
//! | Button | evdev Code |
//! |--------|------------|
//! | Cross (×) | BTN_SOUTH |
//! | Circle (○) | BTN_EAST |
//! | Square (□) | BTN_WEST |
//! | Triangle (△) | BTN_NORTH |
//! | L1 / R1 | BTN_TL / BTN_TR |
//! | L2 / R2 (click) | BTN_TL2 / BTN_TR2 |
//! | Share / Options | BTN_SELECT / BTN_START |
//! | PS | BTN_MODE |
//! | L3 / R3 | BTN_THUMBL / BTN_THUMBR |
//! | Touchpad | BTN_TOUCH |
//!
//! ## D-Pad (EV_ABS)
//!
//! The D-pad reports as two hat axes, `ABS_HAT0X` and `ABS_HAT0Y`, each
//! -1/0/1. A hat move straight from one side to the other is reported as a
//! release of the old direction followed by a press of the new one.
//!
//! ## Usage
//!
//! ```no_run
//! use armlink::controller::mapper::ButtonMapper;
//! use armlink::controller::ps5::DualSenseController;
//!
//! let mut controller = DualSenseController::open()?;
//! let mut mapper = ButtonMapper::new();
//!
//! loop {
//!     for event in controller.fetch_events()? {
//!         for edge in mapper.process_event(&event) {
//!             println!("{:?} pressed={}", edge.button, edge.pressed);
//!         }
//!     }
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use evdev::{AbsoluteAxisType, InputEvent, Key};
use serde::Deserialize;

/// D-Pad axis released.
pub const DPAD_RELEASED: i32 = 0;
/// D-Pad pressed negative direction (left or up).
pub const DPAD_NEGATIVE: i32 = -1;
/// D-Pad pressed positive direction (right or down).
pub const DPAD_POSITIVE: i32 = 1;

/// evdev key value for a held key repeating
const KEY_AUTOREPEAT: i32 = 2;

/// A digital DualSense input, named the way it appears in config files
/// (`dpad_up`, `cross`, `l1`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamepadButton {
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    Cross,
    Circle,
    Square,
    Triangle,
    L1,
    R1,
    L2,
    R2,
    Share,
    Options,
    Ps,
    L3,
    R3,
    Touchpad,
}

impl GamepadButton {
    /// Button reported by an evdev key code, if it is one we know
    pub fn from_key(key: Key) -> Option<Self> {
        let button = match key {
            Key::BTN_SOUTH => Self::Cross,
            Key::BTN_EAST => Self::Circle,
            Key::BTN_WEST => Self::Square,
            Key::BTN_NORTH => Self::Triangle,

            Key::BTN_TL => Self::L1,
            Key::BTN_TR => Self::R1,
            Key::BTN_TL2 => Self::L2,
            Key::BTN_TR2 => Self::R2,

            Key::BTN_SELECT => Self::Share,
            Key::BTN_START => Self::Options,
            Key::BTN_MODE => Self::Ps,

            Key::BTN_THUMBL => Self::L3,
            Key::BTN_THUMBR => Self::R3,

            Key::BTN_TOUCH => Self::Touchpad,

            _ => return None,
        };
        Some(button)
    }
}

/// One press or release edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub button: GamepadButton,
    pub pressed: bool,
}

impl ButtonEvent {
    pub fn press(button: GamepadButton) -> Self {
        Self {
            button,
            pressed: true,
        }
    }

    pub fn release(button: GamepadButton) -> Self {
        Self {
            button,
            pressed: false,
        }
    }
}

/// Converts evdev events into button edges.
///
/// Tracks the two hat axes so a D-pad move can be split into release and
/// press edges. Not thread-safe; use from the reader thread only.
#[derive(Debug, Default)]
pub struct ButtonMapper {
    dpad_x: i32,
    dpad_y: i32,
}

impl ButtonMapper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes a single evdev event.
    ///
    /// Returns the edges it produced: none for sync events, key autorepeat,
    /// analog axes and unknown codes; up to two for a D-pad move.
    ///
    /// # Examples
    ///
    /// ```
    /// use armlink::controller::mapper::{ButtonEvent, ButtonMapper, GamepadButton};
    /// use evdev::{EventType, InputEvent, Key};
    ///
    /// let mut mapper = ButtonMapper::new();
    /// let event = InputEvent::new(EventType::KEY, Key::BTN_SOUTH.code(), 1);
    /// assert_eq!(
    ///     mapper.process_event(&event),
    ///     vec![ButtonEvent::press(GamepadButton::Cross)]
    /// );
    /// ```
    pub fn process_event(&mut self, event: &InputEvent) -> Vec<ButtonEvent> {
        match event.kind() {
            evdev::InputEventKind::Key(key) => self.process_key_event(key, event.value()),
            evdev::InputEventKind::AbsAxis(axis) => self.process_axis_event(axis, event.value()),
            _ => Vec::new(),
        }
    }

    fn process_key_event(&mut self, key: Key, value: i32) -> Vec<ButtonEvent> {
        if value == KEY_AUTOREPEAT {
            return Vec::new();
        }
        match GamepadButton::from_key(key) {
            Some(button) => vec![ButtonEvent {
                button,
                pressed: value != 0,
            }],
            None => Vec::new(),
        }
    }

    fn process_axis_event(&mut self, axis: AbsoluteAxisType, value: i32) -> Vec<ButtonEvent> {
        match axis {
            AbsoluteAxisType::ABS_HAT0X => hat_edges(
                &mut self.dpad_x,
                value,
                GamepadButton::DpadLeft,
                GamepadButton::DpadRight,
            ),
            AbsoluteAxisType::ABS_HAT0Y => hat_edges(
                &mut self.dpad_y,
                value,
                GamepadButton::DpadUp,
                GamepadButton::DpadDown,
            ),
            // Sticks, triggers, motion sensors
            _ => Vec::new(),
        }
    }
}

fn hat_direction(value: i32, negative: GamepadButton, positive: GamepadButton) -> Option<GamepadButton> {
    match value.signum() {
        DPAD_NEGATIVE => Some(negative),
        DPAD_POSITIVE => Some(positive),
        _ => None,
    }
}

fn hat_edges(
    current: &mut i32,
    value: i32,
    negative: GamepadButton,
    positive: GamepadButton,
) -> Vec<ButtonEvent> {
    let value = value.signum();
    if *current == value {
        return Vec::new();
    }

    let mut edges = Vec::with_capacity(2);
    if let Some(old) = hat_direction(*current, negative, positive) {
        edges.push(ButtonEvent::release(old));
    }
    if let Some(new) = hat_direction(value, negative, positive) {
        edges.push(ButtonEvent::press(new));
    }
    *current = value;
    edges
}

#[cfg(test)]
mod tests {
    use super::*;
    use evdev::EventType;

    /// Helper to create an axis event for testing.
    fn make_axis_event(axis: AbsoluteAxisType, value: i32) -> InputEvent {
        InputEvent::new(EventType::ABSOLUTE, axis.0, value)
    }

    /// Helper to create a key event for testing.
    fn make_key_event(key: Key, value: i32) -> InputEvent {
        InputEvent::new(EventType::KEY, key.code(), value)
    }

    #[test]
    fn test_face_buttons() {
        let mut mapper = ButtonMapper::new();
        let cases = [
            (Key::BTN_SOUTH, GamepadButton::Cross),
            (Key::BTN_EAST, GamepadButton::Circle),
            (Key::BTN_WEST, GamepadButton::Square),
            (Key::BTN_NORTH, GamepadButton::Triangle),
        ];

        for (key, button) in cases {
            assert_eq!(
                mapper.process_event(&make_key_event(key, 1)),
                vec![ButtonEvent::press(button)]
            );
            assert_eq!(
                mapper.process_event(&make_key_event(key, 0)),
                vec![ButtonEvent::release(button)]
            );
        }
    }

    #[test]
    fn test_shoulder_and_system_buttons() {
        assert_eq!(GamepadButton::from_key(Key::BTN_TL), Some(GamepadButton::L1));
        assert_eq!(GamepadButton::from_key(Key::BTN_TR2), Some(GamepadButton::R2));
        assert_eq!(GamepadButton::from_key(Key::BTN_SELECT), Some(GamepadButton::Share));
        assert_eq!(GamepadButton::from_key(Key::BTN_START), Some(GamepadButton::Options));
        assert_eq!(GamepadButton::from_key(Key::BTN_MODE), Some(GamepadButton::Ps));
        assert_eq!(GamepadButton::from_key(Key::BTN_THUMBR), Some(GamepadButton::R3));
    }

    #[test]
    fn test_unknown_key_ignored() {
        let mut mapper = ButtonMapper::new();
        assert!(mapper.process_event(&make_key_event(Key::KEY_A, 1)).is_empty());
    }

    #[test]
    fn test_key_autorepeat_ignored() {
        let mut mapper = ButtonMapper::new();
        let edges = mapper.process_event(&make_key_event(Key::BTN_TL, KEY_AUTOREPEAT));
        assert!(edges.is_empty());
    }

    #[test]
    fn test_analog_axes_ignored() {
        let mut mapper = ButtonMapper::new();
        for axis in [
            AbsoluteAxisType::ABS_X,
            AbsoluteAxisType::ABS_Y,
            AbsoluteAxisType::ABS_RX,
            AbsoluteAxisType::ABS_RZ,
        ] {
            assert!(mapper.process_event(&make_axis_event(axis, 255)).is_empty());
        }
    }

    #[test]
    fn test_sync_events_ignored() {
        let mut mapper = ButtonMapper::new();
        let event = InputEvent::new(EventType::SYNCHRONIZATION, 0, 0);
        assert!(mapper.process_event(&event).is_empty());
    }

    #[test]
    fn test_dpad_press_and_release() {
        let mut mapper = ButtonMapper::new();

        // Press up
        let edges = mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0Y, -1));
        assert_eq!(edges, vec![ButtonEvent::press(GamepadButton::DpadUp)]);

        // Same position again
        let edges = mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0Y, -1));
        assert!(edges.is_empty());

        // Release
        let edges = mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0Y, 0));
        assert_eq!(edges, vec![ButtonEvent::release(GamepadButton::DpadUp)]);
    }

    #[test]
    fn test_dpad_flip_releases_then_presses() {
        let mut mapper = ButtonMapper::new();

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, -1));
        let edges = mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, 1));

        assert_eq!(
            edges,
            vec![
                ButtonEvent::release(GamepadButton::DpadLeft),
                ButtonEvent::press(GamepadButton::DpadRight),
            ]
        );
    }

    #[test]
    fn test_dpad_axes_are_independent() {
        let mut mapper = ButtonMapper::new();

        mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, 1));
        let edges = mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0Y, 1));
        assert_eq!(edges, vec![ButtonEvent::press(GamepadButton::DpadDown)]);

        let edges = mapper.process_event(&make_axis_event(AbsoluteAxisType::ABS_HAT0X, 0));
        assert_eq!(edges, vec![ButtonEvent::release(GamepadButton::DpadRight)]);
    }

    #[test]
    fn test_button_names_deserialize_snake_case() {
        #[derive(Deserialize)]
        struct Binding {
            button: GamepadButton,
        }

        let binding: Binding = toml::from_str("button = \"dpad_left\"").unwrap();
        assert_eq!(binding.button, GamepadButton::DpadLeft);
        let binding: Binding = toml::from_str("button = \"l2\"").unwrap();
        assert_eq!(binding.button, GamepadButton::L2);
    }
}

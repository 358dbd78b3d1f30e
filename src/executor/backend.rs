//! Input/Capture Backend capability.
//!
//! The automation engine only talks to this trait; the concrete OS integration
//! (see [`EnigoBackend`](super::EnigoBackend)) is swappable. Time-valued
//! arguments arrive already scaled by the engine's speed factor.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;

use crate::error::BackendError;

/// Mouse button enumeration.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MouseButton {
    #[default]
    Left,
    Middle,
    Right,
}

impl MouseButton {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "left" | "primary" => Some(MouseButton::Left),
            "middle" => Some(MouseButton::Middle),
            "right" | "secondary" => Some(MouseButton::Right),
            _ => None,
        }
    }
}

/// A rectangle region on screen.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    /// `[x, y, width, height]`, the shape accepted in action params.
    pub fn to_value(self) -> Value {
        json!([self.x, self.y, self.width, self.height])
    }
}

/// Absolute screen coordinate.
pub type Point = (i32, i32);

/// Parameters of a click dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct ClickRequest {
    /// Move here first when set; otherwise click at the current pointer position.
    pub position: Option<Point>,
    pub button: MouseButton,
    pub clicks: u32,
    /// Pause between consecutive clicks.
    pub interval: Duration,
}

/// OS-level input simulation and screen capture.
///
/// Every primitive may fail with [`BackendError::FailSafe`] when the operator
/// aborts (e.g. by parking the pointer in a screen corner).
pub trait InputBackend {
    /// Static identifier used in logs.
    fn name(&self) -> &'static str;

    fn click(&mut self, request: &ClickRequest) -> Result<(), BackendError>;

    /// Move the pointer to `(x, y)`, gliding over `duration` when non-zero.
    fn move_to(&mut self, x: i32, y: i32, duration: Duration) -> Result<(), BackendError>;

    /// Type literal text, pausing `interval` between characters.
    fn write(&mut self, text: &str, interval: Duration) -> Result<(), BackendError>;

    /// Press `keys` in order, then release them in reverse order.
    fn hotkey(&mut self, keys: &[String]) -> Result<(), BackendError>;

    /// Capture the screen (or `region`), saving to `path` when given.
    /// Returns the captured image size when known.
    fn screenshot(
        &mut self,
        path: Option<&str>,
        region: Option<Region>,
    ) -> Result<Option<(u32, u32)>, BackendError>;

    fn key_down(&mut self, key: &str) -> Result<(), BackendError>;

    fn key_up(&mut self, key: &str) -> Result<(), BackendError>;

    fn mouse_down(&mut self, position: Option<Point>, button: MouseButton)
    -> Result<(), BackendError>;

    fn mouse_up(&mut self, position: Option<Point>, button: MouseButton) -> Result<(), BackendError>;

    /// Vertical scroll; positive `clicks` scroll up.
    fn scroll(&mut self, clicks: i32, position: Option<Point>) -> Result<(), BackendError>;

    /// Horizontal scroll; positive `clicks` scroll right. Optional capability.
    fn hscroll(&mut self, _clicks: i32, _position: Option<Point>) -> Result<(), BackendError> {
        Err(BackendError::Unsupported("hscroll".into()))
    }
}

/// Builds one backend per run, on the thread that will drive it.
pub type BackendFactory = std::sync::Arc<dyn Fn() -> Box<dyn InputBackend> + Send + Sync>;

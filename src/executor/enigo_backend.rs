use enigo::Keyboard as _;
use enigo::Mouse as _;
use enigo::{Axis, Button as EButton, Coordinate, Direction, Enigo, Key, Settings};
use std::thread;
use std::time::Duration;
use tracing::{info, trace, warn};

use super::backend::{ClickRequest, InputBackend, MouseButton, Point, Region};
use crate::error::BackendError;

/// Interval between intermediate pointer positions during a timed move.
const MOVE_STEP: Duration = Duration::from_millis(10);

/// Input backend on top of enigo, with optional dry-run mode.
/// In dry-run mode, actions are only logged and no real input is simulated.
pub struct EnigoBackend {
    dry_run: bool,
    failsafe: bool,
    enigo: Option<Enigo>,
}

impl EnigoBackend {
    /// - dry_run: when true, only logs instead of simulating real input.
    /// - failsafe: abort when the pointer sits in the top-left screen corner.
    pub fn new(dry_run: bool, failsafe: bool) -> Self {
        Self {
            dry_run,
            failsafe,
            enigo: None,
        }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    fn ensure_enigo(&mut self) -> Result<&mut Enigo, BackendError> {
        if self.enigo.is_none() {
            trace!(target: "autotool::backend", "Initializing Enigo");
            self.enigo = Some(Enigo::new(&Settings::default())?);
        }
        self.enigo
            .as_mut()
            .ok_or_else(|| BackendError::Connection("Enigo is not initialized".into()))
    }

    /// Enigo handle after the failsafe check.
    fn live(&mut self) -> Result<&mut Enigo, BackendError> {
        let failsafe = self.failsafe;
        let enigo = self.ensure_enigo()?;
        if failsafe {
            let (x, y) = enigo.location()?;
            if x <= 0 && y <= 0 {
                warn!(target: "autotool::backend", x, y, "Pointer in failsafe corner");
                return Err(BackendError::FailSafe);
            }
        }
        Ok(enigo)
    }

    fn position_at(&mut self, position: Option<Point>) -> Result<(), BackendError> {
        if let Some((x, y)) = position {
            self.live()?.move_mouse(x, y, Coordinate::Abs)?;
        }
        Ok(())
    }
}

impl InputBackend for EnigoBackend {
    fn name(&self) -> &'static str {
        "enigo"
    }

    fn click(&mut self, request: &ClickRequest) -> Result<(), BackendError> {
        if self.dry_run {
            info!(target: "autotool::backend", ?request, "DRY-RUN click");
            return Ok(());
        }
        self.position_at(request.position)?;
        let enigo = self.live()?;
        let btn = map_mouse_button(request.button);
        trace!(target: "autotool::backend", ?request, "click");
        for i in 0..request.clicks {
            if i > 0 && !request.interval.is_zero() {
                thread::sleep(request.interval);
            }
            enigo.button(btn, Direction::Click)?;
        }
        Ok(())
    }

    fn move_to(&mut self, x: i32, y: i32, duration: Duration) -> Result<(), BackendError> {
        if self.dry_run {
            info!(target: "autotool::backend", x, y, ?duration, "DRY-RUN move_to");
            return Ok(());
        }
        let enigo = self.live()?;
        trace!(target: "autotool::backend", x, y, ?duration, "move_to");
        let steps = i32::try_from(duration.as_millis() / MOVE_STEP.as_millis()).unwrap_or(i32::MAX);
        if steps > 1 {
            let (sx, sy) = enigo.location()?;
            for step in 1..steps {
                let (ix, iy) = interpolate((sx, sy), (x, y), step, steps);
                enigo.move_mouse(ix, iy, Coordinate::Abs)?;
                thread::sleep(MOVE_STEP);
            }
        }
        enigo.move_mouse(x, y, Coordinate::Abs)?;
        Ok(())
    }

    fn write(&mut self, text: &str, interval: Duration) -> Result<(), BackendError> {
        if self.dry_run {
            info!(target: "autotool::backend", %text, ?interval, "DRY-RUN write");
            return Ok(());
        }
        let enigo = self.live()?;
        trace!(target: "autotool::backend", %text, "write");
        if interval.is_zero() {
            enigo.text(text)?;
            return Ok(());
        }
        let mut buf = [0u8; 4];
        for ch in text.chars() {
            enigo.text(ch.encode_utf8(&mut buf))?;
            thread::sleep(interval);
        }
        Ok(())
    }

    fn hotkey(&mut self, keys: &[String]) -> Result<(), BackendError> {
        if self.dry_run {
            info!(target: "autotool::backend", ?keys, "DRY-RUN hotkey");
            return Ok(());
        }
        let parsed = keys
            .iter()
            .map(|k| parse_key(k))
            .collect::<Result<Vec<_>, _>>()?;
        let enigo = self.live()?;
        trace!(target: "autotool::backend", ?keys, "hotkey");
        for key in &parsed {
            enigo.key(*key, Direction::Press)?;
        }
        for key in parsed.iter().rev() {
            enigo.key(*key, Direction::Release)?;
        }
        Ok(())
    }

    fn screenshot(
        &mut self,
        path: Option<&str>,
        region: Option<Region>,
    ) -> Result<Option<(u32, u32)>, BackendError> {
        if self.dry_run {
            info!(target: "autotool::backend", ?path, ?region, "DRY-RUN screenshot");
            return Ok(region.map(|r| (r.width.max(0) as u32, r.height.max(0) as u32)));
        }
        warn!(target: "autotool::backend", ?path, ?region, "screenshot not supported by enigo");
        Err(BackendError::Unsupported("screenshot".into()))
    }

    fn key_down(&mut self, key: &str) -> Result<(), BackendError> {
        if self.dry_run {
            info!(target: "autotool::backend", %key, "DRY-RUN key_down");
            return Ok(());
        }
        let parsed = parse_key(key)?;
        self.live()?.key(parsed, Direction::Press)?;
        Ok(())
    }

    fn key_up(&mut self, key: &str) -> Result<(), BackendError> {
        if self.dry_run {
            info!(target: "autotool::backend", %key, "DRY-RUN key_up");
            return Ok(());
        }
        let parsed = parse_key(key)?;
        self.live()?.key(parsed, Direction::Release)?;
        Ok(())
    }

    fn mouse_down(
        &mut self,
        position: Option<Point>,
        button: MouseButton,
    ) -> Result<(), BackendError> {
        if self.dry_run {
            info!(target: "autotool::backend", ?position, ?button, "DRY-RUN mouse_down");
            return Ok(());
        }
        self.position_at(position)?;
        self.live()?.button(map_mouse_button(button), Direction::Press)?;
        Ok(())
    }

    fn mouse_up(&mut self, position: Option<Point>, button: MouseButton) -> Result<(), BackendError> {
        if self.dry_run {
            info!(target: "autotool::backend", ?position, ?button, "DRY-RUN mouse_up");
            return Ok(());
        }
        self.position_at(position)?;
        self.live()?.button(map_mouse_button(button), Direction::Release)?;
        Ok(())
    }

    fn scroll(&mut self, clicks: i32, position: Option<Point>) -> Result<(), BackendError> {
        if self.dry_run {
            info!(target: "autotool::backend", clicks, ?position, "DRY-RUN scroll");
            return Ok(());
        }
        self.position_at(position)?;
        // enigo scrolls down for positive lengths.
        self.live()?.scroll(-clicks, Axis::Vertical)?;
        Ok(())
    }

    fn hscroll(&mut self, clicks: i32, position: Option<Point>) -> Result<(), BackendError> {
        if self.dry_run {
            info!(target: "autotool::backend", clicks, ?position, "DRY-RUN hscroll");
            return Ok(());
        }
        self.position_at(position)?;
        self.live()?.scroll(clicks, Axis::Horizontal)?;
        Ok(())
    }
}

fn map_mouse_button(btn: MouseButton) -> EButton {
    match btn {
        MouseButton::Left => EButton::Left,
        MouseButton::Middle => EButton::Middle,
        MouseButton::Right => EButton::Right,
    }
}

/// Point `step / steps` of the way from `from` to `to`.
fn interpolate(from: Point, to: Point, step: i32, steps: i32) -> Point {
    let lerp = |a: i32, b: i32| {
        let v = i64::from(a) + (i64::from(b) - i64::from(a)) * i64::from(step) / i64::from(steps.max(1));
        i32::try_from(v).unwrap_or(if v < 0 { i32::MIN } else { i32::MAX })
    };
    (lerp(from.0, to.0), lerp(from.1, to.1))
}

/// Map a key name ("ctrl", "enter", "f5", "a") to an enigo key.
pub fn parse_key(name: &str) -> Result<Key, BackendError> {
    let lower = name.trim().to_ascii_lowercase();
    let key = match lower.as_str() {
        "enter" | "return" => Key::Return,
        "ctrl" | "control" => Key::Control,
        "shift" => Key::Shift,
        "alt" | "option" => Key::Alt,
        "win" | "cmd" | "command" | "super" | "meta" => Key::Meta,
        "tab" => Key::Tab,
        "esc" | "escape" => Key::Escape,
        "space" => Key::Space,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "up" => Key::UpArrow,
        "down" => Key::DownArrow,
        "left" => Key::LeftArrow,
        "right" => Key::RightArrow,
        "home" => Key::Home,
        "end" => Key::End,
        "pageup" | "pgup" => Key::PageUp,
        "pagedown" | "pgdn" => Key::PageDown,
        "capslock" => Key::CapsLock,
        "f1" => Key::F1,
        "f2" => Key::F2,
        "f3" => Key::F3,
        "f4" => Key::F4,
        "f5" => Key::F5,
        "f6" => Key::F6,
        "f7" => Key::F7,
        "f8" => Key::F8,
        "f9" => Key::F9,
        "f10" => Key::F10,
        "f11" => Key::F11,
        "f12" => Key::F12,
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Key::Unicode(ch),
                _ => return Err(BackendError::Input(format!("unknown key '{name}'"))),
            }
        }
    };
    Ok(key)
}

//! Recording backend for tests.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::backend::{ClickRequest, InputBackend, MouseButton, Point, Region};
use crate::error::BackendError;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Click(ClickRequest),
    MoveTo(i32, i32, Duration),
    Write(String, Duration),
    Hotkey(Vec<String>),
    Screenshot(Option<String>, Option<Region>),
    KeyDown(String),
    KeyUp(String),
    MouseDown(Option<Point>, MouseButton),
    MouseUp(Option<Point>, MouseButton),
    Scroll(i32, Option<Point>),
    HScroll(i32, Option<Point>),
}

#[derive(Default)]
struct Shared {
    calls: Mutex<Vec<Call>>,
    failures: Mutex<HashMap<usize, BackendError>>,
}

/// Backend that records every call. Clones share the call log, so a test keeps
/// one handle and gives another to the engine.
#[derive(Clone, Default)]
pub struct MockBackend {
    shared: Arc<Shared>,
    delay: Duration,
    no_hscroll: bool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn without_hscroll(mut self) -> Self {
        self.no_hscroll = true;
        self
    }

    /// Fail the call with zero-based index `index` (counted across all calls).
    pub fn fail_at(&self, index: usize, err: BackendError) {
        self.shared.failures.lock().insert(index, err);
    }

    pub fn fail_next(&self, err: BackendError) {
        let index = self.shared.calls.lock().len();
        self.fail_at(index, err);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.lock().clone()
    }

    pub fn boxed(&self) -> Box<dyn InputBackend> {
        Box::new(self.clone())
    }

    fn record(&self, call: Call) -> Result<(), BackendError> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        let index = {
            let mut calls = self.shared.calls.lock();
            calls.push(call);
            calls.len() - 1
        };
        match self.shared.failures.lock().remove(&index) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl InputBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn click(&mut self, request: &ClickRequest) -> Result<(), BackendError> {
        self.record(Call::Click(request.clone()))
    }

    fn move_to(&mut self, x: i32, y: i32, duration: Duration) -> Result<(), BackendError> {
        self.record(Call::MoveTo(x, y, duration))
    }

    fn write(&mut self, text: &str, interval: Duration) -> Result<(), BackendError> {
        self.record(Call::Write(text.to_string(), interval))
    }

    fn hotkey(&mut self, keys: &[String]) -> Result<(), BackendError> {
        self.record(Call::Hotkey(keys.to_vec()))
    }

    fn screenshot(
        &mut self,
        path: Option<&str>,
        region: Option<Region>,
    ) -> Result<Option<(u32, u32)>, BackendError> {
        self.record(Call::Screenshot(path.map(str::to_string), region))?;
        Ok(Some(match region {
            Some(r) => (r.width.max(0) as u32, r.height.max(0) as u32),
            None => (1920, 1080),
        }))
    }

    fn key_down(&mut self, key: &str) -> Result<(), BackendError> {
        self.record(Call::KeyDown(key.to_string()))
    }

    fn key_up(&mut self, key: &str) -> Result<(), BackendError> {
        self.record(Call::KeyUp(key.to_string()))
    }

    fn mouse_down(
        &mut self,
        position: Option<Point>,
        button: MouseButton,
    ) -> Result<(), BackendError> {
        self.record(Call::MouseDown(position, button))
    }

    fn mouse_up(&mut self, position: Option<Point>, button: MouseButton) -> Result<(), BackendError> {
        self.record(Call::MouseUp(position, button))
    }

    fn scroll(&mut self, clicks: i32, position: Option<Point>) -> Result<(), BackendError> {
        self.record(Call::Scroll(clicks, position))
    }

    fn hscroll(&mut self, clicks: i32, position: Option<Point>) -> Result<(), BackendError> {
        if self.no_hscroll {
            return Err(BackendError::Unsupported("hscroll".into()));
        }
        self.record(Call::HScroll(clicks, position))
    }
}

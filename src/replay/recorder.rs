use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ReplayError;
use crate::model::{Event, unix_now};

/// Filters applied to captured mouse moves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecorderSettings {
    pub record_moves: bool,
    /// Minimum seconds between two retained mouse moves.
    pub min_move_interval: f64,
}

impl Default for RecorderSettings {
    fn default() -> Self {
        Self {
            record_moves: true,
            min_move_interval: 0.0,
        }
    }
}

#[derive(Serialize)]
struct Export<'a> {
    version: u32,
    recorded_at: f64,
    events: &'a [Event],
}

/// Collects captured input events and stamps each with its `delta` from the
/// previous retained event.
#[derive(Debug, Default)]
pub struct Recorder {
    settings: RecorderSettings,
    events: Vec<Event>,
    recording: bool,
    last_ts: Option<f64>,
    last_move_ts: Option<f64>,
    started_at: Option<f64>,
}

impl Recorder {
    pub fn new(settings: RecorderSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// Clear previous events and begin recording.
    pub fn start(&mut self) {
        self.events.clear();
        self.last_ts = None;
        self.last_move_ts = None;
        self.recording = true;
        self.started_at = Some(unix_now());
        info!(target: "autotool::recorder", "Recorder started");
    }

    pub fn stop(&mut self) -> &[Event] {
        self.recording = false;
        info!(target: "autotool::recorder", events = self.events.len(), "Recorder stopped");
        &self.events
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Record `event`; returns whether it was retained.
    pub fn record_event(&mut self, mut event: Event) -> bool {
        if !self.recording || !self.should_record(&event) {
            return false;
        }
        let delta = self.last_ts.map_or(0.0, |last| (event.ts - last).max(0.0));
        self.last_ts = Some(event.ts);
        if event.is_mouse_move() {
            self.last_move_ts = Some(event.ts);
        }
        event.delta = Some(delta);
        self.events.push(event);
        true
    }

    /// Coerce a raw event map and record it.
    pub fn record_value(&mut self, value: &Value) -> Result<bool, ReplayError> {
        if !self.recording {
            return Ok(false);
        }
        Ok(self.record_event(Event::from_value(value)?))
    }

    /// Write `{version, recorded_at, events}` as pretty JSON.
    pub fn export(&self, path: impl AsRef<Path>) -> Result<PathBuf, ReplayError> {
        if self.events.is_empty() {
            return Err(ReplayError::NothingRecorded);
        }
        let path = path.as_ref();
        let payload = Export {
            version: 1,
            recorded_at: self.started_at.unwrap_or_else(unix_now),
            events: &self.events,
        };
        let json = serde_json::to_string_pretty(&payload)?;
        std::fs::write(path, json)?;
        info!(target: "autotool::recorder", path = %path.display(), events = self.events.len(), "Recording exported");
        Ok(path.to_path_buf())
    }

    fn should_record(&self, event: &Event) -> bool {
        if !event.is_mouse_move() {
            return true;
        }
        if !self.settings.record_moves {
            return false;
        }
        let throttled = self
            .last_move_ts
            .is_some_and(|last| event.ts - last < self.settings.min_move_interval);
        if throttled {
            debug!(target: "autotool::recorder", ts = event.ts, "Mouse move throttled");
        }
        !throttled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(kind: &str, action: &str, ts: f64) -> Value {
        json!({"type": kind, "action": action, "ts": ts, "payload": {"x": 1, "y": 2}})
    }

    #[test]
    fn deltas_are_relative_and_never_negative() {
        let mut recorder = Recorder::default();
        assert!(!recorder.record_value(&event("mouse", "move", 1.0)).unwrap());

        recorder.start();
        assert!(recorder.record_value(&event("mouse", "move", 10.0)).unwrap());
        assert!(recorder.record_value(&event("keyboard", "press", 10.5)).unwrap());
        assert!(recorder.record_value(&event("keyboard", "release", 10.25)).unwrap());
        let deltas: Vec<f64> = recorder.stop().iter().filter_map(|e| e.delta).collect();
        assert_eq!(deltas, vec![0.0, 0.5, 0.0]);
        assert!(!recorder.is_recording());
    }

    #[test]
    fn move_filters() {
        let mut recorder = Recorder::new(RecorderSettings {
            record_moves: true,
            min_move_interval: 0.5,
        });
        recorder.start();
        assert!(recorder.record_value(&event("mouse", "move", 1.0)).unwrap());
        assert!(!recorder.record_value(&event("mouse", "move", 1.2)).unwrap());
        assert!(recorder.record_value(&event("mouse", "click", 1.3)).unwrap());
        assert!(recorder.record_value(&event("mouse", "move", 1.6)).unwrap());
        assert_eq!(recorder.events().len(), 3);

        let mut no_moves = Recorder::new(RecorderSettings {
            record_moves: false,
            min_move_interval: 0.0,
        });
        no_moves.start();
        assert!(!no_moves.record_value(&event("mouse", "move", 1.0)).unwrap());
        assert!(no_moves.record_value(&event("mouse", "scroll", 1.0)).unwrap());
    }

    #[test]
    fn invalid_events_are_rejected() {
        let mut recorder = Recorder::default();
        recorder.start();
        assert!(recorder.record_value(&json!({"type": "mouse"})).is_err());
        assert!(recorder.record_value(&json!(["mouse"])).is_err());
    }

    #[test]
    fn export_writes_envelope() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut recorder = Recorder::default();
        recorder.start();
        assert!(matches!(recorder.export(&path), Err(ReplayError::NothingRecorded)));

        recorder.record_value(&event("mouse", "move", 3.0)).unwrap();
        recorder.export(&path).unwrap();
        let written: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["version"], json!(1));
        assert_eq!(written["events"][0]["type"], json!("mouse"));
        assert_eq!(written["events"][0]["delta"], json!(0.0));
    }
}

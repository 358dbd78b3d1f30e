use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::mapping::{ItemShape, Mapped, classify, event_to_action};
use crate::error::ReplayError;
use crate::executor::{AutomationEngine, ExecutionControl, params};
use crate::model::ExecutionResult;
use crate::model::action::id_from_value;

/// Replayer lifecycle.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayState {
    #[default]
    Idle,
    Running,
    Paused,
    Stopped,
}

impl ReplayState {
    pub fn as_str(self) -> &'static str {
        match self {
            ReplayState::Idle => "idle",
            ReplayState::Running => "running",
            ReplayState::Paused => "paused",
            ReplayState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for ReplayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub type StateObserver = Arc<dyn Fn(ReplayState) + Send + Sync>;
pub type ResultObserver = Box<dyn FnMut(&ExecutionResult) + Send>;

#[derive(Default)]
struct Shared {
    state: Mutex<ReplayState>,
    observer: RwLock<Option<StateObserver>>,
}

/// Thread-safe handle for pausing, resuming or stopping a running replay.
#[derive(Clone)]
pub struct ReplayHandle {
    shared: Arc<Shared>,
    control: ExecutionControl,
}

impl ReplayHandle {
    pub fn state(&self) -> ReplayState {
        *self.shared.state.lock()
    }

    /// Only applies while running.
    pub fn pause(&self) {
        if self.transition(ReplayState::Running, ReplayState::Paused) {
            self.control.pause();
            info!(target: "autotool::replay", "Replay paused");
        }
    }

    /// Only applies while paused.
    pub fn resume(&self) {
        if self.transition(ReplayState::Paused, ReplayState::Running) {
            self.control.resume();
            info!(target: "autotool::replay", "Replay resumed");
        }
    }

    pub fn stop(&self) {
        self.control.stop();
        self.set_state(ReplayState::Stopped);
        warn!(target: "autotool::replay", "Replay stopped");
    }

    fn transition(&self, from: ReplayState, to: ReplayState) -> bool {
        {
            let mut state = self.shared.state.lock();
            if *state != from {
                return false;
            }
            *state = to;
        }
        self.notify(to);
        true
    }

    fn set_state(&self, to: ReplayState) {
        *self.shared.state.lock() = to;
        self.notify(to);
    }

    fn notify(&self, state: ReplayState) {
        let observer = self.shared.observer.read().clone();
        if let Some(observer) = observer {
            observer(state);
        }
    }
}

/// Timed playback of recorded events or action lists.
///
/// Items carrying a `delta` are delayed by `delta / speed` seconds before
/// execution. Pause and stop share the engine's [`ExecutionControl`], so a stop
/// also cuts short an in-progress delay or `wait` action.
pub struct Replayer {
    engine: AutomationEngine,
    handle: ReplayHandle,
    on_result: Option<ResultObserver>,
    items: Option<Vec<Value>>,
}

impl Replayer {
    pub fn new(engine: AutomationEngine) -> Self {
        let control = engine.control();
        Self {
            engine,
            handle: ReplayHandle {
                shared: Arc::new(Shared::default()),
                control,
            },
            on_result: None,
            items: None,
        }
    }

    pub fn with_state_observer<F>(self, observer: F) -> Self
    where
        F: Fn(ReplayState) + Send + Sync + 'static,
    {
        *self.handle.shared.observer.write() = Some(Arc::new(observer));
        self
    }

    pub fn with_result_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&ExecutionResult) + Send + 'static,
    {
        self.on_result = Some(Box::new(observer));
        self
    }

    pub fn handle(&self) -> ReplayHandle {
        self.handle.clone()
    }

    pub fn state(&self) -> ReplayState {
        self.handle.state()
    }

    pub fn pause(&self) {
        self.handle.pause();
    }

    pub fn resume(&self) {
        self.handle.resume();
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    pub fn loaded(&self) -> Option<&[Value]> {
        self.items.as_deref()
    }

    /// Load replay items from a JSON file holding either a list or
    /// `{"events": [...]}`.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<&[Value], ReplayError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ReplayError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        let data: Value = serde_json::from_str(&content)?;
        let items = match data {
            Value::Object(mut map) if map.contains_key("events") => {
                map.remove("events").unwrap_or(Value::Null)
            }
            other => other,
        };
        let Value::Array(items) = items else {
            return Err(ReplayError::InvalidPayload);
        };
        info!(target: "autotool::replay", path = %path.display(), items = items.len(), "Replay file loaded");
        Ok(self.items.insert(items).as_slice())
    }

    /// Play `items`, or the loaded items when `None`.
    ///
    /// Returns one result per item played. With `stop_on_error` the first
    /// failed result halts playback and leaves the replayer `stopped`.
    pub fn play(
        &mut self,
        items: Option<&[Value]>,
        speed: f64,
        stop_on_error: bool,
    ) -> Result<Vec<ExecutionResult>, ReplayError> {
        if !(speed > 0.0) {
            return Err(ReplayError::InvalidSpeed);
        }
        let items: Vec<Value> = match items {
            Some(items) => items.to_vec(),
            None => self.items.clone().ok_or(ReplayError::NothingLoaded)?,
        };

        let control = self.engine.control();
        control.reset();
        self.handle.set_state(ReplayState::Running);
        info!(target: "autotool::replay", items = items.len(), speed, "Replay started");

        let mut results = Vec::with_capacity(items.len());
        for item in &items {
            if control.wait_while_paused() {
                break;
            }
            let Some(result) = self.play_item(item, speed, &control) else {
                debug!(target: "autotool::replay", "Stopped during delay");
                break;
            };
            if let Some(observer) = self.on_result.as_mut() {
                observer(&result);
            }
            let failed = !result.success;
            results.push(result);
            if stop_on_error && failed {
                control.stop();
                break;
            }
        }

        let end = if control.is_stopped() {
            ReplayState::Stopped
        } else {
            ReplayState::Idle
        };
        self.handle.set_state(end);
        info!(target: "autotool::replay", results = results.len(), state = %end, "Replay finished");
        Ok(results)
    }

    /// `None` when a stop request interrupted the item's delay.
    fn play_item(
        &mut self,
        item: &Value,
        speed: f64,
        control: &ExecutionControl,
    ) -> Option<ExecutionResult> {
        let Some(map) = item.as_object() else {
            return Some(ExecutionResult::failed("unknown", "Invalid replay item"));
        };
        let item_id = || {
            map.get("id")
                .and_then(id_from_value)
                .unwrap_or_else(|| "unknown".to_string())
        };
        let shape = classify(map);
        if shape == ItemShape::Unknown {
            return Some(ExecutionResult::failed(item_id(), "Unknown replay item"));
        }

        let delta = map.get("delta").and_then(Value::as_f64).unwrap_or(0.0);
        if delta > 0.0 {
            let Ok(delay) = params::scale(delta, speed) else {
                warn!(target: "autotool::replay", delta, speed, "Replay delay out of range");
                return Some(
                    ExecutionResult::failed(item_id(), format!("Invalid replay delay: {delta}"))
                        .with_entry("error", "InvalidAction"),
                );
            };
            if control.sleep(delay) {
                return None;
            }
        }

        Some(match shape {
            ItemShape::Action => self.engine.execute_value(item, speed),
            _ => match event_to_action(map) {
                Mapped::Action(action) => self.engine.execute(&action, speed),
                Mapped::Dropped => ExecutionResult::ok(item_id())
                    .with_message("Event dropped")
                    .with_entry("dropped", true),
                Mapped::Unsupported => ExecutionResult::failed(item_id(), "Unsupported event"),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::mock::{Call, MockBackend};
    use crate::executor::MouseButton;
    use serde_json::json;
    use std::io::Write as _;
    use std::thread;
    use std::time::{Duration, Instant};

    fn replayer(mock: &MockBackend) -> Replayer {
        Replayer::new(AutomationEngine::new(mock.boxed()))
    }

    #[test]
    fn plays_actions_and_events() {
        let mock = MockBackend::new();
        let mut replayer = replayer(&mock);
        let items = vec![
            json!({"type": "move", "params": {"x": 1, "y": 1}}),
            json!({"id": "e1", "type": "mouse", "action": "click", "payload": {"x": 1, "y": 1, "pressed": true}}),
            json!({"id": "e2", "type": "mouse", "action": "click", "payload": {}}),
            json!({"id": "e3", "type": "mouse", "action": "hover", "payload": {}}),
            json!({"id": "e4", "foo": "bar"}),
            json!(42),
        ];
        let results = replayer.play(Some(&items), 1.0, false).unwrap();
        assert_eq!(results.len(), 6);
        assert!(results[0].success);
        assert_eq!(results[1].action_id, "e1");
        assert!(results[2].success);
        assert_eq!(results[2].message, "Event dropped");
        assert_eq!(results[3].message, "Unsupported event");
        assert_eq!(results[4].message, "Unknown replay item");
        assert_eq!(results[5].action_id, "unknown");
        assert_eq!(
            mock.calls(),
            vec![
                Call::MoveTo(1, 1, Duration::ZERO),
                Call::MouseDown(Some((1, 1)), MouseButton::Left),
            ]
        );
        assert_eq!(replayer.state(), ReplayState::Idle);
    }

    #[test]
    fn rejects_bad_speed_and_missing_items() {
        let mut replayer = replayer(&MockBackend::new());
        assert!(matches!(replayer.play(Some(&[]), 0.0, false), Err(ReplayError::InvalidSpeed)));
        assert!(matches!(replayer.play(None, 1.0, false), Err(ReplayError::NothingLoaded)));
    }

    #[test]
    fn stop_on_error_halts_and_stops() {
        let mock = MockBackend::new();
        let states = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::new(Mutex::new(0usize));
        let mut replayer = {
            let states = Arc::clone(&states);
            let seen = Arc::clone(&seen);
            replayer(&mock)
                .with_state_observer(move |s| states.lock().push(s))
                .with_result_observer(move |_| *seen.lock() += 1)
        };
        let items = vec![
            json!({"type": "move", "params": {"x": 1}}),
            json!({"type": "click"}),
        ];
        let results = replayer.play(Some(&items), 1.0, true).unwrap();
        assert_eq!(results.len(), 1);
        assert!(mock.calls().is_empty());
        assert_eq!(replayer.state(), ReplayState::Stopped);
        assert_eq!(*states.lock(), vec![ReplayState::Running, ReplayState::Stopped]);
        assert_eq!(*seen.lock(), 1);

        let results = replayer.play(Some(&items[1..]), 1.0, true).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(replayer.state(), ReplayState::Idle);
    }

    #[test]
    fn delta_is_scaled_by_speed() {
        let mock = MockBackend::new();
        let mut replayer = replayer(&mock);
        let items = vec![json!({"type": "click", "delta": 0.2})];
        let started = Instant::now();
        replayer.play(Some(&items), 4.0, false).unwrap();
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(190));
    }

    #[test]
    fn out_of_range_delta_fails_the_item() {
        let mock = MockBackend::new();
        let mut replayer = replayer(&mock);
        let items = vec![
            json!({"id": "far", "type": "click", "delta": 1.0e30}),
            json!({"type": "click"}),
        ];
        let results = replayer.play(Some(&items), 1.0, false).unwrap();
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert_eq!(results[0].action_id, "far");
        assert_eq!(results[0].error_kind(), Some("InvalidAction"));
        assert!(results[1].success);
        assert_eq!(mock.calls().len(), 1);
    }

    #[test]
    fn stop_interrupts_delay_and_pause_only_while_running() {
        let mock = MockBackend::new();
        let mut replayer = replayer(&mock);
        let handle = replayer.handle();
        handle.pause();
        assert_eq!(handle.state(), ReplayState::Idle);

        let stopper = {
            let handle = handle.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                handle.pause();
                let paused = handle.state();
                handle.resume();
                handle.stop();
                paused
            })
        };
        let items = vec![json!({"type": "click", "delta": 30.0}), json!({"type": "click"})];
        let results = replayer.play(Some(&items), 1.0, false).unwrap();
        assert_eq!(stopper.join().unwrap(), ReplayState::Paused);
        assert!(results.is_empty());
        assert!(mock.calls().is_empty());
        assert_eq!(replayer.state(), ReplayState::Stopped);
    }

    #[test]
    fn loads_lists_and_event_envelopes() {
        let mut replayer = replayer(&MockBackend::new());
        let mut list = tempfile::NamedTempFile::new().unwrap();
        write!(list, r#"[{{"type": "click"}}]"#).unwrap();
        assert_eq!(replayer.load(list.path()).unwrap().len(), 1);

        let mut envelope = tempfile::NamedTempFile::new().unwrap();
        write!(envelope, r#"{{"version": 1, "events": [{{"type": "mouse", "action": "move"}}, {{"type": "click"}}]}}"#).unwrap();
        assert_eq!(replayer.load(envelope.path()).unwrap().len(), 2);
        assert_eq!(replayer.play(None, 1.0, false).unwrap().len(), 2);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, r#"{{"events": 3}}"#).unwrap();
        assert!(matches!(replayer.load(bad.path()), Err(ReplayError::InvalidPayload)));
        assert!(matches!(
            replayer.load("/definitely/not/here.json"),
            Err(ReplayError::NotFound(_))
        ));
    }
}

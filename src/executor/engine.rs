use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

use super::backend::{ClickRequest, InputBackend};
use super::control::ExecutionControl;
use super::params;
use super::registry::{ActionHandler, ActionRegistry};
use crate::error::{ActionError, BackendError};
use crate::model::action::id_from_value;
use crate::model::{Action, ActionKind, ExecutionResult, Params};

/// Engine pacing knobs taken from the `automation` config section.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EngineSettings {
    /// Pause after every dispatched action. Not affected by speed.
    pub pause_interval: Duration,
}

enum Target {
    Primitive(ActionKind),
    Extension(ActionHandler),
}

enum Fault {
    Action(ActionError),
    Backend(BackendError),
}

impl From<ActionError> for Fault {
    fn from(err: ActionError) -> Self {
        Fault::Action(err)
    }
}

impl From<BackendError> for Fault {
    fn from(err: BackendError) -> Self {
        Fault::Backend(err)
    }
}

type Outcome = Result<Option<Params>, Fault>;

/// Executes actions against an [`InputBackend`].
///
/// Every expected failure (bad params, unsupported type, backend error,
/// failsafe, stop) is folded into a failed [`ExecutionResult`]; nothing here
/// returns an error to the caller. Pause/stop go through the shared
/// [`ExecutionControl`], so they can be issued from any thread via
/// [`AutomationEngine::control`].
pub struct AutomationEngine {
    backend: Box<dyn InputBackend>,
    registry: Arc<ActionRegistry>,
    control: ExecutionControl,
    settings: EngineSettings,
}

impl AutomationEngine {
    pub fn new(backend: Box<dyn InputBackend>) -> Self {
        Self {
            backend,
            registry: Arc::new(ActionRegistry::new()),
            control: ExecutionControl::new(),
            settings: EngineSettings::default(),
        }
    }

    pub fn with_registry(mut self, registry: Arc<ActionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Drive this engine from an existing control handle.
    pub fn with_control(mut self, control: ExecutionControl) -> Self {
        self.control = control;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn control(&self) -> ExecutionControl {
        self.control.clone()
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn pause(&self) {
        debug!(target: "autotool::engine", "Automation engine paused");
        self.control.pause();
    }

    pub fn resume(&self) {
        debug!(target: "autotool::engine", "Automation engine resumed");
        self.control.resume();
    }

    pub fn stop(&self) {
        warn!(target: "autotool::engine", "Automation engine stopped");
        self.control.stop();
    }

    /// Clear pause/stop so the engine can run again after a stop.
    pub fn reset(&self) {
        self.control.reset();
    }

    /// Parse `descriptor` and execute it. A descriptor that does not parse yields
    /// a failed result tagged with its `id`, or `"unknown"`.
    pub fn execute_value(&mut self, descriptor: &Value, speed: f64) -> ExecutionResult {
        match Action::from_value(descriptor) {
            Ok(action) => self.execute(&action, speed),
            Err(err) => {
                let action_id = descriptor
                    .get("id")
                    .and_then(id_from_value)
                    .unwrap_or_else(|| "unknown".to_string());
                warn!(target: "autotool::engine", %action_id, error = %err, "Invalid action descriptor");
                ExecutionResult::failed(action_id, err.to_string()).with_entry("error", "InvalidAction")
            }
        }
    }

    /// Execute one action, scaling time-valued params by `1 / speed`.
    pub fn execute(&mut self, action: &Action, speed: f64) -> ExecutionResult {
        let target = match action.kind() {
            Some(kind) => Target::Primitive(kind),
            None => match self.registry.get(action.action_type()) {
                Some(handler) => Target::Extension(handler),
                None => {
                    warn!(target: "autotool::engine", action_type = action.action_type(), "Unsupported action type");
                    return ExecutionResult::failed(
                        action.id(),
                        format!("Unsupported action type: {}", action.action_type()),
                    );
                }
            },
        };
        if self.control.is_stopped() {
            warn!(target: "autotool::engine", id = action.id(), "Execution stopped before action");
            return ExecutionResult::failed(action.id(), "Execution stopped");
        }
        if !(speed > 0.0) {
            return ExecutionResult::failed(action.id(), "Speed must be greater than 0")
                .with_entry("error", "InvalidAction");
        }

        info!(target: "autotool::audit", id = action.id(), action_type = action.action_type(), "action_start");
        let started = Instant::now();
        let mut attempts: u32 = 0;
        let outcome = loop {
            attempts += 1;
            let outcome = match &target {
                Target::Primitive(kind) => self.dispatch(*kind, action.params(), speed),
                Target::Extension(handler) => handler(action.params()).map_err(Fault::from),
            };
            match outcome {
                Err(Fault::Backend(err))
                    if err.is_transient()
                        && attempts <= action.retry()
                        && !self.control.is_stopped() =>
                {
                    warn!(target: "autotool::engine", id = action.id(), attempt = attempts, error = %err, "Retrying action");
                }
                other => break other,
            }
        };

        let mut result = match outcome {
            Ok(Some(data)) => ExecutionResult::ok(action.id()).with_data(data),
            Ok(None) => ExecutionResult::ok(action.id()),
            Err(Fault::Backend(BackendError::FailSafe)) => {
                warn!(target: "autotool::engine", id = action.id(), "Failsafe triggered");
                ExecutionResult::failed(action.id(), "Failsafe triggered")
                    .with_entry("error", BackendError::FailSafe.kind())
            }
            Err(Fault::Backend(err)) => {
                error!(target: "autotool::engine", id = action.id(), error = %err, "Action failed");
                ExecutionResult::failed(action.id(), err.to_string()).with_entry("error", err.kind())
            }
            Err(Fault::Action(err)) => {
                error!(target: "autotool::engine", id = action.id(), error = %err, "Action failed");
                ExecutionResult::failed(action.id(), err.to_string())
                    .with_entry("error", "InvalidAction")
            }
        };
        if attempts > 1 {
            result = result.with_entry("attempts", attempts);
        }
        if let Some(timeout) = action.timeout() {
            let elapsed = started.elapsed();
            if elapsed > timeout {
                warn!(target: "autotool::engine", id = action.id(), ?elapsed, ?timeout, "Action exceeded its timeout");
            }
        }
        info!(target: "autotool::audit", id = action.id(), success = result.success, "action_end");

        if !self.settings.pause_interval.is_zero() {
            self.control.sleep(self.settings.pause_interval);
        }
        result
    }

    /// Execute `actions` in order. Blocks while paused; once stopped, returns
    /// the results gathered so far without dispatching the rest.
    pub fn execute_sequence(&mut self, actions: &[Action], speed: f64) -> Vec<ExecutionResult> {
        let mut results = Vec::with_capacity(actions.len());
        for action in actions {
            if self.control.wait_while_paused() {
                debug!(target: "autotool::engine", completed = results.len(), "Sequence stopped");
                break;
            }
            results.push(self.execute(action, speed));
        }
        results
    }

    fn dispatch(&mut self, kind: ActionKind, p: &Params, speed: f64) -> Outcome {
        trace!(target: "autotool::engine", action_type = kind.as_str(), backend = self.backend.name(), "dispatch");
        match kind {
            ActionKind::Click => {
                let request = ClickRequest {
                    position: params::position(p)?,
                    button: params::button(p)?,
                    clicks: params::u32_or(p, "clicks", 1)?,
                    interval: params::scaled(p, "interval", speed)?,
                };
                self.backend.click(&request)?;
                Ok(Some(echo(p, &["x", "y"])))
            }
            ActionKind::Move => {
                let (x, y) = params::position(p)?
                    .ok_or_else(|| ActionError::new("Move action requires x and y"))?;
                let duration = params::scaled(p, "duration", speed)?;
                self.backend.move_to(x, y, duration)?;
                Ok(Some(echo(p, &["x", "y"])))
            }
            ActionKind::Type => {
                let text = match p.get("text") {
                    None | Some(Value::Null) => {
                        return Err(ActionError::new("Type action requires text").into());
                    }
                    Some(value) => scalar_string(value),
                };
                let interval = params::scaled(p, "interval", speed)?;
                self.backend.write(&text, interval)?;
                Ok(None)
            }
            ActionKind::Hotkey => {
                let keys = hotkey_keys(p)?;
                self.backend.hotkey(&keys)?;
                Ok(None)
            }
            ActionKind::Wait => {
                let seconds = params::f64_or(p, "seconds", 0.0)?;
                let duration = params::scale(seconds, speed)
                    .map_err(|_| ActionError::new("seconds must be a non-negative number"))?;
                let mut data = Params::new();
                data.insert("seconds".into(), Value::from(seconds));
                if self.control.sleep(duration) {
                    data.insert("interrupted".into(), Value::Bool(true));
                }
                Ok(Some(data))
            }
            ActionKind::Screenshot => {
                let path = params::opt_text(p, "path");
                let region = params::region(p)?;
                let size = self.backend.screenshot(path.as_deref(), region)?;
                let mut data = Params::new();
                data.insert("region".into(), region.map_or(Value::Null, |r| r.to_value()));
                data.insert("path".into(), path.clone().map_or(Value::Null, Value::String));
                if path.is_none() {
                    data.insert(
                        "size".into(),
                        size.map_or(Value::Null, |(w, h)| Value::from(vec![w, h])),
                    );
                }
                Ok(Some(data))
            }
            ActionKind::KeyDown => {
                let key = params::opt_text(p, "key")
                    .ok_or_else(|| ActionError::new("Key down action requires key"))?;
                self.backend.key_down(&key)?;
                Ok(None)
            }
            ActionKind::KeyUp => {
                let key = params::opt_text(p, "key")
                    .ok_or_else(|| ActionError::new("Key up action requires key"))?;
                self.backend.key_up(&key)?;
                Ok(None)
            }
            ActionKind::MouseDown => {
                self.backend
                    .mouse_down(params::position(p)?, params::button(p)?)?;
                Ok(None)
            }
            ActionKind::MouseUp => {
                self.backend.mouse_up(params::position(p)?, params::button(p)?)?;
                Ok(None)
            }
            ActionKind::Scroll => {
                let position = params::position(p)?;
                let dx = params::i32_or(p, "dx", 0)?;
                let dy = params::i32_or(p, "dy", 0)?;
                if dy != 0 {
                    self.backend.scroll(dy, position)?;
                }
                if dx != 0 {
                    match self.backend.hscroll(dx, position) {
                        Err(BackendError::Unsupported(_)) => {
                            debug!(target: "autotool::engine", backend = self.backend.name(), "Horizontal scroll unsupported; skipped");
                        }
                        other => other?,
                    }
                }
                let mut data = echo(p, &["x", "y"]);
                data.insert("dx".into(), Value::from(dx));
                data.insert("dy".into(), Value::from(dy));
                Ok(Some(data))
            }
        }
    }
}

/// Copy `keys` from the params into result data, `null` when absent.
fn echo(p: &Params, keys: &[&str]) -> Params {
    keys.iter()
        .map(|k| (k.to_string(), p.get(*k).cloned().unwrap_or(Value::Null)))
        .collect()
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `combo` ("ctrl+c") wins over `keys` (list or combo string).
fn hotkey_keys(p: &Params) -> Result<Vec<String>, ActionError> {
    let split = |s: &str| -> Vec<String> {
        s.split('+')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect()
    };
    let present = |key: &str| p.get(key).filter(|v| !v.is_null());
    let keys = match (present("combo"), present("keys")) {
        (Some(combo), _) => split(&scalar_string(combo)),
        (None, Some(Value::String(s))) => split(s),
        (None, Some(Value::Array(items))) => items
            .iter()
            .map(scalar_string)
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect(),
        (None, Some(_)) => return Err(ActionError::new("Hotkey keys must be a list or combo string")),
        (None, None) => return Err(ActionError::new("Hotkey action requires keys or combo")),
    };
    if keys.is_empty() {
        return Err(ActionError::new("Hotkey action requires at least one key"));
    }
    Ok(keys)
}

#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

/*!
Automation engine and its input backends.

This module wires together:
- `backend`: the `InputBackend` capability (click, move, type, hotkey, screenshot, ...)
- `enigo_backend`: the enigo-based OS implementation, with dry-run mode
- `engine`: `AutomationEngine`, which executes actions with speed scaling,
  retries and cooperative pause/stop
- `control`: the pause/stop flags shared between an engine and its controllers
- `registry`: extension action types beyond the built-in primitives
- `safety`: emergency-stop fan-out

Example:
```no_run
use autotool::executor::{AutomationEngine, EnigoBackend};
use serde_json::json;

let mut engine = AutomationEngine::new(Box::new(EnigoBackend::new(true, true)));
let result = engine.execute_value(&json!({"type": "click", "params": {"x": 10, "y": 10}}), 1.0);
assert!(result.success);
```
*/

pub mod backend;
pub mod control;
pub mod enigo_backend;
pub mod engine;
pub mod params;
pub mod registry;
pub mod safety;

#[cfg(test)]
pub mod mock;

pub use backend::{BackendFactory, ClickRequest, InputBackend, MouseButton, Point, Region};
pub use control::ExecutionControl;
pub use engine::{AutomationEngine, EngineSettings};
pub use enigo_backend::EnigoBackend;
pub use registry::{ActionHandler, ActionRegistry};
pub use safety::SafetyController;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

use crate::error::ActionError;

/// Key→value parameter map carried by actions, results and events.
pub type Params = Map<String, Value>;

/// The primitive action types understood by the automation engine.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Click,
    Move,
    Type,
    Hotkey,
    Wait,
    Screenshot,
    KeyDown,
    KeyUp,
    MouseDown,
    MouseUp,
    Scroll,
}

impl ActionKind {
    pub const ALL: [ActionKind; 11] = [
        ActionKind::Click,
        ActionKind::Move,
        ActionKind::Type,
        ActionKind::Hotkey,
        ActionKind::Wait,
        ActionKind::Screenshot,
        ActionKind::KeyDown,
        ActionKind::KeyUp,
        ActionKind::MouseDown,
        ActionKind::MouseUp,
        ActionKind::Scroll,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Click => "click",
            ActionKind::Move => "move",
            ActionKind::Type => "type",
            ActionKind::Hotkey => "hotkey",
            ActionKind::Wait => "wait",
            ActionKind::Screenshot => "screenshot",
            ActionKind::KeyDown => "key_down",
            ActionKind::KeyUp => "key_up",
            ActionKind::MouseDown => "mouse_down",
            ActionKind::MouseUp => "mouse_up",
            ActionKind::Scroll => "scroll",
        }
    }

    /// Look up a primitive by its wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    pub fn is_primitive(name: &str) -> bool {
        Self::parse(name).is_some()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable unit of work: a type, its parameters, and timing/retry metadata.
///
/// The `type` is kept as a string so that types contributed through the action
/// registry can flow through compilation and replay unchanged; use
/// [`Action::kind`] to classify primitives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    id: String,
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    params: Params,
    #[serde(default)]
    timeout: Option<f64>,
    #[serde(default)]
    retry: u32,
}

impl Action {
    /// Build an action with a freshly generated id.
    pub fn create(action_type: impl Into<String>, params: Params) -> Self {
        Self {
            id: new_id(),
            action_type: action_type.into(),
            params,
            timeout: None,
            retry: 0,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, seconds: f64) -> Self {
        self.timeout = Some(seconds);
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Parse an action descriptor map.
    ///
    /// Accepted keys: `type` (required), `id`, `params` (object), `timeout`
    /// (seconds, non-negative) and `retry` (non-negative integer).
    pub fn from_value(value: &Value) -> Result<Self, ActionError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ActionError::new("Action must be a dict-like object"))?;

        let action_type = match obj.get("type") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            None | Some(Value::Null) | Some(Value::String(_)) => {
                return Err(ActionError::new("Action type is required"));
            }
            Some(other) => {
                return Err(ActionError::new(format!(
                    "Action type must be a string, got {other}"
                )));
            }
        };

        let params = match obj.get("params") {
            None | Some(Value::Null) => Params::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => return Err(ActionError::new("Action params must be an object")),
        };

        let timeout = match obj.get("timeout") {
            None | Some(Value::Null) => None,
            Some(v) => match v.as_f64() {
                Some(secs) if secs.is_finite() && secs >= 0.0 => Some(secs),
                _ => {
                    return Err(ActionError::new(
                        "Action timeout must be a non-negative number",
                    ));
                }
            },
        };

        let retry = match obj.get("retry") {
            None | Some(Value::Null) => 0,
            Some(v) => v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| ActionError::new("Action retry must be a non-negative integer"))?,
        };

        let id = obj.get("id").and_then(id_from_value).unwrap_or_else(new_id);

        Ok(Self {
            id,
            action_type,
            params,
            timeout,
            retry,
        })
    }

    /// Serialize to a plain descriptor map.
    pub fn to_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("id".into(), Value::String(self.id.clone()));
        obj.insert("type".into(), Value::String(self.action_type.clone()));
        obj.insert("params".into(), Value::Object(self.params.clone()));
        obj.insert(
            "timeout".into(),
            self.timeout
                .and_then(serde_json::Number::from_f64)
                .map_or(Value::Null, Value::Number),
        );
        obj.insert("retry".into(), Value::from(self.retry));
        Value::Object(obj)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn action_type(&self) -> &str {
        &self.action_type
    }

    /// The primitive kind, or `None` for registry-provided types.
    pub fn kind(&self) -> Option<ActionKind> {
        ActionKind::parse(&self.action_type)
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Informational timeout; the engine logs overruns but does not abort.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout.and_then(|s| Duration::try_from_secs_f64(s).ok())
    }

    pub fn retry(&self) -> u32 {
        self.retry
    }
}

impl TryFrom<&Value> for Action {
    type Error = ActionError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Action::from_value(value)
    }
}

/// Best-effort id extraction from a descriptor field (strings and numbers).
pub(crate) fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub(crate) fn new_id() -> String {
    Uuid::new_v4().to_string()
}

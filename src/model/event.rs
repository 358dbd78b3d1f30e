use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{SystemTime, UNIX_EPOCH};

use super::action::{Params, id_from_value, new_id};
use crate::error::ReplayError;

/// Device class of a captured input event.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Mouse,
    Keyboard,
}

impl EventKind {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "mouse" => Some(EventKind::Mouse),
            "keyboard" => Some(EventKind::Keyboard),
            _ => None,
        }
    }
}

/// A captured low-level input event.
///
/// `delta` is filled in by the recorder: seconds since the previous retained event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(alias = "timestamp")]
    pub ts: f64,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub action: String,
    #[serde(default)]
    pub payload: Params,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<f64>,
}

impl Event {
    pub fn create(kind: EventKind, action: impl Into<String>, payload: Params) -> Self {
        Self {
            id: new_id(),
            ts: unix_now(),
            kind,
            action: action.into(),
            payload,
            delta: None,
        }
    }

    /// Coerce a raw event map (as produced by capture collaborators).
    ///
    /// `type` and `action` are required; `id` and `ts`/`timestamp` default to a
    /// fresh id and the current time.
    pub fn from_value(value: &Value) -> Result<Self, ReplayError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ReplayError::InvalidEvent("event must be an object".into()))?;
        let kind_name = obj
            .get("type")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        let action = obj
            .get("action")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty());
        let (Some(kind_name), Some(action)) = (kind_name, action) else {
            return Err(ReplayError::InvalidEvent(
                "event requires type and action".into(),
            ));
        };
        let kind = EventKind::parse(kind_name)
            .ok_or_else(|| ReplayError::InvalidEvent(format!("unknown event type '{kind_name}'")))?;
        let payload = obj
            .get("payload")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let ts = obj
            .get("ts")
            .or_else(|| obj.get("timestamp"))
            .and_then(Value::as_f64)
            .unwrap_or_else(unix_now);
        let id = obj.get("id").and_then(id_from_value).unwrap_or_else(new_id);
        let delta = obj.get("delta").and_then(Value::as_f64);

        Ok(Self {
            id,
            ts,
            kind,
            action: action.to_string(),
            payload,
            delta,
        })
    }

    pub fn is_mouse_move(&self) -> bool {
        self.kind == EventKind::Mouse && self.action == "move"
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Seconds since the Unix epoch as a float.
pub fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

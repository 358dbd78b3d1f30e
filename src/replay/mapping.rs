use serde_json::{Map, Value};

use crate::model::action::{id_from_value, new_id};
use crate::model::{Action, ActionKind, Params};

/// How a raw replay item should be played back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemShape {
    /// Has `params`, or its `type` is a primitive action type.
    Action,
    /// Has `type` and `action` but is not action-shaped.
    Event,
    Unknown,
}

pub fn classify(item: &Map<String, Value>) -> ItemShape {
    let primitive = item
        .get("type")
        .and_then(Value::as_str)
        .is_some_and(ActionKind::is_primitive);
    if item.contains_key("params") || primitive {
        ItemShape::Action
    } else if item.contains_key("type") && item.contains_key("action") {
        ItemShape::Event
    } else {
        ItemShape::Unknown
    }
}

/// Result of mapping a captured event onto an action.
#[derive(Debug, Clone, PartialEq)]
pub enum Mapped {
    Action(Action),
    /// A click without `pressed`: nothing to replay, not an error.
    Dropped,
    Unsupported,
}

/// Map a captured input event onto the action that reproduces it.
///
/// The event id becomes the action id.
pub fn event_to_action(event: &Map<String, Value>) -> Mapped {
    let empty = Map::new();
    let payload = event
        .get("payload")
        .and_then(Value::as_object)
        .unwrap_or(&empty);
    let field = |key: &str| payload.get(key).cloned().unwrap_or(Value::Null);
    let id = event.get("id").and_then(id_from_value).unwrap_or_else(new_id);
    let build = |kind: ActionKind, params: Params| {
        Mapped::Action(Action::create(kind.as_str(), params).with_id(id.clone()))
    };

    let kind = event.get("type").and_then(Value::as_str);
    let action = event.get("action").and_then(Value::as_str);
    match (kind, action) {
        (Some("mouse"), Some("move")) => build(
            ActionKind::Move,
            params([("x", field("x")), ("y", field("y"))]),
        ),
        (Some("mouse"), Some("scroll")) => build(
            ActionKind::Scroll,
            params([
                ("x", field("x")),
                ("y", field("y")),
                ("dx", payload.get("dx").cloned().unwrap_or(Value::from(0))),
                ("dy", payload.get("dy").cloned().unwrap_or(Value::from(0))),
            ]),
        ),
        (Some("mouse"), Some("click")) => {
            let kind = match payload.get("pressed") {
                Some(Value::Bool(true)) => ActionKind::MouseDown,
                Some(Value::Bool(false)) => ActionKind::MouseUp,
                _ => return Mapped::Dropped,
            };
            let button = payload
                .get("button")
                .cloned()
                .unwrap_or_else(|| Value::from("left"));
            build(
                kind,
                params([("x", field("x")), ("y", field("y")), ("button", button)]),
            )
        }
        (Some("keyboard"), Some(action @ ("press" | "release"))) => {
            let key = ["key", "char"]
                .into_iter()
                .filter_map(|k| payload.get(k))
                .find(|v| match v {
                    Value::String(s) => !s.is_empty(),
                    Value::Null => false,
                    _ => true,
                });
            let Some(key) = key else {
                return Mapped::Unsupported;
            };
            let kind = if action == "press" {
                ActionKind::KeyDown
            } else {
                ActionKind::KeyUp
            };
            build(kind, params([("key", key.clone())]))
        }
        _ => Mapped::Unsupported,
    }
}

fn params<const N: usize>(entries: [(&str, Value); N]) -> Params {
    entries
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

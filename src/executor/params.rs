//! Typed readers for action parameters.

use serde_json::Value;
use std::time::Duration;

use super::backend::{MouseButton, Point, Region};
use crate::error::ActionError;
use crate::model::Params;

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Optional integer parameter; floats are rounded.
pub fn opt_i32(params: &Params, key: &str) -> Result<Option<i32>, ActionError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => number(v)
            .filter(|f| f.is_finite() && *f >= f64::from(i32::MIN) && *f <= f64::from(i32::MAX))
            .map(|f| Some(f.round() as i32))
            .ok_or_else(|| ActionError::new(format!("{key} must be a number"))),
    }
}

pub fn i32_or(params: &Params, key: &str, default: i32) -> Result<i32, ActionError> {
    Ok(opt_i32(params, key)?.unwrap_or(default))
}

pub fn u32_or(params: &Params, key: &str, default: u32) -> Result<u32, ActionError> {
    match opt_i32(params, key)? {
        None => Ok(default),
        Some(n) => u32::try_from(n)
            .map_err(|_| ActionError::new(format!("{key} must be non-negative"))),
    }
}

pub fn f64_or(params: &Params, key: &str, default: f64) -> Result<f64, ActionError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(default),
        Some(v) => number(v)
            .filter(|f| f.is_finite())
            .ok_or_else(|| ActionError::new(format!("{key} must be a number"))),
    }
}

/// Both coordinates, or `None` when either is missing.
pub fn position(params: &Params) -> Result<Option<Point>, ActionError> {
    Ok(match (opt_i32(params, "x")?, opt_i32(params, "y")?) {
        (Some(x), Some(y)) => Some((x, y)),
        _ => None,
    })
}

/// Text parameter; scalars are stringified, empty strings count as missing.
pub fn opt_text(params: &Params, key: &str) -> Option<String> {
    match params.get(key)? {
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

pub fn button(params: &Params) -> Result<MouseButton, ActionError> {
    match params.get("button") {
        None | Some(Value::Null) => Ok(MouseButton::Left),
        Some(Value::String(s)) => MouseButton::parse(s)
            .ok_or_else(|| ActionError::new(format!("unsupported mouse button '{s}'"))),
        Some(other) => Err(ActionError::new(format!("unsupported mouse button {other}"))),
    }
}

/// `region` as `[x, y, width, height]` or `{x, y, width, height}`.
pub fn region(params: &Params) -> Result<Option<Region>, ActionError> {
    let invalid = || ActionError::new("region must be [x, y, width, height]");
    let coord = |v: Option<&Value>| {
        v.and_then(number)
            .filter(|f| f.is_finite())
            .map(|f| f.round() as i32)
            .ok_or_else(invalid)
    };
    match params.get("region") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) if items.len() == 4 => Ok(Some(Region {
            x: coord(items.first())?,
            y: coord(items.get(1))?,
            width: coord(items.get(2))?,
            height: coord(items.get(3))?,
        })),
        Some(Value::Object(map)) => Ok(Some(Region {
            x: coord(map.get("x"))?,
            y: coord(map.get("y"))?,
            width: coord(map.get("width"))?,
            height: coord(map.get("height"))?,
        })),
        Some(_) => Err(invalid()),
    }
}

/// A time parameter in seconds, divided by `speed`.
pub fn scaled(params: &Params, key: &str, speed: f64) -> Result<Duration, ActionError> {
    scale(f64_or(params, key, 0.0)?, speed)
        .map_err(|_| ActionError::new(format!("{key} must be a non-negative number of seconds")))
}

/// Divide `seconds` by `speed`.
pub fn scale(seconds: f64, speed: f64) -> Result<Duration, ActionError> {
    if !(speed > 0.0) {
        return Err(ActionError::new("Speed must be greater than 0"));
    }
    Duration::try_from_secs_f64(seconds / speed)
        .map_err(|_| ActionError::new(format!("invalid duration {seconds}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn p(v: Value) -> Params {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn integers_round_and_validate() {
        let params = p(json!({"x": 10.6, "y": "7", "bad": "abc", "neg": -2}));
        assert_eq!(opt_i32(&params, "x").unwrap(), Some(11));
        assert_eq!(opt_i32(&params, "y").unwrap(), Some(7));
        assert_eq!(opt_i32(&params, "missing").unwrap(), None);
        assert!(opt_i32(&params, "bad").is_err());
        assert!(u32_or(&params, "neg", 1).is_err());
        assert_eq!(position(&params).unwrap(), Some((11, 7)));
    }

    #[test]
    fn scaling_divides_by_speed() {
        let params = p(json!({"duration": 1.0}));
        assert_eq!(scaled(&params, "duration", 2.0).unwrap(), Duration::from_millis(500));
        assert_eq!(scaled(&params, "duration", 1.0).unwrap(), Duration::from_secs(1));
        assert_eq!(scaled(&params, "interval", 4.0).unwrap(), Duration::ZERO);
        assert!(scale(1.0, 0.0).is_err());
        assert!(scale(1.0, -1.0).is_err());
        assert!(scaled(&p(json!({"duration": -1})), "duration", 1.0).is_err());
    }

    #[test]
    fn regions_in_both_shapes() {
        let list = p(json!({"region": [0, 0, 100, 50]}));
        let obj = p(json!({"region": {"x": 0, "y": 0, "width": 100, "height": 50}}));
        assert_eq!(region(&list).unwrap(), region(&obj).unwrap());
        assert!(region(&p(json!({"region": [1, 2]}))).is_err());
        assert_eq!(region(&p(json!({}))).unwrap(), None);
    }

    #[test]
    fn text_and_buttons() {
        let params = p(json!({"text": 42, "empty": "", "button": "right"}));
        assert_eq!(opt_text(&params, "text").as_deref(), Some("42"));
        assert_eq!(opt_text(&params, "empty"), None);
        assert_eq!(button(&params).unwrap(), MouseButton::Right);
        assert!(button(&p(json!({"button": "thumb"}))).is_err());
    }
}

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::action::Params;

/// Outcome of one action execution attempt. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub action_id: String,
    pub success: bool,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Params>,
}

impl ExecutionResult {
    pub fn ok(action_id: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            success: true,
            message: String::new(),
            data: None,
        }
    }

    pub fn failed(action_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action_id: action_id.into(),
            success: false,
            message: message.into(),
            data: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_data(mut self, data: Params) -> Self {
        self.data = Some(data);
        self
    }

    /// Insert a single data entry, creating the data map if needed.
    #[must_use]
    pub fn with_entry(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.data
            .get_or_insert_with(Params::new)
            .insert(key.to_string(), value.into());
        self
    }

    /// Error classification recorded for failures, if any.
    pub fn error_kind(&self) -> Option<&str> {
        self.data.as_ref()?.get("error")?.as_str()
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::executor::EngineSettings;
use crate::model::{Action, Params};
use crate::replay::RecorderSettings;

/// Root configuration for autotool.
///
/// Deserialized from a JSON file; every section is optional and falls back to
/// its defaults:
/// - `automation`: engine pacing and failsafe
/// - `replay`: default replay speed and error policy
/// - `recorder`: mouse-move filtering while recording
/// - `hotkeys`: named key combos (e.g. `"copy": "ctrl+c"`)
/// - `logging`: default log level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    pub automation: AutomationConfig,

    pub replay: ReplayConfig,

    pub recorder: RecorderConfig,

    /// Named hotkey combos, `+`-joined.
    pub hotkeys: BTreeMap<String, String>,

    pub logging: LoggingConfig,
}

impl Config {
    /// A `hotkey` action for the named combo, if configured.
    pub fn hotkey_action(&self, name: &str) -> Option<Action> {
        let combo = self.hotkeys.get(name)?;
        let mut params = Params::new();
        params.insert("combo".into(), combo.clone().into());
        Some(Action::create("hotkey", params).with_id(format!("hotkey:{name}")))
    }
}

/// Automation engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(default)]
pub struct AutomationConfig {
    /// Abort actions while the pointer sits in the top-left screen corner.
    pub failsafe: bool,

    /// Seconds to pause after every action (not scaled by speed).
    #[validate(minimum = 0.0)]
    pub pause_interval: f64,

    /// Default speed factor for `run`.
    #[validate(exclusive_minimum = 0.0)]
    pub speed: f64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            failsafe: true,
            pause_interval: 0.0,
            speed: 1.0,
        }
    }
}

impl AutomationConfig {
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            pause_interval: Duration::try_from_secs_f64(self.pause_interval).unwrap_or_default(),
        }
    }
}

/// Replay defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(default)]
pub struct ReplayConfig {
    #[validate(exclusive_minimum = 0.0)]
    pub speed: f64,

    pub stop_on_error: bool,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            stop_on_error: false,
        }
    }
}

/// Recorder filters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[serde(default)]
pub struct RecorderConfig {
    pub record_moves: bool,

    /// Minimum seconds between retained mouse moves.
    #[validate(minimum = 0.0)]
    pub min_move_interval: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            record_moves: true,
            min_move_interval: 0.0,
        }
    }
}

impl RecorderConfig {
    pub fn settings(&self) -> RecorderSettings {
        RecorderSettings {
            record_moves: self.record_moves,
            min_move_interval: self.min_move_interval,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

/// Logging level enumeration.
#[derive(Debug, Copy, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Parse a level name; `warning` is accepted for `warn`.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }

    pub fn as_tracing(self) -> tracing::Level {
        match self {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

//! Configuration module for autotool.
//!
//! This module wires together the data models and loading/validation helpers used
//! throughout the crate. Import from here for a convenient, stable API.
//!
//! Example:
//! use autotool::config::{Config, load_from_path};
//!
//! let cfg = load_from_path("config/autotool.json")?;

pub mod loader;
pub mod models;

// Re-export core data models
pub use models::{
    AutomationConfig, Config, LogLevel, LoggingConfig, RecorderConfig, ReplayConfig,
};

// Re-export loader utilities
pub use loader::{
    DEFAULT_CONFIG_PATH, generate_schema, load_cli_config, load_from_path, load_from_path_async,
    load_from_reader, load_from_str, load_from_value, merge_values, parse_override,
    validate_config, write_schema_to_writer,
};

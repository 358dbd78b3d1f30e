use anyhow::{Context, Result, anyhow, bail};
use schemars::{Schema, schema_for};
use serde_json::{Map, Value};
use serde_valid::Validate;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use tracing::debug;

use super::models::Config;

/// Config file used when `--config` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "config/autotool.json";

/// Load configuration from a string slice.
pub fn load_from_str(s: &str) -> Result<Config> {
    let cfg: Config =
        serde_json::from_str(s).context("Failed to parse JSON config string into Config")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from any reader (e.g., a file).
pub fn load_from_reader<R: Read>(reader: R) -> Result<Config> {
    let cfg: Config =
        serde_json::from_reader(reader).context("Failed to parse JSON config from reader")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from an already-parsed JSON value.
pub fn load_from_value(value: Value) -> Result<Config> {
    let cfg: Config = serde_json::from_value(value).context("Failed to map JSON value to Config")?;
    validate_config(&cfg)?;
    Ok(cfg)
}

/// Load configuration from a file path synchronously.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open config file {}", path_ref.display()))?;
    let cfg = load_from_reader(file)?;
    debug!(target: "autotool::config", "Loaded config from {}", path_ref.display());
    Ok(cfg)
}

/// Load configuration from a file path asynchronously (Tokio).
pub async fn load_from_path_async<P: AsRef<Path>>(path: P) -> Result<Config> {
    let bytes = read_async(path.as_ref()).await?;
    let cfg: Config = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON config from {}", path.as_ref().display()))?;
    validate_config(&cfg)?;
    debug!(target: "autotool::config", "Loaded config from {}", path.as_ref().display());
    Ok(cfg)
}

/// Load the CLI configuration: an explicit path must exist; otherwise the
/// default path is used when present, else built-in defaults. `overrides` are
/// `dotted.key=value` pairs merged on top.
pub async fn load_cli_config(explicit: Option<&Path>, overrides: &[String]) -> Result<Config> {
    let mut value = match explicit {
        Some(path) => parse_bytes(&read_async(path).await?, path)?,
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
            let path = Path::new(DEFAULT_CONFIG_PATH);
            parse_bytes(&read_async(path).await?, path)?
        }
        None => {
            debug!(target: "autotool::config", "No config file; using defaults");
            Value::Object(Map::new())
        }
    };
    for item in overrides {
        merge_values(&mut value, parse_override(item)?);
    }
    load_from_value(value)
}

async fn read_async(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))
}

fn parse_bytes(bytes: &[u8], path: &Path) -> Result<Value> {
    serde_json::from_slice(bytes)
        .with_context(|| format!("Failed to parse JSON config from {}", path.display()))
}

/// Turn `automation.speed=2` into `{"automation": {"speed": 2}}`. Values that
/// are not valid JSON are taken as strings.
pub fn parse_override(item: &str) -> Result<Value> {
    let Some((path, raw)) = item.split_once('=') else {
        bail!("Override '{item}' must look like key.path=value");
    };
    let keys: Vec<&str> = path.split('.').map(str::trim).collect();
    if keys.iter().any(|k| k.is_empty()) {
        bail!("Override '{item}' has an empty key segment");
    }
    let leaf = serde_json::from_str(raw.trim()).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok(keys.iter().rev().fold(leaf, |acc, key| {
        let mut map = Map::new();
        map.insert((*key).to_string(), acc);
        Value::Object(map)
    }))
}

/// Deep-merge `overlay` into `base`. Objects merge key by key; anything else in
/// `overlay` replaces the value in `base`.
pub fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Generate the JSON Schema for the Config model (for external validation or tooling).
pub fn generate_schema() -> Schema {
    schema_for!(Config)
}

/// Write the JSON Schema for the Config model to any writer (pretty-printed).
pub fn write_schema_to_writer<W: Write>(mut writer: W) -> Result<()> {
    let schema = generate_schema();
    let json = serde_json::to_string_pretty(&schema).context("Failed to serialize schema")?;
    writer
        .write_all(json.as_bytes())
        .context("Failed to write schema to writer")?;
    Ok(())
}

/// Field-level checks (`serde_valid`) per section, plus hotkey sanity.
pub fn validate_config(cfg: &Config) -> Result<()> {
    cfg.automation
        .validate()
        .map_err(|errors| anyhow!("Invalid automation config: {errors}"))?;
    cfg.replay
        .validate()
        .map_err(|errors| anyhow!("Invalid replay config: {errors}"))?;
    cfg.recorder
        .validate()
        .map_err(|errors| anyhow!("Invalid recorder config: {errors}"))?;

    for (name, combo) in &cfg.hotkeys {
        if combo.split('+').all(|k| k.trim().is_empty()) {
            bail!("Hotkey '{}' has an empty combo", name);
        }
    }
    Ok(())
}

#![forbid(unsafe_code)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Autotool: desktop automation with workflows, rules, record and replay on top of Enigo.
//!
//! This crate organizes the codebase into cohesive modules and exposes a convenient prelude
//! for downstream crates/binaries:
//! - `model`: actions, execution results and captured events.
//! - `rules`: priority-ordered predicate rules over a context map.
//! - `workflow`: workflow validation and compilation (step lists and node graphs).
//! - `executor`: input backends and the automation engine.
//! - `replay`: recorder, replayer and event-to-action mapping.
//! - `orchestrator`: concurrent workflow runs with cooperative cancellation.
//! - `store`: persistence of workflows and run records.
//! - `sources`: recorded-event sources (stdin).
//! - `config`: configuration models, loader, and schema helpers.
//!
//! Use `autotool::prelude::*` to bring commonly used items into scope quickly.

pub mod config;
pub mod error;
pub mod executor;
pub mod model;
pub mod orchestrator;
pub mod replay;
pub mod rules;
pub mod sources;
pub mod store;
pub mod workflow;

/// Crate-level constants for consumers that want to inspect package metadata at runtime.
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the crate version (e.g., "0.1.0").
#[inline]
pub const fn version() -> &'static str {
    PKG_VERSION
}

/// Initialize tracing (logging) with a reasonable default.
/// - Honors the `RUST_LOG` environment variable if set.
/// - Falls back to `info` level.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init_tracing() {
    init_tracing_with_fallback(tracing::Level::INFO);
}

/// Like [`init_tracing`], with `fallback` used when `RUST_LOG` is unset or
/// not a level name.
pub fn init_tracing_with_fallback(fallback: tracing::Level) {
    // Parse RUST_LOG as a simple level (trace|debug|info|warn|error)
    let level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| config::LogLevel::parse(&s))
        .map_or(fallback, config::LogLevel::as_tracing);
    init_tracing_at(level);
}

/// Initialize tracing at an explicit level, ignoring `RUST_LOG`.
pub fn init_tracing_at(level: tracing::Level) {
    // Ignore the error if the global subscriber was already set.
    let _ = tracing_subscriber::fmt().with_max_level(level).try_init();
}

/// A convenient set of exports for most consumers.
///
/// Bring this into scope with:
/// `use autotool::prelude::*;`
pub mod prelude {
    // Common result/error handling
    pub use anyhow::{Context, Error, Result, anyhow, bail, ensure};

    // Serialization
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::{Value, json};

    // Tracing macros
    pub use tracing::{debug, error, info, instrument, trace, warn};

    // Timing helpers
    pub use std::time::Duration;
    pub use tokio::time::sleep;

    // External crates (namespaced) if callers want direct access
    pub use crate as autotool;
    pub use enigo;

    // Core types
    pub use crate::executor::{AutomationEngine, EnigoBackend, InputBackend};
    pub use crate::model::{Action, Event, ExecutionResult, Params};
    pub use crate::orchestrator::{RunEntry, RunManager, RunStatus};
    pub use crate::replay::{Recorder, Replayer};
    pub use crate::rules::{Rule, RuleEngine};

    // Frequently used internal modules
    pub use crate::{config, executor, model, orchestrator, replay, rules, sources, store, workflow};
}

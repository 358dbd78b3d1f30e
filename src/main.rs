use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use autotool::config::{self as cfg, Config};
use autotool::executor::{
    AutomationEngine, BackendFactory, EnigoBackend, ExecutionControl, InputBackend,
    SafetyController,
};
use autotool::model::Params;
use autotool::orchestrator::{RunManager, RunStatus, summarize};
use autotool::replay::{Recorder, Replayer};
use autotool::rules::RuleEngine;
use autotool::sources::{self, EventSource, StdinSource};
use autotool::store::{MemoryStore, RunStore};
use autotool::workflow;

/// Autotool CLI
#[derive(Debug, Parser)]
#[command(
    name = autotool::PKG_NAME,
    version = autotool::PKG_VERSION,
    about = "Desktop automation: workflows, rules, record and replay"
)]
struct Args {
    /// Path to the JSON configuration file (default: config/autotool.json when present)
    #[arg(short = 'c', long = "config", global = true)]
    config: Option<PathBuf>,

    /// Override a config value, e.g. --set replay.speed=2
    #[arg(long = "set", value_name = "KEY=VALUE", global = true)]
    set: Vec<String>,

    /// Enable dry-run mode (log actions instead of simulating input)
    #[arg(long = "dry-run", global = true)]
    dry_run: bool,

    /// Set log level (e.g., trace, debug, info, warn, error). Overrides RUST_LOG.
    #[arg(long = "log-level", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a workflow (steps list, graph or FlowGram payload)
    Validate { file: PathBuf },

    /// Compile a workflow and print its ordered actions
    Compile { file: PathBuf },

    /// Compile and run a workflow
    Run {
        file: PathBuf,
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long = "stop-on-error")]
        stop_on_error: bool,
    },

    /// Replay a recorded session or action list
    Replay {
        file: PathBuf,
        #[arg(long)]
        speed: Option<f64>,
        #[arg(long = "stop-on-error")]
        stop_on_error: bool,
    },

    /// Record NDJSON input events from stdin until EOF or Ctrl+C
    Record {
        #[arg(short = 'o', long)]
        output: PathBuf,
    },

    /// Evaluate rules against a context and print the matches
    Rules {
        #[arg(long)]
        rules: PathBuf,
        #[arg(long)]
        context: PathBuf,
    },

    /// Send a hotkey configured under `hotkeys`
    Hotkey { name: String },

    /// Print the JSON Schema for the configuration and exit
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Command::Schema = args.command {
        let schema = cfg::generate_schema();
        let json = serde_json::to_string_pretty(&schema)?;
        println!("{json}");
        return Ok(());
    }

    let config = cfg::load_cli_config(args.config.as_deref(), &args.set).await?;

    // --log-level wins, then RUST_LOG, then the config file.
    match args.log_level.as_deref() {
        Some(name) => {
            let Some(level) = cfg::LogLevel::parse(name) else {
                bail!("Unknown log level '{name}'");
            };
            autotool::init_tracing_at(level.as_tracing());
        }
        None => autotool::init_tracing_with_fallback(config.logging.level.as_tracing()),
    }
    info!(
        version = autotool::PKG_VERSION,
        dry_run = args.dry_run,
        "Starting Autotool"
    );
    debug!(target: "autotool", ?config, "Configuration loaded");

    match args.command {
        Command::Validate { file } => validate(&file).await,
        Command::Compile { file } => compile(&file).await,
        Command::Run {
            file,
            speed,
            stop_on_error,
        } => {
            let speed = speed.unwrap_or(config.automation.speed);
            run(&config, args.dry_run, &file, speed, stop_on_error).await
        }
        Command::Replay {
            file,
            speed,
            stop_on_error,
        } => {
            let speed = speed.unwrap_or(config.replay.speed);
            let stop_on_error = stop_on_error || config.replay.stop_on_error;
            replay(&config, args.dry_run, file, speed, stop_on_error).await
        }
        Command::Record { output } => record(&config, &output).await,
        Command::Rules { rules, context } => evaluate_rules(&rules, &context).await,
        Command::Hotkey { name } => hotkey(&config, args.dry_run, &name).await,
        Command::Schema => Ok(()),
    }
}

async fn read_json(path: &Path) -> Result<Value> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse JSON from {}", path.display()))
}

/// Step workflows pass through; graphs and FlowGram payloads are normalized.
async fn read_workflow(path: &Path) -> Result<Value> {
    let payload = read_json(path).await?;
    if payload.get("steps").is_some() {
        return Ok(payload);
    }
    Ok(workflow::normalize_flowgram_payload(&payload)?)
}

fn backend_factory(config: &Config, dry_run: bool) -> BackendFactory {
    let failsafe = config.automation.failsafe;
    Arc::new(move || Box::new(EnigoBackend::new(dry_run, failsafe)) as Box<dyn InputBackend>)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn validate(file: &Path) -> Result<()> {
    let wf = read_workflow(file).await?;
    let errors = workflow::validate(&wf);
    if errors.is_empty() {
        println!("{}: valid", file.display());
        return Ok(());
    }
    for err in &errors {
        println!("- {err}");
    }
    bail!("{} is invalid ({} errors)", file.display(), errors.len())
}

async fn compile(file: &Path) -> Result<()> {
    let wf = read_workflow(file).await?;
    let actions = workflow::compile(&wf)?;
    let values: Vec<Value> = actions.iter().map(|a| a.to_value()).collect();
    print_json(&values)
}

async fn run(config: &Config, dry_run: bool, file: &Path, speed: f64, stop_on_error: bool) -> Result<()> {
    let wf = read_workflow(file).await?;
    let actions = workflow::compile(&wf)?;

    let store = Arc::new(MemoryStore::new());
    let workflow_id = store.save_workflow(&wf).await?;
    let manager = RunManager::new(store, backend_factory(config, dry_run))
        .with_settings(config.automation.engine_settings());
    let entry = manager
        .start_workflow(&workflow_id, actions, speed, stop_on_error)
        .await?;
    let run_id = entry.run_id;

    let safety = SafetyController::new();
    {
        let manager = manager.clone();
        let run_id = run_id.clone();
        safety.register_handler(move || {
            manager.stop_run(&run_id);
        });
    }

    let finished = tokio::select! {
        finished = manager.wait(&run_id) => finished,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping run");
            safety.trigger();
            manager.wait(&run_id).await
        }
    };
    let Some(entry) = finished else {
        bail!("Run {run_id} disappeared before completion");
    };
    print_json(&entry)?;
    if entry.status == RunStatus::Failed {
        bail!(
            "Run {} failed ({})",
            entry.run_id,
            entry.summary.as_deref().unwrap_or_default()
        );
    }
    Ok(())
}

async fn replay(config: &Config, dry_run: bool, file: PathBuf, speed: f64, stop_on_error: bool) -> Result<()> {
    let control = ExecutionControl::new();
    let safety = SafetyController::new();
    safety.register_control(control.clone());

    let factory = backend_factory(config, dry_run);
    let settings = config.automation.engine_settings();
    let mut task = tokio::task::spawn_blocking(move || {
        let engine = AutomationEngine::new(factory())
            .with_control(control)
            .with_settings(settings);
        let mut replayer = Replayer::new(engine).with_result_observer(|result| {
            if !result.success {
                warn!(target: "autotool::replay", action_id = %result.action_id, message = %result.message, "Replay step failed");
            }
        });
        replayer.load(&file)?;
        replayer.play(None, speed, stop_on_error)
    });

    let joined = tokio::select! {
        joined = &mut task => joined,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping replay");
            safety.trigger();
            (&mut task).await
        }
    };
    let results = joined.context("Replay worker failed")??;
    print_json(&results)?;
    info!(target: "autotool::replay", summary = %summarize(&results), "Replay finished");
    Ok(())
}

async fn record(config: &Config, output: &Path) -> Result<()> {
    let mut recorder = Recorder::new(config.recorder.settings());
    recorder.start();

    let sources: Vec<Box<dyn EventSource>> = vec![Box::new(StdinSource::new())];
    let (tx, mut rx) = mpsc::channel::<Value>(256);
    let cancel = CancellationToken::new();
    let _handles = sources::spawn_all_sources(&sources, tx, &cancel);

    tokio::select! {
        retained = sources::record_events(&mut rx, &mut recorder, &cancel) => {
            debug!(target: "autotool::recorder", retained, "Input ended");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, finishing recording");
        }
    }
    cancel.cancel();

    let events = recorder.stop().len();
    let path = recorder.export(output)?;
    println!("Recorded {events} events to {}", path.display());
    Ok(())
}

async fn evaluate_rules(rules_path: &Path, context_path: &Path) -> Result<()> {
    let descriptors = read_json(rules_path).await?;
    let descriptors = match descriptors.get("rules").cloned().unwrap_or(descriptors) {
        Value::Array(items) => items,
        _ => bail!("{} must contain a list of rules", rules_path.display()),
    };
    let context: Params = match read_json(context_path).await? {
        Value::Object(map) => map,
        _ => bail!("{} must contain a JSON object", context_path.display()),
    };

    let mut engine = RuleEngine::new();
    for descriptor in &descriptors {
        engine
            .add_rule(descriptor)
            .with_context(|| format!("Invalid rule {descriptor}"))?;
    }
    let matched: Vec<Value> = engine.evaluate(&context).into_iter().map(|r| r.to_value()).collect();
    print_json(&matched)
}

async fn hotkey(config: &Config, dry_run: bool, name: &str) -> Result<()> {
    let Some(action) = config.hotkey_action(name) else {
        bail!("No hotkey named '{name}' in configuration");
    };
    let factory = backend_factory(config, dry_run);
    let settings = config.automation.engine_settings();
    let result = tokio::task::spawn_blocking(move || {
        AutomationEngine::new(factory())
            .with_settings(settings)
            .execute(&action, 1.0)
    })
    .await
    .context("Hotkey worker failed")?;
    print_json(&result)?;
    if !result.success {
        bail!("Hotkey '{name}' failed: {}", result.message);
    }
    Ok(())
}

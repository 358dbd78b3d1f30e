use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::run::{RunEntry, RunStatus, final_status};
use crate::error::StoreError;
use crate::executor::{
    ActionRegistry, AutomationEngine, BackendFactory, EngineSettings, ExecutionControl,
};
use crate::model::{Action, ExecutionResult};
use crate::store::RunStore;

/// Finished runs kept in memory; older ones are only available from the store.
const MAX_FINISHED_RUNS: usize = 256;

struct RunSlot {
    entry: RunEntry,
    control: ExecutionControl,
    stop_requested: bool,
    done: watch::Receiver<RunStatus>,
}

/// Concurrent, independently cancellable workflow runs.
///
/// Each run gets its own [`AutomationEngine`] (and backend, built by the
/// factory) on a blocking worker thread; callers never wait on execution.
/// Cloning yields another handle onto the same run table.
#[derive(Clone)]
pub struct RunManager {
    store: Arc<dyn RunStore>,
    backends: BackendFactory,
    registry: Arc<ActionRegistry>,
    settings: EngineSettings,
    runs: Arc<Mutex<HashMap<String, RunSlot>>>,
}

impl RunManager {
    pub fn new(store: Arc<dyn RunStore>, backends: BackendFactory) -> Self {
        Self {
            store,
            backends,
            registry: Arc::new(ActionRegistry::new()),
            settings: EngineSettings::default(),
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn with_registry(mut self, registry: Arc<ActionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Start executing `actions` in the background and return the `running`
    /// entry. Fails only when the initial run record cannot be stored.
    pub async fn start_workflow(
        &self,
        workflow_id: &str,
        actions: Vec<Action>,
        speed: f64,
        stop_on_error: bool,
    ) -> Result<RunEntry, StoreError> {
        let run_id = Uuid::new_v4().to_string();
        let entry = RunEntry::running(run_id.clone(), workflow_id);
        let control = ExecutionControl::new();
        let (done_tx, done_rx) = watch::channel(RunStatus::Running);

        self.runs.lock().insert(
            run_id.clone(),
            RunSlot {
                entry: entry.clone(),
                control: control.clone(),
                stop_requested: false,
                done: done_rx,
            },
        );
        if let Err(err) = self.store.log_run(&entry).await {
            self.runs.lock().remove(&run_id);
            return Err(err);
        }
        info!(target: "autotool::runs", %run_id, %workflow_id, actions = actions.len(), "Run started");

        let backends = Arc::clone(&self.backends);
        let registry = Arc::clone(&self.registry);
        let settings = self.settings;
        let manager = self.clone();
        tokio::spawn(async move {
            // Backends are not Send; build the engine on the worker thread.
            let outcome = tokio::task::spawn_blocking(move || {
                let engine = AutomationEngine::new(backends())
                    .with_registry(registry)
                    .with_control(control)
                    .with_settings(settings);
                run_actions(engine, &actions, speed, stop_on_error)
            })
            .await;
            manager.finish(&run_id, outcome, done_tx).await;
        });
        Ok(entry)
    }

    async fn finish(
        &self,
        run_id: &str,
        outcome: Result<Vec<ExecutionResult>, JoinError>,
        done: watch::Sender<RunStatus>,
    ) {
        let entry = {
            let mut runs = self.runs.lock();
            let Some(slot) = runs.get_mut(run_id) else {
                return;
            };
            let (status, results) = match outcome {
                Ok(results) => (final_status(slot.stop_requested, &results), results),
                Err(err) => {
                    let message = worker_failure(err);
                    error!(target: "autotool::runs", %run_id, error = %message, "Run worker failed");
                    let crashed = ExecutionResult::failed(run_id, message).with_entry("error", "WorkerFailed");
                    (RunStatus::Failed, vec![crashed])
                }
            };
            slot.entry.finish(status, results);
            let entry = slot.entry.clone();
            evict_finished(&mut runs, MAX_FINISHED_RUNS);
            entry
        };
        if let Err(err) = self.store.update_run(&entry).await {
            error!(target: "autotool::runs", %run_id, error = %err, "Failed to persist run");
        }
        info!(
            target: "autotool::runs",
            %run_id,
            status = %entry.status,
            summary = entry.summary.as_deref().unwrap_or_default(),
            "Run finished"
        );
        done.send_replace(entry.status);
    }

    /// Request cancellation. Returns `false` for unknown run ids.
    pub fn stop_run(&self, run_id: &str) -> bool {
        let mut runs = self.runs.lock();
        let Some(slot) = runs.get_mut(run_id) else {
            warn!(target: "autotool::runs", %run_id, "Stop requested for unknown run");
            return false;
        };
        slot.stop_requested = true;
        slot.control.stop();
        info!(target: "autotool::runs", %run_id, "Run stop requested");
        true
    }

    pub fn get_run(&self, run_id: &str) -> Option<RunEntry> {
        self.runs.lock().get(run_id).map(|slot| slot.entry.clone())
    }

    /// Running runs plus the most recently finished ones, newest first.
    pub fn list_runs(&self) -> Vec<RunEntry> {
        let mut runs: Vec<RunEntry> = self
            .runs
            .lock()
            .values()
            .map(|slot| slot.entry.clone())
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs
    }

    /// Wait until the run reaches a terminal status and return its final entry.
    pub async fn wait(&self, run_id: &str) -> Option<RunEntry> {
        let mut done = self.runs.lock().get(run_id)?.done.clone();
        if done.wait_for(|status| status.is_terminal()).await.is_err() {
            return None;
        }
        self.get_run(run_id)
    }
}

/// Panic payload or cancellation reason of a failed worker.
fn worker_failure(err: JoinError) -> String {
    if !err.is_panic() {
        return format!("Run worker failed: {err}");
    }
    let payload = err.into_panic();
    let reason = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("Run worker panicked: {reason}")
}

/// Drop the oldest finished runs beyond `keep`. Running runs are never evicted.
fn evict_finished(runs: &mut HashMap<String, RunSlot>, keep: usize) {
    let mut finished: Vec<(DateTime<Utc>, String)> = runs
        .iter()
        .filter(|(_, slot)| slot.entry.status.is_terminal())
        .map(|(id, slot)| (slot.entry.ended_at.unwrap_or(slot.entry.started_at), id.clone()))
        .collect();
    if finished.len() <= keep {
        return;
    }
    finished.sort();
    let excess = finished.len() - keep;
    for (_, id) in finished.into_iter().take(excess) {
        runs.remove(&id);
        debug!(target: "autotool::runs", run_id = %id, "Evicted finished run");
    }
}

fn run_actions(
    mut engine: AutomationEngine,
    actions: &[Action],
    speed: f64,
    stop_on_error: bool,
) -> Vec<ExecutionResult> {
    if !stop_on_error {
        return engine.execute_sequence(actions, speed);
    }
    let control = engine.control();
    let mut results = Vec::with_capacity(actions.len());
    for action in actions {
        if control.wait_while_paused() {
            break;
        }
        let result = engine.execute(action, speed);
        let failed = !result.success;
        results.push(result);
        if failed {
            break;
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;
    use crate::executor::mock::MockBackend;
    use crate::store::MemoryStore;
    use serde_json::json;
    use std::time::Duration;

    fn manager(mock: &MockBackend) -> (RunManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let mock = mock.clone();
        let factory: BackendFactory = Arc::new(move || mock.boxed());
        (RunManager::new(store.clone(), factory), store)
    }

    fn actions(values: Vec<serde_json::Value>) -> Vec<Action> {
        values.iter().map(|v| Action::from_value(v).unwrap()).collect()
    }

    #[tokio::test]
    async fn run_completes_and_is_persisted() {
        let mock = MockBackend::new();
        let (manager, store) = manager(&mock);
        let entry = manager
            .start_workflow(
                "wf1",
                actions(vec![json!({"type": "click"}), json!({"type": "key_down", "params": {"key": "a"}})]),
                1.0,
                false,
            )
            .await
            .unwrap();
        assert_eq!(entry.status, RunStatus::Running);

        let done = manager.wait(&entry.run_id).await.unwrap();
        assert_eq!(done.status, RunStatus::Success);
        assert_eq!(done.summary.as_deref(), Some("2/2 succeeded"));
        assert_eq!(done.results.len(), 2);

        let stored = store.get_run(&entry.run_id).await.unwrap();
        assert_eq!(stored.status, RunStatus::Success);
        assert_eq!(manager.list_runs().len(), 1);
    }

    #[tokio::test]
    async fn failures_mark_run_failed() {
        let mock = MockBackend::new();
        mock.fail_at(0, BackendError::Input("nope".into()));
        let (manager, _) = manager(&mock);
        let steps = actions(vec![json!({"type": "click"}), json!({"type": "click"})]);

        let run = manager.start_workflow("wf", steps.clone(), 1.0, false).await.unwrap();
        let done = manager.wait(&run.run_id).await.unwrap();
        assert_eq!(done.status, RunStatus::Failed);
        assert_eq!(done.summary.as_deref(), Some("1/2 succeeded"));

        mock.fail_next(BackendError::Input("nope".into()));
        let run = manager.start_workflow("wf", steps, 1.0, true).await.unwrap();
        let done = manager.wait(&run.run_id).await.unwrap();
        assert_eq!(done.results.len(), 1);
        assert_eq!(done.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn stop_run_cancels_cooperatively() {
        let mock = MockBackend::new();
        let (manager, _) = manager(&mock);
        let run = manager
            .start_workflow(
                "wf",
                actions(vec![
                    json!({"type": "wait", "params": {"seconds": 30}}),
                    json!({"type": "click"}),
                ]),
                1.0,
                false,
            )
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(manager.stop_run(&run.run_id));
        assert!(!manager.stop_run("missing"));

        let done = tokio::time::timeout(Duration::from_secs(5), manager.wait(&run.run_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, RunStatus::Stopped);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn panicking_worker_fails_the_run() {
        let mock = MockBackend::new();
        let (manager, store) = manager(&mock);
        let registry = Arc::new(ActionRegistry::new());
        registry
            .register_action("explode", "tests", |_| panic!("handler blew up"))
            .unwrap();
        let manager = manager.with_registry(registry);

        let run = manager
            .start_workflow("wf", actions(vec![json!({"type": "explode"})]), 1.0, false)
            .await
            .unwrap();
        let done = manager.wait(&run.run_id).await.unwrap();
        assert_eq!(done.status, RunStatus::Failed);
        assert_eq!(done.results.len(), 1);
        assert!(!done.results[0].success);
        assert!(done.results[0].message.contains("handler blew up"));
        assert_eq!(done.summary.as_deref(), Some("0/1 succeeded"));
        assert_eq!(store.get_run(&run.run_id).await.unwrap().status, RunStatus::Failed);
    }

    #[test]
    fn eviction_keeps_running_and_newest_finished() {
        let slot = |id: &str, status: RunStatus, offset: i64| {
            let mut entry = RunEntry::running(id, "wf");
            if status.is_terminal() {
                entry.finish(status, Vec::new());
                entry.ended_at = Some(Utc::now() + chrono::Duration::seconds(offset));
            }
            RunSlot {
                entry,
                control: ExecutionControl::new(),
                stop_requested: false,
                done: watch::channel(status).1,
            }
        };
        let mut runs = HashMap::new();
        runs.insert("old".to_string(), slot("old", RunStatus::Success, 0));
        runs.insert("mid".to_string(), slot("mid", RunStatus::Failed, 10));
        runs.insert("new".to_string(), slot("new", RunStatus::Stopped, 20));
        runs.insert("live".to_string(), slot("live", RunStatus::Running, 0));

        evict_finished(&mut runs, 2);
        let mut left: Vec<&str> = runs.keys().map(String::as_str).collect();
        left.sort_unstable();
        assert_eq!(left, vec!["live", "mid", "new"]);

        evict_finished(&mut runs, 0);
        assert_eq!(runs.keys().collect::<Vec<_>>(), vec!["live"]);
    }

    #[tokio::test]
    async fn runs_are_independent() {
        let mock = MockBackend::new();
        let (manager, _) = manager(&mock);
        let slow = manager
            .start_workflow("slow", actions(vec![json!({"type": "wait", "params": {"seconds": 30}})]), 1.0, false)
            .await
            .unwrap();
        let fast = manager
            .start_workflow("fast", actions(vec![json!({"type": "click"})]), 1.0, false)
            .await
            .unwrap();

        let done = tokio::time::timeout(Duration::from_secs(5), manager.wait(&fast.run_id))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(done.status, RunStatus::Success);
        assert_eq!(manager.get_run(&slow.run_id).unwrap().status, RunStatus::Running);

        manager.stop_run(&slow.run_id);
        let slow = manager.wait(&slow.run_id).await.unwrap();
        assert_eq!(slow.status, RunStatus::Stopped);
        assert!(manager.wait("missing").await.is_none());
    }
}

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::RunStore;
use crate::error::StoreError;
use crate::model::action::id_from_value;
use crate::orchestrator::RunEntry;

#[derive(Default)]
struct Tables {
    workflows: HashMap<String, (u64, Value)>,
    runs: HashMap<String, RunEntry>,
    seq: u64,
}

/// In-process [`RunStore`]. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Workflow identifier fields: non-empty strings or numbers.
fn identifier(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(id_from_value)
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn save_workflow(&self, workflow: &Value) -> Result<String, StoreError> {
        let (Some(id), Some(_)) = (identifier(workflow, "id"), identifier(workflow, "name")) else {
            return Err(StoreError::InvalidRecord("workflow requires id and name".into()));
        };
        let mut tables = self.tables.write();
        tables.seq += 1;
        let seq = tables.seq;
        tables.workflows.insert(id.clone(), (seq, workflow.clone()));
        debug!(target: "autotool::runs", workflow_id = %id, "Workflow saved");
        Ok(id)
    }

    async fn get_workflow(&self, workflow_id: &str) -> Result<Value, StoreError> {
        self.tables
            .read()
            .workflows
            .get(workflow_id)
            .map(|(_, wf)| wf.clone())
            .ok_or_else(|| StoreError::NotFound(workflow_id.to_string()))
    }

    async fn list_workflows(&self) -> Result<Vec<Value>, StoreError> {
        let tables = self.tables.read();
        let mut entries: Vec<&(u64, Value)> = tables.workflows.values().collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(entries.into_iter().map(|(_, wf)| wf.clone()).collect())
    }

    async fn delete_workflow(&self, workflow_id: &str) -> Result<bool, StoreError> {
        Ok(self.tables.write().workflows.remove(workflow_id).is_some())
    }

    async fn log_run(&self, run: &RunEntry) -> Result<(), StoreError> {
        if run.run_id.is_empty() {
            return Err(StoreError::InvalidRecord("run record requires id".into()));
        }
        self.tables
            .write()
            .runs
            .insert(run.run_id.clone(), run.clone());
        Ok(())
    }

    async fn update_run(&self, run: &RunEntry) -> Result<(), StoreError> {
        if run.run_id.is_empty() {
            return Err(StoreError::InvalidRecord("run record requires id".into()));
        }
        let mut tables = self.tables.write();
        let stored = tables
            .runs
            .get_mut(&run.run_id)
            .ok_or_else(|| StoreError::NotFound(run.run_id.clone()))?;
        *stored = run.clone();
        Ok(())
    }

    async fn get_run(&self, run_id: &str) -> Result<RunEntry, StoreError> {
        self.tables
            .read()
            .runs
            .get(run_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(run_id.to_string()))
    }

    async fn list_runs(&self, workflow_id: Option<&str>) -> Result<Vec<RunEntry>, StoreError> {
        let tables = self.tables.read();
        let mut runs: Vec<RunEntry> = tables
            .runs
            .values()
            .filter(|r| workflow_id.is_none_or(|id| r.workflow_id == id))
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(runs)
    }
}

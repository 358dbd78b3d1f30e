//! Persistence collaborator for workflows and run records.
//!
//! The [`RunStore`] trait defines operations for:
//! - Saving, fetching, listing and deleting workflow descriptors
//! - Logging and updating run records
//! - Querying run history
//!
//! [`MemoryStore`] keeps everything in process memory.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;
use crate::orchestrator::RunEntry;

/// Storage trait for workflows and runs.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Insert or replace a workflow descriptor; returns its id.
    async fn save_workflow(&self, workflow: &Value) -> Result<String, StoreError>;

    async fn get_workflow(&self, workflow_id: &str) -> Result<Value, StoreError>;

    /// Workflows, most recently saved first.
    async fn list_workflows(&self) -> Result<Vec<Value>, StoreError>;

    /// Returns whether a workflow was removed.
    async fn delete_workflow(&self, workflow_id: &str) -> Result<bool, StoreError>;

    /// Record a newly started run.
    async fn log_run(&self, run: &RunEntry) -> Result<(), StoreError>;

    /// Replace the stored record of an existing run.
    async fn update_run(&self, run: &RunEntry) -> Result<(), StoreError>;

    async fn get_run(&self, run_id: &str) -> Result<RunEntry, StoreError>;

    /// Runs, newest first, optionally restricted to one workflow.
    async fn list_runs(&self, workflow_id: Option<&str>) -> Result<Vec<RunEntry>, StoreError>;
}

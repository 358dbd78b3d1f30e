use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ExecutionResult;

/// Lifecycle of a run. Only `Running` may transition, and only forward.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
    Stopped,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Success => "success",
            RunStatus::Failed => "failed",
            RunStatus::Stopped => "stopped",
        }
    }

    pub fn is_terminal(self) -> bool {
        self != RunStatus::Running
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution attempt of a compiled workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunEntry {
    pub run_id: String,
    pub workflow_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    #[serde(default)]
    pub results: Vec<ExecutionResult>,
}

impl RunEntry {
    pub fn running(run_id: impl Into<String>, workflow_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            workflow_id: workflow_id.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
            summary: None,
            results: Vec::new(),
        }
    }

    /// Record the final outcome. Ignored (returns `false`) once the run has
    /// already reached a terminal status.
    pub fn finish(&mut self, status: RunStatus, results: Vec<ExecutionResult>) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.summary = Some(summarize(&results));
        self.status = status;
        self.ended_at = Some(Utc::now());
        self.results = results;
        true
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success).count()
    }
}

/// `"k/n succeeded"`.
pub fn summarize(results: &[ExecutionResult]) -> String {
    let ok = results.iter().filter(|r| r.success).count();
    format!("{ok}/{} succeeded", results.len())
}

/// `stopped` when cancellation was requested, else `success` iff every result
/// succeeded.
pub fn final_status(stop_requested: bool, results: &[ExecutionResult]) -> RunStatus {
    if stop_requested {
        RunStatus::Stopped
    } else if results.iter().all(|r| r.success) {
        RunStatus::Success
    } else {
        RunStatus::Failed
    }
}

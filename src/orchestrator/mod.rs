//! Run orchestration: concurrent workflow runs with cooperative cancellation.

pub mod manager;
pub mod run;

pub use manager::RunManager;
pub use run::{RunEntry, RunStatus, final_status, summarize};

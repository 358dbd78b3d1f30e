//! Data model shared by the compiler, engine, replayer and orchestrator.
//!
//! - `action`: the immutable `Action` unit of work and its primitive kinds.
//! - `result`: `ExecutionResult`, one per execution attempt.
//! - `event`: captured input `Event`s consumed by the replayer and recorder.

pub mod action;
pub mod event;
pub mod result;

pub use action::{Action, ActionKind, Params};
pub use event::{Event, EventKind, unix_now};
pub use result::ExecutionResult;

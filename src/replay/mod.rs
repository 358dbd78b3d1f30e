//! Recording and timed replay.
//!
//! - `recorder`: collects captured [`Event`](crate::model::Event)s with inter-event deltas.
//! - `mapping`: classifies replay items and maps captured events onto actions.
//! - `replayer`: plays actions and events back through an `AutomationEngine`.

pub mod mapping;
pub mod recorder;
pub mod replayer;

pub use mapping::{ItemShape, Mapped, classify, event_to_action};
pub use recorder::{Recorder, RecorderSettings};
pub use replayer::{ReplayHandle, ReplayState, Replayer, ResultObserver, StateObserver};

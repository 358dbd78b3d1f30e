/*!
Recorded-event sources.

An `EventSource` produces raw input events (`{type, action, ts, payload}`
JSON values) and pushes them into a channel; `record_events` drains that
channel into a `Recorder`.

- `stdin_source.rs` -> `StdinSource` (newline-delimited JSON from standard input)

Each source implementation is responsible for:
- Parsing raw input into `serde_json::Value`
- Pushing events via `Sender<Value>` while respecting backpressure (`send().await`)
- Logging errors and continuing (never panicking inside tasks)
- Ending cleanly when the channel closes or the cancellation token fires
*/

use serde_json::Value;
use tokio::{
    sync::mpsc::{Receiver, Sender},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::replay::Recorder;

pub mod stdin_source;

pub use stdin_source::StdinSource;

/// Trait implemented by all event sources.
///
/// A source spawns an asynchronous task that produces JSON events and sends
/// them into the provided channel. Tasks should never panic; log and continue
/// or exit gracefully on unrecoverable errors.
pub trait EventSource: Send + Sync {
    /// Static human-readable identifier (used in logs).
    fn name(&self) -> &'static str;

    /// Start the source in the background.
    fn start(&self, sender: Sender<Value>, cancel: CancellationToken) -> JoinHandle<()>;
}

/// Spawn every source, returning their `JoinHandle`s.
pub fn spawn_all_sources(
    sources: &[Box<dyn EventSource>],
    sender: Sender<Value>,
    cancel: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    sources
        .iter()
        .map(|src| {
            info!(
                target: "autotool::sources",
                source = %src.name(),
                "Starting source task"
            );
            src.start(sender.clone(), cancel.child_token())
        })
        .collect()
}

/// Feed events from `rx` into `recorder` until the channel closes or `cancel`
/// fires. Returns how many events were retained.
pub async fn record_events(
    rx: &mut Receiver<Value>,
    recorder: &mut Recorder,
    cancel: &CancellationToken,
) -> usize {
    let mut retained = 0;
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        match recorder.record_value(&event) {
            Ok(true) => retained += 1,
            Ok(false) => debug!(target: "autotool::sources", "Event filtered"),
            Err(err) => warn!(target: "autotool::sources", error = %err, %event, "Rejected event"),
        }
    }
    retained
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn records_until_channel_closes() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut recorder = Recorder::default();
        recorder.start();

        tx.send(json!({"type": "mouse", "action": "move", "ts": 1.0})).await.unwrap();
        tx.send(json!({"type": "mouse"})).await.unwrap();
        tx.send(json!({"type": "keyboard", "action": "press", "ts": 1.5, "payload": {"key": "a"}}))
            .await
            .unwrap();
        drop(tx);

        let retained = record_events(&mut rx, &mut recorder, &CancellationToken::new()).await;
        assert_eq!(retained, 2);
        assert_eq!(recorder.events()[1].delta, Some(0.5));
    }

    #[tokio::test]
    async fn cancellation_ends_recording() {
        let (_tx, mut rx) = mpsc::channel::<Value>(1);
        let mut recorder = Recorder::default();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_eq!(record_events(&mut rx, &mut recorder, &cancel).await, 0);
    }
}

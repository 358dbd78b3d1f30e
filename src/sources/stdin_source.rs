//! Stdin event source.
//!
//! Reads newline-delimited JSON events from standard input (NDJSON style),
//! e.g. piped from an external input listener:
//!     listener | autotool record --output session.json
//!
//! Malformed lines are logged with `warn!` and skipped. EOF, a closed channel
//! or cancellation ends the task.

use serde_json::Value;
use tokio::{
    io::{self, AsyncBufRead, AsyncBufReadExt, BufReader},
    sync::mpsc::Sender,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

use super::EventSource;

/// Source that reads newline-delimited JSON events from stdin.
#[derive(Debug, Clone, Default)]
pub struct StdinSource;

impl StdinSource {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl EventSource for StdinSource {
    fn name(&self) -> &'static str {
        "stdin"
    }

    fn start(&self, sender: Sender<Value>, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(target: "autotool::sources", "StdinSource task started (reading lines)");
            let forwarded = forward_lines(BufReader::new(io::stdin()), sender, cancel).await;
            trace!(target: "autotool::sources", forwarded, "StdinSource task ended");
        })
    }
}

/// Parse each non-empty line of `reader` as a JSON event and send it. Returns
/// the number of events forwarded.
pub async fn forward_lines<R>(reader: R, sender: Sender<Value>, cancel: CancellationToken) -> usize
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = lines.next_line() => next,
        };
        let line = match next {
            Ok(Some(line)) => line,
            Ok(None) => {
                info!(target: "autotool::sources", forwarded, "EOF on input; source exiting");
                break;
            }
            Err(err) => {
                warn!(target: "autotool::sources", error = %err, "Error reading input; terminating task");
                break;
            }
        };
        let Some(event) = parse_event_line(&line) else {
            continue;
        };
        if sender.send(event).await.is_err() {
            error!(target: "autotool::sources", "Event channel closed; stopping stdin source");
            break;
        }
        forwarded += 1;
    }
    forwarded
}

/// One NDJSON line as an event object. Blank lines, malformed JSON and
/// non-object values yield `None`.
fn parse_event_line(line: &str) -> Option<Value> {
    let raw = line.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(event @ Value::Object(_)) => Some(event),
        Ok(other) => {
            warn!(target: "autotool::sources", value = %other, "Ignoring non-object event line");
            None
        }
        Err(err) => {
            warn!(target: "autotool::sources", error = %err, line = raw, "Failed to parse JSON line");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn parses_only_object_lines() {
        assert!(parse_event_line("  ").is_none());
        assert!(parse_event_line("[1, 2]").is_none());
        assert!(parse_event_line("{broken").is_none());
        assert_eq!(
            parse_event_line(" {\"type\": \"mouse\"} ").unwrap()["type"],
            "mouse"
        );
        assert_eq!(StdinSource::new().name(), "stdin");
    }

    #[tokio::test]
    async fn forwards_valid_lines_and_skips_garbage() {
        let input: &[u8] = b"{\"type\":\"mouse\",\"action\":\"move\"}\n\nnot json\n{\"type\":\"keyboard\",\"action\":\"press\"}\n";
        let (tx, mut rx) = mpsc::channel::<Value>(8);
        let forwarded = forward_lines(input, tx, CancellationToken::new()).await;
        assert_eq!(forwarded, 2);
        assert_eq!(rx.recv().await.unwrap()["type"], "mouse");
        assert_eq!(rx.recv().await.unwrap()["type"], "keyboard");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn stops_when_receiver_dropped() {
        let input: &[u8] = b"{\"a\":1}\n{\"a\":2}\n";
        let (tx, rx) = mpsc::channel::<Value>(1);
        drop(rx);
        assert_eq!(forward_lines(input, tx, CancellationToken::new()).await, 0);
    }
}

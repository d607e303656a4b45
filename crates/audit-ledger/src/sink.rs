use std::path::Path;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::event::LogEvent;
use crate::writer::LedgerWriter;

/// Channel buffer size used between producers and the background writer task.
const CHANNEL_BUFFER: usize = 1024;

/// Maximum number of events drained from the channel per writer batch.
const MAX_BATCH: usize = 64;

/// A cheap, cloneable handle used to submit [`LogEvent`] values into the
/// background ledger writer.
///
/// `LedgerSink` is `Clone + Send + Sync` so it can be shared freely across
/// tasks and protocol taps. Submitting never waits on durable write
/// completion; delivery is the background task's responsibility.
#[derive(Clone)]
pub struct LedgerSink {
    tx: mpsc::Sender<LogEvent>,
}

impl LedgerSink {
    /// Spawn the background writer task and return a `(sink, join_handle)` pair.
    ///
    /// The writer opens (or creates) the file at `path` in append mode and
    /// drains the internal channel in batches: each batch is appended as
    /// JSON lines and synced to the file before the next batch is awaited.
    /// When the last `LedgerSink` clone is dropped the remaining events are
    /// drained, synced, and the task exits cleanly.
    ///
    /// # Panics
    ///
    /// The background task will **not** panic. I/O errors are logged via
    /// `tracing::error` and the event is skipped.
    pub async fn start(
        path: impl AsRef<Path>,
    ) -> Result<(Self, JoinHandle<()>), crate::writer::LedgerWriteError> {
        let (sink, rx) = Self::channel();

        let mut writer = LedgerWriter::open(path).await?;

        let handle = tokio::spawn(async move {
            run_writer_loop(&mut writer, rx).await;
        });

        Ok((sink, handle))
    }

    /// Create a sink backed by a bare channel, returning the receiving end.
    ///
    /// Used when the caller wants to drain events itself instead of writing
    /// them to a file (alternative stores, tests).
    pub fn channel() -> (Self, mpsc::Receiver<LogEvent>) {
        let (tx, rx) = mpsc::channel::<LogEvent>(CHANNEL_BUFFER);
        (Self { tx }, rx)
    }

    /// Submit an event to the background writer without waiting.
    ///
    /// Safe to call from synchronous code holding a lock. If the channel is
    /// full or the background task has exited, the event is dropped and a
    /// warning is logged; the caller is never blocked on persistence.
    pub fn enqueue(&self, event: LogEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                tracing::warn!(
                    event_type = %event.event_type,
                    "ledger channel full, event dropped"
                );
            }
            Err(mpsc::error::TrySendError::Closed(event)) => {
                tracing::warn!(
                    event_type = %event.event_type,
                    "ledger channel closed, event dropped"
                );
            }
        }
    }

    /// Submit an event, waiting for channel capacity if necessary.
    ///
    /// Preferred from async contexts that can afford backpressure. If the
    /// background task has already exited the event is dropped and a warning
    /// is logged.
    pub async fn log(&self, event: LogEvent) {
        if let Err(err) = self.tx.send(event).await {
            tracing::warn!(
                event_type = %err.0.event_type,
                "ledger channel closed, event dropped"
            );
        }
    }
}

/// Core loop executed inside the background task.
///
/// Drains the channel in batches of up to [`MAX_BATCH`] events, syncing the
/// writer once per batch. Events never sit buffered while the channel is
/// idle, so no timer is needed; durability lags the channel by at most one
/// batch. Exits when every sender is gone and the channel is empty.
async fn run_writer_loop(writer: &mut LedgerWriter, mut rx: mpsc::Receiver<LogEvent>) {
    let mut batch = Vec::with_capacity(MAX_BATCH);

    // recv_many waits for at least one event and returns 0 only once the
    // channel is closed and fully drained.
    while rx.recv_many(&mut batch, MAX_BATCH).await > 0 {
        for event in batch.drain(..) {
            if let Err(err) = writer.append(&event).await {
                tracing::error!(%err, "failed to write ledger event");
            }
        }
        if let Err(err) = writer.sync().await {
            tracing::error!(%err, "failed to sync ledger");
        }
    }

    tracing::debug!("ledger writer background task shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn enqueue_delivers_to_receiver() {
        let (sink, mut rx) = LedgerSink::channel();

        sink.enqueue(LogEvent::now(
            "mongo",
            "127.0.0.1:9",
            "alice",
            serde_json::json!({"operation": "insert"}),
            None,
        ));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type, "mongo");
        assert_eq!(event.identity, "alice");
    }

    #[tokio::test]
    async fn enqueue_after_receiver_dropped_does_not_panic() {
        let (sink, rx) = LedgerSink::channel();
        drop(rx);

        // Dropped with a warning, caller unaffected.
        sink.enqueue(LogEvent::now("mongo", "a", "", serde_json::json!({}), None));
    }

    #[tokio::test]
    async fn start_drains_batches_to_file_and_exits_on_drop() {
        let path =
            std::env::temp_dir().join(format!("dbtap-sink-{}.jsonl", uuid::Uuid::new_v4()));
        let (sink, handle) = LedgerSink::start(&path).await.unwrap();

        // More than one batch's worth, enqueued before the task can drain.
        for i in 0..(MAX_BATCH + 5) {
            sink.enqueue(LogEvent::now(
                "mongo",
                "127.0.0.1:9",
                "",
                serde_json::json!({"n": i}),
                None,
            ));
        }
        drop(sink);
        handle.await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), MAX_BATCH + 5);
        let last: LogEvent = serde_json::from_str(lines.last().unwrap()).unwrap();
        assert_eq!(last.payload["n"], MAX_BATCH + 5 - 1);

        tokio::fs::remove_file(&path).await.ok();
    }

    #[tokio::test]
    async fn events_arrive_in_enqueue_order() {
        let (sink, mut rx) = LedgerSink::channel();

        for i in 0..10 {
            sink.enqueue(LogEvent::now(
                "mongo",
                "a",
                "",
                serde_json::json!({"n": i}),
                None,
            ));
        }

        for i in 0..10 {
            let event = rx.recv().await.unwrap();
            assert_eq!(event.payload["n"], i);
        }
    }
}

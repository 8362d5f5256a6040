//! Debounced persistence with ordered fallback channels.
//!
//! Result writes arrive in bursts (batch runs touch several keys back to
//! back), while the durable targets behind the store are comparatively slow.
//! [`CoalescingWriter`] sits between the two: callers mark the store dirty
//! with [`CoalescingWriter::touch`] and the writer collapses everything that
//! lands within the debounce window into a single flush on the trailing edge.
//!
//! A flush walks the configured [`PersistChannel`]s in order and stops at the
//! first one that succeeds. Total failure is logged and swallowed; the
//! in-memory store stays authoritative and the next touch retries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

/// A persistence channel rejected a flush.
#[derive(Debug, Error)]
#[error("persist channel '{channel}' failed: {message}")]
pub struct PersistError {
    /// Channel that reported the failure.
    pub channel: String,
    /// Human-readable failure detail.
    pub message: String,
}

impl PersistError {
    /// Build an error for the named channel.
    #[must_use]
    pub fn new(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            message: message.into(),
        }
    }
}

/// One durable target for the conversation log.
///
/// Channels snapshot whatever state they persist themselves; the writer only
/// tells them *when* to flush, never *what*.
#[async_trait]
pub trait PersistChannel: Send + Sync {
    /// Stable channel name used in logs.
    fn name(&self) -> &str;

    /// Flush the current store state to this channel.
    async fn persist(&self) -> Result<(), PersistError>;
}

enum Command {
    Touch,
    Flush(oneshot::Sender<()>),
    Shutdown(oneshot::Sender<()>),
}

/// Trailing-edge debounced writer over ordered fallback channels.
///
/// Dropping the writer without [`CoalescingWriter::shutdown`] abandons any
/// pending (un-flushed) touch.
pub struct CoalescingWriter {
    tx: mpsc::UnboundedSender<Command>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl CoalescingWriter {
    /// Spawn the writer task.
    ///
    /// `debounce` is the quiet period after the last touch before a flush
    /// fires. Channels are tried in the order given.
    #[must_use]
    pub fn spawn(channels: Vec<Arc<dyn PersistChannel>>, debounce: Duration) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_loop(channels, debounce, rx));
        Self {
            tx,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// Mark the store dirty. Restarts the debounce window.
    pub fn touch(&self) {
        let _ = self.tx.send(Command::Touch);
    }

    /// Flush immediately, bypassing the debounce window, and wait for the
    /// flush to complete.
    pub async fn flush(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Flush(ack)).is_ok() {
            let _ = done.await;
        }
    }

    /// Flush any pending touch and stop the worker. Idempotent; later calls
    /// are no-ops.
    pub async fn shutdown(&self) {
        let (ack, done) = oneshot::channel();
        if self.tx.send(Command::Shutdown(ack)).is_ok() {
            let _ = done.await;
        }
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}

async fn run_loop(
    channels: Vec<Arc<dyn PersistChannel>>,
    debounce: Duration,
    mut rx: mpsc::UnboundedReceiver<Command>,
) {
    let mut deadline: Option<Instant> = None;
    loop {
        let next = deadline.unwrap_or_else(Instant::now);
        tokio::select! {
            cmd = rx.recv() => match cmd {
                Some(Command::Touch) => {
                    deadline = Some(Instant::now() + debounce);
                }
                Some(Command::Flush(ack)) => {
                    flush_channels(&channels).await;
                    deadline = None;
                    let _ = ack.send(());
                }
                Some(Command::Shutdown(ack)) => {
                    if deadline.is_some() {
                        flush_channels(&channels).await;
                    }
                    let _ = ack.send(());
                    break;
                }
                None => {
                    if deadline.is_some() {
                        flush_channels(&channels).await;
                    }
                    break;
                }
            },
            () = tokio::time::sleep_until(next), if deadline.is_some() => {
                flush_channels(&channels).await;
                deadline = None;
            }
        }
    }
}

/// Try each channel in order; the first success wins.
async fn flush_channels(channels: &[Arc<dyn PersistChannel>]) {
    for channel in channels {
        match channel.persist().await {
            Ok(()) => {
                debug!(channel = channel.name(), "persisted");
                return;
            }
            Err(err) => {
                warn!(channel = channel.name(), error = %err, "persist channel failed, trying next");
            }
        }
    }
    if !channels.is_empty() {
        warn!("all persist channels failed; store remains in memory only");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingChannel {
        name: &'static str,
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingChannel {
        fn ok(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, calls: AtomicUsize::new(0), fail: false })
        }

        fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self { name, calls: AtomicUsize::new(0), fail: true })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PersistChannel for CountingChannel {
        fn name(&self) -> &str {
            self.name
        }

        async fn persist(&self) -> Result<(), PersistError> {
            let _ = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(PersistError::new(self.name, "unavailable"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_touches_collapses_to_one_flush() {
        let primary = CountingChannel::ok("primary");
        let writer = CoalescingWriter::spawn(
            vec![primary.clone() as Arc<dyn PersistChannel>],
            Duration::from_millis(100),
        );

        for _ in 0..5 {
            writer.touch();
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(primary.calls(), 0, "flushed inside the debounce window");

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(primary.calls(), 1);

        writer.shutdown().await;
        assert_eq!(primary.calls(), 1, "clean shutdown must not re-flush");
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_flush_bypasses_debounce() {
        let primary = CountingChannel::ok("primary");
        let writer = CoalescingWriter::spawn(
            vec![primary.clone() as Arc<dyn PersistChannel>],
            Duration::from_secs(60),
        );

        writer.touch();
        writer.flush().await;
        assert_eq!(primary.calls(), 1);

        // The pending deadline was cleared by the flush.
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(primary.calls(), 1);

        writer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn falls_back_to_next_channel_in_order() {
        let broken = CountingChannel::failing("broken");
        let backup = CountingChannel::ok("backup");
        let writer = CoalescingWriter::spawn(
            vec![
                broken.clone() as Arc<dyn PersistChannel>,
                backup.clone() as Arc<dyn PersistChannel>,
            ],
            Duration::from_millis(50),
        );

        writer.flush().await;
        assert_eq!(broken.calls(), 1);
        assert_eq!(backup.calls(), 1);

        writer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn total_failure_is_swallowed() {
        let broken = CountingChannel::failing("broken");
        let writer = CoalescingWriter::spawn(
            vec![broken.clone() as Arc<dyn PersistChannel>],
            Duration::from_millis(50),
        );

        writer.flush().await;
        assert_eq!(broken.calls(), 1);

        // A later touch retries the same channel.
        writer.touch();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(broken.calls(), 2);

        writer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_flushes_pending_touch() {
        let primary = CountingChannel::ok("primary");
        let writer = CoalescingWriter::spawn(
            vec![primary.clone() as Arc<dyn PersistChannel>],
            Duration::from_secs(60),
        );

        writer.touch();
        writer.shutdown().await;
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn no_touch_means_no_flush() {
        let primary = CountingChannel::ok("primary");
        let writer = CoalescingWriter::spawn(
            vec![primary.clone() as Arc<dyn PersistChannel>],
            Duration::from_millis(50),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        writer.shutdown().await;
        assert_eq!(primary.calls(), 0);
    }
}

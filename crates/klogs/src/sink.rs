//! The shared output sink (§5): serializes line-atomic writes across every
//! engine instance the watcher hosts, so two streams can never interleave
//! partial lines.

use std::sync::Arc;

use tokio::io::{AsyncWriteExt, Stdout};
use tokio::sync::Mutex as AsyncMutex;

/// A destination for whole, already-rendered output lines.
///
/// Implementations must write a line plus its trailing newline as one
/// atomic unit with respect to other concurrent callers. Used generically
/// (`impl LineSink`), never as a trait object, so this can stay a plain
/// async trait method without boxing the future.
pub trait LineSink: Clone + Send + Sync + 'static {
    fn write_line(&self, line: &str) -> impl std::future::Future<Output = ()> + Send;
}

/// The production sink: standard output, guarded by an async mutex so every
/// attached stream's engine can share one handle.
#[derive(Clone)]
pub struct StdoutSink {
    inner: Arc<AsyncMutex<Stdout>>,
}

impl StdoutSink {
    pub fn new() -> Self {
        Self { inner: Arc::new(AsyncMutex::new(tokio::io::stdout())) }
    }
}

impl Default for StdoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSink for StdoutSink {
    async fn write_line(&self, line: &str) {
        let mut guard = self.inner.lock().await;
        let _ = guard.write_all(line.as_bytes()).await;
        let _ = guard.write_all(b"\n").await;
        let _ = guard.flush().await;
    }
}

/// An in-memory sink used by tests to assert on emitted line order.
#[derive(Clone)]
pub struct VecSink {
    inner: Arc<AsyncMutex<Vec<String>>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self { inner: Arc::new(AsyncMutex::new(Vec::new())) }
    }

    pub fn lines(&self) -> Vec<String> {
        self.inner.try_lock().expect("sink accessed from a live writer").clone()
    }
}

impl Default for VecSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LineSink for VecSink {
    async fn write_line(&self, line: &str) {
        self.inner.lock().await.push(line.to_string());
    }
}

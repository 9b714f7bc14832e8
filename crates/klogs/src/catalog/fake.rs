//! In-memory collaborators used by the test suite, modeled on the teacher's
//! `FakeDocker` double: a mutex-guarded table seeded by builder methods,
//! with no network or process dependency.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use tokio::io::AsyncBufRead;
use tokio::sync::{mpsc, watch, Mutex};

use crate::error::CatalogError;

use super::{StreamOpener, Workload, WorkloadCatalog, WorkloadEvent};

#[derive(Default)]
struct Inner {
    workloads: Vec<Workload>,
    logs: HashMap<(String, String), Vec<String>>,
    events: Vec<WorkloadEvent>,
    list_error: Option<CatalogError>,
    open_errors: HashMap<(String, String), CatalogError>,
}

/// A workload catalog backed entirely by in-memory state.
#[derive(Clone, Default)]
pub struct FakeCatalog {
    inner: Arc<Mutex<Inner>>,
}

impl FakeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn push_workload(&self, workload: Workload) {
        self.inner.lock().await.workloads.push(workload);
    }

    pub async fn push_logs(&self, workload: &str, container: &str, lines: Vec<String>) {
        self.inner
            .lock()
            .await
            .logs
            .insert((workload.to_string(), container.to_string()), lines);
    }

    /// Queues a live-discovery event; delivered to subscribers in push order.
    pub async fn push_event(&self, event: WorkloadEvent) {
        self.inner.lock().await.events.push(event);
    }

    pub async fn fail_list(&self, err: CatalogError) {
        self.inner.lock().await.list_error = Some(err);
    }

    pub async fn fail_open(&self, workload: &str, container: &str, err: CatalogError) {
        self.inner
            .lock()
            .await
            .open_errors
            .insert((workload.to_string(), container.to_string()), err);
    }
}

impl WorkloadCatalog for FakeCatalog {
    async fn list(&self, _namespace: &str, _selector: &str) -> Result<Vec<Workload>, CatalogError> {
        let inner = self.inner.lock().await;
        if let Some(err) = &inner.list_error {
            return Err(err.clone());
        }
        Ok(inner.workloads.clone())
    }

    async fn subscribe(
        &self,
        _namespace: &str,
        _selector: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> mpsc::Receiver<WorkloadEvent> {
        let (tx, rx) = mpsc::channel(16);
        let events = self.inner.lock().await.events.clone();

        tokio::spawn(async move {
            for event in events {
                tokio::select! {
                    biased;
                    _ = cancel.changed() => break,
                    result = tx.send(event) => {
                        if result.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        rx
    }
}

/// A single-use in-memory log reader: yields its seeded lines then EOF,
/// ignoring `follow` (the fake never produces new lines on its own — tests
/// drive liveness via `FakeCatalog::push_event` instead).
impl StreamOpener for FakeCatalog {
    async fn open(
        &self,
        _namespace: &str,
        workload: &str,
        container: &str,
        _follow: bool,
        _cancel: watch::Receiver<bool>,
    ) -> Result<Pin<Box<dyn AsyncBufRead + Send + Unpin>>, CatalogError> {
        let inner = self.inner.lock().await;
        let key = (workload.to_string(), container.to_string());
        if let Some(err) = inner.open_errors.get(&key) {
            return Err(err.clone());
        }
        let lines = inner.logs.get(&key).cloned().unwrap_or_default();
        let mut body = lines.join("\n");
        if !body.is_empty() {
            body.push('\n');
        }
        Ok(Box::pin(tokio::io::BufReader::new(std::io::Cursor::new(body.into_bytes()))))
    }
}

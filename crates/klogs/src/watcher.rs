//! Workload/Container Watcher (§4.F): owns the lifetime of every attached
//! stream for a single run. Dedupes attachments, integrates live discovery,
//! and coordinates graceful/forced shutdown.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, watch, Mutex};
use tracing::{debug, info, warn};

use crate::catalog::{Phase, StreamOpener, Workload, WorkloadCatalog, WorkloadEventKind};
use crate::config::{Config, Extra};
use crate::engine;
use crate::error::WatcherError;
use crate::formatters::Registry;
use crate::sink::LineSink;

/// Selection and decoration state shared across every attach decision.
pub struct WatcherSpec {
    pub namespace: String,
    pub selector: String,
    pub follow: bool,
    pub valid_workload_names: Vec<String>,
    pub valid_container_names: Vec<String>,
    pub base_config: Config,
    /// Path hint for constructing the cluster/collaborator client (§6's
    /// `--kubeconfig`). The watcher itself never dials a client — this is
    /// carried through for the driver to hand to whichever collaborator it
    /// builds.
    pub kubeconfig: String,
    /// Context-name override for the cluster client (§6's `--kubecontext`).
    pub kubecontext: String,
}

/// The one-shot "all outstanding streams drained" latch. Firing twice must
/// not panic — `force_finish` is an explicit escape hatch on repeated
/// interrupt, so the underlying channel is consumed defensively.
struct DoneLatch {
    tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl DoneLatch {
    fn new() -> (Arc<Self>, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Arc::new(Self { tx: Mutex::new(Some(tx)) }), rx)
    }

    async fn fire(&self) {
        if let Some(tx) = self.tx.lock().await.take() {
            let _ = tx.send(());
        }
    }
}

/// Supervises every attached stream for one run: one catalog, one stream
/// opener, one shared output sink.
pub struct Watcher<C, O, S> {
    catalog: C,
    opener: O,
    sink: S,
    registry: Arc<Registry>,
    spec: WatcherSpec,
    attached: Arc<Mutex<HashSet<String>>>,
    outstanding: Arc<AtomicU64>,
    done: Arc<DoneLatch>,
    done_rx: Mutex<Option<oneshot::Receiver<()>>>,
}

impl<C, O, S> Watcher<C, O, S>
where
    C: WorkloadCatalog + Clone,
    O: StreamOpener + Clone,
    S: LineSink,
{
    pub fn new(catalog: C, opener: O, sink: S, registry: Arc<Registry>, spec: WatcherSpec) -> Self {
        let (done, done_rx) = DoneLatch::new();
        Self {
            catalog,
            opener,
            sink,
            registry,
            spec,
            attached: Arc::new(Mutex::new(HashSet::new())),
            outstanding: Arc::new(AtomicU64::new(0)),
            done,
            done_rx: Mutex::new(Some(done_rx)),
        }
    }

    /// Fires immediately, even with workers still outstanding. Idempotent:
    /// the underlying latch only ever fires once.
    pub async fn force_finish(&self) {
        warn!("force-finish invoked; abandoning any still-draining streams");
        self.done.fire().await;
    }

    /// Resolves once the outstanding-stream counter reaches zero, or once
    /// `force_finish` is called. Only the first caller actually awaits the
    /// channel; a reused watcher that already consumed it resolves at once.
    pub async fn wait_done(&self) {
        let rx = self.done_rx.lock().await.take();
        match rx {
            Some(rx) => {
                let _ = rx.await;
            }
            None => {}
        }
    }

    fn maybe_finish(&self) {
        if self.outstanding.load(Ordering::SeqCst) == 0 {
            let done = Arc::clone(&self.done);
            tokio::spawn(async move { done.fire().await });
        }
    }

    /// Enumerates matching workloads, attaches each, and — if `follow` is
    /// set — subscribes to live discovery events until `cancel` fires.
    pub async fn start(&self, cancel: watch::Receiver<bool>) -> Result<(), WatcherError> {
        let workloads = self.catalog.list(&self.spec.namespace, &self.spec.selector).await?;
        info!(count = workloads.len(), "listed workloads");

        for workload in workloads {
            self.attach(workload, cancel.clone()).await;
        }

        if self.spec.follow {
            let mut events = self.catalog.subscribe(&self.spec.namespace, &self.spec.selector, cancel.clone()).await;
            loop {
                let Some(event) = events.recv().await else { break };
                let is_live = matches!(event.kind, WorkloadEventKind::Added | WorkloadEventKind::Modified);
                if is_live && event.workload.phase == Phase::Running {
                    self.attach(event.workload, cancel.clone()).await;
                }
            }
        }

        self.maybe_finish();
        Ok(())
    }

    /// Attaches one workload exactly once (test-and-set on `attached`);
    /// spawns one engine worker per allowed container.
    pub async fn attach(&self, workload: Workload, cancel: watch::Receiver<bool>) {
        {
            let mut attached = self.attached.lock().await;
            if attached.contains(&workload.name) {
                return;
            }
            attached.insert(workload.name.clone());
        }

        if !self.spec.valid_workload_names.is_empty()
            && !self.spec.valid_workload_names.contains(&workload.name)
        {
            debug!(workload = %workload.name, "dropping workload not in allowlist");
            return;
        }

        let single_container = workload.containers.len() == 1;

        for container in &workload.containers {
            if !self.spec.valid_container_names.is_empty()
                && !self.spec.valid_container_names.contains(container)
            {
                continue;
            }

            let mut config = self.spec.base_config.clone();
            config.extras.push(Extra { key: "pod_name".into(), value: workload.name.clone() });
            config.extras.push(Extra { key: "namespace".into(), value: workload.namespace.clone() });
            if single_container {
                config.prefix = format!("[{}] {}: ", workload.namespace, workload.name);
            } else {
                config.extras.push(Extra { key: "container_name".into(), value: container.clone() });
                config.prefix = format!("[{}] {} ({}): ", workload.namespace, workload.name, container);
            }

            self.outstanding.fetch_add(1, Ordering::SeqCst);
            info!(workload = %workload.name, container = %container, "attaching stream");

            let opener = self.opener.clone();
            let sink = self.sink.clone();
            let registry = Arc::clone(&self.registry);
            let namespace = workload.namespace.clone();
            let workload_name = workload.name.clone();
            let container_name = container.clone();
            let outstanding = Arc::clone(&self.outstanding);
            let done = Arc::clone(&self.done);
            let worker_cancel = cancel.clone();
            let follow = self.spec.follow;

            tokio::spawn(async move {
                let follow_cancel = worker_cancel.clone();
                let stream = opener
                    .open(&namespace, &workload_name, &container_name, follow, follow_cancel)
                    .await;

                match stream {
                    Ok(reader) => {
                        if let Err(err) = engine::run(config, &registry, reader, sink, worker_cancel).await {
                            warn!(workload = %workload_name, container = %container_name, error = %err, "engine run failed");
                        }
                    }
                    Err(err) => {
                        warn!(workload = %workload_name, container = %container_name, error = %err, "failed to open log stream");
                    }
                }

                info!(workload = %workload_name, container = %container_name, "detached stream");
                if outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
                    done.fire().await;
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fake::FakeCatalog;
    use crate::catalog::{Phase, Workload, WorkloadEvent, WorkloadEventKind};
    use crate::sink::VecSink;
    use std::time::Duration;

    fn spec(namespace: &str) -> WatcherSpec {
        WatcherSpec {
            namespace: namespace.into(),
            selector: String::new(),
            follow: false,
            valid_workload_names: Vec::new(),
            valid_container_names: Vec::new(),
            base_config: Config { formatter_name: "text".into(), ..Default::default() },
            kubeconfig: String::new(),
            kubecontext: String::new(),
        }
    }

    #[tokio::test]
    async fn attaches_each_workload_exactly_once() {
        let catalog = FakeCatalog::new();
        catalog
            .push_workload(Workload {
                name: "api".into(),
                namespace: "default".into(),
                phase: Phase::Running,
                containers: vec!["api".into()],
            })
            .await;
        catalog.push_logs("api", "api", vec!["level=info msg=hello".into()]).await;

        let sink = VecSink::new();
        let registry = Arc::new(Registry::with_defaults());
        let watcher = Watcher::new(catalog.clone(), catalog, sink.clone(), registry, spec("default"));
        let (_tx, cancel) = watch::channel(false);

        watcher.start(cancel).await.unwrap();
        watcher.attach(
            Workload { name: "api".into(), namespace: "default".into(), phase: Phase::Running, containers: vec!["api".into()] },
            watch::channel(false).1,
        ).await;

        watcher.wait_done().await;
        assert_eq!(sink.lines(), vec!["[default] api: level=info msg=hello".to_string()]);
    }

    #[tokio::test]
    async fn follow_mode_attaches_workloads_from_live_events() {
        let catalog = FakeCatalog::new();
        let workload = Workload {
            name: "worker".into(),
            namespace: "default".into(),
            phase: Phase::Running,
            containers: vec!["worker".into()],
        };
        catalog.push_logs("worker", "worker", vec!["level=info msg=up".into()]).await;
        catalog.push_event(WorkloadEvent { kind: WorkloadEventKind::Added, workload }).await;

        let sink = VecSink::new();
        let registry = Arc::new(Registry::with_defaults());
        let mut watcher_spec = spec("default");
        watcher_spec.follow = true;
        let (tx, cancel) = watch::channel(false);
        let watcher = Arc::new(Watcher::new(catalog.clone(), catalog, sink.clone(), registry, watcher_spec));

        let started = Arc::clone(&watcher);
        let start_cancel = cancel.clone();
        tokio::spawn(async move { started.start(start_cancel).await.unwrap() });

        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = tx.send(true);
        watcher.wait_done().await;

        assert_eq!(sink.lines(), vec!["[default] worker: level=info msg=up".to_string()]);
    }

    #[tokio::test]
    async fn force_finish_resolves_wait_done_immediately() {
        let catalog = FakeCatalog::new();
        let sink = VecSink::new();
        let registry = Arc::new(Registry::with_defaults());
        let watcher = Watcher::new(catalog.clone(), catalog, sink, registry, spec("default"));

        watcher.force_finish().await;
        watcher.force_finish().await;
        watcher.wait_done().await;
    }
}

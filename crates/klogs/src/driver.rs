//! Driver (§4.G): collaborator glue. Builds nothing the core needs to know
//! about the shape of — it wires a catalog, a stream opener, an output
//! sink, and an interrupt source into one [`Watcher`] run.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::catalog::{StreamOpener, WorkloadCatalog};
use crate::error::WatcherError;
use crate::formatters::Registry;
use crate::sink::LineSink;
use crate::watcher::{Watcher, WatcherSpec};

/// Runs one watcher to completion, wiring `interrupt` (see
/// [`interrupt_signal`]) to the watcher's cancellation handle. The first
/// interrupt requests a graceful shutdown; a second escalates to
/// [`Watcher::force_finish`].
pub async fn run<C, O, S>(
    catalog: C,
    opener: O,
    sink: S,
    registry: Arc<Registry>,
    spec: WatcherSpec,
    mut interrupt: tokio::sync::mpsc::Receiver<()>,
) -> Result<(), WatcherError>
where
    C: WorkloadCatalog + Clone,
    O: StreamOpener + Clone,
    S: LineSink,
{
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let watcher = Arc::new(Watcher::new(catalog, opener, sink, registry, spec));

    let escalation = {
        let watcher = Arc::clone(&watcher);
        async move {
            if interrupt.recv().await.is_some() {
                info!("received interrupt, requesting graceful shutdown");
                let _ = cancel_tx.send(true);
            }
            if interrupt.recv().await.is_some() {
                warn!("received a second interrupt, forcing shutdown");
                watcher.force_finish().await;
            }
        }
    };

    let start = {
        let watcher = Arc::clone(&watcher);
        async move { watcher.start(cancel_rx).await }
    };

    let (start_result, _) = tokio::join!(start, escalation_with_wait(&watcher, escalation));
    start_result
}

/// Runs the escalation listener alongside waiting for quiescence, so a
/// second interrupt can still fire `force_finish` while streams drain.
async fn escalation_with_wait<C, O, S>(
    watcher: &Arc<Watcher<C, O, S>>,
    escalation: impl std::future::Future<Output = ()>,
) where
    C: WorkloadCatalog + Clone,
    O: StreamOpener + Clone,
    S: LineSink,
{
    tokio::select! {
        _ = escalation => {}
        _ = watcher.wait_done() => {}
    }
    watcher.wait_done().await;
    info!("shutdown complete, all streams drained");
}

/// The ambient interrupt source: SIGINT (and SIGTERM on unix), mapped to one
/// signal per press. A driver that wants a different interrupt source can
/// construct its own channel and call [`run`] directly.
pub fn interrupt_signal() -> tokio::sync::mpsc::Receiver<()> {
    let (tx, rx) = tokio::sync::mpsc::channel(2);

    tokio::spawn(async move {
        loop {
            let ctrl_c = async {
                let _ = tokio::signal::ctrl_c().await;
            };

            #[cfg(unix)]
            let terminate = async {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(_) => std::future::pending::<()>().await,
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {}
                _ = terminate => {}
            }

            if tx.send(()).await.is_err() {
                break;
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::fake::FakeCatalog;
    use crate::catalog::{Phase, Workload};
    use crate::config::Config;
    use crate::sink::VecSink;

    #[tokio::test]
    async fn run_completes_without_any_interrupt_once_streams_drain() {
        let catalog = FakeCatalog::new();
        catalog
            .push_workload(Workload {
                name: "api".into(),
                namespace: "default".into(),
                phase: Phase::Running,
                containers: vec!["api".into()],
            })
            .await;
        catalog.push_logs("api", "api", vec!["level=info msg=up".into()]).await;

        let sink = VecSink::new();
        let registry = Arc::new(Registry::with_defaults());
        let spec = WatcherSpec {
            namespace: "default".into(),
            selector: String::new(),
            follow: false,
            valid_workload_names: Vec::new(),
            valid_container_names: Vec::new(),
            base_config: Config { formatter_name: "text".into(), ..Default::default() },
            kubeconfig: String::new(),
            kubecontext: String::new(),
        };
        let (_tx, rx) = tokio::sync::mpsc::channel(1);

        run(catalog.clone(), catalog, sink.clone(), registry, spec, rx).await.unwrap();
        assert_eq!(sink.lines(), vec!["[default] api: level=info msg=up".to_string()]);
    }
}

//! Collaborator contracts (§4.G, §6): the workload catalog and the
//! log-stream opener. Cluster client construction, authentication, and the
//! specific wire protocol of the log endpoint are explicitly out of scope —
//! these traits are the only surface the core depends on.

pub mod docker;
pub mod fake;

use tokio::io::AsyncBufRead;
use tokio::sync::watch;

use crate::error::CatalogError;

/// One logical deployment unit containing one or more containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    pub phase: Phase,
    pub containers: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Pending,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkloadEventKind {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone)]
pub struct WorkloadEvent {
    pub kind: WorkloadEventKind,
    pub workload: Workload,
}

/// Lists and subscribes to workload additions filtered by namespace and
/// label query.
pub trait WorkloadCatalog: Send + Sync + 'static {
    fn list(
        &self,
        namespace: &str,
        selector: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Workload>, CatalogError>> + Send;

    /// Returns a receiver fed with workload lifecycle events until `cancel`
    /// fires. `added`/`modified` events for a `Running` workload drive live
    /// attach (§4.F); `deleted` events are informational only.
    fn subscribe(
        &self,
        namespace: &str,
        selector: &str,
        cancel: watch::Receiver<bool>,
    ) -> impl std::future::Future<Output = tokio::sync::mpsc::Receiver<WorkloadEvent>> + Send;
}

/// Opens a byte-oriented log reader for one container.
pub trait StreamOpener: Send + Sync + 'static {
    fn open(
        &self,
        namespace: &str,
        workload: &str,
        container: &str,
        follow: bool,
        cancel: watch::Receiver<bool>,
    ) -> impl std::future::Future<
        Output = Result<std::pin::Pin<Box<dyn AsyncBufRead + Send + Unpin>>, CatalogError>,
    > + Send;
}

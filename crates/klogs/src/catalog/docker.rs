//! A concrete, testable realization of the workload-catalog and
//! stream-opener collaborators backed by a local Docker engine (via
//! `bollard`, reused from the teacher's own `docker` module). Real cluster
//! client construction and authentication remain out of scope — this is
//! one possible collaborator, not part of the core.
//!
//! Each Docker container is treated as a single-container workload; the
//! `namespace` concept has no Docker analogue and is ignored on `list`
//! (every container is visible regardless of the `namespace` argument).
//! `selector` is interpreted as a Docker label filter in `key=value` form.

use std::collections::HashMap;
use std::pin::Pin;

use bollard::query_parameters::{EventsOptionsBuilder, ListContainersOptions, LogsOptions};
use bollard::Docker;
use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::AsyncBufRead;
use tokio::sync::{mpsc, watch};
use tokio_util::io::StreamReader;

use crate::error::CatalogError;

use super::{Phase, StreamOpener, Workload, WorkloadCatalog, WorkloadEvent, WorkloadEventKind};

#[derive(Clone)]
pub struct DockerCatalog {
    client: Docker,
}

impl DockerCatalog {
    pub fn connect(socket_path: &str) -> Result<Self, CatalogError> {
        let client = if socket_path.is_empty() {
            Docker::connect_with_defaults()
        } else {
            let clean_path = socket_path.trim_start_matches("unix://");
            Docker::connect_with_socket(clean_path, 120, bollard::API_DEFAULT_VERSION)
        }
        .map_err(|e| CatalogError::Backend(e.to_string()))?;

        Ok(Self { client })
    }
}

fn split_selector(selector: &str) -> Option<(&str, &str)> {
    if selector.is_empty() {
        return None;
    }
    selector.split_once('=')
}

fn log_output_bytes(output: bollard::container::LogOutput) -> Bytes {
    use bollard::container::LogOutput;
    match output {
        LogOutput::StdOut { message } => message,
        LogOutput::StdErr { message } => message,
        LogOutput::StdIn { message } => message,
        LogOutput::Console { message } => message,
    }
}

impl WorkloadCatalog for DockerCatalog {
    async fn list(&self, _namespace: &str, selector: &str) -> Result<Vec<Workload>, CatalogError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        if let Some((key, value)) = split_selector(selector) {
            filters.insert("label".to_string(), vec![format!("{key}={value}")]);
        }

        let options = Some(ListContainersOptions { all: false, filters, ..Default::default() });

        let containers = self
            .client
            .list_containers(options)
            .await
            .map_err(|e| CatalogError::Backend(e.to_string()))?;

        Ok(containers
            .into_iter()
            .map(|c| {
                let name = c
                    .names
                    .unwrap_or_default()
                    .into_iter()
                    .next()
                    .unwrap_or_default()
                    .trim_start_matches('/')
                    .to_string();
                let phase = match c.state.as_deref() {
                    Some("running") => Phase::Running,
                    Some(_) => Phase::Other,
                    None => Phase::Other,
                };
                Workload { namespace: String::new(), containers: vec![name.clone()], name, phase }
            })
            .collect())
    }

    async fn subscribe(
        &self,
        _namespace: &str,
        selector: &str,
        mut cancel: watch::Receiver<bool>,
    ) -> mpsc::Receiver<WorkloadEvent> {
        let (tx, rx) = mpsc::channel(16);
        let client = self.client.clone();
        let selector = selector.to_string();

        tokio::spawn(async move {
            let label = split_selector(&selector).map(|(key, value)| format!("{key}={value}"));

            let mut filters = HashMap::new();
            filters.insert("type", vec!["container"]);
            if let Some(label) = &label {
                filters.insert("label", vec![label.as_str()]);
            }
            let options = EventsOptionsBuilder::default().filters(&filters).build();
            let mut events = client.events(Some(options));

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.changed() => break,
                    next = events.next() => {
                        let Some(Ok(event)) = next else { break };
                        let Some(action) = event.action.as_deref() else { continue };
                        let kind = match action {
                            "start" => WorkloadEventKind::Added,
                            "die" | "stop" | "destroy" => WorkloadEventKind::Deleted,
                            _ => continue,
                        };
                        let name = event
                            .actor
                            .and_then(|a| a.attributes)
                            .and_then(|attrs| attrs.get("name").cloned())
                            .unwrap_or_default();
                        let workload = Workload {
                            name: name.clone(),
                            namespace: String::new(),
                            phase: if matches!(kind, WorkloadEventKind::Added) { Phase::Running } else { Phase::Other },
                            containers: vec![name],
                        };
                        if tx.send(WorkloadEvent { kind, workload }).await.is_err() {
                            break;
                        }
                    }
                }
            }
        });

        rx
    }
}

impl StreamOpener for DockerCatalog {
    async fn open(
        &self,
        _namespace: &str,
        workload: &str,
        _container: &str,
        follow: bool,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<Pin<Box<dyn AsyncBufRead + Send + Unpin>>, CatalogError> {
        let options = LogsOptions {
            follow,
            stdout: true,
            stderr: true,
            tail: "all".to_string(),
            ..Default::default()
        };

        let logs = self.client.logs(workload, Some(options));

        let byte_stream = logs
            .take_until(async move {
                let _ = cancel.changed().await;
            })
            .map(|item| {
                item.map(log_output_bytes)
                    .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
            });

        let reader = StreamReader::new(byte_stream);
        Ok(Box::pin(tokio::io::BufReader::new(reader)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_selector_parses_key_value() {
        assert_eq!(split_selector("app=api"), Some(("app", "api")));
        assert_eq!(split_selector(""), None);
        assert_eq!(split_selector("noequals"), None);
    }
}

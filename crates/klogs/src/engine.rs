//! Streaming Search Engine (§4.E): per-line parallel parse+match across
//! candidate formatters, order-preserving output, soft/hard error reporting.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::{mpsc, watch, Semaphore};

use crate::config::Config;
use crate::error::EngineError;
use crate::formatters::{FormatterFactory, Registry};
use crate::matcher::search_line;
use crate::sink::LineSink;

/// One worker's outcome for one input line, keyed by its arrival order.
struct LineResult {
    index: u64,
    original: String,
    outcome: Result<String, EngineError>,
}

/// Bounds per-line worker concurrency. `Config::concurrency` overrides the
/// default; otherwise falls back to the number of available CPUs.
/// Unbounded fan-out is not used because its memory impact on a
/// long-running `--follow` stream would be undocumented and unbounded.
fn worker_pool_size(config: &Config) -> usize {
    config
        .concurrency
        .filter(|&n| n > 0)
        .unwrap_or_else(|| std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(4))
}

fn resolve_formatters(config: &Config, registry: &Registry) -> Result<Vec<FormatterFactory>, EngineError> {
    let formatters = if config.formatter_name.is_empty() {
        registry.list_all()
    } else {
        match registry.lookup(&config.formatter_name) {
            Some(factory) => vec![factory],
            None => return Err(EngineError::NoFormatter(config.formatter_name.clone())),
        }
    };

    if formatters.is_empty() {
        return Err(EngineError::NoFormattersRegistered);
    }
    Ok(formatters)
}

fn try_formatters(config: &Config, line: &[u8], formatters: &[FormatterFactory]) -> Result<String, EngineError> {
    let mut last_err = EngineError::NoFormattersRegistered;
    for factory in formatters {
        match search_line(config, line, *factory) {
            Ok(result) => return Ok(result),
            Err(err) => last_err = err,
        }
    }
    Err(last_err)
}

/// Runs the engine to completion: reads `reader` line by line, dispatches
/// each non-empty line to the worker pool, and writes ordered results to
/// `sink`. Returns once `reader` reaches EOF (or cancellation fires) and
/// all in-flight workers have drained.
pub async fn run(
    config: Config,
    registry: &Registry,
    mut reader: impl AsyncBufRead + Unpin,
    sink: impl LineSink,
    mut cancel: watch::Receiver<bool>,
) -> Result<(), EngineError> {
    let formatters = Arc::new(resolve_formatters(&config, registry)?);
    let semaphore = Arc::new(Semaphore::new(worker_pool_size(&config)));
    let config = Arc::new(config);
    let (tx, mut rx) = mpsc::unbounded_channel::<LineResult>();

    let producer = {
        let config = Arc::clone(&config);
        let formatters = Arc::clone(&formatters);
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();
        async move {
            let mut index: u64 = 0;
            loop {
                let mut buf = String::new();
                let read = tokio::select! {
                    biased;
                    _ = cancel.changed() => None,
                    result = reader.read_line(&mut buf) => Some(result),
                };

                let raw = match read {
                    None => break,
                    Some(Ok(0)) => break,
                    Some(Ok(_)) => buf,
                    Some(Err(_)) => break,
                };
                let trimmed = raw.strip_suffix('\n').unwrap_or(&raw);
                let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
                if trimmed.is_empty() {
                    continue;
                }

                let original = trimmed.to_string();
                let line_index = index;
                index += 1;

                let config = Arc::clone(&config);
                let formatters = Arc::clone(&formatters);
                let tx = tx.clone();
                let permit = Arc::clone(&semaphore).acquire_owned().await.expect("semaphore never closed");

                tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = try_formatters(&config, original.as_bytes(), &formatters);
                    let _ = tx.send(LineResult { index: line_index, original, outcome });
                });
            }
        }
    };
    drop(tx);

    let sequencer = async move {
        let mut pending: HashMap<u64, LineResult> = HashMap::new();
        let mut next_to_emit: u64 = 0;
        let mut any_results = false;

        while let Some(result) = rx.recv().await {
            pending.insert(result.index, result);
            while let Some(ready) = pending.remove(&next_to_emit) {
                match ready.outcome {
                    Ok(rendered) => {
                        sink.write_line(&rendered).await;
                        any_results = true;
                    }
                    Err(err) => {
                        let should_report = config.verbose
                            || (!err.is_soft() && !config.formatter_name.is_empty());
                        if should_report {
                            sink.write_line(&format!(
                                "Error on line {}: {}: {}",
                                ready.index, err, ready.original
                            ))
                            .await;
                        }
                    }
                }
                next_to_emit += 1;
            }
        }

        if !any_results && !config.silent {
            sink.write_line("no results found").await;
        }
    };

    tokio::join!(producer, sequencer);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Combinator, Predicate};
    use crate::sink::VecSink;
    use tokio::io::BufReader;

    fn never_cancel() -> watch::Receiver<bool> {
        let (_tx, rx) = watch::channel(false);
        rx
    }

    #[test]
    fn worker_pool_size_honors_concurrency_override() {
        let config = Config { concurrency: Some(3), ..Default::default() };
        assert_eq!(worker_pool_size(&config), 3);
    }

    #[test]
    fn worker_pool_size_ignores_a_zero_override() {
        let config = Config { concurrency: Some(0), ..Default::default() };
        assert!(worker_pool_size(&config) > 0);
    }

    #[tokio::test]
    async fn preserves_input_order_with_a_single_worker() {
        let input = (0..20).map(|i| format!(r#"{{"n":{}}}"#, i)).collect::<Vec<_>>().join("\n");
        let reader = BufReader::new(input.as_bytes());
        let sink = VecSink::new();
        let registry = Registry::with_defaults();
        let config = Config { formatter_name: "json".into(), concurrency: Some(1), ..Default::default() };

        run(config, &registry, reader, sink.clone(), never_cancel()).await.unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 20);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line, &format!(r#"{{"n":{}}}"#, i));
        }
    }

    #[tokio::test]
    async fn preserves_input_order_across_concurrent_workers() {
        let input = (0..50).map(|i| format!(r#"{{"n":{}}}"#, i)).collect::<Vec<_>>().join("\n");
        let reader = BufReader::new(input.as_bytes());
        let sink = VecSink::new();
        let registry = Registry::with_defaults();
        let config = Config { formatter_name: "json".into(), ..Default::default() };

        run(config, &registry, reader, sink.clone(), never_cancel()).await.unwrap();

        let lines = sink.lines();
        assert_eq!(lines.len(), 50);
        for (i, line) in lines.iter().enumerate() {
            assert_eq!(line, &format!(r#"{{"n":{}}}"#, i));
        }
    }

    #[tokio::test]
    async fn no_results_found_when_silent_is_false() {
        let input = r#"{"a":"1"}"#.to_string();
        let reader = BufReader::new(input.as_bytes());
        let sink = VecSink::new();
        let registry = Registry::with_defaults();
        let config = Config {
            formatter_name: "json".into(),
            combinator: Combinator::And,
            predicates: vec![Predicate::literal("x", "1")],
            ..Default::default()
        };

        run(config, &registry, reader, sink.clone(), never_cancel()).await.unwrap();
        assert_eq!(sink.lines(), vec!["no results found".to_string()]);
    }

    #[tokio::test]
    async fn silent_suppresses_no_results_found() {
        let input = r#"{"a":"1"}"#.to_string();
        let reader = BufReader::new(input.as_bytes());
        let sink = VecSink::new();
        let registry = Registry::with_defaults();
        let config = Config {
            formatter_name: "json".into(),
            silent: true,
            combinator: Combinator::And,
            predicates: vec![Predicate::literal("x", "1")],
            ..Default::default()
        };

        run(config, &registry, reader, sink.clone(), never_cancel()).await.unwrap();
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn verbose_reports_soft_errors() {
        let input = "not json at all".to_string();
        let reader = BufReader::new(input.as_bytes());
        let sink = VecSink::new();
        let registry = Registry::with_defaults();
        let config = Config { formatter_name: "json".into(), verbose: true, ..Default::default() };

        run(config, &registry, reader, sink.clone(), never_cancel()).await.unwrap();
        let lines = sink.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("Error on line 0:"));
    }

    #[tokio::test]
    async fn missing_formatter_is_a_setup_error() {
        let reader = BufReader::new("".as_bytes());
        let sink = VecSink::new();
        let registry = Registry::with_defaults();
        let config = Config { formatter_name: "yaml".into(), ..Default::default() };

        let err = run(config, &registry, reader, sink.clone(), never_cancel()).await.unwrap_err();
        assert_eq!(err, EngineError::NoFormatter("yaml".into()));
    }

    #[tokio::test]
    async fn empty_registry_is_a_setup_error() {
        let reader = BufReader::new("".as_bytes());
        let sink = VecSink::new();
        let registry = Registry::new();
        let config = Config::default();

        let err = run(config, &registry, reader, sink.clone(), never_cancel()).await.unwrap_err();
        assert_eq!(err, EngineError::NoFormattersRegistered);
    }
}

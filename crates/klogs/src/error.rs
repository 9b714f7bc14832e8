//! Typed error hierarchy (§4.I). One enum per failure domain, each
//! convertible into a process exit code by the driver.

use thiserror::Error;

/// The engine/matcher error taxonomy of §7.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid formatter format")]
    InvalidFormat,

    #[error("no matching key values found")]
    NoMatchingKeyValues,

    #[error("no matching print values found")]
    NoMatchingPrintValues,

    #[error("no formatter for '{0}' found")]
    NoFormatter(String),

    #[error("no formatters registered")]
    NoFormattersRegistered,
}

impl EngineError {
    /// Soft errors are only reported per-line when `verbose` is set.
    pub fn is_soft(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidFormat
                | EngineError::NoMatchingKeyValues
                | EngineError::NoMatchingPrintValues
        )
    }

    /// Setup errors abort the whole engine run rather than being reported
    /// per line.
    pub fn is_setup(&self) -> bool {
        matches!(self, EngineError::NoFormatter(_) | EngineError::NoFormattersRegistered)
    }
}

/// Watcher-level failures (§4.F). Catalog listing errors are fatal at start;
/// stream-open errors are logged and end only the affected stream.
#[derive(Debug, Error)]
pub enum WatcherError {
    #[error("failed to list workloads: {0}")]
    CatalogList(#[from] CatalogError),

    #[error("failed to open log stream for {workload}/{container}: {source}")]
    StreamOpen {
        workload: String,
        container: String,
        #[source]
        source: CatalogError,
    },

    #[error("workload subscription ended with an error: {0}")]
    Subscription(CatalogError),
}

/// Errors surfaced by the workload-catalog / stream-opener collaborators.
#[derive(Debug, Error, Clone)]
pub enum CatalogError {
    #[error("cluster client error: {0}")]
    Backend(String),

    #[error("container not found: {0}")]
    NotFound(String),
}

/// CLI parsing errors (§4.H). Distinct from runtime `EngineError::NoFormatter`,
/// which is only discovered once the engine starts.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("predicate entry '{0}' has no '=' and there is no previous key to inherit from")]
    MissingKeyWithNoPrevious(String),
}

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{debug, error};
use tracing_subscriber::{fmt, EnvFilter};

use klogs::appconfig::AppConfig;
use klogs::catalog::docker::DockerCatalog;
use klogs::cli::Args;
use klogs::driver;
use klogs::formatters::Registry;
use klogs::sink::StdoutSink;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("klogs=info"));
    fmt().with_env_filter(filter).with_target(true).with_thread_ids(false).init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let defaults = match AppConfig::load() {
        Ok(defaults) => defaults,
        Err(err) => {
            error!(error = %err, "failed to load app configuration");
            return ExitCode::FAILURE;
        }
    };

    let args = Args::parse();
    let (_config, spec) = match args.into_config_and_spec(&defaults) {
        Ok(parts) => parts,
        Err(err) => {
            error!(error = %err, "invalid invocation");
            return ExitCode::FAILURE;
        }
    };

    // `--kubeconfig` overrides the collaborator's connection hint (here, the
    // Docker socket path); empty falls back to the layered app default,
    // which itself falls back to `DockerCatalog::connect`'s own `DOCKER_HOST`
    // handling. `--kubecontext` has no Docker analogue (same as `namespace`
    // in `catalog::docker`) but is still surfaced for diagnostics rather
    // than silently dropped.
    let socket_path = if !spec.kubeconfig.is_empty() { spec.kubeconfig.as_str() } else { defaults.docker_socket.as_str() };
    if !spec.kubecontext.is_empty() {
        debug!(kubecontext = %spec.kubecontext, "kubecontext has no Docker-collaborator analogue; ignored");
    }

    let catalog = match DockerCatalog::connect(socket_path) {
        Ok(catalog) => catalog,
        Err(err) => {
            error!(error = %err, "failed to connect to the docker daemon");
            return ExitCode::FAILURE;
        }
    };

    let registry = Arc::new(Registry::with_defaults());
    let sink = StdoutSink::new();
    let interrupt = driver::interrupt_signal();

    match driver::run(catalog.clone(), catalog, sink, registry, spec, interrupt).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "watcher run failed");
            ExitCode::FAILURE
        }
    }
}

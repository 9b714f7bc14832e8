//! CLI front-end (§4.H). Parses argv into the invocation surface of §6 and
//! builds a [`Config`] plus a [`WatcherSpec`](crate::watcher::WatcherSpec).
//! Never touches the engine or watcher internals directly.

use clap::Parser;

use crate::appconfig::AppConfig;
use crate::config::{Combinator, Config, Predicate};
use crate::error::CliError;
use crate::watcher::WatcherSpec;

#[derive(Debug, Parser)]
#[command(name = "klogs", about = "Streaming, structured-log filter for a container cluster")]
pub struct Args {
    #[arg(long, default_value = "")]
    pub kubeconfig: String,

    #[arg(long, default_value = "")]
    pub kubecontext: String,

    #[arg(short = 'n', long, default_value = "")]
    pub namespace: String,

    #[arg(short = 'l', long, default_value = "")]
    pub selector: String,

    #[arg(short = 'c', long = "containers")]
    pub containers: Vec<String>,

    #[arg(short = 't', long = "type", default_value = "")]
    pub formatter_type: String,

    #[arg(short = 's', long = "search_type", default_value = "and")]
    pub search_type: String,

    #[arg(short = 'd', long = "key_delimiter", default_value = "")]
    pub key_delimiter: String,

    #[arg(short = 'm', long = "match")]
    pub matches: Vec<String>,

    #[arg(short = 'r', long = "regexp")]
    pub regexps: Vec<String>,

    #[arg(short = 'e', long = "key_exists")]
    pub key_exists: Vec<String>,

    #[arg(short = 'p', long = "print_keys")]
    pub print_keys: Vec<String>,

    #[arg(short, long)]
    pub follow: bool,

    #[arg(short, long)]
    pub verbose: bool,

    #[arg(long)]
    pub silent: bool,

    /// Positional workload-name allowlist; empty means "all".
    pub workloads: Vec<String>,
}

/// Splits one `--match`/`--regexp`/`--key_exists` entry on its first `=`,
/// inheriting the key from `prev_key` when the entry has no `=` at all.
///
/// Differs deliberately from the original source: an entry with no `=` and
/// no previous key is an error here rather than silently keying on the
/// empty string (resolved open question, see DESIGN.md).
fn split_kv<'a>(entry: &'a str, prev_key: Option<&str>) -> Result<(String, &'a str), CliError> {
    match entry.split_once('=') {
        Some((key, value)) => Ok((key.trim().to_string(), value.trim())),
        None => match prev_key {
            Some(key) => Ok((key.to_string(), entry.trim())),
            None => Err(CliError::MissingKeyWithNoPrevious(entry.to_string())),
        },
    }
}

fn build_literal_predicates(entries: &[String]) -> Result<Vec<Predicate>, CliError> {
    let mut predicates = Vec::with_capacity(entries.len());
    let mut prev_key: Option<String> = None;
    for entry in entries {
        let (key, value) = split_kv(entry, prev_key.as_deref())?;
        predicates.push(Predicate::literal(key.clone(), value));
        prev_key = Some(key);
    }
    Ok(predicates)
}

fn build_regex_predicates(entries: &[String]) -> Result<Vec<Predicate>, CliError> {
    let mut predicates = Vec::with_capacity(entries.len());
    let mut prev_key: Option<String> = None;
    for entry in entries {
        let (key, pattern) = split_kv(entry, prev_key.as_deref())?;
        let predicate = Predicate::regex(key.clone(), pattern)
            .map_err(|e| CliError::MissingKeyWithNoPrevious(format!("invalid regex in '{entry}': {e}")))?;
        predicates.push(predicate);
        prev_key = Some(key);
    }
    Ok(predicates)
}

/// `--key_exists` entries take the bare key, no `=` ever expected.
fn build_key_exists_predicates(entries: &[String]) -> Vec<Predicate> {
    entries.iter().map(|key| Predicate::key_exists(key.trim())).collect()
}

impl Args {
    /// Builds the matcher [`Config`] (without per-stream decoration, which
    /// is the watcher's job — see §4.F) and the watcher's selection spec.
    pub fn into_config_and_spec(self, defaults: &AppConfig) -> Result<(Config, WatcherSpec), CliError> {
        let mut predicates = build_literal_predicates(&self.matches)?;
        predicates.extend(build_regex_predicates(&self.regexps)?);
        predicates.extend(build_key_exists_predicates(&self.key_exists));

        let combinator = if self.search_type.eq_ignore_ascii_case("or") { Combinator::Or } else { Combinator::And };

        let config = Config {
            formatter_name: self.formatter_type,
            combinator,
            predicates,
            print_keys: self.print_keys,
            key_split: self.key_delimiter,
            verbose: self.verbose,
            silent: self.silent,
            extras: Vec::new(),
            prefix: String::new(),
        };

        let namespace = if self.namespace.is_empty() { defaults.default_namespace.clone() } else { self.namespace };
        let selector = if self.selector.is_empty() { defaults.default_selector.clone() } else { self.selector };

        let spec = WatcherSpec {
            namespace,
            selector,
            follow: self.follow,
            valid_workload_names: self.workloads,
            valid_container_names: self.containers,
            base_config: config.clone(),
            kubeconfig: self.kubeconfig,
            kubecontext: self.kubecontext,
        };

        Ok((config, spec))
    }
}

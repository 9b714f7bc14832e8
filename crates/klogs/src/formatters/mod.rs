//! Formatter Registry (§4.A) plus the two bundled line formats.

pub mod json;
pub mod text;

use std::collections::HashMap;
use std::sync::Mutex;

use crate::config::Config;

/// One key/value pair that survived projection, in render order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Found {
    pub key: String,
    pub value: String,
}

/// A parser for one structured line format.
///
/// `validate`/`get_value` never return errors: an unparseable or missing
/// key is represented as "not found", exactly as the matcher (§4.D) expects.
pub trait LineFormatter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the trimmed, validated slice on success.
    fn validate<'a>(&self, line: &'a [u8]) -> Option<&'a [u8]>;

    /// Looks up `key` in an already-validated line. Empty string means
    /// "not present", not an error.
    fn get_value(&self, line: &[u8], key: &str) -> String;

    fn format_found_values(&self, values: &[Found]) -> String;

    fn append_values(&self, line: &[u8], values: &[Found]) -> String;
}

/// Builds a [`LineFormatter`] from a [`Config`] (the text/JSON formatters
/// both need `key_split` at construction time).
pub type FormatterFactory = fn(&Config) -> Box<dyn LineFormatter>;

/// Name → factory table. Rearchitected per the design notes into an
/// explicit, constructible container rather than process-wide global state;
/// the engine receives one by reference.
pub struct Registry {
    factories: Mutex<HashMap<String, FormatterFactory>>,
}

impl Registry {
    pub fn new() -> Self {
        Self { factories: Mutex::new(HashMap::new()) }
    }

    /// A registry pre-populated with the bundled JSON and text formatters.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register("json", json::new_formatter);
        registry.register("text", text::new_formatter);
        registry
    }

    /// Idempotent: registering the same name twice is last-writer-wins.
    pub fn register(&self, name: &str, factory: FormatterFactory) {
        self.factories
            .lock()
            .expect("formatter registry mutex poisoned")
            .insert(name.to_ascii_lowercase(), factory);
    }

    pub fn lookup(&self, name: &str) -> Option<FormatterFactory> {
        self.factories
            .lock()
            .expect("formatter registry mutex poisoned")
            .get(&name.to_ascii_lowercase())
            .copied()
    }

    pub fn list_all(&self) -> Vec<FormatterFactory> {
        self.factories
            .lock()
            .expect("formatter registry mutex poisoned")
            .values()
            .copied()
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotent_registry_round_trip() {
        let registry = Registry::new();
        registry.register("json", json::new_formatter);
        let looked_up = registry.lookup("json").expect("should be registered");
        let config = Config::default();
        assert_eq!(looked_up(&config).name(), "json");
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = Registry::with_defaults();
        assert!(registry.lookup("JSON").is_some());
        assert!(registry.lookup("Text").is_some());
        assert!(registry.lookup("yaml").is_none());
    }

    #[test]
    fn with_defaults_registers_both_formatters() {
        let registry = Registry::with_defaults();
        assert_eq!(registry.list_all().len(), 2);
    }

    #[test]
    fn re_registering_a_name_is_last_writer_wins() {
        let registry = Registry::new();
        fn other_json(config: &Config) -> Box<dyn LineFormatter> {
            json::new_formatter(config)
        }
        registry.register("json", json::new_formatter);
        registry.register("json", other_json);
        assert_eq!(registry.list_all().len(), 1);
    }
}

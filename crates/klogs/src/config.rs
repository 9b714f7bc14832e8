use std::sync::Arc;

use regex::Regex;

/// One keyed match rule. Exactly one of `key-exists`, literal, or regex mode
/// applies; which mode is active is determined by which variant is
/// constructed, not by any runtime flag.
#[derive(Debug, Clone)]
pub enum Predicate {
    /// Passes if the key is present with any non-empty value.
    KeyExists { key: String },
    /// Passes on exact string equality against the looked-up value.
    Literal { key: String, value: String },
    /// Passes if the looked-up value matches an anchorless regex. Compiled
    /// once at construction time rather than per line.
    Regex { key: String, regex: Arc<Regex> },
}

impl Predicate {
    pub fn key_exists(key: impl Into<String>) -> Self {
        Predicate::KeyExists { key: key.into() }
    }

    pub fn literal(key: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::Literal { key: key.into(), value: value.into() }
    }

    pub fn regex(key: impl Into<String>, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Predicate::Regex { key: key.into(), regex: Arc::new(Regex::new(pattern)?) })
    }

    pub fn key(&self) -> &str {
        match self {
            Predicate::KeyExists { key } => key,
            Predicate::Literal { key, .. } => key,
            Predicate::Regex { key, .. } => key,
        }
    }
}

impl PartialEq for Predicate {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Predicate::KeyExists { key: a }, Predicate::KeyExists { key: b }) => a == b,
            (Predicate::Literal { key: ak, value: av }, Predicate::Literal { key: bk, value: bv }) => {
                ak == bk && av == bv
            }
            (Predicate::Regex { key: ak, regex: ar }, Predicate::Regex { key: bk, regex: br }) => {
                ak == bk && ar.as_str() == br.as_str()
            }
            _ => false,
        }
    }
}

/// The logical connective for a predicate list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// A literal key/value pair injected into matching and projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extra {
    pub key: String,
    pub value: String,
}

/// Value object consumed by the matcher (§4.D) and the engine (§4.E).
///
/// Cloning is cheap relative to one stream's lifetime; the watcher clones a
/// base `Config` once per attached container and decorates the clone with
/// stream-specific `extras`/`prefix`.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Empty means "try every registered formatter".
    pub formatter_name: String,
    pub combinator: Combinator,
    pub predicates: Vec<Predicate>,
    pub print_keys: Vec<String>,
    /// Empty disables compound-key splitting.
    pub key_split: String,
    pub verbose: bool,
    pub silent: bool,
    pub extras: Vec<Extra>,
    /// Prepended to passthrough output when no `print_keys` and no
    /// extras-aware rewrite applies.
    pub prefix: String,
    /// Bounds the engine's per-line worker pool (§5). `None` defers to
    /// `available_parallelism`; set explicitly to trade memory for latency
    /// on a high-fan-out `--follow` run.
    pub concurrency: Option<usize>,
}

impl Config {
    pub fn lookup_extra(&self, key: &str) -> Option<&str> {
        self.extras
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinator_defaults_to_and() {
        assert_eq!(Combinator::default(), Combinator::And);
    }

    #[test]
    fn lookup_extra_finds_first_match() {
        let config = Config {
            extras: vec![
                Extra { key: "env".into(), value: "prod".into() },
                Extra { key: "env".into(), value: "staging".into() },
            ],
            ..Default::default()
        };
        assert_eq!(config.lookup_extra("env"), Some("prod"));
        assert_eq!(config.lookup_extra("missing"), None);
    }
}

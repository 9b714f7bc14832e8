//! On-disk/env defaults that outlive a single invocation (§4.J). Distinct
//! from [`crate::config::Config`], which is the per-run matcher/formatter
//! value object the engine consumes — this is process-level plumbing:
//! where to find a kubeconfig, which Docker socket to dial, what namespace
//! to assume when the CLI omits `-n`.
//!
//! Layered the same way the teacher's cluster binary layers its config:
//! compiled-in defaults, then an optional `klogs.toml` file, then
//! `KLOGS__`-prefixed environment variables, each overriding the last.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct AppConfig {
    #[serde(default)]
    pub docker_socket: String,
    #[serde(default = "default_namespace")]
    pub default_namespace: String,
    #[serde(default)]
    pub default_selector: String,
}

fn default_namespace() -> String {
    String::new()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self { docker_socket: String::new(), default_namespace: default_namespace(), default_selector: String::new() }
    }
}

impl AppConfig {
    /// Loads defaults from (in increasing precedence): compiled-in
    /// defaults, `./klogs.toml`, `/etc/klogs/klogs.toml`, then
    /// `KLOGS__`-prefixed environment variables.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = config::Config::try_from(&AppConfig::default())
            .context("failed to serialize default app configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);

        for path in ["/etc/klogs/klogs", "klogs"] {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("KLOGS").separator("__").try_parsing(true),
        );

        builder.build().context("failed to build app configuration")?.try_deserialize().context("failed to deserialize app configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_have_empty_namespace_and_selector() {
        let config = AppConfig::default();
        assert_eq!(config.default_namespace, "");
        assert_eq!(config.default_selector, "");
    }
}

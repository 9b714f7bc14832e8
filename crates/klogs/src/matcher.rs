//! Line Matcher (§4.D): `search_line` applies one formatter's predicates to
//! one raw line and renders the surviving projection.

use crate::config::{Combinator, Config, Predicate};
use crate::error::EngineError;
use crate::formatters::{Found, FormatterFactory};

/// Runs one formatter against one raw line under `config`.
///
/// Returns the rendered output on success. Soft errors (`InvalidFormat`,
/// `NoMatchingKeyValues`, `NoMatchingPrintValues`) and hard errors (bad
/// regex) are both represented as `Err`; the engine (§4.E) decides which
/// ones are worth reporting based on verbosity and formatter pinning.
pub fn search_line(
    config: &Config,
    line: &[u8],
    factory: FormatterFactory,
) -> Result<String, EngineError> {
    let formatter = factory(config);

    let validated = formatter.validate(line).ok_or(EngineError::InvalidFormat)?;

    let mut any_matched = false;
    for predicate in &config.predicates {
        let mut value = formatter.get_value(validated, predicate.key());
        if value.is_empty() {
            if let Some(extra) = config.lookup_extra(predicate.key()) {
                value = extra.to_string();
            }
        }
        if value.is_empty() {
            // Present in neither line nor extras: skip, contributing
            // neither a match nor a miss.
            continue;
        }

        let matched = match predicate {
            Predicate::KeyExists { .. } => true,
            Predicate::Literal { value: want, .. } => &value == want,
            Predicate::Regex { regex, .. } => regex.is_match(&value),
        };

        if !matched && config.combinator == Combinator::And {
            return Err(EngineError::NoMatchingKeyValues);
        }
        if matched {
            any_matched = true;
        }
    }

    if !config.predicates.is_empty() && !any_matched {
        return Err(EngineError::NoMatchingKeyValues);
    }

    render_projection(config, &formatter, validated)
}

fn render_projection(
    config: &Config,
    formatter: &dyn crate::formatters::LineFormatter,
    validated: &[u8],
) -> Result<String, EngineError> {
    let mut projected = Vec::with_capacity(config.print_keys.len());
    for key in &config.print_keys {
        let mut value = formatter.get_value(validated, key);
        if value.is_empty() {
            if let Some(extra) = config.lookup_extra(key) {
                value = extra.to_string();
            }
        }
        if value.is_empty() {
            continue;
        }
        projected.push(Found { key: key.clone(), value });
    }

    if projected.is_empty() {
        if config.print_keys.is_empty() {
            if !config.extras.is_empty() {
                let extras: Vec<Found> = config
                    .extras
                    .iter()
                    .map(|e| Found { key: e.key.clone(), value: e.value.clone() })
                    .collect();
                return Ok(formatter.append_values(validated, &extras));
            }
            let rendered = String::from_utf8_lossy(validated).into_owned();
            return Ok(format!("{}{}", config.prefix, rendered));
        }
        return Err(EngineError::NoMatchingPrintValues);
    }

    for extra in &config.extras {
        projected.push(Found { key: extra.key.clone(), value: extra.value.clone() });
    }
    Ok(formatter.format_found_values(&projected))
}

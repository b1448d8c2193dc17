// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Environment variable overlay

use anyhow::Result;
use config::Source;

/// Prefix of every environment variable the runtime reads.
pub const ENV_PREFIX: &str = "LOCKSTEP";

/// Path of the TOML configuration file.
pub const CONFIG_PATH_VAR: &str = "LOCKSTEP_CONFIG";

/// Set to `0` to load the runtime with every substitute passing through.
pub const ENABLED_VAR: &str = "LOCKSTEP_ENABLED";

const NESTING_SEPARATOR: &str = "__";

/// Environment variable name for a dotted configuration key.
///
/// `log.trace-parking` maps to `LOCKSTEP_LOG__TRACE_PARKING`.
pub fn env_var(key: &str) -> String {
    let body = key
        .split('.')
        .map(|segment| segment.replace('-', "_").to_ascii_uppercase())
        .collect::<Vec<_>>()
        .join(NESTING_SEPARATOR);
    format!("{ENV_PREFIX}_{body}")
}

/// Collect `LOCKSTEP_*` variables as dotted kebab-case keys.
///
/// `source` replaces the process environment when given. Values stay strings;
/// typed fields are coerced during deserialization.
pub fn env_overlay(
    source: Option<config::Map<String, String>>,
) -> Result<Vec<(String, config::Value)>> {
    let environment = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator(NESTING_SEPARATOR)
        .source(source);

    let mut entries: Vec<_> = environment
        .collect()?
        .into_iter()
        .filter(|(key, _)| !is_control_key(key))
        .map(|(key, value)| (key.replace('_', "-"), value))
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(entries)
}

// Variables that steer loading rather than carry configuration values.
fn is_control_key(key: &str) -> bool {
    key == "config" || key == "enabled"
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Layered loading: defaults < TOML file < environment

use std::path::Path;

use anyhow::{Context, Result};

use crate::RuntimeConfig;
use crate::env::{CONFIG_PATH_VAR, env_overlay};

/// Load using the file named by `LOCKSTEP_CONFIG` (if any) and the process environment.
pub fn load_from_process_env() -> Result<RuntimeConfig> {
    let file = std::env::var_os(CONFIG_PATH_VAR);
    load(file.as_deref().map(Path::new))
}

/// Load `file` (if given) overlaid with the process environment.
pub fn load(file: Option<&Path>) -> Result<RuntimeConfig> {
    load_with_env(file, None)
}

/// Load `file` overlaid with `env`, or with the process environment when `env` is `None`.
pub fn load_with_env(
    file: Option<&Path>,
    env: Option<config::Map<String, String>>,
) -> Result<RuntimeConfig> {
    let mut builder = config::Config::builder();

    if let Some(path) = file {
        builder = builder.add_source(
            config::File::from(path)
                .format(config::FileFormat::Toml)
                .required(true),
        );
    }

    for (key, value) in env_overlay(env)? {
        builder = builder
            .set_override(key.as_str(), value)
            .with_context(|| format!("applying environment override for {key}"))?;
    }

    let built = builder.build().with_context(|| match file {
        Some(path) => format!("reading config file {}", path.display()),
        None => "collecting configuration".to_string(),
    })?;
    let config: RuntimeConfig = built
        .try_deserialize()
        .context("deserializing runtime configuration")?;
    config.validate()?;
    Ok(config)
}

/// Render the effective configuration as TOML.
pub fn to_toml_string(config: &RuntimeConfig) -> Result<String> {
    toml::to_string(config).context("serializing configuration to TOML")
}

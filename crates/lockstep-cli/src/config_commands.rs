// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::disallowed_methods)] // CLI commands intentionally print to stdout/stderr

//! Configuration inspection
use std::path::Path;

use anyhow::Result;

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Also list the environment variable for each setting
    #[arg(long)]
    pub env_names: bool,
}

impl ConfigArgs {
    pub fn run(self, config_file: Option<&Path>) -> Result<()> {
        let config = lockstep_config::load(config_file)?;
        print!("{}", lockstep_config::to_toml_string(&config)?);

        if self.env_names {
            println!();
            for key in ENV_KEYS {
                println!("# {key} <- {}", lockstep_config::env_var(key));
            }
        }
        Ok(())
    }
}

/// Settings that can be given through the environment.
pub const ENV_KEYS: &[&str] = &[
    "interest-keys",
    "pause-signal",
    "init-trigger",
    "summary-on-exit",
    "log.level",
    "log.format",
    "log.file",
    "log.trace-parking",
];

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::path::PathBuf;

use clap::Subcommand;
use lockstep_logging::CliLoggingArgs;

pub use clap::Parser;

pub mod config_commands;
pub mod run;

#[derive(clap::Parser)]
#[command(
    name = "lockstep",
    about = "Run programs under the Lockstep runtime",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Runtime configuration file (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(flatten)]
    pub logging: CliLoggingArgs,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Launch a program with the runtime preloaded
    Run(run::RunArgs),
    /// Print the effective runtime configuration as TOML
    Config(config_commands::ConfigArgs),
}

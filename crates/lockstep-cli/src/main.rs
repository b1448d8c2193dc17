// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::Result;
use lockstep_cli::{Cli, Commands, Parser};
use lockstep_logging::{LogFormat, LogLevel};

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli.logging.log_level.unwrap_or(LogLevel::Warn);
    let format = cli.logging.log_format.unwrap_or(LogFormat::Plaintext);
    lockstep_logging::init("lockstep", level.into(), format)?;

    match cli.command {
        Commands::Run(args) => args.run(cli.config.as_deref(), &cli.logging),
        Commands::Config(args) => args.run(cli.config.as_deref()),
    }
}

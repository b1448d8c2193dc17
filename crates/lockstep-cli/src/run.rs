// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! `lockstep run`: exec a program with the shim preloaded

use std::ffi::{OsStr, OsString};
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use lockstep_config::{CONFIG_PATH_VAR, env_var, parse_key, parse_pause_signal};
use lockstep_logging::CliLoggingArgs;
use tracing::{debug, info};

/// File name of the injected library
pub const SHIM_FILE_NAME: &str = "liblockstep_shim.so";

/// Overrides the shim location when `--shim` is not given
pub const SHIM_PATH_VAR: &str = "LOCKSTEP_SHIM";

#[derive(clap::Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to liblockstep_shim.so (default: next to this executable)
    #[arg(long)]
    pub shim: Option<PathBuf>,

    /// Entry point key to wait for; repeatable
    #[arg(long = "interest", value_name = "KEY", allow_hyphen_values = true, value_parser = parse_interest)]
    pub interest: Vec<i64>,

    /// Designate the main thread when the runtime loads instead of at SDL_Init
    #[arg(long)]
    pub init_on_load: bool,

    /// Signal used to park the main thread
    #[arg(long, value_name = "SIGNAL", value_parser = parse_signal_name)]
    pub pause_signal: Option<String>,

    /// Do not log the thread summary when the program exits
    #[arg(long)]
    pub no_summary: bool,

    /// Program to run, followed by its arguments
    #[arg(required = true, last = true, value_name = "PROGRAM")]
    pub command: Vec<OsString>,
}

fn parse_interest(value: &str) -> Result<i64, String> {
    parse_key(value).map_err(|e| e.to_string())
}

fn parse_signal_name(value: &str) -> Result<String, String> {
    parse_pause_signal(value)
        .map(|signal| signal.as_str().to_string())
        .map_err(|e| e.to_string())
}

/// Everything needed to start the host, resolved but not yet executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub program: OsString,
    pub args: Vec<OsString>,
    pub env: Vec<(String, OsString)>,
}

impl LaunchPlan {
    pub fn env_value(&self, name: &str) -> Option<&OsStr> {
        self.env
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_os_str())
    }

    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }
}

impl RunArgs {
    /// Resolve the launch without touching the process.
    ///
    /// `inherited_preload` is the current `LD_PRELOAD`, kept after the shim.
    pub fn plan(
        &self,
        shim: &Path,
        config_file: Option<&Path>,
        logging: &CliLoggingArgs,
        inherited_preload: Option<&OsStr>,
    ) -> Result<LaunchPlan> {
        let Some((program, args)) = self.command.split_first() else {
            bail!("no program given");
        };

        let mut env = Vec::new();

        let mut preload = shim.as_os_str().to_os_string();
        if let Some(existing) = inherited_preload.filter(|value| !value.is_empty()) {
            preload.push(":");
            preload.push(existing);
        }
        env.push(("LD_PRELOAD".to_string(), preload));

        if let Some(path) = config_file {
            env.push((CONFIG_PATH_VAR.to_string(), path.as_os_str().to_os_string()));
        }
        if !self.interest.is_empty() {
            let keys = self.interest.iter().map(i64::to_string).collect::<Vec<_>>().join(",");
            env.push((env_var("interest-keys"), keys.into()));
        }
        if self.init_on_load {
            env.push((env_var("init-trigger"), "load".into()));
        }
        if let Some(signal) = &self.pause_signal {
            env.push((env_var("pause-signal"), signal.into()));
        }
        if self.no_summary {
            env.push((env_var("summary-on-exit"), "false".into()));
        }
        if let Some(level) = logging.log_level {
            env.push((env_var("log.level"), level.to_string().into()));
        }
        if let Some(format) = logging.log_format {
            env.push((env_var("log.format"), format.to_string().into()));
        }
        if let Some(file) = &logging.log_file {
            env.push((env_var("log.file"), file.into()));
        }

        Ok(LaunchPlan {
            program: program.clone(),
            args: args.to_vec(),
            env,
        })
    }

    /// Replace this process with the host program. Only returns on failure.
    pub fn run(self, config_file: Option<&Path>, logging: &CliLoggingArgs) -> Result<()> {
        let shim = resolve_shim(self.shim.as_deref())?;
        let config_file = config_file
            .map(|path| {
                std::fs::canonicalize(path)
                    .with_context(|| format!("config file {}", path.display()))
            })
            .transpose()?;

        // Surface configuration mistakes here rather than inside the host.
        lockstep_config::load(config_file.as_deref())?;

        let inherited = std::env::var_os("LD_PRELOAD");
        let plan = self.plan(&shim, config_file.as_deref(), logging, inherited.as_deref())?;
        for (key, value) in &plan.env {
            debug!(key, value = %value.to_string_lossy(), "launch environment");
        }
        info!(
            program = %plan.program.to_string_lossy(),
            shim = %shim.display(),
            "launching"
        );

        let error = plan.command().exec();
        Err(error).with_context(|| format!("failed to execute {}", plan.program.to_string_lossy()))
    }
}

/// `--shim`, then `LOCKSTEP_SHIM`, then the library next to the launcher.
pub fn resolve_shim(explicit: Option<&Path>) -> Result<PathBuf> {
    let candidate = match explicit {
        Some(path) => path.to_path_buf(),
        None => match std::env::var_os(SHIM_PATH_VAR) {
            Some(path) => PathBuf::from(path),
            None => std::env::current_exe()
                .context("locating the lockstep executable")?
                .with_file_name(SHIM_FILE_NAME),
        },
    };
    if !candidate.is_file() {
        bail!(
            "shim library not found at {} (use --shim or {SHIM_PATH_VAR})",
            candidate.display()
        );
    }
    std::fs::canonicalize(&candidate)
        .with_context(|| format!("resolving shim path {}", candidate.display()))
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Centralized logging utilities for Lockstep
//!
//! The injected runtime and the launcher both initialise `tracing` through this
//! crate so that filters, formats and destinations behave the same way. Code
//! running inside a signal handler must not use `tracing`; it goes through
//! [`signal_safe`] instead.

pub mod logging_config;
pub mod signal_safe;

pub use logging_config::LoggingConfig;

use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use clap;
pub use tracing::Level;

/// Output format for log messages
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable plaintext format
    #[default]
    Plaintext,
    /// Structured JSON format
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Plaintext => write!(f, "plaintext"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "plaintext" => Ok(LogFormat::Plaintext),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!(
                "Invalid log format: {}. Use 'plaintext' or 'json'",
                s
            )),
        }
    }
}

/// Log level accepted on the command line and in configuration files
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only error conditions
    Error,
    /// Errors and warnings
    #[default]
    Warn,
    /// Errors, warnings, and informational messages
    Info,
    /// All above plus debug information
    Debug,
    /// All above plus detailed tracing
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

/// Standardized CLI logging arguments for clap integration
///
/// Use with `#[command(flatten)]`. Values given on the command line override
/// the ones loaded from configuration via [`CliLoggingArgs::apply_to`].
#[derive(Clone, Debug, Default, clap::Args, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliLoggingArgs {
    /// Log verbosity level
    #[arg(long, value_enum, global = true, help = "Log verbosity level (default: warn)")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,

    /// Log output format
    #[arg(long, value_enum, global = true, help = "Log output format (default: plaintext)")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<LogFormat>,

    /// Log file; stderr when absent
    #[arg(long, global = true, help = "Append log records to this file instead of stderr")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<String>,
}

impl CliLoggingArgs {
    /// Overlay the command-line values onto a loaded configuration.
    pub fn apply_to(&self, config: &mut LoggingConfig) {
        if let Some(level) = self.log_level {
            config.level = level;
        }
        if let Some(format) = self.log_format {
            config.format = format;
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.into());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.log_level.is_none() && self.log_format.is_none() && self.log_file.is_none()
    }
}

/// Initialize logging according to a [`LoggingConfig`]
///
/// Records go to `config.file` when set, otherwise to stderr. Stdout is left
/// alone because it belongs to the host program.
pub fn init_from_config(component: &str, config: &LoggingConfig) -> anyhow::Result<()> {
    match &config.file {
        Some(path) => init_to_file(component, config.level.into(), config.format, path),
        None => init(component, config.level.into(), config.format),
    }
}

/// Initialize logging to stderr with the specified component name, default level, and format
///
/// # Example
/// ```rust
/// use lockstep_logging::{init, Level, LogFormat};
///
/// fn main() -> anyhow::Result<()> {
///     init("lockstep", Level::INFO, LogFormat::Plaintext)?;
///     tracing::info!("Application started");
///     Ok(())
/// }
/// ```
pub fn init(component: &str, default_level: Level, format: LogFormat) -> anyhow::Result<()> {
    init_with_writer(component, default_level, format, io::stderr)
}

/// Initialize logging to a file, appending to it and creating parent directories
pub fn init_to_file(
    component: &str,
    default_level: Level,
    format: LogFormat,
    log_path: &Path,
) -> anyhow::Result<()> {
    use std::fs;

    if let Some(parent) = log_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let log_file = fs::OpenOptions::new().create(true).append(true).open(log_path)?;

    init_with_writer(component, default_level, format, std::sync::Mutex::new(log_file))
}

/// Initialize logging with a custom writer
///
/// `RUST_LOG` takes precedence over `default_level` when it is set.
pub fn init_with_writer<W>(
    component: &str,
    default_level: Level,
    format: LogFormat,
    writer: W,
) -> anyhow::Result<()>
where
    W: for<'writer> tracing_subscriber::fmt::MakeWriter<'writer> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{},{}={}",
            default_level,
            component.replace('-', "_"),
            default_level
        ))
    });

    match format {
        LogFormat::Json => {
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false).json();
            #[cfg(debug_assertions)]
            let layer = layer.with_file(true).with_line_number(true);

            tracing_subscriber::registry().with(filter).with(layer).try_init()?;
        }
        LogFormat::Plaintext => {
            let layer = tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false);
            #[cfg(debug_assertions)]
            let layer = layer.with_file(true).with_line_number(true);

            tracing_subscriber::registry().with(filter).with(layer).try_init()?;
        }
    }

    Ok(())
}

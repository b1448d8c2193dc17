// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Logging configuration types

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{LogFormat, LogLevel};

/// Logging section of the runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LoggingConfig {
    /// Logging verbosity level
    pub level: LogLevel,

    /// Output format for log records
    pub format: LogFormat,

    /// Append log records to this file instead of stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    /// Let the pause signal handler write a raw line to stderr each time it parks
    #[serde(alias = "trace_parking")]
    pub trace_parking: bool,
}

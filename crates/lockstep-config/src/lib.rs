// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Runtime configuration for Lockstep.
//!
//! Values come from built-in defaults, then an optional TOML file
//! (`LOCKSTEP_CONFIG`), then `LOCKSTEP_*` environment variables. Nested keys
//! use `__` in variable names: `LOCKSTEP_LOG__LEVEL=debug`.

pub mod env;
pub mod loader;
pub mod schema;

pub use env::{CONFIG_PATH_VAR, ENABLED_VAR, ENV_PREFIX, env_var};
pub use loader::{load, load_from_process_env, load_with_env, to_toml_string};
pub use schema::{InitTrigger, PidOverride, RuntimeConfig, parse_key, parse_pause_signal};

use nix::sys::signal::Signal;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown signal name {name:?}")]
    UnknownSignal { name: String },

    #[error("{signal} cannot be caught and cannot park a thread")]
    UncatchableSignal { signal: Signal },

    #[error("invalid entry point key {value:?}")]
    InvalidKey { value: String },

    #[error("pid override for pid {pid} names no library")]
    EmptyPidOverride { pid: i32 },
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Linux-specific test utilities for shim injection

use std::path::{Path, PathBuf};
use std::process::Command;

/// Extension trait for Command to add shim library injection
pub trait CommandExt {
    fn with_shim_libraries(&mut self, libraries: &[PathBuf]) -> &mut Self;

    /// Start from a clean slate: no inherited preloads or runtime settings.
    fn without_lockstep_env(&mut self) -> &mut Self;
}

impl CommandExt for Command {
    fn with_shim_libraries(&mut self, libraries: &[PathBuf]) -> &mut Self {
        if !libraries.is_empty() {
            let library_paths =
                libraries.iter().map(|lib| lib.to_string_lossy()).collect::<Vec<_>>().join(":");

            self.env("LD_PRELOAD", &library_paths);
        }
        self
    }

    fn without_lockstep_env(&mut self) -> &mut Self {
        self.env_remove("LD_PRELOAD");
        for (key, _) in std::env::vars_os() {
            if key.to_string_lossy().starts_with("LOCKSTEP_") {
                self.env_remove(key);
            }
        }
        self
    }
}

/// `target/<profile>` of the running test binary (`target/<profile>/deps/...`).
pub fn artifact_dir() -> PathBuf {
    let exe = std::env::current_exe().expect("current test executable");
    exe.parent()
        .and_then(Path::parent)
        .map(Path::to_path_buf)
        .expect("test executable lives in target/<profile>/deps")
}

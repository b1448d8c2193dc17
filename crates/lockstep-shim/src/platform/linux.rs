// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Linux implementation using LD_PRELOAD

use ctor::{ctor, dtor};
use lockstep_config::InitTrigger;
use lockstep_hooks::{NativeGuard, disable_hooks, enable_hooks};
use lockstep_logging::signal_safe;

use crate::core::{self, SHIM_STATE};

/// Initialize the shim on library load
#[ctor]
fn initialize_shim() {
    let _native = NativeGuard::new();

    let state = core::initialize_shim_state();
    if SHIM_STATE.set(state).is_err() {
        return;
    }

    if core::runtime().is_some() {
        core::designate_main_on(InitTrigger::Load);
        enable_hooks();
    }
}

/// Report what was seen and stop intercepting while the process tears down.
///
/// Runs after the exiting thread's thread-locals are destroyed, so nothing
/// here may go through `tracing`: the summary is written to stderr directly.
#[dtor]
fn finalize_shim() {
    let _native = NativeGuard::new();
    disable_hooks();

    let Some(runtime) = core::runtime() else {
        return;
    };
    runtime.coordinator.resume_quietly();
    if runtime.config.summary_on_exit {
        let summary = runtime.coordinator.summary();
        signal_safe::loud("thread summary:");
        let _ = signal_safe::write_fd(libc::STDERR_FILENO, summary.as_bytes());
    }
}

/// Check if the shim is loaded and applying substitutes
pub fn is_shim_enabled() -> bool {
    core::runtime().is_some() && lockstep_hooks::hooks_enabled()
}

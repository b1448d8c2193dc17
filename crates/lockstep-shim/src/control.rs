// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! C entry points for collaborators living in the same process (frame
//! stepping, input scripting). All of them are safe to call before the
//! runtime is ready; they then report "nothing happened".

use libc::c_int;
use lockstep_core::{EntryPointKey, SuspendOutcome, ThreadIdentity};
use lockstep_hooks::with_native;
use lockstep_logging::signal_safe;
use tracing::{debug, info};

use crate::core::coordinator;

/// Ask for the main thread to be paused on behalf of the calling thread.
///
/// Returns 1 when the pause was requested, 0 when the caller does not
/// qualify or suspension is unavailable, and `-errno` when the signal could
/// not be delivered.
#[no_mangle]
pub extern "C" fn lockstep_suspend() -> c_int {
    with_native(|| {
        let Some(coordinator) = coordinator() else {
            return 0;
        };
        match coordinator.suspend(ThreadIdentity::current()) {
            SuspendOutcome::Requested => 1,
            SuspendOutcome::SignalFailed(errno) => -(errno as c_int),
            SuspendOutcome::NotInitialised
            | SuspendOutcome::NotOfInterest
            | SuspendOutcome::Degraded => 0,
        }
    })
}

/// Release the main thread. Returns 1 if it was paused.
#[no_mangle]
pub extern "C" fn lockstep_resume() -> c_int {
    with_native(|| coordinator().is_some_and(|coordinator| coordinator.resume()) as c_int)
}

#[no_mangle]
pub extern "C" fn lockstep_is_suspended() -> c_int {
    coordinator().is_some_and(|coordinator| coordinator.is_suspended()) as c_int
}

/// Park the calling thread while a pause is pending.
#[no_mangle]
pub extern "C" fn lockstep_checkpoint() {
    if let Some(coordinator) = coordinator() {
        coordinator.checkpoint();
    }
}

/// Start waiting for threads launched from `key`. Returns 1 if the key is new.
#[no_mangle]
pub extern "C" fn lockstep_add_interest(key: i64) -> c_int {
    with_native(|| {
        coordinator()
            .is_some_and(|coordinator| coordinator.tracker().add_interest(EntryPointKey::new(key)))
            as c_int
    })
}

/// Write the thread summary to `fd`. Returns the number of bytes or -1.
#[no_mangle]
pub extern "C" fn lockstep_write_summary(fd: c_int) -> isize {
    with_native(|| {
        let Some(coordinator) = coordinator() else {
            return -1;
        };
        match signal_safe::write_fd(fd, coordinator.summary().as_bytes()) {
            Ok(written) => written as isize,
            Err(_) => -1,
        }
    })
}

/// Make the calling thread the main thread, whatever the configured trigger.
/// For hosts that know their frame loop thread and do not go through SDL.
///
/// Returns 1 on success, 0 when a main thread is already designated or the
/// runtime is disabled.
#[no_mangle]
pub extern "C" fn lockstep_designate_main() -> c_int {
    with_native(|| {
        let Some(coordinator) = coordinator() else {
            return 0;
        };
        let main = ThreadIdentity::current();
        match coordinator.init(main) {
            Ok(()) => {
                info!(main = %main, "main thread designated by the host");
                1
            }
            Err(error) => {
                debug!(%error, caller = %main, "host designation ignored");
                0
            }
        }
    })
}

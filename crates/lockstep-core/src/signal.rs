// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The channel used to force the main thread into its parked state.

use core::sync::atomic::{AtomicBool, Ordering};

use lockstep_logging::signal_safe::RawLine;
use nix::errno::Errno;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};

use crate::identity::ThreadIdentity;
use crate::pause::PAUSE_FLAG;

/// Delivers the pause signal to a thread.
#[cfg_attr(test, mockall::automock)]
pub trait PauseSignal: Send + Sync {
    fn deliver(&self, target: ThreadIdentity, signal: Signal) -> Result<(), Errno>;
}

/// Production delivery through `pthread_kill(3)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PthreadKill;

impl PauseSignal for PthreadKill {
    fn deliver(&self, target: ThreadIdentity, signal: Signal) -> Result<(), Errno> {
        nix::sys::pthread::pthread_kill(target.as_pthread(), signal)
    }
}

static TRACE_PARKING: AtomicBool = AtomicBool::new(false);

/// Write a raw stderr line each time the handler parks and unparks.
pub fn set_trace_parking(enabled: bool) {
    TRACE_PARKING.store(enabled, Ordering::Relaxed);
}

extern "C" fn on_pause_signal(signal: libc::c_int) {
    let trace = TRACE_PARKING.load(Ordering::Relaxed);
    if trace {
        let mut line = RawLine::<96>::new();
        line.push_str("[lockstep] parked on signal ").push_decimal(signal as i64);
        line.write_to_stderr();
    }

    PAUSE_FLAG.park();

    if trace {
        let mut line = RawLine::<64>::new();
        line.push_str("[lockstep] unparked");
        line.write_to_stderr();
    }
}

/// Install the parking handler for `signal`, process-wide.
///
/// `SA_RESTART` keeps the host's interrupted system calls from failing with
/// `EINTR` once the thread is released.
pub fn install_pause_handler(signal: Signal) -> Result<(), Errno> {
    let action = SigAction::new(
        SigHandler::Handler(on_pause_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    unsafe { sigaction(signal, &action) }.map(|_| ())
}

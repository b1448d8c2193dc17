// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Thread creation and termination substitutes.
//!
//! `pthread_create` wraps the host's start routine in a trampoline so the new
//! thread reports itself to the coordinator before running host code. A thread
//! whose entry point is of interest holds the main thread paused for as long as
//! it runs; the main thread continues once the last hold is withdrawn.

use core::cell::Cell;
use core::ffi::c_void;

use libc::{c_int, pthread_attr_t, pthread_t};
use lockstep_core::ThreadIdentity;
use lockstep_hooks::{NativeGuard, return_address, substitute};
use tracing::{debug, trace};

use crate::core::coordinator;

type StartRoutine = extern "C" fn(*mut c_void) -> *mut c_void;

struct Launch {
    routine: StartRoutine,
    arg: *mut c_void,
    request: usize,
}

thread_local! {
    // Set while a thread launched after init runs; `Some(true)` when it holds main.
    static LAUNCHED: Cell<Option<bool>> = const { Cell::new(None) };
}

substitute! {
    unsafe fn pthread_create(
        thread: *mut pthread_t,
        attr: *const pthread_attr_t,
        start_routine: StartRoutine,
        arg: *mut c_void,
    ) -> c_int [original = real_pthread_create, unresolved = libc::EAGAIN] {
        if coordinator().is_none() {
            return real_pthread_create(thread, attr, start_routine, arg);
        }

        let request = return_address(0).unwrap_or(0);
        let launch = Box::into_raw(Box::new(Launch {
            routine: start_routine,
            arg,
            request,
        }));

        let rc = real_pthread_create(thread, attr, launch_trampoline, launch.cast());
        if rc != 0 {
            drop(Box::from_raw(launch));
            debug!(rc, "pthread_create failed");
        }
        rc
    }
}

substitute! {
    unsafe fn pthread_exit(retval: *mut c_void) -> ! [original = real_pthread_exit, unresolved = libc::abort()] {
        finish_launch();
        real_pthread_exit(retval)
    }
}

extern "C" fn launch_trampoline(raw: *mut c_void) -> *mut c_void {
    // SAFETY: `raw` is the `Launch` boxed by the pthread_create substitute and
    // ownership passes to this thread exactly once.
    let Launch {
        routine,
        arg,
        request,
    } = *unsafe { Box::from_raw(raw.cast::<Launch>()) };

    begin_launch(request, routine as usize);
    let result = routine(arg);
    finish_launch();
    result
}

fn begin_launch(request: usize, target: usize) {
    let Some(coordinator) = coordinator() else {
        return;
    };
    let _native = NativeGuard::new();

    let me = ThreadIdentity::current();
    let Some(key) = coordinator.start(me, request, target) else {
        // Before init: nothing to end or release later.
        return;
    };
    trace!(thread = %me, entry_point = key.get(), "thread launched");

    // Nothing below may lock or log: main can be parked anywhere from here on.
    let held = coordinator.suspend(me).is_requested();
    let _ = LAUNCHED.try_with(|launched| launched.set(Some(held)));
}

/// Record the end of a trampolined thread. Later calls on the same thread are no-ops.
fn finish_launch() {
    let Some(held) = LAUNCHED.try_with(Cell::take).ok().flatten() else {
        return;
    };
    let Some(coordinator) = coordinator() else {
        return;
    };
    let _native = NativeGuard::new();

    // Release main before touching anything it might be holding a lock on.
    if held {
        coordinator.release_hold();
    }
    coordinator.end(ThreadIdentity::current());
}

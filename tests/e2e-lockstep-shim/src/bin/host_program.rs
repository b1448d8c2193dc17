// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Host program driven by the shim end-to-end tests.
//!
//! It knows nothing about the runtime except the optional C control entry
//! points, which it looks up at run time.

use std::env;
use std::ffi::CStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

type WriteSummary = extern "C" fn(libc::c_int) -> isize;
type DesignateMain = extern "C" fn() -> libc::c_int;

#[allow(clippy::print_stdout, clippy::print_stderr, clippy::disallowed_methods)]
fn main() {
    println!("host: started");

    let args: Vec<String> = env::args().collect();
    match args.get(1).map(String::as_str) {
        Some("threads") => {
            let count = args.get(2).and_then(|n| n.parse().ok()).unwrap_or(4);
            spawn_and_join(count);
        }
        Some("pid") => {
            let pid = unsafe { libc::getpid() };
            println!("host: pid {pid}");
        }
        Some("pause-probe") => pause_probe(),
        Some("overlap-probe") => overlap_probe(),
        Some("reuse") => reuse_across_init(),
        _ => {
            eprintln!("Usage: {} [threads N|pid|pause-probe|overlap-probe|reuse]", args[0]);
            std::process::exit(1);
        }
    }

    write_runtime_summary();
    println!("host: completed");
}

fn spawn_and_join(count: usize) {
    let workers: Vec<_> = (0..count)
        .map(|i| {
            thread::spawn(move || {
                let mut acc = 0u64;
                for n in 0..10_000u64 {
                    acc = acc.wrapping_add(n * i as u64);
                }
                acc
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker thread");
    }
    println!("host: joined {count} threads");
}

/// One worker samples a counter the main thread keeps bumping. When the
/// worker's entry point is of interest the main thread is held paused and the
/// samples match.
#[allow(clippy::print_stdout, clippy::disallowed_methods)]
fn pause_probe() {
    let counter = Arc::new(AtomicU64::new(0));
    let done = Arc::new(AtomicBool::new(false));

    let worker = {
        let counter = Arc::clone(&counter);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let first = counter.load(Ordering::SeqCst);
            thread::sleep(Duration::from_millis(150));
            let second = counter.load(Ordering::SeqCst);
            done.store(true, Ordering::SeqCst);
            first == second
        })
    };

    while !done.load(Ordering::SeqCst) {
        counter.fetch_add(1, Ordering::SeqCst);
        std::hint::spin_loop();
    }

    let frozen = worker.join().expect("probe worker");
    println!("host: main frozen={frozen}");
}

static MAIN_COUNTER: AtomicU64 = AtomicU64::new(0);
static OVERLAP_DONE: AtomicBool = AtomicBool::new(false);
static FROZEN_AFTER_FIRST: AtomicBool = AtomicBool::new(false);

const SHORT_HOLD: usize = 1;
const LONG_HOLD: usize = 2;

/// Both holders run this routine and are launched from the same call site,
/// so they share one entry point.
extern "C" fn holder(role: *mut libc::c_void) -> *mut libc::c_void {
    if role as usize == SHORT_HOLD {
        thread::sleep(Duration::from_millis(50));
        return std::ptr::null_mut();
    }
    // The short holder is gone by now; main must still be held.
    thread::sleep(Duration::from_millis(150));
    let first = MAIN_COUNTER.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(100));
    let second = MAIN_COUNTER.load(Ordering::SeqCst);
    FROZEN_AFTER_FIRST.store(first == second, Ordering::SeqCst);
    OVERLAP_DONE.store(true, Ordering::SeqCst);
    std::ptr::null_mut()
}

fn launch_raw(routine: extern "C" fn(*mut libc::c_void) -> *mut libc::c_void, arg: usize) -> libc::pthread_t {
    let mut thread: libc::pthread_t = 0;
    let rc = unsafe {
        libc::pthread_create(&mut thread, std::ptr::null(), routine, arg as *mut libc::c_void)
    };
    assert_eq!(rc, 0, "pthread_create");
    thread
}

fn join_raw(thread: libc::pthread_t) {
    let rc = unsafe { libc::pthread_join(thread, std::ptr::null_mut()) };
    assert_eq!(rc, 0, "pthread_join");
}

/// Two holders overlap: a short one that ends early and a long one that
/// samples the main thread's counter after the short one is gone. They are
/// launched from a helper thread so the main thread being paused cannot keep
/// the second one from starting.
#[allow(clippy::print_stdout, clippy::disallowed_methods)]
fn overlap_probe() {
    let launcher = thread::spawn(|| {
        let holders: Vec<_> = [SHORT_HOLD, LONG_HOLD]
            .into_iter()
            .map(|role| launch_raw(holder, role))
            .collect();
        holders.into_iter().for_each(join_raw);
    });

    while !OVERLAP_DONE.load(Ordering::SeqCst) {
        MAIN_COUNTER.fetch_add(1, Ordering::SeqCst);
        std::hint::spin_loop();
    }
    launcher.join().expect("launcher thread");

    let frozen = FROZEN_AFTER_FIRST.load(Ordering::SeqCst);
    println!("host: main frozen after first holder={frozen}");
}

static RELEASE_REUSED: AtomicBool = AtomicBool::new(false);

extern "C" fn short_lived(_: *mut libc::c_void) -> *mut libc::c_void {
    std::ptr::null_mut()
}

extern "C" fn waits_for_release(_: *mut libc::c_void) -> *mut libc::c_void {
    while !RELEASE_REUSED.load(Ordering::SeqCst) {
        thread::sleep(Duration::from_millis(1));
    }
    std::ptr::null_mut()
}

/// A thread that ends before init, then one started after init that glibc
/// usually hands the same identity. The second must show as still running.
#[allow(clippy::print_stdout, clippy::disallowed_methods)]
fn reuse_across_init() {
    let before = launch_raw(short_lived, 0);
    join_raw(before);

    let Some(designate) = lookup::<DesignateMain>(c"lockstep_designate_main") else {
        println!("host: no runtime");
        return;
    };
    designate();

    let after = launch_raw(waits_for_release, 0);
    println!("host: reused identity={}", before == after);
    println!("host: summary while running");
    write_runtime_summary();
    println!("host: end of running summary");

    RELEASE_REUSED.store(true, Ordering::SeqCst);
    join_raw(after);
}

/// Resolve an optional runtime entry point. The shim exports them all with
/// the signatures declared above.
fn lookup<F: Copy>(name: &CStr) -> Option<F> {
    let symbol = unsafe { libc::dlsym(libc::RTLD_DEFAULT, name.as_ptr()) };
    if symbol.is_null() {
        return None;
    }
    // SAFETY: `F` is a function pointer type matching the exported symbol.
    Some(unsafe { std::mem::transmute_copy::<*mut libc::c_void, F>(&symbol) })
}

#[allow(clippy::print_stdout, clippy::disallowed_methods)]
fn write_runtime_summary() {
    let Some(write_summary) = lookup::<WriteSummary>(c"lockstep_write_summary") else {
        return;
    };
    write_summary(libc::STDOUT_FILENO);
    println!("host: summary to a closed descriptor returned {}", write_summary(-1));
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use core::sync::atomic::{AtomicUsize, Ordering};

/// Process-wide count of outstanding pause requests on the main thread.
///
/// The main thread stays parked while the count is non-zero. Read from the
/// signal handler, so every operation is a single atomic access.
#[derive(Debug)]
pub struct PauseFlag(AtomicUsize);

/// The flag the installed signal handler parks on.
pub static PAUSE_FLAG: PauseFlag = PauseFlag::new();

impl PauseFlag {
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    /// Add one request. Returns the number of requests outstanding before it.
    pub fn request_pause(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst)
    }

    /// Withdraw one request. Returns true when it was the last one.
    pub fn release_one(&self) -> bool {
        self.0
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |held| held.checked_sub(1))
            .is_ok_and(|held| held == 1)
    }

    /// Drop every request. Returns true when any was outstanding.
    pub fn release(&self) -> bool {
        self.0.swap(0, Ordering::SeqCst) > 0
    }

    pub fn is_paused(&self) -> bool {
        self.outstanding() > 0
    }

    pub fn outstanding(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    /// Busy-wait until no request is outstanding. Async-signal-safe.
    pub fn park(&self) {
        while self.is_paused() {
            core::hint::spin_loop();
        }
    }
}

impl Default for PauseFlag {
    fn default() -> Self {
        Self::new()
    }
}

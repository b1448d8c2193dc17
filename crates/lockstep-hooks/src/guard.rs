// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Re-entrancy guard.
//!
//! A call is "native" when the runtime is acting on its own behalf: either
//! hooks are switched off process-wide, or the current thread is already inside
//! runtime code (a substitute body, logging, start-up). Substitutes reached in
//! native context forward to the original implementation untouched.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

static HOOKS_ENABLED: AtomicBool = AtomicBool::new(false);

thread_local! {
    static NATIVE_DEPTH: Cell<usize> = const { Cell::new(0) };
}

/// Start applying substitute logic to host calls.
///
/// The shim turns hooks on once its coordinator is in place; until then every
/// substitute is a plain pass-through.
pub fn enable_hooks() {
    HOOKS_ENABLED.store(true, Ordering::Release);
}

/// Stop applying substitute logic; substitutes forward to the originals.
pub fn disable_hooks() {
    HOOKS_ENABLED.store(false, Ordering::Release);
}

pub fn hooks_enabled() -> bool {
    HOOKS_ENABLED.load(Ordering::Acquire)
}

/// True when the current call stack belongs to the runtime rather than the host.
///
/// Thread-local storage that is already torn down (late in thread exit)
/// counts as native.
pub fn is_native() -> bool {
    if !hooks_enabled() {
        return true;
    }
    NATIVE_DEPTH.try_with(|depth| depth.get() > 0).unwrap_or(true)
}

/// Scoped native section. Nested guards stack; each drop undoes one level,
/// including drops during unwinding.
#[must_use = "the guard only covers the scope it is alive in"]
pub struct NativeGuard {
    _not_send: core::marker::PhantomData<*const ()>,
}

impl NativeGuard {
    pub fn new() -> Self {
        let _ = NATIVE_DEPTH.try_with(|depth| depth.set(depth.get() + 1));
        NativeGuard {
            _not_send: core::marker::PhantomData,
        }
    }
}

impl Default for NativeGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NativeGuard {
    fn drop(&mut self) {
        let _ = NATIVE_DEPTH.try_with(|depth| {
            let current = depth.get();
            if current > 0 {
                depth.set(current - 1);
            }
        });
    }
}

/// Run `f` as runtime code.
pub fn with_native<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = NativeGuard::new();
    f()
}

/// Current nesting depth on this thread, for diagnostics.
pub fn native_depth() -> usize {
    NATIVE_DEPTH.try_with(Cell::get).unwrap_or(0)
}

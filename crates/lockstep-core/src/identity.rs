// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::fmt;

/// OS thread handle (`pthread_t`). Unique while the thread lives, reusable after.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadIdentity(u64);

impl ThreadIdentity {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn current() -> Self {
        Self::from(nix::sys::pthread::pthread_self())
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub fn as_pthread(self) -> libc::pthread_t {
        self.0 as libc::pthread_t
    }
}

impl From<libc::pthread_t> for ThreadIdentity {
    fn from(raw: libc::pthread_t) -> Self {
        Self(raw as u64)
    }
}

impl fmt::Display for ThreadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Logical role of a thread: launch target minus launch request address.
///
/// Both addresses move together under ASLR when they live in the same image,
/// so the difference is stable across runs where the absolute values are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryPointKey(i64);

impl EntryPointKey {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub fn between(launch_request: usize, launch_target: usize) -> Self {
        Self(launch_target.wrapping_sub(launch_request) as isize as i64)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for EntryPointKey {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EntryPointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Thread launch bookkeeping.
//!
//! Every thread the host starts is classified by its [`EntryPointKey`]. Threads
//! whose current key is in the [`InterestSet`] are the ones the main thread
//! gets paused for. Everything else recorded here feeds the diagnostic summary.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt::Write as _;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use crate::clock::{CpuClock, ProcessCpuClock};
use crate::error::CoordinatorError;
use crate::identity::{EntryPointKey, ThreadIdentity};
use crate::interest::InterestSet;

#[derive(Default)]
struct TrackerState {
    interest: InterestSet,
    thread_map: BTreeMap<EntryPointKey, BTreeSet<ThreadIdentity>>,
    current: HashMap<ThreadIdentity, EntryPointKey>,
    start_times: HashMap<ThreadIdentity, Vec<Duration>>,
    end_times: HashMap<ThreadIdentity, Vec<Duration>>,
    pre_init: BTreeSet<usize>,
}

pub struct ThreadTracker<C: CpuClock = ProcessCpuClock> {
    main: OnceCell<ThreadIdentity>,
    state: Mutex<TrackerState>,
    clock: C,
}

impl ThreadTracker<ProcessCpuClock> {
    pub fn new(interest: InterestSet) -> Self {
        Self::with_clock(interest, ProcessCpuClock)
    }
}

impl<C: CpuClock> ThreadTracker<C> {
    pub fn with_clock(interest: InterestSet, clock: C) -> Self {
        Self {
            main: OnceCell::new(),
            state: Mutex::new(TrackerState {
                interest,
                ..TrackerState::default()
            }),
            clock,
        }
    }

    // Every operation leaves the maps consistent, so a panic elsewhere while
    // holding the lock does not invalidate them.
    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Designate the main thread. Only the first call succeeds.
    pub fn init(&self, main: ThreadIdentity) -> Result<(), CoordinatorError> {
        self.main.set(main).map_err(|_| CoordinatorError::AlreadyInitialised {
            main: self.main.get().copied().unwrap_or(main),
        })?;
        debug!(main = %main, "main thread designated");
        Ok(())
    }

    pub fn is_initialised(&self) -> bool {
        self.main.get().is_some()
    }

    pub fn main_thread(&self) -> Option<ThreadIdentity> {
        self.main.get().copied()
    }

    /// Record a thread launch.
    ///
    /// Before [`init`](Self::init) only the target address is kept, and such a
    /// thread can never be waited for. Returns the computed key otherwise.
    pub fn start(
        &self,
        identity: ThreadIdentity,
        launch_request: usize,
        launch_target: usize,
    ) -> Option<EntryPointKey> {
        if !self.is_initialised() {
            self.state().pre_init.insert(launch_target);
            trace!(thread = %identity, target = launch_target, "thread started before init");
            return None;
        }

        let key = EntryPointKey::between(launch_request, launch_target);
        let now = self.clock.now();
        let mut state = self.state();
        state.thread_map.entry(key).or_default().insert(identity);
        state.current.insert(identity, key);
        state.start_times.entry(identity).or_default().push(now);
        drop(state);

        debug!(thread = %identity, entry_point = key.get(), "thread started");
        Some(key)
    }

    /// Record the end of the thread's latest run.
    ///
    /// Ignored when every recorded start already has its end, which is the
    /// case for threads launched before init: glibc hands their identities
    /// out again, and a stray end would pair with the next thread's start.
    pub fn end(&self, identity: ThreadIdentity) {
        let now = self.clock.now();
        let mut state = self.state();
        let started = state.start_times.get(&identity).map_or(0, Vec::len);
        let ends = state.end_times.entry(identity).or_default();
        if ends.len() >= started {
            drop(state);
            trace!(thread = %identity, "end without a recorded start");
            return;
        }
        ends.push(now);
        drop(state);
        debug!(thread = %identity, "thread ended");
    }

    /// Whether the thread's most recent launch is of interest.
    pub fn wait_for(&self, identity: ThreadIdentity) -> bool {
        if !self.is_initialised() {
            return false;
        }
        let state = self.state();
        state
            .current
            .get(&identity)
            .is_some_and(|key| state.interest.contains(*key))
    }

    pub fn add_interest(&self, key: EntryPointKey) -> bool {
        self.state().interest.insert(key)
    }

    pub fn interest(&self) -> InterestSet {
        self.state().interest.clone()
    }

    pub fn current_key(&self, identity: ThreadIdentity) -> Option<EntryPointKey> {
        self.state().current.get(&identity).copied()
    }

    pub fn threads_for(&self, key: EntryPointKey) -> Vec<ThreadIdentity> {
        self.state()
            .thread_map
            .get(&key)
            .map(|threads| threads.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn pre_init_targets(&self) -> Vec<usize> {
        self.state().pre_init.iter().copied().collect()
    }

    /// Human-readable report of every launch seen so far.
    pub fn summary(&self) -> String {
        let state = self.state();
        let mut out = String::new();

        for (key, threads) in &state.thread_map {
            let marker = if state.interest.contains(*key) {
                " (waited for)"
            } else {
                ""
            };
            let _ = write!(out, "\nRecord for entry point : {key}{marker}");
            for thread in threads {
                let _ = write!(out, "\n  - {thread}");
                let starts = state.start_times.get(thread).map(Vec::as_slice).unwrap_or(&[]);
                let ends = state.end_times.get(thread).map(Vec::as_slice).unwrap_or(&[]);
                for (run, start) in starts.iter().enumerate() {
                    let _ = write!(out, "\n    {}: Started", run + 1);
                    match ends.get(run) {
                        Some(end) => {
                            let lasted = end.saturating_sub(*start);
                            let _ = write!(
                                out,
                                " and lasted {} seconds and {} nsec.",
                                lasted.as_secs(),
                                lasted.subsec_nanos()
                            );
                        }
                        None => out.push_str(" and is still running."),
                    }
                }
            }
        }

        out.push_str("\nThese threads started before init and can't be waited for :\n");
        for target in &state.pre_init {
            let _ = writeln!(out, "{target:#x}");
        }
        out
    }
}

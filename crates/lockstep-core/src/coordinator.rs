// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Pausing the main thread on behalf of other threads.
//!
//! A suspension request adds one hold to [`PAUSE_FLAG`] and sends the pause
//! signal to the main thread, whose handler then spins until every hold is
//! withdrawn with [`release_hold`] or dropped at once by [`resume`]. Requests
//! are honoured only from the main thread itself or from threads the tracker
//! considers of interest.
//!
//! [`release_hold`]: SuspensionCoordinator::release_hold
//! [`resume`]: SuspensionCoordinator::resume

use nix::errno::Errno;
use nix::sys::signal::Signal;
use tracing::{debug, info, trace, warn};

use crate::clock::{CpuClock, ProcessCpuClock};
use crate::error::CoordinatorError;
use crate::identity::{EntryPointKey, ThreadIdentity};
use crate::interest::InterestSet;
use crate::pause::{PAUSE_FLAG, PauseFlag};
use crate::signal::{PauseSignal, PthreadKill, install_pause_handler};
use crate::tracker::ThreadTracker;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    pub interest: InterestSet,
    pub pause_signal: Signal,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            interest: InterestSet::new(),
            pause_signal: Signal::SIGUSR1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuspendOutcome {
    /// No main thread designated yet.
    NotInitialised,
    /// The requester is neither the main thread nor of interest.
    NotOfInterest,
    /// The pause handler could not be installed; requests are ignored.
    Degraded,
    /// Hold added and signal sent. The main thread parks asynchronously.
    Requested,
    /// Signal delivery failed; the hold was withdrawn again.
    SignalFailed(Errno),
}

impl SuspendOutcome {
    pub fn is_requested(self) -> bool {
        matches!(self, SuspendOutcome::Requested)
    }
}

pub struct SuspensionCoordinator<S: PauseSignal = PthreadKill, C: CpuClock = ProcessCpuClock> {
    tracker: ThreadTracker<C>,
    flag: &'static PauseFlag,
    signal: S,
    pause_signal: Signal,
    degraded: bool,
}

impl SuspensionCoordinator {
    /// Build the process coordinator and install the pause handler.
    ///
    /// An installation failure is logged and leaves the coordinator degraded:
    /// tracking continues but the signal is never sent, since its default
    /// disposition could terminate the host.
    pub fn install(settings: CoordinatorSettings) -> Self {
        let degraded = match install_pause_handler(settings.pause_signal) {
            Ok(()) => false,
            Err(errno) => {
                let error = CoordinatorError::HandlerInstall {
                    signal: settings.pause_signal,
                    errno,
                };
                warn!(%error, "main thread suspension disabled");
                true
            }
        };
        Self::with_parts(
            settings,
            PthreadKill,
            ProcessCpuClock,
            &PAUSE_FLAG,
            degraded,
        )
    }
}

impl<S: PauseSignal, C: CpuClock> SuspensionCoordinator<S, C> {
    pub fn with_parts(
        settings: CoordinatorSettings,
        signal: S,
        clock: C,
        flag: &'static PauseFlag,
        degraded: bool,
    ) -> Self {
        Self {
            tracker: ThreadTracker::with_clock(settings.interest, clock),
            flag,
            signal,
            pause_signal: settings.pause_signal,
            degraded,
        }
    }

    pub fn tracker(&self) -> &ThreadTracker<C> {
        &self.tracker
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn pause_signal(&self) -> Signal {
        self.pause_signal
    }

    pub fn init(&self, main: ThreadIdentity) -> Result<(), CoordinatorError> {
        self.tracker.init(main)
    }

    pub fn start(
        &self,
        identity: ThreadIdentity,
        launch_request: usize,
        launch_target: usize,
    ) -> Option<EntryPointKey> {
        self.tracker.start(identity, launch_request, launch_target)
    }

    pub fn end(&self, identity: ThreadIdentity) {
        self.tracker.end(identity)
    }

    pub fn wait_for(&self, identity: ThreadIdentity) -> bool {
        self.tracker.wait_for(identity)
    }

    pub fn summary(&self) -> String {
        self.tracker.summary()
    }

    /// Ask for the main thread to be paused on behalf of `requester`.
    ///
    /// Does not wait for the main thread to actually park.
    pub fn suspend(&self, requester: ThreadIdentity) -> SuspendOutcome {
        let Some(main) = self.tracker.main_thread() else {
            return SuspendOutcome::NotInitialised;
        };
        if requester != main && !self.tracker.wait_for(requester) {
            trace!(requester = %requester, "not suspending main");
            return SuspendOutcome::NotOfInterest;
        }
        if self.degraded {
            debug!(requester = %requester, "suspension requested while degraded");
            return SuspendOutcome::Degraded;
        }

        debug!(main = %main, requester = %requester, "suspending main");
        self.flag.request_pause();
        match self.signal.deliver(main, self.pause_signal) {
            Ok(()) => SuspendOutcome::Requested,
            Err(errno) => {
                // Only this request goes; holds taken by others stay.
                self.flag.release_one();
                warn!(main = %main, %errno, "failed to signal main thread");
                SuspendOutcome::SignalFailed(errno)
            }
        }
    }

    /// Withdraw one honoured request. Returns true when it was the last one
    /// and the main thread runs again.
    ///
    /// Logs nothing unless the main thread was actually let go: with other
    /// holds outstanding it may still be parked inside the logging stack.
    pub fn release_hold(&self) -> bool {
        let released = self.flag.release_one();
        if released {
            info!("released main");
        }
        released
    }

    /// Release the main thread. Safe to call at any time, any number of times.
    pub fn resume(&self) -> bool {
        let released = self.flag.release();
        if released {
            info!("released main");
        }
        released
    }

    /// [`resume`](Self::resume) without logging, for process teardown when
    /// the logging stack may already be gone.
    pub fn resume_quietly(&self) -> bool {
        self.flag.release()
    }

    pub fn is_suspended(&self) -> bool {
        self.flag.is_paused()
    }

    /// Park the calling thread for as long as a pause is pending.
    pub fn checkpoint(&self) {
        self.flag.park();
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Thread lifecycle tracking and on-demand suspension of the host's main thread.

pub mod clock;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod interest;
pub mod pause;
pub mod signal;
pub mod tracker;

pub use clock::{CpuClock, ProcessCpuClock};
pub use coordinator::{CoordinatorSettings, SuspendOutcome, SuspensionCoordinator};
pub use error::CoordinatorError;
pub use identity::{EntryPointKey, ThreadIdentity};
pub use interest::InterestSet;
pub use pause::{PAUSE_FLAG, PauseFlag};
pub use signal::{PauseSignal, PthreadKill, install_pause_handler, set_trace_parking};
pub use tracker::ThreadTracker;

pub use nix::sys::signal::Signal;

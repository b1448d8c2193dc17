// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::time::Duration;

use nix::time::{ClockId, clock_gettime};

/// Source of the timestamps recorded at thread start and end.
pub trait CpuClock: Send + Sync {
    fn now(&self) -> Duration;
}

/// CPU time consumed by the whole process (`CLOCK_PROCESS_CPUTIME_ID`).
///
/// Wall-clock time would make the report depend on how long the host was held
/// suspended, which is exactly what the report should not show.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCpuClock;

impl CpuClock for ProcessCpuClock {
    fn now(&self) -> Duration {
        match clock_gettime(ClockId::CLOCK_PROCESS_CPUTIME_ID) {
            Ok(spec) => Duration::new(spec.tv_sec() as u64, spec.tv_nsec() as u32),
            Err(_) => Duration::ZERO,
        }
    }
}

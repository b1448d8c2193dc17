// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Process identity and library start-up substitutes

use libc::c_int;
use lockstep_config::InitTrigger;
use lockstep_hooks::{object_containing, return_address, substitute};
use tracing::debug;

use crate::core::{designate_main_on, runtime};

substitute! {
    /// Hosts that seed their RNG from the pid get a fixed value when the
    /// calling library matches a configured override.
    unsafe fn getpid() -> libc::pid_t [original = real_getpid, unresolved = -1] {
        let pid = real_getpid();
        let Some(runtime) = runtime() else {
            return pid;
        };
        if runtime.config.pid_overrides.is_empty() {
            return pid;
        }

        let caller = return_address(0).and_then(object_containing);
        match caller.as_deref().and_then(|object| runtime.config.pid_override_for(object)) {
            Some(fixed) => {
                debug!(object = caller.as_deref().unwrap_or_default(), pid = fixed, "reporting fixed pid");
                fixed
            }
            None => pid,
        }
    }
}

substitute! {
    /// The thread that initialises SDL is the one rendering frames, which is
    /// the thread to pause.
    #[allow(non_snake_case)]
    unsafe fn SDL_Init(flags: u32) -> c_int [original = real_sdl_init, unresolved = -1] {
        designate_main_on(InitTrigger::SdlInit);
        real_sdl_init(flags)
    }
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Lockstep injection shim
//!
//! Loaded into the host with `LD_PRELOAD`. On load it reads the runtime
//! configuration, installs the main-thread pause handler and switches the
//! substitutes on. From then on every thread the host starts is reported to
//! the suspension coordinator, and threads of interest pause the main thread
//! for as long as they run.

#![cfg(target_os = "linux")]

pub mod control;
pub mod platform;
pub mod system;
pub mod threads;

pub use platform::*;

/// Core types and logic shared by the substitutes
pub mod core {
    use lockstep_config::{ENABLED_VAR, InitTrigger, RuntimeConfig, load_from_process_env};
    use lockstep_core::{
        CoordinatorError, CoordinatorSettings, Signal, SuspensionCoordinator, ThreadIdentity,
        set_trace_parking,
    };
    use lockstep_logging::signal_safe;
    use once_cell::sync::OnceCell;
    use tracing::{debug, error, info};

    /// Global state for the shim
    pub static SHIM_STATE: OnceCell<ShimState> = OnceCell::new();

    pub struct Runtime {
        pub coordinator: SuspensionCoordinator,
        pub config: RuntimeConfig,
    }

    pub enum ShimState {
        /// `LOCKSTEP_ENABLED=0`: every substitute passes through
        Disabled,
        Ready(Box<Runtime>),
    }

    /// The live runtime, once the shim is initialised and enabled.
    pub fn runtime() -> Option<&'static Runtime> {
        match SHIM_STATE.get()? {
            ShimState::Ready(runtime) => Some(runtime),
            ShimState::Disabled => None,
        }
    }

    pub fn coordinator() -> Option<&'static SuspensionCoordinator> {
        runtime().map(|runtime| &runtime.coordinator)
    }

    /// Build the runtime from `LOCKSTEP_CONFIG` and `LOCKSTEP_*` variables.
    ///
    /// A broken configuration never keeps the host from starting: it is
    /// reported and the defaults are used instead.
    pub fn initialize_shim_state() -> ShimState {
        if std::env::var(ENABLED_VAR).is_ok_and(|value| value == "0") {
            return ShimState::Disabled;
        }

        let (config, config_error) = match load_from_process_env() {
            Ok(config) => (config, None),
            Err(error) => (RuntimeConfig::default(), Some(error)),
        };

        if let Err(error) = lockstep_logging::init_from_config("lockstep-shim", &config.log) {
            signal_safe::loud(&format!("logging unavailable: {error:#}"));
        }
        if let Some(error) = config_error {
            error!(error = %format!("{error:#}"), "invalid configuration, using defaults");
        }

        set_trace_parking(config.log.trace_parking);
        let settings = CoordinatorSettings {
            interest: config.interest_keys.iter().copied().collect(),
            pause_signal: config.pause_signal().unwrap_or(Signal::SIGUSR1),
        };
        let coordinator = SuspensionCoordinator::install(settings);

        info!(
            interest = ?config.interest_keys,
            pause_signal = %coordinator.pause_signal(),
            init_trigger = %config.init_trigger,
            degraded = coordinator.is_degraded(),
            "lockstep runtime loaded"
        );

        ShimState::Ready(Box::new(Runtime {
            coordinator,
            config,
        }))
    }

    /// Make the calling thread the main thread if `trigger` is the configured one.
    pub fn designate_main_on(trigger: InitTrigger) {
        let Some(runtime) = runtime() else {
            return;
        };
        if runtime.config.init_trigger != trigger {
            return;
        }
        let main = ThreadIdentity::current();
        match runtime.coordinator.init(main) {
            Ok(()) => info!(main = %main, trigger = %trigger, "main thread designated"),
            Err(CoordinatorError::AlreadyInitialised { main: existing }) => {
                debug!(main = %existing, caller = %main, "main thread already designated")
            }
            Err(error) => error!(%error, "failed to designate main thread"),
        }
    }
}

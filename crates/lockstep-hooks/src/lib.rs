// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Symbol shadowing primitives for the Lockstep runtime.
//!
//! A shadowing library exports functions under the same names as the library
//! entry points it wants to control. Each of those substitutes needs three
//! things, all provided here:
//!
//! - [`guard`]: telling the runtime's own calls apart from the host's,
//! - [`resolver`]: finding the original implementation to delegate to,
//! - [`substitute!`]: the dispatch contract tying the two together.

extern crate libc;

pub mod caller;
pub mod guard;
pub mod resolver;
mod substitute;

pub use caller::{object_containing, return_address};
pub use guard::{
    NativeGuard, disable_hooks, enable_hooks, hooks_enabled, is_native, native_depth, with_native,
};
pub use resolver::{NextObject, Original, ResolveError, SymbolLookup, SymbolRegistry, registry};

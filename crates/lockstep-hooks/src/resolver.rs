// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Resolution of the original implementation behind a shadowed symbol.
//!
//! [`SymbolRegistry`] maps a symbol name to the address found by a
//! [`SymbolLookup`]. Each name is looked up at most once that matters: the
//! first result stored under the lock wins, and failures are cached as well so
//! the diagnostic for a missing symbol is emitted a single time.
//!
//! [`Original`] is the typed per-symbol slot a substitute keeps in a `static`.
//! After the first successful resolution it is a single atomic load.

use core::ffi::c_void;
use core::marker::PhantomData;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicPtr, Ordering};
use std::collections::HashMap;
use std::ffi::CStr;
use std::sync::{Mutex, PoisonError};

use once_cell::sync::Lazy;
use thiserror::Error;

use crate::guard::with_native;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("unable to find the original implementation of `{symbol}`")]
    NotFound { symbol: String },
}

/// Where original implementations are looked up.
pub trait SymbolLookup: Send + Sync {
    fn lookup(&self, symbol: &CStr) -> Option<NonNull<c_void>>;
}

/// Looks a symbol up in the objects loaded after this one (`RTLD_NEXT`),
/// which skips our own shadowing definition.
#[derive(Debug, Default, Clone, Copy)]
pub struct NextObject;

impl SymbolLookup for NextObject {
    fn lookup(&self, symbol: &CStr) -> Option<NonNull<c_void>> {
        let ptr = unsafe { libc::dlsym(libc::RTLD_NEXT, symbol.as_ptr()) };
        NonNull::new(ptr)
    }
}

pub struct SymbolRegistry<L = NextObject> {
    lookup: L,
    entries: Mutex<HashMap<String, Option<usize>>>,
}

impl<L: SymbolLookup> SymbolRegistry<L> {
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Address of the original implementation of `symbol`.
    ///
    /// The lookup itself runs without the registry lock held, since the
    /// dynamic loader may call back into shadowed functions that resolve
    /// their own originals.
    pub fn resolve(&self, symbol: &CStr) -> Result<NonNull<c_void>, ResolveError> {
        let name = symbol.to_string_lossy();

        let cached = self.lock().get(name.as_ref()).copied();
        let outcome = match cached {
            Some(outcome) => outcome,
            None => {
                let found = self.lookup.lookup(symbol).map(|p| p.as_ptr() as usize);
                let mut entries = self.lock();
                let stored = *entries.entry(name.to_string()).or_insert(found);
                drop(entries);
                if stored.is_none() {
                    report_unresolved(&name);
                } else {
                    tracing::trace!(symbol = %name, address = ?stored, "resolved original symbol");
                }
                stored
            }
        };

        outcome
            .and_then(|addr| NonNull::new(addr as *mut c_void))
            .ok_or_else(|| ResolveError::NotFound {
                symbol: name.into_owned(),
            })
    }

    /// Everything resolved so far, sorted by name. `None` marks a failure.
    pub fn snapshot(&self) -> Vec<(String, Option<usize>)> {
        let mut all: Vec<_> = self.lock().iter().map(|(k, v)| (k.clone(), *v)).collect();
        all.sort();
        all
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Option<usize>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn report_unresolved(symbol: &str) {
    // Raw stderr first: the subscriber may not be installed yet, and a
    // substitute without a delegate is a configuration problem worth shouting.
    let mut line = lockstep_logging::signal_safe::RawLine::<160>::new();
    line.push_str("[lockstep] unable to find the original implementation of `")
        .push_str(symbol)
        .push_str("`; calls to it will fail");
    line.write_to_stderr();
    with_native(|| tracing::error!(symbol, "original symbol not found; aborting calls to it"));
}

static PROCESS_REGISTRY: Lazy<SymbolRegistry<NextObject>> =
    Lazy::new(|| SymbolRegistry::new(NextObject));

/// The registry every substitute in the process resolves through.
pub fn registry() -> &'static SymbolRegistry<NextObject> {
    &PROCESS_REGISTRY
}

/// Typed, lazily resolved pointer to an original implementation.
///
/// `F` must be an `unsafe extern "C" fn(..) -> ..` type matching the C
/// signature of the symbol.
pub struct Original<F> {
    symbol: &'static CStr,
    slot: AtomicPtr<c_void>,
    _marker: PhantomData<F>,
}

// SAFETY: the slot is an atomic and F is only ever a function pointer type.
unsafe impl<F> Sync for Original<F> {}
unsafe impl<F> Send for Original<F> {}

impl<F: Copy> Original<F> {
    pub const fn new(symbol: &'static CStr) -> Self {
        Self {
            symbol,
            slot: AtomicPtr::new(ptr::null_mut()),
            _marker: PhantomData,
        }
    }

    pub fn symbol(&self) -> &'static CStr {
        self.symbol
    }

    pub fn is_resolved(&self) -> bool {
        !self.slot.load(Ordering::Acquire).is_null()
    }

    /// Resolve through the process registry.
    ///
    /// # Safety
    ///
    /// `F` must be the function pointer type of the symbol's real signature.
    pub unsafe fn get(&self) -> Result<F, ResolveError> {
        self.get_with(registry())
    }

    /// Resolve through an explicit registry.
    ///
    /// # Safety
    ///
    /// `F` must be the function pointer type of the symbol's real signature.
    pub unsafe fn get_with<L: SymbolLookup>(
        &self,
        registry: &SymbolRegistry<L>,
    ) -> Result<F, ResolveError> {
        debug_assert_eq!(core::mem::size_of::<F>(), core::mem::size_of::<*mut c_void>());

        let cached = self.slot.load(Ordering::Acquire);
        if !cached.is_null() {
            return Ok(core::mem::transmute_copy(&cached));
        }

        let resolved = registry.resolve(self.symbol)?.as_ptr();
        self.slot.store(resolved, Ordering::Release);
        Ok(core::mem::transmute_copy(&resolved))
    }
}

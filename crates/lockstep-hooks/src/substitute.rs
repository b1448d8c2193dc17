// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The dispatch contract every shadowed entry point follows.
//!
//! ```ignore
//! lockstep_hooks::substitute! {
//!     unsafe fn getpid() -> libc::pid_t [original = real_getpid, unresolved = -1] {
//!         let pid = real_getpid();
//!         /* controlled behaviour */
//!         pid
//!     }
//! }
//! ```
//!
//! expands to an exported `extern "C"` function with the exact C signature that
//!
//! 1. resolves the original through a per-symbol [`Original`](crate::Original)
//!    slot, returning `unresolved` (after a loud diagnostic) when it is missing;
//!    `unresolved` may diverge, as for `-> !` entry points,
//! 2. forwards straight to the original when [`is_native`](crate::is_native),
//! 3. otherwise runs the body with the original bound to the `original` name,
//!    under a [`NativeGuard`](crate::NativeGuard) so that anything the body
//!    calls passes through untouched.

#[doc(hidden)]
#[macro_export]
macro_rules! __symbol_name {
    ($name:ident) => {
        // SAFETY: the literal is NUL-terminated and an identifier has no interior NUL.
        unsafe {
            ::std::ffi::CStr::from_bytes_with_nul_unchecked(
                concat!(stringify!($name), "\0").as_bytes(),
            )
        }
    };
}

#[macro_export]
macro_rules! substitute {
    (
        $(#[$meta:meta])*
        unsafe fn $name:ident ( $( $arg:ident : $ty:ty ),* $(,)? ) -> $ret:ty
            [original = $original:ident, unresolved = $fallback:expr]
        $body:block
    ) => {
        $(#[$meta])*
        #[no_mangle]
        pub unsafe extern "C" fn $name( $( $arg : $ty ),* ) -> $ret {
            static ORIGINAL: $crate::Original<unsafe extern "C" fn( $( $ty ),* ) -> $ret> =
                $crate::Original::new($crate::__symbol_name!($name));

            // Either return may be unreachable for a diverging `$ret`.
            let $original = match ORIGINAL.get() {
                Ok(original) => original,
                Err(_) => {
                    #[allow(unreachable_code)]
                    return $fallback;
                }
            };

            if $crate::is_native() {
                #[allow(unreachable_code)]
                return $original( $( $arg ),* );
            }

            let _native = $crate::NativeGuard::new();
            $body
        }
    };
}

// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Who called the substitute.

use core::ffi::c_void;
use std::ffi::CStr;

extern "C" {
    // glibc <execinfo.h>
    fn backtrace(buffer: *mut *mut c_void, size: libc::c_int) -> libc::c_int;
}

const MAX_FRAMES: usize = 8;

/// Return address of the function that calls this one, `depth` frames up.
///
/// `return_address(0)` inside a substitute is the instruction in the host
/// right after its call into the substitute. Frame 0 of the captured trace is
/// inside this function and frame 1 inside the caller, hence the `+ 2`.
#[inline(never)]
pub fn return_address(depth: usize) -> Option<usize> {
    let wanted = depth + 2;
    if wanted >= MAX_FRAMES {
        return None;
    }
    let mut frames = [core::ptr::null_mut::<c_void>(); MAX_FRAMES];
    let captured = unsafe { backtrace(frames.as_mut_ptr(), MAX_FRAMES as libc::c_int) };
    if captured <= wanted as libc::c_int {
        return None;
    }
    let address = frames[wanted] as usize;
    (address != 0).then_some(address)
}

/// Path of the loaded object containing `address`, as reported by `dladdr`.
pub fn object_containing(address: usize) -> Option<String> {
    let mut info: libc::Dl_info = unsafe { core::mem::zeroed() };
    let found = unsafe { libc::dladdr(address as *const c_void, &mut info) };
    if found == 0 || info.dli_fname.is_null() {
        return None;
    }
    let name = unsafe { CStr::from_ptr(info.dli_fname) };
    Some(name.to_string_lossy().into_owned())
}

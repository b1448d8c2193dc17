// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Diagnostics that may be emitted from a signal handler.
//!
//! Nothing in here allocates, locks or goes through `std::io`. Lines are
//! assembled in a fixed stack buffer and handed to `write(2)` directly.

use std::io;

/// Fixed-capacity line buffer. Content past the capacity is dropped.
pub struct RawLine<const N: usize> {
    buf: [u8; N],
    len: usize,
}

impl<const N: usize> RawLine<N> {
    pub const fn new() -> Self {
        Self {
            buf: [0u8; N],
            len: 0,
        }
    }

    pub fn push_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        for &b in bytes {
            if self.len == N {
                break;
            }
            self.buf[self.len] = b;
            self.len += 1;
        }
        self
    }

    pub fn push_str(&mut self, s: &str) -> &mut Self {
        self.push_bytes(s.as_bytes())
    }

    /// Append `value` as lowercase hexadecimal with a `0x` prefix.
    pub fn push_hex(&mut self, value: usize) -> &mut Self {
        self.push_bytes(b"0x");
        if value == 0 {
            return self.push_bytes(b"0");
        }
        let mut digits = [0u8; core::mem::size_of::<usize>() * 2];
        let mut idx = digits.len();
        let mut v = value;
        while v > 0 {
            let nibble = (v & 0xF) as u8;
            idx -= 1;
            digits[idx] = match nibble {
                0..=9 => b'0' + nibble,
                _ => b'a' + (nibble - 10),
            };
            v >>= 4;
        }
        let mut out = [0u8; core::mem::size_of::<usize>() * 2];
        let count = digits.len() - idx;
        out[..count].copy_from_slice(&digits[idx..]);
        self.push_bytes(&out[..count])
    }

    pub fn push_decimal(&mut self, value: i64) -> &mut Self {
        if value < 0 {
            self.push_bytes(b"-");
        }
        let mut v = value.unsigned_abs();
        if v == 0 {
            return self.push_bytes(b"0");
        }
        let mut digits = [0u8; 20];
        let mut idx = digits.len();
        while v > 0 {
            idx -= 1;
            digits[idx] = b'0' + (v % 10) as u8;
            v /= 10;
        }
        let mut out = [0u8; 20];
        let count = digits.len() - idx;
        out[..count].copy_from_slice(&digits[idx..]);
        self.push_bytes(&out[..count])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    /// Write the line plus a trailing newline to stderr.
    pub fn write_to_stderr(&mut self) {
        if self.len == N && N > 0 {
            self.buf[N - 1] = b'\n';
        } else {
            self.push_bytes(b"\n");
        }
        let _ = write_fd(libc::STDERR_FILENO, self.as_bytes());
    }
}

impl<const N: usize> Default for RawLine<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// `write(2)` loop retrying short writes and `EINTR`.
///
/// Returns the number of bytes written, which is all of them on success.
/// Building the error reads `errno` and does not allocate.
pub fn write_fd(fd: libc::c_int, bytes: &[u8]) -> io::Result<usize> {
    let mut written = 0;
    while written < bytes.len() {
        let rc = unsafe {
            libc::write(
                fd,
                bytes[written..].as_ptr() as *const libc::c_void,
                bytes.len() - written,
            )
        };
        if rc < 0 {
            let error = io::Error::last_os_error();
            if error.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(error);
        }
        if rc == 0 {
            return Err(io::ErrorKind::WriteZero.into());
        }
        written += rc as usize;
    }
    Ok(written)
}

/// Emit a prefixed line on stderr without touching the tracing subscriber.
pub fn loud(message: &str) {
    let mut line = RawLine::<256>::new();
    line.push_str("[lockstep] ").push_str(message);
    line.write_to_stderr();
}

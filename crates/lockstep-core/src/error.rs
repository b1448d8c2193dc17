// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

use crate::identity::ThreadIdentity;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("main thread already designated as {main}")]
    AlreadyInitialised { main: ThreadIdentity },

    #[error("failed to install the {signal} handler: {errno}")]
    HandlerInstall { signal: Signal, errno: Errno },
}

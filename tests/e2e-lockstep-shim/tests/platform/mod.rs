// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Platform-specific test utilities for shim injection

pub mod linux;
pub use linux::*;

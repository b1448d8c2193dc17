// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Platform-specific load and unload handling

pub mod linux;

pub use linux::*;

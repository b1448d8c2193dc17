// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use std::collections::BTreeSet;

use crate::identity::EntryPointKey;

/// Entry point keys whose threads the main thread must be paused for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestSet {
    keys: BTreeSet<EntryPointKey>,
}

impl InterestSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true when the key was not already present.
    pub fn insert(&mut self, key: EntryPointKey) -> bool {
        self.keys.insert(key)
    }

    pub fn contains(&self, key: EntryPointKey) -> bool {
        self.keys.contains(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = EntryPointKey> + '_ {
        self.keys.iter().copied()
    }
}

impl FromIterator<EntryPointKey> for InterestSet {
    fn from_iter<T: IntoIterator<Item = EntryPointKey>>(iter: T) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<i64> for InterestSet {
    fn from_iter<T: IntoIterator<Item = i64>>(iter: T) -> Self {
        iter.into_iter().map(EntryPointKey::new).collect()
    }
}

impl Extend<EntryPointKey> for InterestSet {
    fn extend<T: IntoIterator<Item = EntryPointKey>>(&mut self, iter: T) {
        self.keys.extend(iter);
    }
}

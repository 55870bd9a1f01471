// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Undo logs backing the runtime's unit of work.
//!
//! Tables that grow with history are never copied as a whole. Each one keeps
//! the prior value of every key written since the unit of work began, so
//! undoing a call costs as much as the call itself.

use std::collections::{BTreeMap, BTreeSet};

/// State that can discard every write made since [`Journaled::begin`].
pub trait Journaled {
    fn begin(&mut self);
    fn commit(&mut self);
    fn rollback(&mut self);
}

/// Prior values of the keys written to a map during the open unit of work.
/// `None` marks a key that did not exist yet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MapUndoLog<K, V> {
    saved: Option<BTreeMap<K, Option<V>>>,
}

impl<K, V> Default for MapUndoLog<K, V> {
    fn default() -> Self {
        Self { saved: None }
    }
}

impl<K: Ord + Clone, V: Clone> MapUndoLog<K, V> {
    pub fn begin(&mut self) {
        self.saved = Some(BTreeMap::new());
    }

    pub fn commit(&mut self) {
        self.saved = None;
    }

    /// Remembers what `key` holds in `table` unless it was saved already.
    /// Does nothing outside a unit of work.
    pub fn save(&mut self, table: &BTreeMap<K, V>, key: &K) {
        if let Some(saved) = self.saved.as_mut() {
            if !saved.contains_key(key) {
                saved.insert(key.clone(), table.get(key).cloned());
            }
        }
    }

    pub fn rollback(&mut self, table: &mut BTreeMap<K, V>) {
        for (key, value) in self.saved.take().unwrap_or_default() {
            match value {
                Some(value) => {
                    table.insert(key, value);
                }
                None => {
                    table.remove(&key);
                }
            }
        }
    }

    /// Number of keys saved in the open unit of work.
    pub fn touched(&self) -> usize {
        self.saved.as_ref().map_or(0, BTreeMap::len)
    }
}

/// Keys added to an append-only set during the open unit of work.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SetUndoLog<K> {
    added: Option<Vec<K>>,
}

impl<K> Default for SetUndoLog<K> {
    fn default() -> Self {
        Self { added: None }
    }
}

impl<K: Ord + Clone> SetUndoLog<K> {
    pub fn begin(&mut self) {
        self.added = Some(Vec::new());
    }

    pub fn commit(&mut self) {
        self.added = None;
    }

    /// Inserts `key` into `set`; returns false if it was already there.
    pub fn insert(&mut self, set: &mut BTreeSet<K>, key: K) -> bool {
        let inserted = set.insert(key.clone());
        if inserted {
            if let Some(added) = self.added.as_mut() {
                added.push(key);
            }
        }
        inserted
    }

    pub fn rollback(&mut self, set: &mut BTreeSet<K>) {
        for key in self.added.take().unwrap_or_default() {
            set.remove(&key);
        }
    }
}

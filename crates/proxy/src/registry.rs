// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of live sessions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::RwLock;

use crate::session::{Session, SessionId};

pub type SessionRegistry = Registry<Session>;

/// Insertion-ordered set of live entries keyed by id.
///
/// Removal empties the entry's slot in place and the map is compacted with
/// an order-preserving `retain` once empty slots outnumber live ones, so
/// insert and remove are amortized O(1). Scans work on a point-in-time
/// snapshot, so entries may be removed by their own tasks while a scan is
/// in flight.
pub struct Registry<T> {
    next_id: AtomicU64,
    slots: RwLock<Slots<T>>,
}

struct Slots<T> {
    entries: IndexMap<SessionId, Option<Arc<T>>>,
    vacant: usize,
}

impl<T> Slots<T> {
    fn live(&self) -> usize {
        self.entries.len() - self.vacant
    }

    fn compact(&mut self) {
        if self.vacant > self.live() {
            self.entries.retain(|_, entry| entry.is_some());
            self.vacant = 0;
        }
    }
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            slots: RwLock::new(Slots { entries: IndexMap::new(), vacant: 0 }),
        }
    }

    /// Allocate an id for an entry about to be inserted.
    pub fn next_id(&self) -> SessionId {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub async fn insert(&self, id: SessionId, entry: Arc<T>) {
        let mut guard = self.slots.write().await;
        let slots = &mut *guard;
        match slots.entries.get_mut(&id) {
            // An emptied slot keeps its original position.
            Some(slot) => {
                if slot.replace(entry).is_none() {
                    slots.vacant -= 1;
                }
            }
            None => {
                slots.entries.insert(id, Some(entry));
            }
        }
    }

    pub async fn remove(&self, id: SessionId) -> Option<Arc<T>> {
        let mut slots = self.slots.write().await;
        let removed = slots.entries.get_mut(&id).and_then(Option::take)?;
        slots.vacant += 1;
        slots.compact();
        Some(removed)
    }

    pub async fn get(&self, id: SessionId) -> Option<Arc<T>> {
        self.slots.read().await.entries.get(&id).and_then(|entry| entry.as_ref().map(Arc::clone))
    }

    pub async fn len(&self) -> usize {
        self.slots.read().await.live()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Entries in insertion order, oldest first.
    pub async fn snapshot(&self) -> Vec<Arc<T>> {
        self.slots.read().await.entries.values().flatten().map(Arc::clone).collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;

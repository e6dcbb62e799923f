// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Offline mutation queue.
//!
//! Mutations that must survive connectivity loss are appended here and
//! drained later with [`OfflineQueue::flush`]. The whole queue is one JSON
//! array under a single storage key, so every change is a read-modify-write
//! of that key.
//!
//! Flush semantics:
//! - items are processed in insertion order
//! - failed items are kept, in their original relative order
//! - the result is persisted once, after the loop; a crash mid-flush leaves
//!   the pre-flush queue in place, so processors must be idempotent

use std::collections::HashSet;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::clock::{ClockSource, SystemClock};
use crate::error::Result;
use crate::store::KeyValueStore;

/// Default storage key for the queue.
pub const DEFAULT_STORAGE_KEY: &str = "offline_mutation_queue";

/// Configuration for the offline queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Storage key holding the serialized queue.
    pub storage_key: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig { storage_key: DEFAULT_STORAGE_KEY.to_string() }
    }
}

/// A mutation waiting to be applied remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedMutation {
    /// Unique among queued items; derived from `subject_key` and the enqueue time.
    pub id: String,
    /// What the mutation is about (e.g. a vehicle id).
    pub subject_key: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

/// Durable FIFO of pending mutations.
pub struct OfflineQueue {
    store: Arc<dyn KeyValueStore>,
    config: QueueConfig,
    clock: Arc<dyn ClockSource>,
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn KeyValueStore>, config: QueueConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Create a queue with a custom clock (for testing).
    pub fn with_clock(
        store: Arc<dyn KeyValueStore>,
        config: QueueConfig,
        clock: Arc<dyn ClockSource>,
    ) -> Self {
        OfflineQueue { store, config, clock }
    }

    pub fn storage_key(&self) -> &str {
        &self.config.storage_key
    }

    /// Loads the stored sequence.
    ///
    /// Unparseable content is logged and treated as an empty queue; store
    /// failures propagate.
    fn load(&self) -> Result<Vec<QueuedMutation>> {
        let Some(raw) = self.store.get(&self.config.storage_key)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str(&raw) {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::warn!(
                    key = %self.config.storage_key,
                    "discarding unreadable offline queue: {}",
                    e
                );
                Ok(Vec::new())
            }
        }
    }

    fn persist(&self, items: &[QueuedMutation]) -> Result<()> {
        if items.is_empty() {
            return self.store.remove(&self.config.storage_key);
        }
        let json = serde_json::to_string(items)?;
        self.store.set(&self.config.storage_key, &json)
    }

    fn next_id(&self, subject_key: &str, now_ms: u64, existing: &[QueuedMutation]) -> String {
        let base = format!("{subject_key}_{now_ms}");
        let taken: HashSet<&str> = existing.iter().map(|i| i.id.as_str()).collect();
        if !taken.contains(base.as_str()) {
            return base;
        }
        let mut suffix = 1u32;
        loop {
            let candidate = format!("{base}_{suffix}");
            if !taken.contains(candidate.as_str()) {
                return candidate;
            }
            suffix += 1;
        }
    }

    /// Appends a mutation and persists the queue.
    pub fn enqueue(&self, subject_key: &str, payload: Value) -> Result<QueuedMutation> {
        let mut items = self.load()?;
        let now_ms = self.clock.now_ms();
        let item = QueuedMutation {
            id: self.next_id(subject_key, now_ms, &items),
            subject_key: subject_key.to_string(),
            payload,
            created_at: DateTime::from_timestamp_millis(now_ms as i64).unwrap_or_default(),
        };
        items.push(item.clone());
        self.persist(&items)?;

        tracing::debug!(id = %item.id, queued = items.len(), "enqueued offline mutation");
        Ok(item)
    }

    /// Removes the item with the given id. Absent ids are a no-op.
    pub fn dequeue(&self, id: &str) -> Result<()> {
        let mut items = self.load()?;
        let before = items.len();
        items.retain(|i| i.id != id);
        if items.len() == before {
            return Ok(());
        }
        self.persist(&items)
    }

    /// Current queue contents, oldest first.
    pub fn list(&self) -> Result<Vec<QueuedMutation>> {
        self.load()
    }

    pub fn get(&self, id: &str) -> Result<Option<QueuedMutation>> {
        Ok(self.load()?.into_iter().find(|i| i.id == id))
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.load()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Drops every queued item.
    pub fn clear(&self) -> Result<()> {
        self.store.remove(&self.config.storage_key)
    }

    /// Runs `processor` over the queue in order and keeps only the failures.
    ///
    /// Items enqueued while the flush is running are not processed; they are
    /// kept after the retained failures and picked up by the next flush.
    /// Returns the persisted remainder.
    pub async fn flush<F, Fut, E>(&self, mut processor: F) -> Result<Vec<QueuedMutation>>
    where
        F: FnMut(QueuedMutation) -> Fut,
        Fut: Future<Output = std::result::Result<(), E>>,
        E: Display,
    {
        let pending = self.load()?;
        if pending.is_empty() {
            return Ok(Vec::new());
        }

        let mut remaining = Vec::new();
        let mut processed = 0usize;
        for item in &pending {
            match processor(item.clone()).await {
                Ok(()) => processed += 1,
                Err(e) => {
                    tracing::warn!(
                        id = %item.id,
                        "offline mutation failed, keeping for retry: {}",
                        e
                    );
                    remaining.push(item.clone());
                }
            }
        }

        let seen: HashSet<&str> = pending.iter().map(|i| i.id.as_str()).collect();
        let late: Vec<QueuedMutation> =
            self.load()?.into_iter().filter(|i| !seen.contains(i.id.as_str())).collect();
        remaining.extend(late);
        self.persist(&remaining)?;

        tracing::info!(processed, remaining = remaining.len(), "flushed offline queue");
        Ok(remaining)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;

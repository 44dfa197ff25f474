// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 terndds contributors

//! Generic bounded change store, the base of the reader history.
//!
//! A flat sequence of all currently held changes in reception order, bounded
//! by the resolved `max_samples` resource limit, plus the payload pool those
//! changes draw from. Policy decisions (what to admit, what to evict) live a
//! layer up; this store only enforces the hard bound and keeps the `is_full`
//! flag and the instance lists' backing pointers consistent.

use std::sync::Arc;

use crate::core::pool::{HistoryAttributes, PayloadPool};
use crate::core::types::{CacheChange, SerializedPayload};
use crate::qos::HistoryMemoryPolicy;

/// Flat ordered store of received changes.
///
/// Changes are shared (`Arc`) with the per-instance lists kept by the
/// keyed history; every pointer held by an instance list also lives here.
#[derive(Debug)]
pub struct ChangeStore {
    changes: Vec<Arc<CacheChange>>,
    /// Resolved `max_samples` limit (`usize::MAX` when unlimited).
    max_samples: usize,
    is_full: bool,
    total_received: u64,
    pool: PayloadPool,
}

impl ChangeStore {
    /// Create a store bounded by `max_samples` with a pool sized from
    /// `attributes`.
    pub fn new(max_samples: usize, attributes: &HistoryAttributes) -> Self {
        Self {
            changes: Vec::new(),
            max_samples,
            is_full: false,
            total_received: 0,
            pool: PayloadPool::new(attributes),
        }
    }

    /// Append a change in reception order.
    ///
    /// Rejects duplicates of a sample already held (same writer GUID and
    /// sequence number), oversized payloads under the fixed memory policy,
    /// and anything beyond the hard sample bound.
    pub fn add_change(&mut self, change: Arc<CacheChange>) -> bool {
        if self.changes.iter().any(|held| held.same_sample(&change)) {
            log::warn!(
                "[ChangeStore::add_change] dropping duplicate seq={} from {:?}",
                change.sequence_number,
                change.writer_guid
            );
            return false;
        }

        if self.pool.memory_policy() == HistoryMemoryPolicy::Preallocated
            && change.serialized_payload.len() > self.pool.payload_max_size()
        {
            log::error!(
                "[ChangeStore::add_change] payload of {} bytes exceeds pool size {}",
                change.serialized_payload.len(),
                self.pool.payload_max_size()
            );
            return false;
        }

        if self.changes.len() >= self.max_samples {
            log::warn!(
                "[ChangeStore::add_change] store holds {} samples, at capacity",
                self.changes.len()
            );
            return false;
        }

        self.changes.push(change);
        self.total_received += 1;
        self.is_full = self.changes.len() == self.max_samples;
        true
    }

    /// Remove a change matched by sample identity.
    pub fn remove_change(&mut self, change: &CacheChange, release: bool) -> bool {
        match self.find_change(change) {
            Some(at) => {
                self.remove_change_at(at, release);
                true
            }
            None => false,
        }
    }

    /// Remove the change at `at`, returning it when it is still usable.
    ///
    /// With `release` the payload cache is returned to the pool; when the
    /// store held the last reference the buffer is recycled and `None` is
    /// returned even though the removal happened.
    pub fn remove_change_at(&mut self, at: usize, release: bool) -> Option<Arc<CacheChange>> {
        if at >= self.changes.len() {
            return None;
        }

        let change = self.changes.remove(at);
        self.is_full = self.changes.len() == self.max_samples;

        if release {
            match Arc::try_unwrap(change) {
                Ok(owned) => {
                    self.pool.recycle(owned.serialized_payload);
                    return None;
                }
                Err(shared) => {
                    self.pool.release();
                    return Some(shared);
                }
            }
        }

        Some(change)
    }

    /// Position of a change matched by sample identity.
    pub fn find_change(&self, change: &CacheChange) -> Option<usize> {
        self.changes.iter().position(|held| held.same_sample(change))
    }

    /// All held changes, in reception order.
    pub fn changes(&self) -> &[Arc<CacheChange>] {
        &self.changes
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<CacheChange>> {
        self.changes.iter()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The store is full exactly when it holds `max_samples` changes.
    pub fn is_full(&self) -> bool {
        self.is_full
    }

    /// Total samples ever admitted (for diagnostics).
    pub fn total_received(&self) -> u64 {
        self.total_received
    }

    /// Reserve a payload buffer from the backing pool.
    pub fn reserve_payload(&mut self, len: usize) -> Option<SerializedPayload> {
        self.pool.reserve(len)
    }

    /// Outstanding payload caches in the backing pool.
    pub fn pool_reserved(&self) -> usize {
        self.pool.reserved()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Guid;
    use crate::qos::{DataReaderQos, History, ResourceLimits};

    fn store(max_samples: usize) -> ChangeStore {
        let qos = DataReaderQos {
            history: History::KeepAll,
            resource_limits: ResourceLimits {
                max_samples,
                allocated_samples: 0,
                ..Default::default()
            },
            ..Default::default()
        };
        let att = HistoryAttributes::for_reader(61, false, &qos);
        ChangeStore::new(
            if max_samples == 0 { usize::MAX } else { max_samples },
            &att,
        )
    }

    fn change(seq: u64) -> Arc<CacheChange> {
        Arc::new(CacheChange::new(
            Guid {
                prefix: [1; 12],
                entity_id: [0, 0, 0, 1],
            },
            seq,
            SerializedPayload::default(),
        ))
    }

    #[test]
    fn test_add_and_order() {
        let mut store = store(0);
        assert!(store.add_change(change(1)));
        assert!(store.add_change(change(2)));
        assert!(store.add_change(change(3)));
        let seqs: Vec<u64> = store.iter().map(|c| c.sequence_number).collect();
        assert_eq!(seqs, vec![1, 2, 3]);
        assert_eq!(store.total_received(), 3);
        assert!(!store.is_full());
    }

    #[test]
    fn test_add_rejects_duplicate_identity() {
        let mut store = store(0);
        assert!(store.add_change(change(7)));
        assert!(!store.add_change(change(7)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_seq_from_other_writer_accepted() {
        let mut store = store(0);
        assert!(store.add_change(change(7)));
        let other = Arc::new(CacheChange::new(
            Guid {
                prefix: [2; 12],
                entity_id: [0, 0, 0, 1],
            },
            7,
            SerializedPayload::default(),
        ));
        assert!(store.add_change(other));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_full_flag_tracks_capacity() {
        let mut store = store(2);
        assert!(store.add_change(change(1)));
        assert!(!store.is_full());
        assert!(store.add_change(change(2)));
        assert!(store.is_full());
        assert!(!store.add_change(change(3)), "at capacity");

        let removed = store.remove_change(&change(1), false);
        assert!(removed);
        assert!(!store.is_full());
    }

    #[test]
    fn test_remove_by_identity() {
        let mut store = store(0);
        store.add_change(change(1));
        store.add_change(change(2));
        store.add_change(change(3));

        assert!(store.remove_change(&change(2), false));
        let seqs: Vec<u64> = store.iter().map(|c| c.sequence_number).collect();
        assert_eq!(seqs, vec![1, 3]);
        assert!(!store.remove_change(&change(2), false), "already gone");
    }

    #[test]
    fn test_remove_at_returns_shared_change() {
        let mut store = store(0);
        store.add_change(change(1));
        let kept = store.changes()[0].clone();

        // Still shared with `kept`, so release cannot recycle the buffer.
        let back = store.remove_change_at(0, true);
        assert!(back.is_some());
        assert_eq!(kept.sequence_number, 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_at_out_of_range() {
        let mut store = store(0);
        assert!(store.remove_change_at(0, false).is_none());
    }
}

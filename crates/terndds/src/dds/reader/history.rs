// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 terndds contributors

//! Sample history of a DataReader.
//!
//! The history is the in-memory store the RTPS receive path deposits
//! samples into and the application reads and takes them from. It enforces
//! the history QoS (KEEP_ALL rejects at capacity, KEEP_LAST evicts the
//! oldest), the resource limits, and keyed-topic semantics with on-the-fly
//! key extraction when a sample arrives without its instance handle.
//!
//! # Architecture
//!
//! ```text
//! receive path                          application
//!      |                                     |
//!      v                                     v
//! received_change()              get_first_untaken_info()
//!      |                          lookup_instance()/take
//!      v                                     |
//! +----------------- DataReaderHistory -----------------+
//! | admission (one of four, bound at construction)      |
//! | ChangeStore   [c1][c2][c3][c4] ... (reception order)|
//! | instances     A -> [c1][c3]    next_deadline        |
//! |               B -> [c2][c4]    next_deadline        |
//! +-----------------------------------------------------+
//! ```
//!
//! Every pointer held by an instance list also lives in the change store;
//! the union of the instance lists equals the store. Removal paths scrub
//! the instance side first so the relation survives each operation.
//!
//! # Locking
//!
//! One non-recursive mutex guards the whole mutable state. Public entry
//! points lock once and call `*_nts` primitives internally, so the
//! evict-then-add paths of KEEP_LAST never need to re-enter the lock. The
//! enclosing reader must be attached before the history is usable.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::core::history::ChangeStore;
use crate::core::pool::HistoryAttributes;
use crate::core::types::{CacheChange, InstanceHandle, SerializedPayload};
use crate::dds::reader::ReaderContext;
use crate::dds::sample_info::SampleInfo;
use crate::dds::type_support::TypeSupport;
use crate::dds::{Error, Result, TopicDescription};
use crate::qos::{DataReaderQos, History};

/// Result of an instance lookup: the handle and a snapshot of its samples
/// in reception order.
#[derive(Debug, Clone)]
pub struct InstanceLookup {
    pub handle: InstanceHandle,
    pub changes: Vec<Arc<CacheChange>>,
}

/// Admission strategy, selected once at construction from
/// `(has_keys, history kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    KeepAllNoKey,
    KeepLastNoKey,
    KeepAllWithKey,
    KeepLastWithKey,
}

/// Per-instance state: retained samples plus the deadline bookkeeping.
struct InstanceEntry {
    /// Samples of this instance, in reception order. Tail-append only.
    cache_changes: Vec<Arc<CacheChange>>,
    next_deadline: Instant,
}

impl InstanceEntry {
    fn new() -> Self {
        Self {
            cache_changes: Vec::new(),
            next_deadline: Instant::now(),
        }
    }
}

/// Mutable history state, guarded by the history mutex.
struct HistoryState {
    /// Enclosing reader, installed after construction.
    reader: Option<Arc<dyn ReaderContext>>,
    store: ChangeStore,
    /// Keyed instances. Empty for unkeyed topics.
    instances: BTreeMap<InstanceHandle, InstanceEntry>,
    /// Deadline slot of the single fictitious instance (unkeyed topics).
    next_deadline: Instant,
    /// Reusable key-extraction scratch, allocated iff the type has keys.
    scratch_key: Option<Box<dyn std::any::Any + Send>>,
}

/// Reader-side sample history for one topic.
pub struct DataReaderHistory {
    topic_name: String,
    type_name: String,
    type_support: Arc<dyn TypeSupport>,
    has_keys: bool,
    /// KEEP_LAST retention depth per instance (unused for KEEP_ALL).
    depth: usize,
    /// Resolved resource limits (zeros rewritten to `usize::MAX`).
    max_samples: usize,
    max_instances: usize,
    max_samples_per_instance: usize,
    admission: Admission,
    state: Mutex<HistoryState>,
}

fn resolved(limit: usize) -> usize {
    if limit == 0 {
        usize::MAX
    } else {
        limit
    }
}

impl DataReaderHistory {
    /// Create a history for `topic` with the retention shape of `qos`.
    ///
    /// Zero values in the resource limits mean "unlimited". The enclosing
    /// reader must call [`attach_reader`] before the history accepts any
    /// operation that touches reader state.
    ///
    /// [`attach_reader`]: DataReaderHistory::attach_reader
    pub fn new(
        type_support: Arc<dyn TypeSupport>,
        topic: &TopicDescription,
        qos: &DataReaderQos,
    ) -> Result<Self> {
        qos.validate().map_err(Error::InvalidQos)?;

        let has_keys = type_support.has_key();
        let attributes = HistoryAttributes::for_reader(type_support.payload_size(), has_keys, qos);

        let admission = match (has_keys, qos.history) {
            (false, History::KeepAll) => Admission::KeepAllNoKey,
            (false, History::KeepLast(_)) => Admission::KeepLastNoKey,
            (true, History::KeepAll) => Admission::KeepAllWithKey,
            (true, History::KeepLast(_)) => Admission::KeepLastWithKey,
        };

        let scratch_key = if has_keys {
            type_support.create_key_scratch()
        } else {
            None
        };

        Ok(Self {
            topic_name: topic.name.clone(),
            type_name: topic.type_name.clone(),
            has_keys,
            depth: qos.history.depth().unwrap_or(0) as usize,
            max_samples: resolved(qos.resource_limits.max_samples),
            max_instances: resolved(qos.resource_limits.max_instances),
            max_samples_per_instance: resolved(qos.resource_limits.max_samples_per_instance),
            admission,
            state: Mutex::new(HistoryState {
                reader: None,
                store: ChangeStore::new(resolved(qos.resource_limits.max_samples), &attributes),
                instances: BTreeMap::new(),
                next_deadline: Instant::now(),
                scratch_key,
            }),
            type_support,
        })
    }

    /// Install the enclosing reader. Must happen before any history
    /// operation that touches reader state.
    pub fn attach_reader(&self, reader: Arc<dyn ReaderContext>) {
        self.state.lock().reader = Some(reader);
    }

    /// Detach the enclosing reader. Required before the history is dropped.
    pub fn detach_reader(&self) {
        self.state.lock().reader = None;
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Deposit a change arriving from the receive path.
    ///
    /// `unknown_missing_up_to` is how many lower sequence numbers the RTPS
    /// layer still expects to fill in ahead of this sample; only the
    /// KEEP_ALL/unkeyed strategy reserves capacity for them.
    ///
    /// Returns `false` when the sample was not admitted; the history state
    /// is unchanged in that case.
    pub fn received_change(&self, change: CacheChange, unknown_missing_up_to: usize) -> bool {
        let mut state = self.state.lock();
        if state.reader.is_none() {
            log::error!(
                "[DataReaderHistory::received_change] no reader attached to history of topic {}",
                self.topic_name
            );
            return false;
        }

        match self.admission {
            Admission::KeepAllNoKey => {
                self.received_keep_all_no_key(&mut state, change, unknown_missing_up_to)
            }
            Admission::KeepLastNoKey => self.received_keep_last_no_key(&mut state, change),
            Admission::KeepAllWithKey => self.received_keep_all_with_key(&mut state, change),
            Admission::KeepLastWithKey => self.received_keep_last_with_key(&mut state, change),
        }
    }

    fn received_keep_all_no_key(
        &self,
        state: &mut HistoryState,
        change: CacheChange,
        unknown_missing_up_to: usize,
    ) -> bool {
        if state.store.len().saturating_add(unknown_missing_up_to) < self.max_samples {
            return self.add_received_change(state, change);
        }

        log::warn!(
            "[DataReaderHistory::received_change] {}: change {} refused, sample limit reached",
            self.topic_name,
            change.sequence_number
        );
        false
    }

    fn received_keep_last_no_key(&self, state: &mut HistoryState, change: CacheChange) -> bool {
        let mut add = state.store.len() < self.depth;
        if !add {
            // Substitute the oldest sample. Ordering is reception order, so
            // the front of the store is always the one to go.
            if let Some(oldest) = state.store.changes().first().cloned() {
                log::debug!(
                    "[DataReaderHistory::received_change] {}: evicting change {} for depth {}",
                    self.topic_name,
                    oldest.sequence_number,
                    self.depth
                );
                add = self.remove_change_sub_nts(state, oldest.as_ref());
            }
        }

        if add {
            return self.add_received_change(state, change);
        }
        false
    }

    fn received_keep_all_with_key(&self, state: &mut HistoryState, mut change: CacheChange) -> bool {
        // TODO: reserve capacity for in-flight lower sequence numbers the
        // way the unkeyed KEEP_ALL path does.
        let Some(handle) = self.resolve_instance(state, &mut change) else {
            return false;
        };

        let held = state
            .instances
            .get(&handle)
            .map(|entry| entry.cache_changes.len())
            .unwrap_or(0);
        if held < self.max_samples_per_instance {
            return self.add_received_change_with_key(state, change, handle);
        }

        log::warn!(
            "[DataReaderHistory::received_change] {}: change not added due to maximum number of samples per instance",
            self.topic_name
        );
        false
    }

    fn received_keep_last_with_key(
        &self,
        state: &mut HistoryState,
        mut change: CacheChange,
    ) -> bool {
        let Some(handle) = self.resolve_instance(state, &mut change) else {
            return false;
        };

        let held = state
            .instances
            .get(&handle)
            .map(|entry| entry.cache_changes.len())
            .unwrap_or(0);
        let mut add = held < self.depth;
        if !add {
            // Substitute the oldest sample of this instance.
            let oldest = state
                .instances
                .get(&handle)
                .and_then(|entry| entry.cache_changes.first())
                .cloned();
            if let Some(oldest) = oldest {
                log::debug!(
                    "[DataReaderHistory::received_change] {}: evicting change {} of instance {:?}",
                    self.topic_name,
                    oldest.sequence_number,
                    handle
                );
                add = self.remove_change_sub_nts(state, oldest.as_ref());
            }
        }

        if add {
            return self.add_received_change_with_key(state, change, handle);
        }
        false
    }

    fn add_received_change(&self, state: &mut HistoryState, change: CacheChange) -> bool {
        if state.store.is_full() {
            log::warn!(
                "[DataReaderHistory::received_change] attempting to add data to full reader history: {}",
                self.type_name
            );
            return false;
        }

        let sequence_number = change.sequence_number;
        let writer_guid = change.writer_guid;
        if !state.store.add_change(Arc::new(change)) {
            return false;
        }

        log::debug!(
            "[DataReaderHistory::received_change] {}: change {} added from {:?}",
            self.type_name,
            sequence_number,
            writer_guid
        );
        true
    }

    fn add_received_change_with_key(
        &self,
        state: &mut HistoryState,
        change: CacheChange,
        handle: InstanceHandle,
    ) -> bool {
        if state.store.is_full() {
            log::warn!(
                "[DataReaderHistory::received_change] attempting to add data to full reader history: {}",
                self.type_name
            );
            return false;
        }

        let sequence_number = change.sequence_number;
        let writer_guid = change.writer_guid;
        let shared = Arc::new(change);
        if !state.store.add_change(Arc::clone(&shared)) {
            return false;
        }

        // Ordering is reception order only, so the tail is always right.
        match state.instances.get_mut(&handle) {
            Some(entry) => entry.cache_changes.push(shared),
            None => {
                // resolve_instance just created or found this entry.
                log::error!(
                    "[DataReaderHistory::received_change] instance {:?} vanished during admission",
                    handle
                );
                state.store.remove_change(shared.as_ref(), true);
                return false;
            }
        }

        let reader_guid = state.reader.as_ref().map(|reader| reader.guid());
        log::debug!(
            "[DataReaderHistory::received_change] {:?}: change {} added from {:?} with key {:?}",
            reader_guid,
            sequence_number,
            writer_guid,
            handle
        );
        true
    }

    // ========================================================================
    // Key resolution / instance table
    // ========================================================================

    /// Resolve the instance a change belongs to, extracting the key from the
    /// payload when the receive path did not supply a handle. Allocates a
    /// new instance slot subject to `max_instances`.
    fn resolve_instance(
        &self,
        state: &mut HistoryState,
        change: &mut CacheChange,
    ) -> Option<InstanceHandle> {
        if !change.instance_handle.is_defined() {
            let HistoryState {
                reader,
                scratch_key,
                ..
            } = &mut *state;

            match scratch_key.as_mut() {
                Some(scratch) => {
                    log::debug!(
                        "[DataReaderHistory::received_change] resolving key of change with no key transmitted"
                    );
                    let is_key_protected = reader
                        .as_ref()
                        .map(|r| r.is_key_protected())
                        .unwrap_or(false);

                    if !self
                        .type_support
                        .deserialize(&change.serialized_payload, scratch.as_mut())
                    {
                        log::warn!(
                            "[DataReaderHistory::received_change] could not deserialize key of change {} in topic {}",
                            change.sequence_number,
                            self.topic_name
                        );
                        return None;
                    }

                    match self.type_support.get_key(scratch.as_ref(), is_key_protected) {
                        Some(handle) => change.instance_handle = handle,
                        None => {
                            log::warn!(
                                "[DataReaderHistory::received_change] could not extract key of change {} in topic {}",
                                change.sequence_number,
                                self.topic_name
                            );
                            return None;
                        }
                    }
                }
                None => {
                    log::warn!(
                        "[DataReaderHistory::received_change] no key in topic {} and no method to obtain it",
                        self.topic_name
                    );
                    return None;
                }
            }
        }

        self.find_or_create_instance(state, change.instance_handle)
    }

    /// Look up an instance entry, creating one when the table has room.
    ///
    /// When the table is at `max_instances`, a slot whose samples were all
    /// taken is reclaimed for the new handle. This is the only place an
    /// instance is deleted implicitly.
    fn find_or_create_instance(
        &self,
        state: &mut HistoryState,
        handle: InstanceHandle,
    ) -> Option<InstanceHandle> {
        if state.instances.contains_key(&handle) {
            return Some(handle);
        }

        if state.instances.len() < self.max_instances {
            state.instances.insert(handle, InstanceEntry::new());
            return Some(handle);
        }

        let reclaimable = state
            .instances
            .iter()
            .find(|(_, entry)| entry.cache_changes.is_empty())
            .map(|(h, _)| *h);
        if let Some(empty) = reclaimable {
            log::debug!(
                "[DataReaderHistory::received_change] reclaiming empty instance {:?} for {:?}",
                empty,
                handle
            );
            state.instances.remove(&empty);
            state.instances.insert(handle, InstanceEntry::new());
            return Some(handle);
        }

        log::warn!(
            "[DataReaderHistory::received_change] {}: history has reached the maximum number of instances",
            self.topic_name
        );
        None
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Remove a change, keeping the keyed bookkeeping consistent.
    pub fn remove_change_sub(&self, change: &CacheChange) -> bool {
        let mut state = self.state.lock();
        if state.reader.is_none() {
            log::error!(
                "[DataReaderHistory::remove_change_sub] no reader attached to history of topic {}",
                self.topic_name
            );
            return false;
        }
        self.remove_change_sub_nts(&mut state, change)
    }

    fn remove_change_sub_nts(&self, state: &mut HistoryState, change: &CacheChange) -> bool {
        if self.has_keys {
            let mut found = false;
            if let Some(handle) = self.find_or_create_instance(state, change.instance_handle) {
                if let Some(entry) = state.instances.get_mut(&handle) {
                    if let Some(at) = entry
                        .cache_changes
                        .iter()
                        .position(|held| held.same_sample(change))
                    {
                        entry.cache_changes.remove(at);
                        found = true;
                    }
                }
            }
            if !found {
                log::error!(
                    "[DataReaderHistory::remove_change_sub] change not found on this key, something is wrong"
                );
            }
        }

        state.store.remove_change(change, true)
    }

    /// Remove a change while iterating a sample list obtained from
    /// [`lookup_instance`]; `at` is the caller's position in that list (the
    /// instance list for keyed topics, the whole store otherwise).
    ///
    /// Returns the position of the next sample in the iterated list, or
    /// `None` when nothing was removed.
    ///
    /// [`lookup_instance`]: DataReaderHistory::lookup_instance
    pub fn remove_change_sub_at(&self, change: &CacheChange, at: usize) -> Option<usize> {
        let mut state = self.state.lock();
        if state.reader.is_none() {
            log::error!(
                "[DataReaderHistory::remove_change_sub] no reader attached to history of topic {}",
                self.topic_name
            );
            return None;
        }

        let mut next = at;
        if self.has_keys {
            let mut found = false;
            if let Some(handle) = self.find_or_create_instance(&mut state, change.instance_handle) {
                if let Some(entry) = state.instances.get_mut(&handle) {
                    if let Some(pos) = entry
                        .cache_changes
                        .iter()
                        .position(|held| held.same_sample(change))
                    {
                        debug_assert_eq!(pos, at);
                        entry.cache_changes.remove(pos);
                        next = pos;
                        found = true;
                    }
                }
            }
            if !found {
                log::error!(
                    "[DataReaderHistory::remove_change_sub] change not found on this key, something is wrong"
                );
            }
        }

        let Some(index) = state.store.find_change(change) else {
            log::info!(
                "[DataReaderHistory::remove_change_sub] trying to remove a change not in history"
            );
            return None;
        };
        state.store.remove_change_at(index, true);

        if self.has_keys {
            Some(next)
        } else {
            Some(index)
        }
    }

    /// Remove the change at `at` in the store, as driven by the reader for
    /// expiry and cleanup. Scrubs the owning instance's reference first.
    ///
    /// With `release` the payload cache returns to the pool.
    pub fn remove_change_at(&self, at: usize, release: bool) -> bool {
        let mut state = self.state.lock();
        self.remove_change_nts(&mut state, at, release)
    }

    fn remove_change_nts(&self, state: &mut HistoryState, at: usize, release: bool) -> bool {
        let Some(change) = state.store.changes().get(at).cloned() else {
            log::info!(
                "[DataReaderHistory::remove_change] trying to remove a change not in history"
            );
            return false;
        };

        if self.has_keys && change.instance_handle.is_defined() {
            // Clean any references to this change in the instance lists. The
            // entry stays, even empty; an empty entry is what the instance
            // table later reclaims.
            match state.instances.get_mut(&change.instance_handle) {
                Some(entry) => entry
                    .cache_changes
                    .retain(|held| !Arc::ptr_eq(held, &change)),
                None => log::error!(
                    "[DataReaderHistory::remove_change] keyed change {} has no instance entry, something is wrong",
                    change.sequence_number
                ),
            }
        }

        drop(change);
        state.store.remove_change_at(at, release);
        true
    }

    // ========================================================================
    // Query surface
    // ========================================================================

    /// Metadata of the reader's next not-yet-taken sample, marked as read
    /// by the user but left in place.
    pub fn get_first_untaken_info(&self) -> Option<SampleInfo> {
        let state = self.state.lock();
        let Some(reader) = state.reader.as_ref() else {
            log::error!(
                "[DataReaderHistory::get_first_untaken_info] no reader attached to history of topic {}",
                self.topic_name
            );
            return None;
        };

        let change = reader.next_untaken_cache()?;
        let info = SampleInfo::from_change(&change);
        reader.change_read_by_user(&change, false);
        Some(info)
    }

    /// Look up an instance by handle.
    ///
    /// With `exact` the handle must match; otherwise the least instance
    /// strictly greater than `handle` is returned. Unkeyed topics expose a
    /// single fictitious instance holding every change, reachable only with
    /// the nil handle and `exact == false`.
    pub fn lookup_instance(&self, handle: InstanceHandle, exact: bool) -> Option<InstanceLookup> {
        let state = self.state.lock();

        if !self.has_keys {
            if handle.is_defined() || exact {
                return None;
            }
            return Some(InstanceLookup {
                handle: InstanceHandle::UNKEYED,
                changes: state.store.changes().to_vec(),
            });
        }

        let entry = if exact {
            state.instances.get_key_value(&handle)
        } else {
            state.instances.range((Excluded(handle), Unbounded)).next()
        };

        entry.map(|(h, e)| InstanceLookup {
            handle: *h,
            changes: e.cache_changes.clone(),
        })
    }

    // ========================================================================
    // Deadlines
    // ========================================================================

    /// Record the next deadline of `handle`. Unkeyed topics keep a single
    /// global slot and ignore the handle.
    pub fn set_next_deadline(&self, handle: InstanceHandle, next_deadline: Instant) -> bool {
        let mut state = self.state.lock();
        if state.reader.is_none() {
            log::error!(
                "[DataReaderHistory::set_next_deadline] no reader attached to history of topic {}",
                self.topic_name
            );
            return false;
        }

        if !self.has_keys {
            state.next_deadline = next_deadline;
            return true;
        }

        match state.instances.get_mut(&handle) {
            Some(entry) => {
                entry.next_deadline = next_deadline;
                true
            }
            None => false,
        }
    }

    /// The instance whose deadline fires first. For unkeyed topics the
    /// global slot is returned under the nil handle; for keyed topics the
    /// entry with the minimum `next_deadline` wins.
    pub fn get_next_deadline(&self) -> Option<(InstanceHandle, Instant)> {
        let state = self.state.lock();
        if state.reader.is_none() {
            log::error!(
                "[DataReaderHistory::get_next_deadline] no reader attached to history of topic {}",
                self.topic_name
            );
            return None;
        }

        if !self.has_keys {
            return Some((InstanceHandle::nil(), state.next_deadline));
        }

        state
            .instances
            .iter()
            .min_by_key(|(_, entry)| entry.next_deadline)
            .map(|(handle, entry)| (*handle, entry.next_deadline))
    }

    // ========================================================================
    // Introspection / pool
    // ========================================================================

    /// Reserve a payload buffer for an incoming sample.
    pub fn reserve_payload(&self, len: usize) -> Result<SerializedPayload> {
        self.state
            .lock()
            .store
            .reserve_payload(len)
            .ok_or(Error::WouldBlock)
    }

    /// Snapshot of all held changes, in reception order.
    pub fn changes(&self) -> Vec<Arc<CacheChange>> {
        self.state.lock().store.changes().to_vec()
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.state.lock().store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().store.is_empty()
    }

    /// Whether the store sits at its total sample limit.
    pub fn is_full(&self) -> bool {
        self.state.lock().store.is_full()
    }

    /// Number of keyed instances currently tracked.
    pub fn instance_count(&self) -> usize {
        self.state.lock().instances.len()
    }

    /// Total samples ever admitted.
    pub fn total_received(&self) -> u64 {
        self.state.lock().store.total_received()
    }

    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }
}

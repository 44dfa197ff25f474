// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 terndds contributors

//! Payload pool backing the reader history.
//!
//! One size class sized for the topic type (`payload_size + 3` bytes of
//! alignment slack), with initial and maximum cache counts derived from the
//! reader QoS. The receive path reserves a payload per incoming sample; the
//! history releases it when the sample leaves the store.

use crate::core::types::SerializedPayload;
use crate::qos::{DataReaderQos, History, HistoryMemoryPolicy};

/// Sizing attributes for the history and its payload pool.
///
/// For KEEP_ALL the raw resource limits apply. For KEEP_LAST the cap is
/// `depth` (unkeyed) or `depth * max_instances` (keyed), with the initial
/// reservation clamped to the cap. A cap of `0` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryAttributes {
    pub memory_policy: HistoryMemoryPolicy,
    /// Maximum serialized payload size, including alignment slack.
    pub payload_max_size: usize,
    /// Caches reserved at pool creation.
    pub initial_reserved_caches: usize,
    /// Hard cap on outstanding caches (`0` = unbounded).
    pub maximum_reserved_caches: usize,
}

impl HistoryAttributes {
    /// Derive attributes from the topic type and reader QoS.
    pub fn for_reader(payload_size: usize, has_key: bool, qos: &DataReaderQos) -> Self {
        let mut initial = qos.resource_limits.allocated_samples;
        let mut max = qos.resource_limits.max_samples;

        if let History::KeepLast(depth) = qos.history {
            max = depth as usize;
            if has_key {
                max = max.saturating_mul(qos.resource_limits.max_instances);
            }
            if max != 0 {
                initial = initial.min(max);
            }
        }

        Self {
            memory_policy: qos.history_memory_policy,
            // possible alignment
            payload_max_size: payload_size + 3,
            initial_reserved_caches: initial,
            maximum_reserved_caches: max,
        }
    }
}

/// Bounded pool of serialized payload buffers.
///
/// The memory policy governs buffer sizing (fixed, grow-on-demand or exact);
/// the cache counts govern how many payloads may be outstanding at once.
/// Buffers travel out as [`SerializedPayload`] and can be recycled when the
/// history is the last owner at release time.
#[derive(Debug)]
pub struct PayloadPool {
    memory_policy: HistoryMemoryPolicy,
    payload_max_size: usize,
    max_caches: usize,
    reserved: usize,
    free: Vec<Vec<u8>>,
}

impl PayloadPool {
    /// Create a pool from history attributes, preallocating the initial
    /// buffers for the preallocated memory policies.
    pub fn new(attributes: &HistoryAttributes) -> Self {
        let max_caches = if attributes.maximum_reserved_caches == 0 {
            usize::MAX
        } else {
            attributes.maximum_reserved_caches
        };

        let prealloc = matches!(
            attributes.memory_policy,
            HistoryMemoryPolicy::Preallocated | HistoryMemoryPolicy::PreallocatedWithRealloc
        );
        let free = if prealloc {
            (0..attributes.initial_reserved_caches)
                .map(|_| Vec::with_capacity(attributes.payload_max_size))
                .collect()
        } else {
            Vec::new()
        };

        Self {
            memory_policy: attributes.memory_policy,
            payload_max_size: attributes.payload_max_size,
            max_caches,
            reserved: 0,
            free,
        }
    }

    /// Reserve a payload buffer able to hold `len` bytes.
    ///
    /// Returns `None` when the pool is exhausted, or when the fixed
    /// `Preallocated` policy cannot fit the requested length.
    pub fn reserve(&mut self, len: usize) -> Option<SerializedPayload> {
        if self.reserved >= self.max_caches {
            log::debug!(
                "[PayloadPool::reserve] pool exhausted ({} caches outstanding)",
                self.reserved
            );
            return None;
        }

        if self.memory_policy == HistoryMemoryPolicy::Preallocated && len > self.payload_max_size {
            log::warn!(
                "[PayloadPool::reserve] payload of {} bytes exceeds fixed size {}",
                len,
                self.payload_max_size
            );
            return None;
        }

        let wanted = match self.memory_policy {
            HistoryMemoryPolicy::Preallocated => self.payload_max_size,
            HistoryMemoryPolicy::PreallocatedWithRealloc => len.max(self.payload_max_size),
            HistoryMemoryPolicy::Dynamic | HistoryMemoryPolicy::DynamicReusable => len,
        };

        let data = match self.free.iter().position(|buf| buf.capacity() >= wanted) {
            Some(idx) => self.free.swap_remove(idx),
            None => Vec::with_capacity(wanted),
        };

        self.reserved += 1;
        Some(SerializedPayload { data })
    }

    /// Release one cache without recovering its buffer.
    ///
    /// Used when the payload is still shared outside the pool; the allocation
    /// is freed when the last owner drops it.
    pub fn release(&mut self) {
        self.reserved = self.reserved.saturating_sub(1);
    }

    /// Release one cache and take its buffer back for reuse.
    pub fn recycle(&mut self, payload: SerializedPayload) {
        self.reserved = self.reserved.saturating_sub(1);
        if matches!(
            self.memory_policy,
            HistoryMemoryPolicy::Preallocated
                | HistoryMemoryPolicy::PreallocatedWithRealloc
                | HistoryMemoryPolicy::DynamicReusable
        ) {
            let mut buf = payload.data;
            buf.clear();
            self.free.push(buf);
        }
    }

    /// Number of caches currently outstanding.
    pub fn reserved(&self) -> usize {
        self.reserved
    }

    /// Maximum payload size this pool serves under the fixed policy.
    pub fn payload_max_size(&self) -> usize {
        self.payload_max_size
    }

    /// Memory policy this pool was created with.
    pub fn memory_policy(&self) -> HistoryMemoryPolicy {
        self.memory_policy
    }

    /// Hard cap on outstanding caches.
    pub fn max_caches(&self) -> usize {
        self.max_caches
    }
}

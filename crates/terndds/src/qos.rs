// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 terndds contributors

//! QoS (Quality of Service) policies consumed by the reader history.
//!
//! The history recognizes the subset of DDS reader QoS that shapes sample
//! retention: the history policy (KEEP_LAST / KEEP_ALL), resource limits,
//! the deadline period and the payload memory policy. All other reader
//! policies live with the enclosing reader.

/// Deadline QoS policy - expected sample reception period.
pub mod deadline;

pub use deadline::Deadline;

/// History policy
///
/// Determines how many samples to keep per instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum History {
    /// Keep last N samples per instance (bounded queue, evicts oldest).
    KeepLast(u32),
    /// Keep all samples within `ResourceLimits`.
    ///
    /// Inserts fail once the limits are reached; nothing is evicted.
    KeepAll,
}

impl Default for History {
    fn default() -> Self {
        Self::KeepLast(1)
    }
}

impl History {
    /// Retention depth under KEEP_LAST; `None` for KEEP_ALL.
    pub fn depth(&self) -> Option<u32> {
        match self {
            History::KeepLast(depth) => Some(*depth),
            History::KeepAll => None,
        }
    }
}

/// Resource limits for the reader history.
///
/// A value of `0` means "unlimited"; the history rewrites zeros to
/// `usize::MAX` when it takes its configuration snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceLimits {
    /// Maximum total samples across all instances.
    pub max_samples: usize,
    /// Samples preallocated in the payload pool at creation.
    pub allocated_samples: usize,
    /// Maximum number of distinct keyed instances.
    pub max_instances: usize,
    /// Maximum samples retained per instance.
    pub max_samples_per_instance: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_samples: 0,
            allocated_samples: 100,
            max_instances: 0,
            max_samples_per_instance: 0,
        }
    }
}

/// Memory policy for the payload pool backing the history.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HistoryMemoryPolicy {
    /// Fixed-size payloads reserved up front.
    #[default]
    Preallocated,
    /// Preallocated, grown when a payload exceeds the reserved size.
    PreallocatedWithRealloc,
    /// Allocate per sample, free on release.
    Dynamic,
    /// Allocate per sample, keep released buffers for reuse.
    DynamicReusable,
}

/// QoS snapshot a DataReader hands to its history at creation.
///
/// Validated at reader creation (fail-fast on invalid config).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DataReaderQos {
    /// History policy (KeepLast or KeepAll).
    pub history: History,
    /// Capacity ceilings (samples, instances, samples per instance).
    pub resource_limits: ResourceLimits,
    /// Expected reception period per instance.
    pub deadline: Deadline,
    /// Payload pool memory policy.
    pub history_memory_policy: HistoryMemoryPolicy,
}

impl DataReaderQos {
    /// Validate the QoS combination.
    ///
    /// # Validation Rules
    ///
    /// - `History::KeepLast(n)` requires `n > 0`
    /// - when all three sample limits are bounded, `max_samples` must cover
    ///   `max_samples_per_instance * max_instances`
    pub fn validate(&self) -> Result<(), String> {
        if self.history == History::KeepLast(0) {
            return Err("History::KeepLast(n) requires n > 0".to_string());
        }

        let rl = &self.resource_limits;
        if rl.max_samples != 0
            && rl.max_instances != 0
            && rl.max_samples_per_instance != 0
            && rl.max_samples < rl.max_samples_per_instance.saturating_mul(rl.max_instances)
        {
            return Err(format!(
                "max_samples ({}) must be >= max_samples_per_instance ({}) * max_instances ({})",
                rl.max_samples, rl.max_samples_per_instance, rl.max_instances
            ));
        }

        Ok(())
    }
}
